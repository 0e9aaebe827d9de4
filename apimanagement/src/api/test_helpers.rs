//! Test helpers for the ARM API

use super::auth::StaticTokenCredential;
use super::client::{Client, RetryConfig};
use super::pool::ConnectionConfig;
use std::sync::Arc;

pub const TEST_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

#[allow(clippy::disallowed_methods)]
pub fn create_test_client(url: &str) -> Client {
    create_test_client_with_retry(
        url,
        RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
    )
}

#[allow(clippy::disallowed_methods)]
pub fn create_test_client_with_retry(url: &str, retry_config: RetryConfig) -> Client {
    Client::with_config(
        url,
        TEST_SUBSCRIPTION,
        Arc::new(StaticTokenCredential::new("test-token")),
        retry_config,
        ConnectionConfig::default(),
    )
    .unwrap()
}
