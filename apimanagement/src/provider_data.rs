//! Provider data structure passed to resources and data sources

use crate::api::retry::RetryPolicy;
use crate::api::Client;
use crate::config::ApiManagementFeatures;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiManagementProviderData {
    pub client: Arc<Client>,
    pub features: ApiManagementFeatures,
    /// Used for the status-keyed retries around PUTs (412 on APIs, 400 while
    /// recovering a soft-deleted service).
    pub retry_policy: RetryPolicy,
}

impl ApiManagementProviderData {
    pub fn new(client: Client, features: ApiManagementFeatures) -> Self {
        Self {
            client: Arc::new(client),
            features,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}
