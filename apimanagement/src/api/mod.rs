//! Azure Resource Manager client for API Management

pub mod auth;
pub mod client;
pub mod common;
pub mod error;
pub mod ids;
pub mod poll;
pub mod pool;
pub mod retry;

pub mod api_diagnostics;
pub mod apis;
pub mod backends;
pub mod deleted_services;
pub mod identity_providers;
pub mod loggers;
pub mod named_values;
pub mod portal_settings;
pub mod products;
pub mod service;
pub mod subscriptions;
pub mod workspaces;

#[cfg(test)]
pub mod test_helpers;

pub use auth::{ClientSecretCredential, StaticTokenCredential, TokenCredential};
pub use client::{Client, RetryConfig};
pub use error::ApiError;
pub use pool::{ConnectionConfig, ConnectionStats};
