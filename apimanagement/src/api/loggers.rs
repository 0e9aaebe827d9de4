//! Loggers: Application Insights, Event Hub or Azure Monitor sinks

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::LoggerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type LoggerContract = ArmResource<LoggerProperties>;

pub const LOGGER_TYPE_APPLICATION_INSIGHTS: &str = "applicationInsights";
pub const LOGGER_TYPE_EVENT_HUB: &str = "azureEventHub";
pub const LOGGER_TYPE_AZURE_MONITOR: &str = "azureMonitor";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerProperties {
    pub logger_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Write-only. The service returns masked values or named-value
    /// references, never the original secrets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_buffered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LoggerUpdate {
    pub properties: LoggerUpdateProperties,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerUpdateProperties {
    pub logger_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_buffered: Option<bool>,
}

pub struct LoggersApi<'a> {
    client: &'a Client,
}

impl<'a> LoggersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &LoggerId) -> Result<LoggerContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &LoggerId,
        logger: &LoggerContract,
    ) -> Result<Option<LoggerContract>, ApiError> {
        self.client.put(&id.to_string(), logger).await
    }

    pub async fn update(
        &self,
        id: &LoggerId,
        update: &LoggerUpdate,
    ) -> Result<Option<LoggerContract>, ApiError> {
        self.client
            .patch_with_if_match(&id.to_string(), update, "*")
            .await
    }

    pub async fn delete(&self, id: &LoggerId) -> Result<(), ApiError> {
        self.client
            .delete_with_if_match(&id.to_string(), &QueryParams::new(), "*")
            .await
    }
}
