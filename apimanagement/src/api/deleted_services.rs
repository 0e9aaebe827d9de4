//! Soft-deleted services (`locations/{location}/deletedServices`)

use super::client::Client;
use super::common::{ProvisioningState, QueryParams};
use super::error::ApiError;
use super::ids::DeletedServiceId;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedService {
    pub id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub properties: Option<DeletedServiceProperties>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedServiceProperties {
    pub service_id: Option<String>,
    pub scheduled_purge_date: Option<String>,
    pub deletion_date: Option<String>,
}

/// A purge in progress reports no state; the poller treats it as pending
/// until the GET turns 404.
impl ProvisioningState for DeletedService {
    fn provisioning_state(&self) -> Option<&str> {
        None
    }
}

pub struct DeletedServicesApi<'a> {
    client: &'a Client,
}

impl<'a> DeletedServicesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &DeletedServiceId) -> Result<DeletedService, ApiError> {
        self.client.get(&id.to_string()).await
    }

    /// Permanently removes a soft-deleted service.
    pub async fn purge(&self, id: &DeletedServiceId) -> Result<(), ApiError> {
        self.client.delete(&id.to_string(), &QueryParams::new()).await
    }
}

/// Lowercases and strips spaces so `West Europe` and `westeurope` address the
/// same deleted service.
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    #[test]
    fn normalizes_display_locations() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("eastus2"), "eastus2");
    }

    #[tokio::test]
    async fn get_and_purge() {
        let mut server = Server::new_async().await;
        let id = DeletedServiceId::new(TEST_SUBSCRIPTION, "westeurope", "apim1");
        let path = id.to_string();

        let get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"name":"apim1","location":"West Europe","properties":{"scheduledPurgeDate":"2026-11-01T00:00:00Z"}}"#,
            )
            .create_async()
            .await;
        let purge = server
            .mock("DELETE", path.as_str())
            .match_query(Matcher::Any)
            .with_status(202)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let deleted = client.deleted_services().get(&id).await.unwrap();
        assert_eq!(deleted.name.as_deref(), Some("apim1"));
        assert_eq!(
            deleted.properties.unwrap().scheduled_purge_date.as_deref(),
            Some("2026-11-01T00:00:00Z")
        );

        client.deleted_services().purge(&id).await.unwrap();
        get.assert_async().await;
        purge.assert_async().await;
    }
}
