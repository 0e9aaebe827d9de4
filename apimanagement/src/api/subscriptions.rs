//! API Management subscriptions (keys scoped to a product, an API or all APIs)

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::SubscriptionId;
use serde::{Deserialize, Serialize};

pub type SubscriptionContract = ArmResource<SubscriptionProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_tracing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub properties: SubscriptionUpdateProperties,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_tracing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionKeys {
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
}

pub struct SubscriptionsApi<'a> {
    client: &'a Client,
}

impl<'a> SubscriptionsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &SubscriptionId) -> Result<SubscriptionContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &SubscriptionId,
        subscription: &SubscriptionContract,
    ) -> Result<Option<SubscriptionContract>, ApiError> {
        self.client.put(&id.to_string(), subscription).await
    }

    pub async fn update(
        &self,
        id: &SubscriptionId,
        update: &SubscriptionUpdate,
    ) -> Result<Option<SubscriptionContract>, ApiError> {
        self.client
            .patch_with_if_match(&id.to_string(), update, "*")
            .await
    }

    pub async fn list_secrets(&self, id: &SubscriptionId) -> Result<SubscriptionKeys, ApiError> {
        self.client.post_action(&format!("{}/listSecrets", id)).await
    }

    pub async fn delete(&self, id: &SubscriptionId) -> Result<(), ApiError> {
        self.client
            .delete_with_if_match(&id.to_string(), &QueryParams::new(), "*")
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_then_list_secrets() {
        let mut server = Server::new_async().await;
        let id = SubscriptionId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "sub1");
        let path = id.to_string();
        let scope = format!("{}/apis", id.service_id());

        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"scope": scope, "displayName": "All APIs", "state": "submitted"}
            })))
            .with_status(201)
            .with_body(r#"{"properties":{"scope":"/apis","displayName":"All APIs","state":"submitted"}}"#)
            .create_async()
            .await;
        let _secrets = server
            .mock("POST", format!("{}/listSecrets", path).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"primaryKey":"p","secondaryKey":"s"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let body = SubscriptionContract::with_properties(SubscriptionProperties {
            scope: scope.clone(),
            display_name: Some("All APIs".to_string()),
            state: Some("submitted".to_string()),
            ..Default::default()
        });
        client
            .subscriptions()
            .create_or_update(&id, &body)
            .await
            .unwrap();
        let keys = client.subscriptions().list_secrets(&id).await.unwrap();

        put.assert_async().await;
        assert_eq!(keys.primary_key.as_deref(), Some("p"));
        assert_eq!(keys.secondary_key.as_deref(), Some("s"));
    }
}
