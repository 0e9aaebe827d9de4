//! Products. Only listing and deletion are needed, to clear the sample
//! products a new service is provisioned with.

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::{ProductId, ServiceId};
use serde::{Deserialize, Serialize};

pub type ProductContract = ArmResource<ProductProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

pub struct ProductsApi<'a> {
    client: &'a Client,
}

impl<'a> ProductsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, service: &ServiceId) -> Result<Vec<ProductContract>, ApiError> {
        self.client
            .list(&format!("{}/products", service), &QueryParams::new())
            .await
    }

    pub async fn delete(&self, id: &ProductId, delete_subscriptions: bool) -> Result<(), ApiError> {
        let params = QueryParams::new().add("deleteSubscriptions", delete_subscriptions);
        self.client
            .delete_with_if_match(&id.to_string(), &params, "*")
            .await
    }
}
