//! Named values, optionally backed by a Key Vault secret

use super::client::Client;
use super::common::{ArmResource, ProvisioningState, QueryParams};
use super::error::ApiError;
use super::ids::NamedValueId;
use serde::{Deserialize, Serialize};

pub type NamedValueContract = ArmResource<NamedValueProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NamedValueProperties {
    pub display_name: String,
    /// Empty on GET when `secret` is true. Use [`NamedValuesApi::list_value`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault: Option<KeyVaultReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct NamedValueSecret {
    pub value: Option<String>,
}

impl ProvisioningState for NamedValueContract {
    fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

pub struct NamedValuesApi<'a> {
    client: &'a Client,
}

impl<'a> NamedValuesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &NamedValueId) -> Result<NamedValueContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &NamedValueId,
        named_value: &NamedValueContract,
    ) -> Result<Option<NamedValueContract>, ApiError> {
        self.client.put(&id.to_string(), named_value).await
    }

    pub async fn list_value(&self, id: &NamedValueId) -> Result<NamedValueSecret, ApiError> {
        self.client.post_action(&format!("{}/listValue", id)).await
    }

    pub async fn delete(&self, id: &NamedValueId) -> Result<(), ApiError> {
        self.client
            .delete_with_if_match(&id.to_string(), &QueryParams::new(), "*")
            .await
    }
}
