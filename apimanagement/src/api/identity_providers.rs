//! Developer portal identity providers (`identityProviders/{type}`)

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::IdentityProviderId;
use serde::{Deserialize, Serialize};

pub type IdentityProviderContract = ArmResource<IdentityProviderProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderProperties {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,
    pub client_id: String,
    /// Not returned by GET.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tenants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signin_tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_library: Option<String>,
}

pub struct IdentityProvidersApi<'a> {
    client: &'a Client,
}

impl<'a> IdentityProvidersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &IdentityProviderId) -> Result<IdentityProviderContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &IdentityProviderId,
        provider: &IdentityProviderContract,
    ) -> Result<Option<IdentityProviderContract>, ApiError> {
        self.client
            .put_with_if_match(&id.to_string(), provider, "*")
            .await
    }

    pub async fn delete(&self, id: &IdentityProviderId) -> Result<(), ApiError> {
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
    async fn get_aad_provider() {
        let mut server = Server::new_async().await;
        let id = IdentityProviderId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "aad");
        assert!(id.to_string().ends_with("/identityProviders/aad"));

        let _m = server
            .mock("GET", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"properties":{"type":"aad","clientId":"app","allowedTenants":["contoso.onmicrosoft.com"],"signinTenant":"contoso.onmicrosoft.com"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let provider = client.identity_providers().get(&id).await.unwrap();
        let props = provider.properties.unwrap();

        assert_eq!(props.client_id, "app");
        assert_eq!(props.client_secret, None);
        assert_eq!(
            props.allowed_tenants,
            Some(vec!["contoso.onmicrosoft.com".to_string()])
        );
    }
}
