//! APIs and their revisions (`service/{name}/apis/{apiId}`)

use super::client::Client;
use super::common::{ArmResource, ProvisioningState, QueryParams};
use super::error::ApiError;
use super::ids::{ApiId, ServiceId};
use serde::{Deserialize, Serialize};

pub type ApiContract = ArmResource<ApiProperties>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// `graphql`, `http`, `soap` or `websocket`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    /// Import-time variant of `type`; `http` maps to `http`, `soap` to `soap`.
    #[serde(rename = "apiType", skip_serializing_if = "Option::is_none")]
    pub soap_api_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_key_parameter_names: Option<SubscriptionKeyParameterNames>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_settings: Option<AuthenticationSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ApiContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<ApiLicense>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wsdl_selector: Option<WsdlSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionKeyParameterNames {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticationSettings {
    #[serde(rename = "oAuth2", skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2AuthenticationSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid: Option<OpenIdAuthenticationSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2AuthenticationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpenIdAuthenticationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid_provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token_sending_methods: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiLicense {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WsdlSelector {
    pub wsdl_service_name: String,
    pub wsdl_endpoint_name: String,
}

impl ProvisioningState for ApiContract {
    fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

pub struct ApisApi<'a> {
    client: &'a Client,
}

impl<'a> ApisApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &ApiId) -> Result<ApiContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn list(&self, service: &ServiceId) -> Result<Vec<ApiContract>, ApiError> {
        self.client
            .list(&format!("{}/apis", service), &QueryParams::new())
            .await
    }

    /// PUT an API. An import is submitted without `If-Match`; regular
    /// updates pass `Some("*")`. A 202 yields `None`.
    pub async fn create_or_update(
        &self,
        id: &ApiId,
        api: &ApiContract,
        if_match: Option<&str>,
    ) -> Result<Option<ApiContract>, ApiError> {
        let path = id.to_string();
        match if_match {
            Some(etag) => self.client.put_with_if_match(&path, api, etag).await,
            None => self.client.put(&path, api).await,
        }
    }

    pub async fn delete(&self, id: &ApiId, delete_revisions: bool) -> Result<(), ApiError> {
        let params = QueryParams::new().add("deleteRevisions", delete_revisions);
        self.client
            .delete_with_if_match(&id.to_string(), &params, "*")
            .await
    }
}

/// Maps `type` onto the `apiType` value the import endpoint expects.
pub fn soap_api_type(api_type: &str) -> &'static str {
    match api_type {
        "graphql" => "graphql",
        "soap" => "soap",
        "websocket" => "websocket",
        _ => "http",
    }
}
