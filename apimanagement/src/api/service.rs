//! API Management service (`Microsoft.ApiManagement/service`)

use super::client::Client;
use super::common::ProvisioningState;
use super::error::ApiError;
use super::ids::ServiceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<ServiceSku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ServiceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ServiceProperties>,
}

/// PATCH body. Only the fields that changed are set.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<ServiceSku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ServiceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ServiceProperties>,
}

impl ServiceUpdate {
    pub fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.identity.is_none()
            && self.zones.is_none()
            && self.tags.is_none()
            && self.properties.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSku {
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<HashMap<String, UserAssignedIdentity>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sender_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_regional_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_portal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname_configurations: Option<Vec<HostnameConfiguration>>,
    #[serde(rename = "publicIPAddresses", skip_serializing_if = "Option::is_none")]
    pub public_ip_addresses: Option<Vec<String>>,
    #[serde(rename = "privateIPAddresses", skip_serializing_if = "Option::is_none")]
    pub private_ip_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_address_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_configuration: Option<VirtualNetworkConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_locations: Option<Vec<AdditionalLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_client_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_gateway: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_constraint: Option<ApiVersionConstraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostnameConfiguration {
    #[serde(rename = "type")]
    pub hostname_type: String,
    pub host_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ssl_binding: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiate_client_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInformation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    pub store_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateInformation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnetid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetname: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalLocation {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<ServiceSku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(rename = "publicIPAddresses", skip_serializing_if = "Option::is_none")]
    pub public_ip_addresses: Option<Vec<String>>,
    #[serde(rename = "privateIPAddresses", skip_serializing_if = "Option::is_none")]
    pub private_ip_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_address_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_configuration: Option<VirtualNetworkConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_regional_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_gateway: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_api_version: Option<String>,
}

impl ProvisioningState for ServiceResource {
    fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

pub struct ServiceApi<'a> {
    client: &'a Client,
}

impl<'a> ServiceApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &ServiceId) -> Result<ServiceResource, ApiError> {
        self.client.get(&id.to_string()).await
    }

    /// Long-running PUT. Accepted responses may carry no body, so callers
    /// poll with [`ServiceApi::get`] afterwards.
    pub async fn create_or_update(
        &self,
        id: &ServiceId,
        service: &ServiceResource,
    ) -> Result<Option<ServiceResource>, ApiError> {
        self.client.put(&id.to_string(), service).await
    }

    pub async fn update(
        &self,
        id: &ServiceId,
        update: &ServiceUpdate,
    ) -> Result<Option<ServiceResource>, ApiError> {
        self.client.patch(&id.to_string(), update).await
    }

    pub async fn delete(&self, id: &ServiceId) -> Result<(), ApiError> {
        self.client
            .delete(&id.to_string(), &super::common::QueryParams::new())
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    fn service_id() -> ServiceId {
        ServiceId::new(TEST_SUBSCRIPTION, "rg1", "apim1")
    }

    #[tokio::test]
    async fn get_parses_service() {
        let mut server = Server::new_async().await;
        let path = service_id().to_string();
        let _m = server
            .mock("GET", path.as_str())
            .match_query(Matcher::UrlEncoded("api-version".into(), "2024-05-01".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "id": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1",
                "name": "apim1",
                "location": "West Europe",
                "sku": {"name": "Developer", "capacity": 1},
                "properties": {
                    "publisherName": "Contoso",
                    "publisherEmail": "admin@contoso.com",
                    "provisioningState": "Succeeded",
                    "gatewayUrl": "https://apim1.azure-api.net",
                    "customProperties": {
                        "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.Protocols.Tls10": "false"
                    },
                    "hostnameConfigurations": [
                        {"type": "Proxy", "hostName": "apim1.azure-api.net", "defaultSslBinding": true}
                    ]
                }
            }"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let service = client.services().get(&service_id()).await.unwrap();

        assert_eq!(service.name.as_deref(), Some("apim1"));
        assert_eq!(service.sku.as_ref().unwrap().capacity, 1);
        assert_eq!(service.provisioning_state(), Some("Succeeded"));
        let props = service.properties.unwrap();
        assert_eq!(props.publisher_name.as_deref(), Some("Contoso"));
        let hostnames = props.hostname_configurations.unwrap();
        assert_eq!(hostnames[0].hostname_type, "Proxy");
        assert_eq!(hostnames[0].default_ssl_binding, Some(true));
    }

    #[tokio::test]
    async fn update_sends_only_set_fields() {
        let mut server = Server::new_async().await;
        let path = service_id().to_string();
        let _m = server
            .mock("PATCH", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!({
                "tags": {"env": "test"}
            })))
            .with_status(202)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let update = ServiceUpdate {
            tags: Some(HashMap::from([("env".to_string(), "test".to_string())])),
            ..Default::default()
        };
        let result = client.services().update(&service_id(), &update).await.unwrap();

        assert!(result.is_none());
        _m.assert_async().await;
    }

    #[tokio::test]
    async fn get_missing_service_is_not_found() {
        let mut server = Server::new_async().await;
        let path = service_id().to_string();
        let _m = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.services().get(&service_id()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(ServiceUpdate::default().is_empty());
        let update = ServiceUpdate {
            zones: Some(vec!["1".to_string()]),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
