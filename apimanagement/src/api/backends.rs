//! Backends, single or load-balanced pools

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::BackendId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type BackendContract = ArmResource<BackendProperties>;

pub const BACKEND_TYPE_SINGLE: &str = "Single";
pub const BACKEND_TYPE_POOL: &str = "Pool";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendProperties {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BackendCredentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<BackendProxy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<BackendTls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BackendExtraProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreaker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<BackendPool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationHeaderCredentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationHeaderCredentials {
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub scheme: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendProxy {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendTls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_certificate_chain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_certificate_name: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendExtraProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_fabric_cluster: Option<ServiceFabricCluster>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFabricCluster {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_id: Option<String>,
    /// Lowercase `t` on the wire.
    #[serde(
        rename = "clientCertificatethumbprint",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_certificate_thumbprint: Option<String>,
    #[serde(default)]
    pub management_endpoints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_partition_resolution_retries: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_certificate_thumbprints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_x509_names: Option<Vec<X509CertificateName>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct X509CertificateName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_certificate_thumbprint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitBreaker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<CircuitBreakerRule>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_retry_after: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_condition: Option<FailureCondition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reasons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code_ranges: Option<Vec<StatusCodeRange>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCodeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<BackendPoolItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendPoolItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

pub struct BackendsApi<'a> {
    client: &'a Client,
}

impl<'a> BackendsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &BackendId) -> Result<BackendContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &BackendId,
        backend: &BackendContract,
    ) -> Result<Option<BackendContract>, ApiError> {
        self.client.put(&id.to_string(), backend).await
    }

    pub async fn delete(&self, id: &BackendId) -> Result<(), ApiError> {
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

    #[test]
    fn service_fabric_thumbprint_wire_name() {
        let cluster = ServiceFabricCluster {
            client_certificate_thumbprint: Some("ABC".to_string()),
            management_endpoints: vec!["https://sf:19080".to_string()],
            max_partition_resolution_retries: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&cluster).unwrap();
        assert_eq!(json["clientCertificatethumbprint"], "ABC");
        assert_eq!(json["maxPartitionResolutionRetries"], 5);
    }

    #[tokio::test]
    async fn pool_backend_round_trip() {
        let mut server = Server::new_async().await;
        let id = BackendId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "pool1");
        let path = id.to_string();
        let m = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"type": "Pool", "pool": {"services": [{"id": "/b1", "priority": 1}]}}
            })))
            .with_status(201)
            .with_body(
                r#"{"name":"pool1","properties":{"type":"Pool","pool":{"services":[{"id":"/b1","priority":1}]}}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let body = BackendContract::with_properties(BackendProperties {
            backend_type: Some(BACKEND_TYPE_POOL.to_string()),
            pool: Some(BackendPool {
                services: Some(vec![BackendPoolItem {
                    id: "/b1".to_string(),
                    priority: Some(1),
                    weight: None,
                }]),
            }),
            ..Default::default()
        });
        let created = client
            .backends()
            .create_or_update(&id, &body)
            .await
            .unwrap()
            .unwrap();

        m.assert_async().await;
        assert_eq!(created.properties.unwrap().pool, body.properties.unwrap().pool);
    }
}
