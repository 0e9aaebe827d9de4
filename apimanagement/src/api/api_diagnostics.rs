//! API-scoped diagnostics (`apis/{apiId}/diagnostics/{diagnosticId}`)

use super::client::Client;
use super::common::{ArmResource, QueryParams};
use super::error::ApiError;
use super::ids::ApiDiagnosticId;
use serde::{Deserialize, Serialize};

pub type DiagnosticContract = ArmResource<DiagnosticProperties>;

pub const ALWAYS_LOG_ALL_ERRORS: &str = "allErrors";
pub const SAMPLING_TYPE_FIXED: &str = "fixed";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticProperties {
    pub logger_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<PipelineDiagnosticSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<PipelineDiagnosticSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_client_ip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_correlation_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name_format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineDiagnosticSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HttpMessageDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpMessageDiagnostic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpMessageDiagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDiagnosticSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_masking: Option<DataMasking>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BodyDiagnosticSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMasking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<DataMaskingEntity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<DataMaskingEntity>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMaskingEntity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

pub struct ApiDiagnosticsApi<'a> {
    client: &'a Client,
}

impl<'a> ApiDiagnosticsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &ApiDiagnosticId) -> Result<DiagnosticContract, ApiError> {
        self.client.get(&id.to_string()).await
    }

    pub async fn create_or_update(
        &self,
        id: &ApiDiagnosticId,
        diagnostic: &DiagnosticContract,
    ) -> Result<Option<DiagnosticContract>, ApiError> {
        self.client
            .put_with_if_match(&id.to_string(), diagnostic, "*")
            .await
    }

    pub async fn delete(&self, id: &ApiDiagnosticId) -> Result<(), ApiError> {
        self.client
            .delete_with_if_match(&id.to_string(), &QueryParams::new(), "*")
            .await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::ids::ApiId;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    fn diagnostic_id() -> ApiDiagnosticId {
        let api = ApiId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "echo");
        ApiDiagnosticId::new(&api, "azuremonitor")
    }

    #[test]
    fn unset_sampling_is_omitted() {
        let props = DiagnosticProperties {
            logger_id: "/loggers/l1".to_string(),
            always_log: Some(ALWAYS_LOG_ALL_ERRORS.to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"loggerId": "/loggers/l1", "alwaysLog": "allErrors"})
        );
    }

    #[tokio::test]
    async fn get_parses_nested_settings() {
        let mut server = Server::new_async().await;
        let path = diagnostic_id().to_string();
        let _m = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                "properties": {
                    "loggerId": "/loggers/l1",
                    "sampling": {"samplingType": "fixed", "percentage": 12.5},
                    "frontend": {
                        "request": {
                            "headers": ["Accept"],
                            "body": {"bytes": 512},
                            "dataMasking": {"query": [{"mode": "Hide", "value": "token"}]}
                        }
                    }
                }
            }"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let diagnostic = client.api_diagnostics().get(&diagnostic_id()).await.unwrap();
        let props = diagnostic.properties.unwrap();

        assert_eq!(props.sampling.unwrap().percentage, Some(12.5));
        let request = props.frontend.unwrap().request.unwrap();
        assert_eq!(request.body.unwrap().bytes, Some(512));
        let query = request.data_masking.unwrap().query.unwrap();
        assert_eq!(query[0].mode.as_deref(), Some("Hide"));
    }
}
