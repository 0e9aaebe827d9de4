//! Common types and utilities for the ARM API

use serde::{Deserialize, Serialize};

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
pub struct ArmErrorResponse {
    pub error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ArmErrorBody {
    /// The message followed by any per-field details.
    pub fn full_message(&self) -> String {
        if self.details.is_empty() {
            return self.message.clone();
        }
        let details = self
            .details
            .iter()
            .map(|d| match &d.target {
                Some(target) => format!("{} ({}): {}", d.code, target, d.message),
                None => format!("{}: {}", d.code, d.message),
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("{} [{}]", self.message, details)
    }
}

/// Paged collection returned by ARM list operations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Child resource shape shared by most APIM entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmResource<P> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<P>,
}

impl<P> ArmResource<P> {
    pub fn with_properties(properties: P) -> Self {
        Self {
            id: None,
            name: None,
            resource_type: None,
            properties: Some(properties),
        }
    }
}

/// Exposes `properties.provisioningState` to the poller.
pub trait ProvisioningState {
    fn provisioning_state(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `k=v&k2=v2` with values percent-encoded, no leading `?`.
    pub fn encode(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Splits comma-separated values the way the portal stores them.
pub fn split_comma(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn query_params_skip_missing_values() {
        let params = QueryParams::new()
            .add("deleteRevisions", true)
            .add_optional("$filter", Some("name eq 'a b'"))
            .add_optional("$top", None::<u32>);

        assert_eq!(
            params.encode(),
            "deleteRevisions=true&$filter=name%20eq%20%27a%20b%27"
        );
    }

    #[test]
    fn error_envelope_with_details() {
        let body: ArmErrorResponse = serde_json::from_str(
            r#"{"error":{"code":"ValidationError","message":"One or more fields contain incorrect values:","details":[{"code":"ValidationError","target":"path","message":"path is invalid"}]}}"#,
        )
        .unwrap();

        assert_eq!(body.error.code, "ValidationError");
        assert_eq!(
            body.error.full_message(),
            "One or more fields contain incorrect values: [ValidationError (path): path is invalid]"
        );
    }

    #[test]
    fn list_result_defaults() {
        let list: ListResult<ArmResource<serde_json::Value>> =
            serde_json::from_str(r#"{"value":[{"name":"echo-api"}]}"#).unwrap();
        assert_eq!(list.value.len(), 1);
        assert!(list.next_link.is_none());
        assert_eq!(list.value[0].name.as_deref(), Some("echo-api"));
    }

    #[test]
    fn split_comma_trims_and_drops_empty() {
        assert_eq!(split_comma("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_comma("").is_empty());
    }
}
