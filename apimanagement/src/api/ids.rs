//! Typed Azure resource IDs
//!
//! Each ID parses from and formats to the canonical ARM path. Static segments
//! (`resourceGroups`, `providers`, ...) match case-insensitively on parse and
//! are always written back in canonical case, so `parse(id.to_string())`
//! returns the same value.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const PROVIDER_NAMESPACE: &str = "Microsoft.ApiManagement";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("parsing {kind} ID {id:?}: expected {expected} segments, got {actual}")]
    SegmentCount {
        kind: &'static str,
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("parsing {kind} ID {id:?}: expected segment {expected:?} at position {position}, got {actual:?}")]
    UnexpectedSegment {
        kind: &'static str,
        id: String,
        position: usize,
        expected: &'static str,
        actual: String,
    },

    #[error("parsing {kind} ID {id:?}: the value for {name:?} is empty")]
    EmptyValue {
        kind: &'static str,
        id: String,
        name: &'static str,
    },

    #[error("parsing {kind} ID {id:?}: {reason}")]
    Invalid {
        kind: &'static str,
        id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Static(&'static str),
    Value(&'static str),
}

use Segment::{Static, Value};

const SERVICE_SEGMENTS: [Segment; 8] = [
    Static("subscriptions"),
    Value("subscription_id"),
    Static("resourceGroups"),
    Value("resource_group_name"),
    Static("providers"),
    Static(PROVIDER_NAMESPACE),
    Static("service"),
    Value("service_name"),
];

/// Splits `input` against `pattern` and returns the variable segments in order.
fn parse_segments(
    kind: &'static str,
    input: &str,
    pattern: &[Segment],
) -> Result<Vec<String>, IdError> {
    let trimmed = input.strip_prefix('/').ok_or_else(|| IdError::Invalid {
        kind,
        id: input.to_string(),
        reason: "must start with \"/\"".to_string(),
    })?;
    let parts: Vec<&str> = trimmed.trim_end_matches('/').split('/').collect();

    if parts.len() != pattern.len() {
        return Err(IdError::SegmentCount {
            kind,
            id: input.to_string(),
            expected: pattern.len(),
            actual: parts.len(),
        });
    }

    let mut values = Vec::new();
    for (position, (part, segment)) in parts.iter().zip(pattern.iter().copied()).enumerate() {
        match segment {
            Static(expected) if part.eq_ignore_ascii_case(expected) => {}
            Static(expected) => {
                return Err(IdError::UnexpectedSegment {
                    kind,
                    id: input.to_string(),
                    position,
                    expected,
                    actual: part.to_string(),
                })
            }
            Value(name) if part.is_empty() => {
                return Err(IdError::EmptyValue {
                    kind,
                    id: input.to_string(),
                    name,
                })
            }
            Value(_) => values.push(part.to_string()),
        }
    }
    Ok(values)
}

fn into_array<const N: usize>(
    kind: &'static str,
    input: &str,
    values: Vec<String>,
) -> Result<[String; N], IdError> {
    let actual = values.len();
    values.try_into().map_err(|_| IdError::SegmentCount {
        kind,
        id: input.to_string(),
        expected: N,
        actual,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub service_name: String,
}

impl ServiceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group_name: resource_group_name.into(),
            service_name: service_name.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let values = parse_segments("Service", input, &SERVICE_SEGMENTS)?;
        let [subscription_id, resource_group_name, service_name] =
            into_array("Service", input, values)?;
        Ok(Self {
            subscription_id,
            resource_group_name,
            service_name,
        })
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/service/{}",
            self.subscription_id, self.resource_group_name, PROVIDER_NAMESPACE, self.service_name
        )
    }
}

impl FromStr for ServiceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// IDs of the form `{service}/{collection}/{name}`.
macro_rules! service_child_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $collection:literal, $field:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            pub subscription_id: String,
            pub resource_group_name: String,
            pub service_name: String,
            pub $field: String,
        }

        impl $name {
            pub fn new(
                subscription_id: impl Into<String>,
                resource_group_name: impl Into<String>,
                service_name: impl Into<String>,
                $field: impl Into<String>,
            ) -> Self {
                Self {
                    subscription_id: subscription_id.into(),
                    resource_group_name: resource_group_name.into(),
                    service_name: service_name.into(),
                    $field: $field.into(),
                }
            }

            pub fn from_service(service: &ServiceId, $field: impl Into<String>) -> Self {
                Self::new(
                    service.subscription_id.clone(),
                    service.resource_group_name.clone(),
                    service.service_name.clone(),
                    $field,
                )
            }

            pub fn service_id(&self) -> ServiceId {
                ServiceId::new(
                    self.subscription_id.clone(),
                    self.resource_group_name.clone(),
                    self.service_name.clone(),
                )
            }

            pub fn parse(input: &str) -> Result<Self, IdError> {
                let mut pattern = SERVICE_SEGMENTS.to_vec();
                pattern.push(Static($collection));
                pattern.push(Value(stringify!($field)));

                let values = parse_segments($kind, input, &pattern)?;
                let [subscription_id, resource_group_name, service_name, $field] =
                    into_array($kind, input, values)?;
                Ok(Self {
                    subscription_id,
                    resource_group_name,
                    service_name,
                    $field,
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}/{}/{}", self.service_id(), $collection, self.$field)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

service_child_id!(
    /// `api_id` is the ARM API identifier, which may carry a `;rev=N` suffix.
    ApiId, "Api", "apis", api_id
);
service_child_id!(BackendId, "Backend", "backends", backend_id);
service_child_id!(LoggerId, "Logger", "loggers", logger_id);
service_child_id!(
    /// The last segment is the provider type: `aad`, `facebook`, ...
    IdentityProviderId, "Identity Provider", "identityProviders", identity_provider_name
);
service_child_id!(NamedValueId, "Named Value", "namedValues", named_value_id);
service_child_id!(WorkspaceId, "Workspace", "workspaces", workspace_id);
service_child_id!(
    /// An APIM subscription, not an Azure subscription.
    SubscriptionId, "Subscription", "subscriptions", subscription_name
);
service_child_id!(ProductId, "Product", "products", product_id);
service_child_id!(ApiVersionSetId, "Api Version Set", "apiVersionSets", version_set_id);

/// Separator between an API name and its revision in the ARM API ID.
pub const REVISION_SEPARATOR: &str = ";rev=";

impl ApiId {
    /// The API name with any `;rev=N` qualifier removed.
    pub fn api_name(&self) -> &str {
        match self.api_id.split_once(REVISION_SEPARATOR) {
            Some((name, _)) => name,
            None => &self.api_id,
        }
    }

    pub fn revision(&self) -> Option<&str> {
        self.api_id
            .split_once(REVISION_SEPARATOR)
            .map(|(_, revision)| revision)
    }
}

/// Builds the ARM API ID for a name and revision: `{name};rev={revision}`.
pub fn api_id_with_revision(name: &str, revision: &str) -> String {
    format!("{}{}{}", name, REVISION_SEPARATOR, revision)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiDiagnosticId {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub service_name: String,
    pub api_id: String,
    pub diagnostic_id: String,
}

impl ApiDiagnosticId {
    pub fn new(api: &ApiId, diagnostic_id: impl Into<String>) -> Self {
        Self {
            subscription_id: api.subscription_id.clone(),
            resource_group_name: api.resource_group_name.clone(),
            service_name: api.service_name.clone(),
            api_id: api.api_id.clone(),
            diagnostic_id: diagnostic_id.into(),
        }
    }

    pub fn api(&self) -> ApiId {
        ApiId::new(
            self.subscription_id.clone(),
            self.resource_group_name.clone(),
            self.service_name.clone(),
            self.api_id.clone(),
        )
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let mut pattern = SERVICE_SEGMENTS.to_vec();
        pattern.extend([
            Static("apis"),
            Value("api_id"),
            Static("diagnostics"),
            Value("diagnostic_id"),
        ]);

        let values = parse_segments("Api Diagnostic", input, &pattern)?;
        let [subscription_id, resource_group_name, service_name, api_id, diagnostic_id] =
            into_array("Api Diagnostic", input, values)?;
        Ok(Self {
            subscription_id,
            resource_group_name,
            service_name,
            api_id,
            diagnostic_id,
        })
    }
}

impl fmt::Display for ApiDiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/diagnostics/{}", self.api(), self.diagnostic_id)
    }
}

impl FromStr for ApiDiagnosticId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A soft-deleted service, addressed by location rather than resource group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletedServiceId {
    pub subscription_id: String,
    pub location: String,
    pub service_name: String,
}

impl DeletedServiceId {
    pub fn new(
        subscription_id: impl Into<String>,
        location: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            location: location.into(),
            service_name: service_name.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let pattern = [
            Static("subscriptions"),
            Value("subscription_id"),
            Static("providers"),
            Static(PROVIDER_NAMESPACE),
            Static("locations"),
            Value("location"),
            Static("deletedServices"),
            Value("service_name"),
        ];
        let values = parse_segments("Deleted Service", input, &pattern)?;
        let [subscription_id, location, service_name] =
            into_array("Deleted Service", input, values)?;
        Ok(Self {
            subscription_id,
            location,
            service_name,
        })
    }
}

impl fmt::Display for DeletedServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/providers/{}/locations/{}/deletedServices/{}",
            self.subscription_id, PROVIDER_NAMESPACE, self.location, self.service_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubnetId {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub virtual_network_name: String,
    pub subnet_name: String,
}

impl SubnetId {
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let pattern = [
            Static("subscriptions"),
            Value("subscription_id"),
            Static("resourceGroups"),
            Value("resource_group_name"),
            Static("providers"),
            Static("Microsoft.Network"),
            Static("virtualNetworks"),
            Value("virtual_network_name"),
            Static("subnets"),
            Value("subnet_name"),
        ];
        let values = parse_segments("Subnet", input, &pattern)?;
        let [subscription_id, resource_group_name, virtual_network_name, subnet_name] =
            into_array("Subnet", input, values)?;
        Ok(Self {
            subscription_id,
            resource_group_name,
            virtual_network_name,
            subnet_name,
        })
    }
}

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
            self.subscription_id, self.resource_group_name, self.virtual_network_name, self.subnet_name
        )
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    const SERVICE: &str = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1";

    #[test]
    fn service_id_round_trips() {
        let id = ServiceId::parse(SERVICE).unwrap();
        assert_eq!(id.service_name, "apim1");
        assert_eq!(id.to_string(), SERVICE);
    }

    #[test]
    fn static_segments_are_case_insensitive() {
        let id = ServiceId::parse(
            "/subscriptions/sub1/resourcegroups/rg1/providers/microsoft.apimanagement/Service/apim1",
        )
        .unwrap();
        assert_eq!(id.to_string(), SERVICE);
    }

    #[test]
    fn wrong_segment_count_is_rejected() {
        let err = ServiceId::parse("/subscriptions/sub1/resourceGroups/rg1").unwrap_err();
        assert!(matches!(
            err,
            IdError::SegmentCount {
                expected: 8,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn wrong_static_segment_is_rejected() {
        let err = BackendId::parse(&format!("{}/loggers/l1", SERVICE)).unwrap_err();
        match err {
            IdError::UnexpectedSegment {
                expected, actual, ..
            } => {
                assert_eq!(expected, "backends");
                assert_eq!(actual, "loggers");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn empty_values_and_missing_slash_are_rejected() {
        assert!(matches!(
            LoggerId::parse(&format!("{}/loggers/", SERVICE.replace("rg1", ""))),
            Err(IdError::EmptyValue { .. }) | Err(IdError::SegmentCount { .. })
        ));
        assert!(matches!(
            ServiceId::parse(SERVICE.trim_start_matches('/')),
            Err(IdError::Invalid { .. })
        ));
    }

    #[test]
    fn api_id_strips_revision() {
        let id = ApiId::parse(&format!("{}/apis/echo;rev=3", SERVICE)).unwrap();
        assert_eq!(id.api_id, "echo;rev=3");
        assert_eq!(id.api_name(), "echo");
        assert_eq!(id.revision(), Some("3"));

        let plain = ApiId::new("sub1", "rg1", "apim1", "echo");
        assert_eq!(plain.api_name(), "echo");
        assert_eq!(plain.revision(), None);
        assert_eq!(api_id_with_revision("echo", "1"), "echo;rev=1");
    }

    #[test]
    fn child_ids_round_trip() {
        let cases = [
            format!("{}/apis/echo;rev=1", SERVICE),
            format!("{}/backends/b1", SERVICE),
            format!("{}/loggers/l1", SERVICE),
            format!("{}/identityProviders/aad", SERVICE),
            format!("{}/namedValues/nv1", SERVICE),
            format!("{}/workspaces/ws1", SERVICE),
            format!("{}/subscriptions/s1", SERVICE),
            format!("{}/products/starter", SERVICE),
            format!("{}/apiVersionSets/vs1", SERVICE),
            format!("{}/apis/echo/diagnostics/applicationinsights", SERVICE),
        ];

        assert_eq!(ApiId::parse(&cases[0]).unwrap().to_string(), cases[0]);
        assert_eq!(BackendId::parse(&cases[1]).unwrap().to_string(), cases[1]);
        assert_eq!(LoggerId::parse(&cases[2]).unwrap().to_string(), cases[2]);
        assert_eq!(
            IdentityProviderId::parse(&cases[3]).unwrap().to_string(),
            cases[3]
        );
        assert_eq!(NamedValueId::parse(&cases[4]).unwrap().to_string(), cases[4]);
        assert_eq!(WorkspaceId::parse(&cases[5]).unwrap().to_string(), cases[5]);
        assert_eq!(
            SubscriptionId::parse(&cases[6]).unwrap().to_string(),
            cases[6]
        );
        assert_eq!(ProductId::parse(&cases[7]).unwrap().to_string(), cases[7]);
        assert_eq!(
            ApiVersionSetId::parse(&cases[8]).unwrap().to_string(),
            cases[8]
        );
        assert_eq!(
            ApiDiagnosticId::parse(&cases[9]).unwrap().to_string(),
            cases[9]
        );
    }

    #[test]
    fn new_then_parse_is_identity() {
        let service = ServiceId::new("sub1", "rg1", "apim1");
        let logger = LoggerId::from_service(&service, "l1");
        assert_eq!(LoggerId::parse(&logger.to_string()).unwrap(), logger);
        assert_eq!(logger.service_id(), service);

        let diag = ApiDiagnosticId::new(&ApiId::from_service(&service, "echo"), "azuremonitor");
        assert_eq!(ApiDiagnosticId::parse(&diag.to_string()).unwrap(), diag);
        assert_eq!(diag.api().api_id, "echo");
    }

    #[test]
    fn mixed_case_child_ids_format_canonically() {
        let lowered = SERVICE
            .replace("resourceGroups", "RESOURCEGROUPS")
            .replace("Microsoft.ApiManagement", "microsoft.apimanagement");
        let backend = BackendId::parse(&format!("{}/BACKENDS/b1", lowered)).unwrap();
        assert_eq!(backend.to_string(), format!("{}/backends/b1", SERVICE));
        assert_eq!(BackendId::parse(&backend.to_string()).unwrap(), backend);

        let diag = ApiDiagnosticId::parse(&format!(
            "{}/Apis/echo;rev=2/Diagnostics/applicationinsights",
            lowered
        ))
        .unwrap();
        assert_eq!(
            diag.to_string(),
            format!("{}/apis/echo;rev=2/diagnostics/applicationinsights", SERVICE)
        );
        assert_eq!(diag.api().revision(), Some("2"));

        // Values keep their case; only static segments are normalized.
        let named = NamedValueId::parse(&format!("{}/namedvalues/MyValue", lowered)).unwrap();
        assert_eq!(named.named_value_id, "MyValue");
    }

    #[test]
    fn revision_suffixed_api_ids_survive_both_directions() {
        let built = ApiId::new("sub1", "rg1", "apim1", api_id_with_revision("echo", "2"));
        let text = built.to_string();
        assert_eq!(text, format!("{}/apis/echo;rev=2", SERVICE));

        let parsed = ApiId::parse(&text).unwrap();
        assert_eq!(parsed, built);
        assert_eq!(parsed.api_name(), "echo");
        assert_eq!(parsed.revision(), Some("2"));
        assert_eq!(parsed.service_id(), ServiceId::parse(SERVICE).unwrap());

        let diag = ApiDiagnosticId::new(&parsed, "azuremonitor");
        let reparsed = ApiDiagnosticId::parse(&diag.to_string()).unwrap();
        assert_eq!(reparsed, diag);
        assert_eq!(reparsed.api(), parsed);
    }

    #[test]
    fn deleted_service_and_subnet_ids() {
        let deleted = DeletedServiceId::new("sub1", "westeurope", "apim1");
        assert_eq!(
            deleted.to_string(),
            "/subscriptions/sub1/providers/Microsoft.ApiManagement/locations/westeurope/deletedServices/apim1"
        );
        assert_eq!(DeletedServiceId::parse(&deleted.to_string()).unwrap(), deleted);

        let subnet = "/subscriptions/sub1/resourceGroups/net/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/apim";
        let parsed = SubnetId::parse(subnet).unwrap();
        assert_eq!(parsed.subnet_name, "apim");
        assert_eq!(parsed.to_string(), subnet);
    }
}
