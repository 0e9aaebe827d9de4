//! `azurerm_api_management_backend`
//!
//! A backend is either a single endpoint (`url`, credentials, TLS, proxy,
//! Service Fabric, circuit breaker) or a `pool` of other backends. Pools
//! accept none of the single-endpoint fields.

use super::common;
use crate::api::backends::{
    AuthorizationHeaderCredentials, BackendContract, BackendCredentials, BackendExtraProperties,
    BackendPool, BackendPoolItem, BackendProperties, BackendProxy, BackendTls, CircuitBreaker,
    CircuitBreakerRule, FailureCondition, ServiceFabricCluster, StatusCodeRange,
    X509CertificateName, BACKEND_TYPE_POOL, BACKEND_TYPE_SINGLE,
};
use crate::api::common::{split_comma, ArmResource};
use crate::api::ids::BackendId;
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::object::{ObjectBuilder, ObjectReader};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, BlockConstraint, NestedBlock, NestedBlockBuilder,
    SchemaBuilder,
};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{
    IsIso8601Duration, IsResourceId, NumberRange, StringLength, StringNotEmpty, StringOneOf,
};
use tfplug::Operation;

pub const PROTOCOLS: [&str; 2] = ["http", "soap"];

pub const CIRCUIT_BREAKER_ERROR_REASONS: [&str; 6] = [
    "OperationNotFound",
    "SubscriptionKeyNotFound",
    "SubscriptionKeyInvalid",
    "ClientConnectionFailure",
    "BackendConnectionFailure",
    "ExpressionValueEvaluationFailure",
];

/// Fields that only make sense on a `Single` backend.
const SINGLE_BACKEND_FIELDS: [&str; 8] = [
    "credentials",
    "protocol",
    "proxy",
    "resource_id",
    "service_fabric_cluster",
    "tls",
    "url",
    "circuit_breaker_rule",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsModel {
    pub authorization: Option<(String, String)>,
    pub certificate: Vec<String>,
    /// Comma-joined values, split per header on the wire.
    pub header: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyModel {
    pub url: String,
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFabricModel {
    pub client_certificate_id: Option<String>,
    pub client_certificate_thumbprint: Option<String>,
    pub management_endpoints: Vec<String>,
    pub max_partition_resolution_retries: i64,
    pub server_certificate_thumbprints: Vec<String>,
    /// `(issuer_certificate_thumbprint, name)`
    pub server_x509_names: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureConditionModel {
    pub count: Option<i64>,
    pub percentage: Option<i64>,
    pub interval: String,
    pub error_reasons: Vec<String>,
    pub status_code_ranges: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitBreakerModel {
    pub name: String,
    pub accept_retry_after: bool,
    pub trip_duration: String,
    pub failure_condition: Option<FailureConditionModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolServiceModel {
    pub id: String,
    pub priority: i64,
    pub weight: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendModel {
    pub name: String,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub description: Option<String>,
    pub protocol: Option<String>,
    pub resource_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub credentials: Option<CredentialsModel>,
    pub proxy: Option<ProxyModel>,
    pub service_fabric_cluster: Option<ServiceFabricModel>,
    pub tls: Option<(Option<bool>, Option<bool>)>,
    pub circuit_breaker_rule: Option<CircuitBreakerModel>,
    pub pool: Option<Vec<PoolServiceModel>>,
}

impl BackendModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);

        let credentials = match r.block("credentials")? {
            Some(c) => Some(CredentialsModel {
                authorization: match c.block("authorization")? {
                    Some(a) => Some((a.string_or("parameter", "")?, a.string_or("scheme", "")?)),
                    None => None,
                },
                certificate: c.string_list("certificate")?,
                header: c.string_map("header")?,
                query: c.string_map("query")?,
            }),
            None => None,
        };

        let proxy = match r.block("proxy")? {
            Some(p) => Some(ProxyModel {
                url: p.required_string("url")?,
                username: p.required_string("username")?,
                password: p.non_empty_string("password")?,
            }),
            None => None,
        };

        let service_fabric_cluster = match r.block("service_fabric_cluster")? {
            Some(sf) => Some(ServiceFabricModel {
                client_certificate_id: sf.non_empty_string("client_certificate_id")?,
                client_certificate_thumbprint: sf.non_empty_string("client_certificate_thumbprint")?,
                management_endpoints: sf.string_list("management_endpoints")?,
                max_partition_resolution_retries: sf
                    .int("max_partition_resolution_retries")?
                    .unwrap_or_default(),
                server_certificate_thumbprints: sf.string_list("server_certificate_thumbprints")?,
                server_x509_names: sf
                    .blocks("server_x509_name")?
                    .iter()
                    .map(|n| {
                        Ok((
                            n.required_string("issuer_certificate_thumbprint")?,
                            n.required_string("name")?,
                        ))
                    })
                    .collect::<Result<_, Diagnostic>>()?,
            }),
            None => None,
        };

        let tls = match r.block("tls")? {
            Some(t) => Some((
                t.bool("validate_certificate_chain")?,
                t.bool("validate_certificate_name")?,
            )),
            None => None,
        };

        let circuit_breaker_rule = match r.block("circuit_breaker_rule")? {
            Some(cb) => Some(CircuitBreakerModel {
                name: cb.required_string("name")?,
                accept_retry_after: cb.bool_or("accept_retry_after", false)?,
                trip_duration: cb.required_string("trip_duration")?,
                failure_condition: match cb.block("failure_condition")? {
                    Some(fc) => Some(FailureConditionModel {
                        count: fc.int("count")?,
                        percentage: fc.int("percentage")?,
                        interval: fc.string_or("interval", "")?,
                        error_reasons: fc.string_list("error_reasons")?,
                        status_code_ranges: fc
                            .blocks("status_code_range")?
                            .iter()
                            .map(|range| {
                                Ok((
                                    range.int("min")?.unwrap_or_default(),
                                    range.int("max")?.unwrap_or_default(),
                                ))
                            })
                            .collect::<Result<_, Diagnostic>>()?,
                    }),
                    None => None,
                },
            }),
            None => None,
        };

        let pool = match r.block("pool")? {
            Some(p) => Some(
                p.blocks("service")?
                    .iter()
                    .map(|s| {
                        Ok(PoolServiceModel {
                            id: s.required_string("id")?,
                            priority: s.int("priority")?.unwrap_or_default(),
                            weight: s.int("weight")?.unwrap_or_default(),
                        })
                    })
                    .collect::<Result<_, Diagnostic>>()?,
            ),
            None => None,
        };

        Ok(Self {
            name: r.required_string("name")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            description: r.non_empty_string("description")?,
            protocol: r.non_empty_string("protocol")?,
            resource_id: r.non_empty_string("resource_id")?,
            title: r.non_empty_string("title")?,
            url: r.non_empty_string("url")?,
            credentials,
            proxy,
            service_fabric_cluster,
            tls,
            circuit_breaker_rule,
            pool,
        })
    }

    pub fn id(&self, subscription_id: &str) -> BackendId {
        BackendId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            &self.name,
        )
    }

    pub fn expand(&self) -> Result<BackendContract, Diagnostic> {
        let mut props = BackendProperties {
            description: self.description.clone(),
            resource_id: self.resource_id.clone(),
            title: self.title.clone(),
            ..Default::default()
        };

        if let Some(pool) = &self.pool {
            props.backend_type = Some(BACKEND_TYPE_POOL.to_string());
            props.pool = Some(BackendPool {
                services: Some(
                    pool.iter()
                        .map(|s| BackendPoolItem {
                            id: s.id.clone(),
                            priority: Some(s.priority),
                            weight: Some(s.weight),
                        })
                        .collect(),
                ),
            });
            return Ok(ArmResource::with_properties(props));
        }

        props.backend_type = Some(BACKEND_TYPE_SINGLE.to_string());
        props.url = self.url.clone();
        props.protocol = self.protocol.clone();
        props.credentials = self.credentials.as_ref().map(expand_credentials);
        props.proxy = self.proxy.as_ref().map(|p| BackendProxy {
            url: p.url.clone(),
            username: Some(p.username.clone()),
            password: p.password.clone(),
        });
        props.tls = self.tls.map(|(chain, name)| BackendTls {
            validate_certificate_chain: chain,
            validate_certificate_name: name,
        });
        props.circuit_breaker = self.circuit_breaker_rule.as_ref().map(expand_circuit_breaker);
        if let Some(sf) = &self.service_fabric_cluster {
            props.properties = Some(BackendExtraProperties {
                service_fabric_cluster: Some(expand_service_fabric(sf)?),
            });
        }
        Ok(ArmResource::with_properties(props))
    }

    pub fn flatten(id: &BackendId, contract: &BackendContract) -> Self {
        let mut model = Self {
            name: id.backend_id.clone(),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            ..Default::default()
        };
        let Some(props) = &contract.properties else {
            return model;
        };

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        model.description = non_empty(&props.description);
        model.protocol = non_empty(&props.protocol);
        model.resource_id = non_empty(&props.resource_id);
        model.title = non_empty(&props.title);
        model.url = non_empty(&props.url);
        model.credentials = props.credentials.as_ref().map(flatten_credentials);
        model.proxy = props.proxy.as_ref().map(|p| ProxyModel {
            url: p.url.clone(),
            username: p.username.clone().unwrap_or_default(),
            password: p.password.clone(),
        });
        model.tls = props
            .tls
            .as_ref()
            .map(|t| {
                (
                    Some(t.validate_certificate_chain.unwrap_or(false)),
                    Some(t.validate_certificate_name.unwrap_or(false)),
                )
            });
        model.service_fabric_cluster = props
            .properties
            .as_ref()
            .and_then(|p| p.service_fabric_cluster.as_ref())
            .map(flatten_service_fabric);
        model.circuit_breaker_rule = props.circuit_breaker.as_ref().and_then(flatten_circuit_breaker);
        model.pool = props.pool.as_ref().map(|pool| {
            pool.services
                .iter()
                .flatten()
                .map(|s| PoolServiceModel {
                    id: s.id.clone(),
                    priority: s.priority.unwrap_or_default(),
                    weight: s.weight.unwrap_or_default(),
                })
                .collect()
        });
        model
    }

    pub fn to_state(&self, id: &BackendId, source: &DynamicValue) -> DynamicValue {
        let builder = ObjectBuilder::new()
            .string("id", id.to_string())
            .string("name", &self.name)
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .opt_string("description", self.description.clone())
            .opt_string("protocol", self.protocol.clone())
            .opt_string("resource_id", self.resource_id.clone())
            .opt_string("title", self.title.clone())
            .opt_string("url", self.url.clone())
            .block("credentials", self.credentials.as_ref().map(credentials_state))
            .block(
                "proxy",
                self.proxy.as_ref().map(|p| {
                    ObjectBuilder::new()
                        .string("url", &p.url)
                        .string("username", &p.username)
                        .opt_string("password", p.password.clone())
                }),
            )
            .block(
                "tls",
                self.tls.map(|(chain, name)| {
                    ObjectBuilder::new()
                        .opt_bool("validate_certificate_chain", chain)
                        .opt_bool("validate_certificate_name", name)
                }),
            )
            .block(
                "service_fabric_cluster",
                self.service_fabric_cluster.as_ref().map(service_fabric_state),
            )
            .block(
                "circuit_breaker_rule",
                self.circuit_breaker_rule.as_ref().map(circuit_breaker_state),
            )
            .block(
                "pool",
                self.pool.as_ref().map(|services| {
                    ObjectBuilder::new().blocks(
                        "service",
                        services
                            .iter()
                            .map(|s| {
                                ObjectBuilder::new()
                                    .string("id", &s.id)
                                    .int("priority", s.priority)
                                    .int("weight", s.weight)
                            })
                            .collect(),
                    )
                }),
            );
        common::with_timeouts(builder, source).into_value()
    }
}

fn expand_credentials(c: &CredentialsModel) -> BackendCredentials {
    let split = |m: &HashMap<String, String>| -> Option<HashMap<String, Vec<String>>> {
        (!m.is_empty()).then(|| m.iter().map(|(k, v)| (k.clone(), split_comma(v))).collect())
    };
    BackendCredentials {
        authorization: c
            .authorization
            .as_ref()
            .map(|(parameter, scheme)| AuthorizationHeaderCredentials {
                parameter: parameter.clone(),
                scheme: scheme.clone(),
            }),
        certificate: (!c.certificate.is_empty()).then(|| c.certificate.clone()),
        header: split(&c.header),
        query: split(&c.query),
    }
}

fn flatten_credentials(c: &BackendCredentials) -> CredentialsModel {
    let join = |m: &Option<HashMap<String, Vec<String>>>| -> HashMap<String, String> {
        m.iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.join(",")))
            .collect()
    };
    CredentialsModel {
        authorization: c
            .authorization
            .as_ref()
            .map(|a| (a.parameter.clone(), a.scheme.clone())),
        certificate: c.certificate.clone().unwrap_or_default(),
        header: join(&c.header),
        query: join(&c.query),
    }
}

fn credentials_state(c: &CredentialsModel) -> ObjectBuilder {
    ObjectBuilder::new()
        .block(
            "authorization",
            c.authorization.as_ref().map(|(parameter, scheme)| {
                ObjectBuilder::new()
                    .opt_string("parameter", Some(parameter).filter(|p| !p.is_empty()).cloned())
                    .opt_string("scheme", Some(scheme).filter(|s| !s.is_empty()).cloned())
            }),
        )
        .string_list("certificate", c.certificate.iter().cloned())
        .string_map("header", &c.header)
        .string_map("query", &c.query)
}

fn expand_service_fabric(sf: &ServiceFabricModel) -> Result<ServiceFabricCluster, Diagnostic> {
    let path = AttributePath::new("service_fabric_cluster").index(0);
    if sf.client_certificate_id.is_none() && sf.client_certificate_thumbprint.is_none() {
        return Err(Diagnostic::error(
            "Invalid service_fabric_cluster",
            "at least one of `client_certificate_thumbprint` and `client_certificate_id` must be set",
        )
        .with_attribute(path));
    }
    if sf.server_certificate_thumbprints.is_empty() && sf.server_x509_names.is_empty() {
        return Err(Diagnostic::error(
            "Invalid service_fabric_cluster",
            "one of `server_certificate_thumbprints` or `server_x509_name` must be set",
        )
        .with_attribute(path));
    }
    Ok(ServiceFabricCluster {
        client_certificate_id: sf.client_certificate_id.clone(),
        client_certificate_thumbprint: sf.client_certificate_thumbprint.clone(),
        management_endpoints: sf.management_endpoints.clone(),
        max_partition_resolution_retries: Some(sf.max_partition_resolution_retries),
        server_certificate_thumbprints: (!sf.server_certificate_thumbprints.is_empty())
            .then(|| sf.server_certificate_thumbprints.clone()),
        server_x509_names: (!sf.server_x509_names.is_empty()).then(|| {
            sf.server_x509_names
                .iter()
                .map(|(issuer, name)| X509CertificateName {
                    name: Some(name.clone()),
                    issuer_certificate_thumbprint: Some(issuer.clone()),
                })
                .collect()
        }),
    })
}

fn flatten_service_fabric(sf: &ServiceFabricCluster) -> ServiceFabricModel {
    ServiceFabricModel {
        client_certificate_id: sf.client_certificate_id.clone(),
        client_certificate_thumbprint: sf.client_certificate_thumbprint.clone(),
        management_endpoints: sf.management_endpoints.clone(),
        max_partition_resolution_retries: sf.max_partition_resolution_retries.unwrap_or_default(),
        server_certificate_thumbprints: sf.server_certificate_thumbprints.clone().unwrap_or_default(),
        server_x509_names: sf
            .server_x509_names
            .iter()
            .flatten()
            .map(|n| {
                (
                    n.issuer_certificate_thumbprint.clone().unwrap_or_default(),
                    n.name.clone().unwrap_or_default(),
                )
            })
            .collect(),
    }
}

fn service_fabric_state(sf: &ServiceFabricModel) -> ObjectBuilder {
    ObjectBuilder::new()
        .opt_string("client_certificate_id", sf.client_certificate_id.clone())
        .opt_string("client_certificate_thumbprint", sf.client_certificate_thumbprint.clone())
        .string_list("management_endpoints", sf.management_endpoints.iter().cloned())
        .int("max_partition_resolution_retries", sf.max_partition_resolution_retries)
        .string_list(
            "server_certificate_thumbprints",
            sf.server_certificate_thumbprints.iter().cloned(),
        )
        .blocks(
            "server_x509_name",
            sf.server_x509_names
                .iter()
                .map(|(issuer, name)| {
                    ObjectBuilder::new()
                        .string("issuer_certificate_thumbprint", issuer)
                        .string("name", name)
                })
                .collect(),
        )
}

/// The API takes a list of rules; only one is configurable.
fn expand_circuit_breaker(cb: &CircuitBreakerModel) -> CircuitBreaker {
    let failure_condition = cb.failure_condition.as_ref().map(|fc| FailureCondition {
        count: fc.count.filter(|c| *c != 0),
        percentage: fc.percentage.filter(|p| *p != 0),
        interval: Some(fc.interval.clone()).filter(|i| !i.is_empty()),
        error_reasons: (!fc.error_reasons.is_empty()).then(|| fc.error_reasons.clone()),
        status_code_ranges: (!fc.status_code_ranges.is_empty()).then(|| {
            fc.status_code_ranges
                .iter()
                .map(|(min, max)| StatusCodeRange {
                    min: Some(*min),
                    max: Some(*max),
                })
                .collect()
        }),
    });
    CircuitBreaker {
        rules: Some(vec![CircuitBreakerRule {
            name: Some(cb.name.clone()),
            accept_retry_after: Some(cb.accept_retry_after),
            trip_duration: Some(cb.trip_duration.clone()),
            failure_condition,
        }]),
    }
}

fn flatten_circuit_breaker(cb: &CircuitBreaker) -> Option<CircuitBreakerModel> {
    let rule = cb.rules.as_ref()?.first()?;
    Some(CircuitBreakerModel {
        name: rule.name.clone().unwrap_or_default(),
        accept_retry_after: rule.accept_retry_after.unwrap_or(false),
        trip_duration: rule.trip_duration.clone().unwrap_or_default(),
        failure_condition: rule.failure_condition.as_ref().map(|fc| FailureConditionModel {
            count: fc.count.filter(|c| *c != 0),
            percentage: fc.percentage.filter(|p| *p != 0),
            interval: fc.interval.clone().unwrap_or_default(),
            error_reasons: fc.error_reasons.clone().unwrap_or_default(),
            status_code_ranges: fc
                .status_code_ranges
                .iter()
                .flatten()
                .map(|r| (r.min.unwrap_or_default(), r.max.unwrap_or_default()))
                .collect(),
        }),
    })
}

fn circuit_breaker_state(cb: &CircuitBreakerModel) -> ObjectBuilder {
    ObjectBuilder::new()
        .string("name", &cb.name)
        .bool("accept_retry_after", cb.accept_retry_after)
        .string("trip_duration", &cb.trip_duration)
        .block(
            "failure_condition",
            cb.failure_condition.as_ref().map(|fc| {
                ObjectBuilder::new()
                    .opt_int("count", fc.count)
                    .opt_int("percentage", fc.percentage)
                    .string("interval", &fc.interval)
                    .string_list("error_reasons", fc.error_reasons.iter().cloned())
                    .blocks(
                        "status_code_range",
                        fc.status_code_ranges
                            .iter()
                            .map(|(min, max)| ObjectBuilder::new().int("min", *min).int("max", *max))
                            .collect(),
                    )
            }),
        )
}

fn string_list_attribute(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::list_of(AttributeType::String))
        .optional()
        .build()
}

fn credentials_block() -> NestedBlock {
    let credential_kinds = || {
        vec![
            "authorization".to_string(),
            "certificate".to_string(),
            "header".to_string(),
            "query".to_string(),
        ]
    };
    NestedBlockBuilder::list("credentials")
        .max_items(1)
        .attribute(string_list_attribute("certificate"))
        .attribute(
            AttributeBuilder::new("header", AttributeType::Map(Box::new(AttributeType::String)))
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("query", AttributeType::Map(Box::new(AttributeType::String)))
                .optional()
                .build(),
        )
        .block(
            NestedBlockBuilder::list("authorization")
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("parameter", AttributeType::String)
                        .optional()
                        .validator(StringNotEmpty::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("scheme", AttributeType::String)
                        .optional()
                        .validator(StringNotEmpty::create())
                        .build(),
                )
                .constraint(BlockConstraint::AtLeastOneOf(vec![
                    "parameter".to_string(),
                    "scheme".to_string(),
                ]))
                .build(),
        )
        .constraint(BlockConstraint::AtLeastOneOf(credential_kinds()))
        .build()
}

fn service_fabric_block() -> NestedBlock {
    NestedBlockBuilder::list("service_fabric_cluster")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("client_certificate_id", AttributeType::String)
                .optional()
                .computed()
                .validator(IsResourceId::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("client_certificate_thumbprint", AttributeType::String)
                .optional()
                .computed()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("management_endpoints", AttributeType::set_of(AttributeType::String))
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("max_partition_resolution_retries", AttributeType::Number)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("server_certificate_thumbprints", AttributeType::set_of(AttributeType::String))
                .optional()
                .build(),
        )
        .block(
            NestedBlockBuilder::set("server_x509_name")
                .attribute(common::required_string("issuer_certificate_thumbprint", "Issuer certificate thumbprint"))
                .attribute(common::required_string("name", "Common name of the certificate"))
                .build(),
        )
        .constraint(BlockConstraint::ConflictsWith(vec![
            "server_certificate_thumbprints".to_string(),
            "server_x509_name".to_string(),
        ]))
        .build()
}

fn circuit_breaker_block() -> NestedBlock {
    NestedBlockBuilder::list("circuit_breaker_rule")
        .max_items(1)
        .attribute(common::required_string("name", "The name of the circuit breaker rule"))
        .attribute(
            AttributeBuilder::new("accept_retry_after", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("trip_duration", AttributeType::String)
                .required()
                .validator(IsIso8601Duration::create())
                .build(),
        )
        .block(
            NestedBlockBuilder::list("failure_condition")
                .min_items(1)
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("count", AttributeType::Number)
                        .optional()
                        .validator(NumberRange::int_at_least(1))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("percentage", AttributeType::Number)
                        .optional()
                        .validator(NumberRange::int_between(1, 100))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("interval", AttributeType::String)
                        .required()
                        .validator(IsIso8601Duration::create())
                        .build(),
                )
                .attribute(string_list_attribute("error_reasons"))
                .block(
                    NestedBlockBuilder::list("status_code_range")
                        .min_items(1)
                        .attribute(
                            AttributeBuilder::new("min", AttributeType::Number)
                                .required()
                                .validator(NumberRange::int_between(200, 599))
                                .build(),
                        )
                        .attribute(
                            AttributeBuilder::new("max", AttributeType::Number)
                                .required()
                                .validator(NumberRange::int_between(200, 599))
                                .build(),
                        )
                        .build(),
                )
                .constraint(BlockConstraint::ExactlyOneOf(vec![
                    "count".to_string(),
                    "percentage".to_string(),
                ]))
                .build(),
        )
        .build()
}

fn pool_block() -> NestedBlock {
    NestedBlockBuilder::list("pool")
        .max_items(1)
        .block(
            NestedBlockBuilder::list("service")
                .min_items(1)
                .max_items(30)
                .attribute(
                    AttributeBuilder::new("id", AttributeType::String)
                        .required()
                        .validator(IsResourceId::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("priority", AttributeType::Number)
                        .optional()
                        .default(StaticDefault::number(0.0))
                        .validator(NumberRange::int_at_least(1))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("weight", AttributeType::Number)
                        .optional()
                        .default(StaticDefault::number(0.0))
                        .validator(NumberRange::int_at_least(1))
                        .build(),
                )
                .build(),
        )
        .build()
}

#[derive(Default)]
pub struct BackendResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl BackendResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &BackendId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.backends().get(id)).await;
        Ok(common::read_outcome(id, result)?
            .map(|contract| BackendModel::flatten(id, &contract).to_state(id, source)))
    }

    async fn apply(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
        operation: Operation,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, operation)?;
        let model = BackendModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let backends = data.client.backends();

        if operation == Operation::Create {
            common::check_not_exists(
                self.type_name(),
                &id,
                common::within(&ctx, backends.get(&id)).await,
            )?;
        }

        let contract = model.expand()?;
        tracing::debug!(
            "Writing {} ({})",
            id,
            contract
                .properties
                .as_ref()
                .and_then(|p| p.backend_type.as_deref())
                .unwrap_or(BACKEND_TYPE_SINGLE)
        );
        common::within(&ctx, backends.create_or_update(&id, &contract))
            .await
            .map_err(|e| common::api_diagnostic("creating/updating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after write"))
    }
}

#[async_trait]
impl Resource for BackendResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_backend"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Manages a backend within an API Management Service")
            .attribute(common::id_attribute())
            .attribute(common::child_name_attribute("The name of the API Management backend"))
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .validator(StringLength::between(1, 2000))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .optional()
                    .validator(StringOneOf::create(&PROTOCOLS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_id", AttributeType::String)
                    .optional()
                    .validator(StringLength::between(1, 2000))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("title", AttributeType::String)
                    .optional()
                    .validator(StringLength::between(1, 300))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .optional()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .block(credentials_block())
            .block(
                NestedBlockBuilder::list("proxy")
                    .max_items(1)
                    .attribute(common::required_string("url", "The proxy URL"))
                    .attribute(common::required_string("username", "The proxy username"))
                    .attribute(
                        AttributeBuilder::new("password", AttributeType::String)
                            .optional()
                            .sensitive()
                            .validator(StringNotEmpty::create())
                            .build(),
                    )
                    .build(),
            )
            .block(service_fabric_block())
            .block(
                NestedBlockBuilder::list("tls")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("validate_certificate_chain", AttributeType::Bool)
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("validate_certificate_name", AttributeType::Bool)
                            .optional()
                            .build(),
                    )
                    .constraint(BlockConstraint::AtLeastOneOf(vec![
                        "validate_certificate_chain".to_string(),
                        "validate_certificate_name".to_string(),
                    ]))
                    .build(),
            )
            .block(circuit_breaker_block())
            .block(pool_block())
            .block(timeouts_block());

        for field in SINGLE_BACKEND_FIELDS {
            builder = builder.constraint(BlockConstraint::ConflictsWith(vec![
                "pool".to_string(),
                field.to_string(),
            ]));
        }

        ResourceSchemaResponse {
            schema: builder.build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let reasons = ObjectReader::new(&request.config)
            .block("circuit_breaker_rule")
            .and_then(|rule| match rule {
                Some(rule) => rule.block("failure_condition"),
                None => Ok(None),
            })
            .and_then(|condition| match condition {
                Some(condition) => condition.string_list("error_reasons"),
                None => Ok(Vec::new()),
            });
        let diagnostics = match reasons {
            Ok(reasons) => common::check_list_values(
                &reasons,
                &CIRCUIT_BREAKER_ERROR_REASONS,
                AttributePath::new("circuit_breaker_rule")
                    .index(0)
                    .attribute("failure_condition")
                    .index(0)
                    .attribute("error_reasons"),
            )
            .into_iter()
            .collect(),
            Err(diag) => vec![diag],
        };
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.apply(&ctx, &request.planned_state, Operation::Create).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let result = async {
            let ctx = common::operation_context(
                &ctx,
                CHILD_RESOURCE_TIMEOUTS,
                &request.current_state,
                Operation::Read,
            )?;
            let id = common::state_id(&request.current_state, BackendId::parse)?;
            self.read_state(&ctx, &id, &request.current_state).await
        }
        .await;

        match result {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self.apply(&ctx, &request.planned_state, Operation::Update).await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let result = async {
            let data = common::provider_data(&self.provider_data)?;
            let ctx = common::operation_context(
                &ctx,
                CHILD_RESOURCE_TIMEOUTS,
                &request.prior_state,
                Operation::Delete,
            )?;
            let id = common::state_id(&request.prior_state, BackendId::parse)?;
            let result = common::within(&ctx, data.client.backends().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for BackendResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let (provider_data, diagnostics) = common::configure(request.provider_data);
        self.provider_data = provider_data;
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for BackendResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, BackendId::parse);
        response
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use crate::config::ApiManagementFeatures;
    use crate::ApiManagementProviderData;
    use mockito::{Matcher, Server};
    use tfplug::types::Dynamic;

    fn base() -> ObjectBuilder {
        ObjectBuilder::new()
            .string("name", "backend1")
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
    }

    #[test]
    fn pool_backend_has_pool_type_and_no_single_fields() {
        let value = base()
            .block(
                "pool",
                Some(ObjectBuilder::new().blocks(
                    "service",
                    vec![ObjectBuilder::new()
                        .string("id", BackendId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "b2").to_string())
                        .int("priority", 1)
                        .int("weight", 50)],
                )),
            )
            .into_value();
        let props = BackendModel::from_config(&value).unwrap().expand().unwrap().properties.unwrap();
        assert_eq!(props.backend_type.as_deref(), Some(BACKEND_TYPE_POOL));
        assert!(props.url.is_none());
        let services = props.pool.unwrap().services.unwrap();
        assert_eq!(services[0].weight, Some(50));
    }

    #[test]
    fn header_values_split_and_join() {
        let mut header = HashMap::new();
        header.insert("x-key".to_string(), "a,b".to_string());
        let value = base()
            .string("url", "https://backend.example.com")
            .string("protocol", "http")
            .block(
                "credentials",
                Some(ObjectBuilder::new().string_map("header", &header)),
            )
            .into_value();

        let contract = BackendModel::from_config(&value).unwrap().expand().unwrap();
        let credentials = contract.properties.as_ref().unwrap().credentials.clone().unwrap();
        assert_eq!(
            credentials.header.unwrap()["x-key"],
            vec!["a".to_string(), "b".to_string()]
        );

        let id = BackendId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "backend1");
        let model = BackendModel::flatten(&id, &contract);
        assert_eq!(model.credentials.unwrap().header["x-key"], "a,b");
        assert!(model.pool.is_none());
    }

    #[test]
    fn service_fabric_requires_client_and_server_certificates() {
        let sf = ServiceFabricModel {
            management_endpoints: vec!["https://sf:19080".to_string()],
            max_partition_resolution_retries: 5,
            ..Default::default()
        };
        let err = expand_service_fabric(&sf).unwrap_err();
        assert!(err.detail.contains("client_certificate_thumbprint"));

        let sf = ServiceFabricModel {
            client_certificate_thumbprint: Some("ABC".to_string()),
            ..sf
        };
        let err = expand_service_fabric(&sf).unwrap_err();
        assert!(err.detail.contains("server_x509_name"));

        let sf = ServiceFabricModel {
            server_certificate_thumbprints: vec!["DEF".to_string()],
            ..sf
        };
        assert!(expand_service_fabric(&sf).is_ok());
    }

    #[test]
    fn circuit_breaker_omits_zero_count() {
        let cb = CircuitBreakerModel {
            name: "rule".to_string(),
            trip_duration: "PT1M".to_string(),
            failure_condition: Some(FailureConditionModel {
                count: Some(0),
                percentage: Some(50),
                interval: "PT5M".to_string(),
                status_code_ranges: vec![(500, 599)],
                ..Default::default()
            }),
            ..Default::default()
        };
        let expanded = expand_circuit_breaker(&cb);
        let rules = expanded.rules.as_ref().unwrap();
        assert_eq!(rules.len(), 1);
        let condition = rules[0].failure_condition.as_ref().unwrap();
        assert_eq!(condition.count, None);
        assert_eq!(condition.percentage, Some(50));

        let flattened = flatten_circuit_breaker(&expanded).unwrap();
        assert_eq!(flattened.failure_condition.unwrap().status_code_ranges, vec![(500, 599)]);
    }

    #[tokio::test]
    async fn read_returns_empty_blocks_for_absent_objects() {
        let mut server = Server::new_async().await;
        let id = BackendId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "backend1");
        let _m = server
            .mock("GET", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"properties":{"type":"Single","url":"https://backend.example.com","protocol":"http"}}"#)
            .create_async()
            .await;

        let resource = BackendResource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(&server.url()),
                ApiManagementFeatures::default(),
            )),
        };
        let state = resource
            .read_state(&Context::new(), &id, &DynamicValue::null())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            state.get_string(&AttributePath::new("url")).unwrap(),
            "https://backend.example.com"
        );
        for block in ["credentials", "proxy", "tls", "pool", "circuit_breaker_rule"] {
            assert_eq!(
                state.get(&AttributePath::new(block)),
                Some(&Dynamic::List(vec![]))
            );
        }
    }
}
