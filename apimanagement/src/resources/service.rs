//! `azurerm_api_management`
//!
//! The service itself. Besides the service PUT/PATCH this handler owns the
//! soft-delete lifecycle (recover on create, purge on destroy), removal of the
//! sample APIs and products a new service comes with, and the developer
//! portal settings, which live on separate sub-resources.

use super::common;
use crate::api::common::ArmResource;
use crate::api::deleted_services::normalize_location;
use crate::api::ids::{ApiId, DeletedServiceId, ProductId, ServiceId, SubnetId};
use crate::api::poll::{
    deletion_waiter, provisioning_waiter, wait_for_deletion, wait_for_provisioning, StateWaiter,
};
use crate::api::portal_settings::{
    DelegationProperties, DelegationSecrets, DelegationSettings, DelegationToggle,
    SignInProperties, SignInSettings, SignUpProperties, SignUpSettings, TenantAccessSecrets,
    TermsOfService,
};
use crate::api::retry::{is_bad_request, retry_if};
use crate::api::service::{
    AdditionalLocation, ApiVersionConstraint, CertificateConfiguration, HostnameConfiguration,
    ServiceIdentity, ServiceProperties, ServiceResource as ServiceContract, ServiceSku,
    ServiceUpdate, UserAssignedIdentity, VirtualNetworkConfiguration,
};
use crate::api::Client;
use crate::config::{
    DELEGATION_URL_PLACEHOLDER, DELEGATION_VALIDATION_KEY_PLACEHOLDER, HTTP2_PROTOCOL,
    SECURITY_PROPERTIES, SERVICE_TIMEOUTS,
};
use crate::ApiManagementProviderData;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::object::{ObjectBuilder, ObjectReader};
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
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
    Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder,
    SchemaBuilder,
};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{
    is_uuid, IsResourceId, IsUrl, NumberRange, StringLength, StringMatches, StringNotEmpty,
    StringOneOf,
};
use tfplug::Operation;

pub const CONSUMPTION: &str = "Consumption";
const PREMIUM: &str = "Premium";
const DEVELOPER: &str = "Developer";

pub const SKU_NAME_PATTERN: &str =
    r"^(Consumption_0|(Basic|Standard|Developer|Premium|StandardV2|BasicV2|PremiumV2)_[1-9][0-9]*)$";
pub const VIRTUAL_NETWORK_TYPES: [&str; 3] = ["None", "External", "Internal"];
const VIRTUAL_NETWORK_TYPE_NONE: &str = "None";
pub const IDENTITY_TYPES: [&str; 3] = [
    "SystemAssigned",
    "UserAssigned",
    "SystemAssigned, UserAssigned",
];
pub const CERTIFICATE_STORE_NAMES: [&str; 2] = ["CertificateAuthority", "Root"];
const PORTAL_SETTINGS: [&str; 4] = ["sign_in", "sign_up", "delegation", "tenant_access"];
const BUILT_IN_CERTIFICATE_SOURCE: &str = "BuiltIn";

const CUSTOM_DOMAIN_MIN_INTERVAL: Duration = Duration::from_secs(60);
const CUSTOM_DOMAIN_TARGET_OCCURRENCES: u32 = 6;

/// `Premium_2` <-> `{name: Premium, capacity: 2}`.
pub fn parse_sku(input: &str) -> Option<ServiceSku> {
    let (name, capacity) = input.split_once('_')?;
    Some(ServiceSku {
        name: name.to_string(),
        capacity: capacity.parse().ok()?,
    })
}

pub fn format_sku(sku: &ServiceSku) -> String {
    format!("{}_{}", sku.name, sku.capacity)
}

/// Certificate expiry as RFC 3339 in UTC. Unparsable values pass through.
fn format_expiry(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| {
            t.with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        })
        .unwrap_or_else(|_| raw.to_string())
}

/// Custom property flags. A missing or unparsable value reads as `false`.
fn parse_flag(properties: &HashMap<String, String>, key: &str) -> bool {
    match properties.get(key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "t" | "1"),
        None => {
            tracing::debug!("{} was not found in the custom properties - assuming false", key);
            false
        }
    }
}

/// Waiter used after hostname changes: the gateway flaps between states
/// while custom domains are bound.
pub fn custom_domain_waiter() -> StateWaiter {
    StateWaiter::new(&["Updating", "Unknown"], &["Succeeded", "Ready"])
        .with_min_interval(CUSTOM_DOMAIN_MIN_INTERVAL)
        .with_continuous_target_occurrence(CUSTOM_DOMAIN_TARGET_OCCURRENCES)
}

pub fn opted_out_of_recovery_message(name: &str, location: &str) -> String {
    format!(
        "An existing soft-deleted API Management exists with the Name {:?} in the location {:?}, however \
         automatically recovering this API Management has been disabled via the \"features\" block.\n\n\
         Terraform can automatically recover the soft-deleted API Management when this behaviour is \
         enabled within the \"features\" block (located within the \"provider\" block).\n\n\
         Alternatively you can manually recover this (e.g. using the Azure CLI) and then import \
         this into Terraform via \"terraform import\", or pick a different name/location.",
        name, location
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameKind {
    Management,
    Portal,
    DeveloperPortal,
    Proxy,
    Scm,
}

impl HostnameKind {
    pub const ALL: [HostnameKind; 5] = [
        Self::Management,
        Self::Portal,
        Self::DeveloperPortal,
        Self::Proxy,
        Self::Scm,
    ];

    pub fn attribute(self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::Portal => "portal",
            Self::DeveloperPortal => "developer_portal",
            Self::Proxy => "proxy",
            Self::Scm => "scm",
        }
    }

    pub fn api_type(self) -> &'static str {
        match self {
            Self::Management => "Management",
            Self::Portal => "Portal",
            Self::DeveloperPortal => "DeveloperPortal",
            Self::Proxy => "Proxy",
            Self::Scm => "Scm",
        }
    }

    pub fn from_api_type(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.api_type().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameModel {
    pub kind: HostnameKind,
    pub host_name: String,
    pub key_vault_certificate_id: Option<String>,
    pub certificate: Option<String>,
    pub certificate_password: Option<String>,
    pub negotiate_client_certificate: bool,
    pub ssl_keyvault_identity_client_id: Option<String>,
    /// Proxy hostnames only.
    pub default_ssl_binding: Option<bool>,
    pub expiry: Option<String>,
    pub thumbprint: Option<String>,
    pub subject: Option<String>,
    pub certificate_source: Option<String>,
    pub certificate_status: Option<String>,
}

impl HostnameModel {
    fn from_reader(kind: HostnameKind, r: &ObjectReader) -> Result<Self, Diagnostic> {
        Ok(Self {
            kind,
            host_name: r.required_string("host_name")?,
            key_vault_certificate_id: r.non_empty_string("key_vault_certificate_id")?,
            certificate: r.non_empty_string("certificate")?,
            certificate_password: r.non_empty_string("certificate_password")?,
            negotiate_client_certificate: r.bool_or("negotiate_client_certificate", false)?,
            ssl_keyvault_identity_client_id: r.non_empty_string("ssl_keyvault_identity_client_id")?,
            default_ssl_binding: match kind {
                HostnameKind::Proxy => r.bool("default_ssl_binding")?,
                _ => None,
            },
            expiry: None,
            thumbprint: None,
            subject: None,
            certificate_source: None,
            certificate_status: None,
        })
    }

    fn expand(&self) -> HostnameConfiguration {
        HostnameConfiguration {
            hostname_type: self.kind.api_type().to_string(),
            host_name: self.host_name.clone(),
            key_vault_id: self.key_vault_certificate_id.clone(),
            identity_client_id: self.ssl_keyvault_identity_client_id.clone(),
            encoded_certificate: self.certificate.clone(),
            certificate_password: self.certificate_password.clone(),
            default_ssl_binding: self.default_ssl_binding,
            negotiate_client_certificate: Some(self.negotiate_client_certificate),
            ..Default::default()
        }
    }

    fn flatten(kind: HostnameKind, config: &HostnameConfiguration) -> Self {
        let certificate = config.certificate.as_ref();
        Self {
            kind,
            host_name: config.host_name.clone(),
            key_vault_certificate_id: config.key_vault_id.clone(),
            certificate: None,
            certificate_password: None,
            negotiate_client_certificate: config.negotiate_client_certificate.unwrap_or(false),
            ssl_keyvault_identity_client_id: config.identity_client_id.clone(),
            default_ssl_binding: match kind {
                HostnameKind::Proxy => Some(config.default_ssl_binding.unwrap_or(false)),
                _ => None,
            },
            expiry: certificate
                .and_then(|c| c.expiry.as_deref())
                .filter(|e| !e.is_empty())
                .map(format_expiry),
            thumbprint: certificate.and_then(|c| c.thumbprint.clone()),
            subject: certificate.and_then(|c| c.subject.clone()),
            certificate_source: config.certificate_source.clone(),
            certificate_status: config.certificate_status.clone(),
        }
    }

    fn to_builder(&self) -> ObjectBuilder {
        let builder = ObjectBuilder::new()
            .string("host_name", &self.host_name)
            .opt_string("key_vault_certificate_id", self.key_vault_certificate_id.clone())
            .opt_string("certificate", self.certificate.clone())
            .opt_string("certificate_password", self.certificate_password.clone())
            .bool("negotiate_client_certificate", self.negotiate_client_certificate)
            .opt_string(
                "ssl_keyvault_identity_client_id",
                self.ssl_keyvault_identity_client_id.clone(),
            )
            .opt_string("expiry", self.expiry.clone())
            .opt_string("thumbprint", self.thumbprint.clone())
            .opt_string("subject", self.subject.clone())
            .opt_string("certificate_source", self.certificate_source.clone())
            .opt_string("certificate_status", self.certificate_status.clone());
        match self.kind {
            HostnameKind::Proxy => builder.bool("default_ssl_binding", self.default_ssl_binding.unwrap_or(false)),
            _ => builder,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityModel {
    pub identity_type: String,
    pub identity_ids: Vec<String>,
    pub principal_id: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateModel {
    pub encoded_certificate: Option<String>,
    pub certificate_password: Option<String>,
    pub store_name: String,
    pub expiry: Option<String>,
    pub subject: Option<String>,
    pub thumbprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalLocationModel {
    pub location: String,
    /// Zero inherits the capacity of the main SKU.
    pub capacity: i64,
    pub zones: Vec<String>,
    pub public_ip_address_id: Option<String>,
    pub subnet_id: Option<String>,
    pub gateway_disabled: bool,
    pub gateway_regional_url: Option<String>,
    pub public_ip_addresses: Vec<String>,
    pub private_ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermsOfServiceModel {
    pub enabled: bool,
    pub consent_required: bool,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpModel {
    pub enabled: bool,
    pub terms_of_service: Option<TermsOfServiceModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationModel {
    pub subscriptions_enabled: bool,
    pub user_registration_enabled: bool,
    pub url: Option<String>,
    pub validation_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantAccessModel {
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
}

/// Portal sub-resources as read from the service.
#[derive(Debug, Clone, Default)]
pub struct PortalSettings {
    pub sign_in: SignInSettings,
    pub sign_up: SignUpSettings,
    pub delegation: DelegationSettings,
    pub delegation_secrets: DelegationSecrets,
    pub tenant_access: TenantAccessSecrets,
}

impl TenantAccessModel {
    pub fn flatten(secrets: &TenantAccessSecrets) -> Self {
        Self {
            enabled: secrets.enabled.unwrap_or(false),
            tenant_id: secrets.id.clone(),
            primary_key: secrets.primary_key.clone(),
            secondary_key: secrets.secondary_key.clone(),
        }
    }

    pub fn to_builder(&self) -> ObjectBuilder {
        ObjectBuilder::new()
            .bool("enabled", self.enabled)
            .opt_string("tenant_id", self.tenant_id.clone())
            .opt_string("primary_key", self.primary_key.clone())
            .opt_string("secondary_key", self.secondary_key.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceModel {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub publisher_name: String,
    pub publisher_email: String,
    pub sku_name: String,
    pub identity: Option<IdentityModel>,
    pub virtual_network_type: String,
    pub subnet_id: Option<String>,
    pub client_certificate_enabled: bool,
    pub gateway_disabled: bool,
    pub min_api_version: Option<String>,
    pub notification_sender_email: Option<String>,
    pub additional_locations: Vec<AdditionalLocationModel>,
    pub certificates: Vec<CertificateModel>,
    /// `None` without a `protocols` block; the custom property is then left alone.
    pub http2_enabled: Option<bool>,
    /// Keyed by `security` attribute name.
    pub security: BTreeMap<&'static str, bool>,
    pub hostnames: Vec<HostnameModel>,
    pub sign_in: Option<bool>,
    pub sign_up: Option<SignUpModel>,
    pub delegation: Option<DelegationModel>,
    pub tenant_access: Option<TenantAccessModel>,
    pub zones: Vec<String>,
    pub public_ip_address_id: Option<String>,
    pub public_network_access_enabled: bool,
    pub tags: HashMap<String, String>,
    pub gateway_url: Option<String>,
    pub gateway_regional_url: Option<String>,
    pub management_api_url: Option<String>,
    pub portal_url: Option<String>,
    pub developer_portal_url: Option<String>,
    pub scm_url: Option<String>,
    pub public_ip_addresses: Vec<String>,
    pub private_ip_addresses: Vec<String>,
}

impl ServiceModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);

        let identity = match r.block("identity")? {
            Some(i) => Some(IdentityModel {
                identity_type: i.required_string("type")?,
                identity_ids: i.string_set("identity_ids")?.into_iter().collect(),
                principal_id: None,
                tenant_id: None,
            }),
            None => None,
        };

        let subnet_id = match r.block("virtual_network_configuration")? {
            Some(v) => Some(v.required_string("subnet_id")?),
            None => None,
        };

        let additional_locations = r
            .blocks("additional_location")?
            .iter()
            .map(|l| {
                Ok(AdditionalLocationModel {
                    location: l.required_string("location")?,
                    capacity: l.int("capacity")?.unwrap_or(0),
                    zones: l.string_list("zones")?,
                    public_ip_address_id: l.non_empty_string("public_ip_address_id")?,
                    subnet_id: match l.block("virtual_network_configuration")? {
                        Some(v) => Some(v.required_string("subnet_id")?),
                        None => None,
                    },
                    gateway_disabled: l.bool_or("gateway_disabled", false)?,
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, Diagnostic>>()?;

        let certificates = r
            .blocks("certificate")?
            .iter()
            .map(|c| {
                Ok(CertificateModel {
                    encoded_certificate: Some(c.required_string("encoded_certificate")?),
                    certificate_password: c.non_empty_string("certificate_password")?,
                    store_name: c.required_string("store_name")?,
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, Diagnostic>>()?;

        let security = match r.block("security")? {
            Some(s) => SECURITY_PROPERTIES
                .iter()
                .map(|p| Ok((p.attribute, s.bool_or(p.attribute, false)?)))
                .collect::<Result<BTreeMap<_, _>, Diagnostic>>()?,
            None => BTreeMap::new(),
        };

        let mut hostnames = Vec::new();
        if let Some(h) = r.block("hostname_configuration")? {
            for kind in HostnameKind::ALL {
                for item in h.blocks(kind.attribute())? {
                    hostnames.push(HostnameModel::from_reader(kind, &item)?);
                }
            }
        }

        let sign_up = match r.block("sign_up")? {
            Some(s) => Some(SignUpModel {
                enabled: s.bool_or("enabled", false)?,
                terms_of_service: match s.block("terms_of_service")? {
                    Some(t) => Some(TermsOfServiceModel {
                        enabled: t.bool_or("enabled", false)?,
                        consent_required: t.bool_or("consent_required", false)?,
                        text: t.string("text")?,
                    }),
                    None => None,
                },
            }),
            None => None,
        };

        let delegation = match r.block("delegation")? {
            Some(d) => Some(DelegationModel {
                subscriptions_enabled: d.bool_or("subscriptions_enabled", false)?,
                user_registration_enabled: d.bool_or("user_registration_enabled", false)?,
                url: d.non_empty_string("url")?,
                validation_key: d.non_empty_string("validation_key")?,
            }),
            None => None,
        };

        let tenant_access = match r.block("tenant_access")? {
            Some(t) => Some(TenantAccessModel {
                enabled: t.bool_or("enabled", false)?,
                ..Default::default()
            }),
            None => None,
        };

        Ok(Self {
            name: r.required_string("name")?,
            resource_group_name: r.required_string("resource_group_name")?,
            location: r.required_string("location")?,
            publisher_name: r.required_string("publisher_name")?,
            publisher_email: r.required_string("publisher_email")?,
            sku_name: r.required_string("sku_name")?,
            identity,
            virtual_network_type: r.string_or("virtual_network_type", VIRTUAL_NETWORK_TYPE_NONE)?,
            subnet_id,
            client_certificate_enabled: r.bool_or("client_certificate_enabled", false)?,
            gateway_disabled: r.bool_or("gateway_disabled", false)?,
            min_api_version: r.non_empty_string("min_api_version")?,
            notification_sender_email: r.non_empty_string("notification_sender_email")?,
            additional_locations,
            certificates,
            http2_enabled: match r.block("protocols")? {
                Some(p) => Some(p.bool_or("http2_enabled", false)?),
                None => None,
            },
            security,
            hostnames,
            sign_in: match r.block("sign_in")? {
                Some(s) => Some(s.bool_or("enabled", false)?),
                None => None,
            },
            sign_up,
            delegation,
            tenant_access,
            zones: r.string_list("zones")?,
            public_ip_address_id: r.non_empty_string("public_ip_address_id")?,
            public_network_access_enabled: r.bool_or("public_network_access_enabled", true)?,
            tags: r.string_map("tags")?,
            ..Default::default()
        })
    }

    pub fn id(&self, subscription_id: &str) -> ServiceId {
        ServiceId::new(subscription_id, &self.resource_group_name, &self.name)
    }

    pub fn sku(&self) -> Result<ServiceSku, Diagnostic> {
        parse_sku(&self.sku_name).ok_or_else(|| {
            Diagnostic::error(
                "Invalid SKU",
                format!("`sku_name` {:?} is not of the form `<tier>_<capacity>`", self.sku_name),
            )
            .with_attribute(AttributePath::new("sku_name"))
        })
    }

    pub fn is_consumption(&self) -> bool {
        parse_sku(&self.sku_name).is_some_and(|s| s.name == CONSUMPTION)
    }

    pub fn security_flag(&self, attribute: &str) -> bool {
        self.security.get(attribute).copied().unwrap_or(false)
    }

    /// TLS and cipher toggles plus HTTP/2. Consumption only accepts the
    /// protocol toggles.
    pub fn custom_properties(&self, consumption: bool) -> HashMap<String, String> {
        let mut properties: HashMap<String, String> = SECURITY_PROPERTIES
            .iter()
            .filter(|p| !consumption || p.allowed_on_consumption)
            .map(|p| (p.key.to_string(), self.security_flag(p.attribute).to_string()))
            .collect();
        if let Some(http2) = self.http2_enabled {
            properties.insert(HTTP2_PROTOCOL.to_string(), http2.to_string());
        }
        properties
    }

    fn expand_identity(&self) -> ServiceIdentity {
        match &self.identity {
            Some(identity) => ServiceIdentity {
                identity_type: identity.identity_type.clone(),
                user_assigned_identities: (!identity.identity_ids.is_empty()).then(|| {
                    identity
                        .identity_ids
                        .iter()
                        .map(|id| (id.clone(), UserAssignedIdentity::default()))
                        .collect()
                }),
                ..Default::default()
            },
            None => ServiceIdentity {
                identity_type: "None".to_string(),
                ..Default::default()
            },
        }
    }

    fn expand_virtual_network(&self) -> Option<VirtualNetworkConfiguration> {
        self.subnet_id.as_ref().map(|subnet| VirtualNetworkConfiguration {
            subnet_resource_id: Some(subnet.clone()),
            ..Default::default()
        })
    }

    fn expand_hostnames(&self) -> Vec<HostnameConfiguration> {
        self.hostnames.iter().map(HostnameModel::expand).collect()
    }

    fn expand_certificates(&self) -> Vec<CertificateConfiguration> {
        self.certificates
            .iter()
            .map(|c| CertificateConfiguration {
                encoded_certificate: c.encoded_certificate.clone(),
                certificate_password: Some(c.certificate_password.clone().unwrap_or_default()),
                store_name: c.store_name.clone(),
                certificate: None,
            })
            .collect()
    }

    fn expand_additional_locations(&self, sku: &ServiceSku) -> Vec<AdditionalLocation> {
        self.additional_locations
            .iter()
            .map(|l| AdditionalLocation {
                location: normalize_location(&l.location),
                sku: Some(ServiceSku {
                    name: sku.name.clone(),
                    capacity: if l.capacity > 0 { l.capacity } else { sku.capacity },
                }),
                zones: (!l.zones.is_empty()).then(|| l.zones.clone()),
                public_ip_address_id: l.public_ip_address_id.clone(),
                virtual_network_configuration: l.subnet_id.as_ref().map(|subnet| {
                    VirtualNetworkConfiguration {
                        subnet_resource_id: Some(subnet.clone()),
                        ..Default::default()
                    }
                }),
                disable_gateway: Some(l.gateway_disabled),
                ..Default::default()
            })
            .collect()
    }

    fn public_network_access(&self) -> String {
        if self.public_network_access_enabled {
            "Enabled".to_string()
        } else {
            "Disabled".to_string()
        }
    }

    /// Body of the initial PUT.
    pub fn expand(&self) -> Result<ServiceContract, Diagnostic> {
        let sku = self.sku()?;
        let consumption = sku.name == CONSUMPTION;
        let vnet_type = self.virtual_network_type.clone();

        let properties = ServiceProperties {
            publisher_name: Some(self.publisher_name.clone()),
            publisher_email: Some(self.publisher_email.clone()),
            public_network_access: Some(self.public_network_access()),
            custom_properties: Some(self.custom_properties(consumption)),
            certificates: Some(self.expand_certificates()),
            hostname_configurations: (!self.hostnames.is_empty()).then(|| self.expand_hostnames()),
            additional_locations: (!self.additional_locations.is_empty())
                .then(|| self.expand_additional_locations(&sku)),
            notification_sender_email: self.notification_sender_email.clone(),
            virtual_network_configuration: (vnet_type != VIRTUAL_NETWORK_TYPE_NONE)
                .then(|| self.expand_virtual_network())
                .flatten(),
            virtual_network_type: Some(vnet_type),
            public_ip_address_id: self.public_ip_address_id.clone(),
            enable_client_certificate: consumption.then_some(self.client_certificate_enabled),
            disable_gateway: Some(self.gateway_disabled),
            api_version_constraint: self.min_api_version.as_ref().map(|v| ApiVersionConstraint {
                min_api_version: Some(v.clone()),
            }),
            ..Default::default()
        };

        Ok(ServiceContract {
            location: Some(normalize_location(&self.location)),
            sku: Some(sku),
            identity: Some(self.expand_identity()),
            zones: (!self.zones.is_empty()).then(|| self.zones.clone()),
            tags: Some(self.tags.clone()),
            properties: Some(properties),
            ..Default::default()
        })
    }

    /// PATCH body carrying only the fields for which `changed` holds.
    pub fn expand_update(&self, changed: impl Fn(&str) -> bool) -> Result<ServiceUpdate, Diagnostic> {
        let sku = self.sku()?;
        let mut update = ServiceUpdate::default();
        let mut props = ServiceProperties::default();

        if changed("sku_name") {
            update.sku = Some(sku.clone());
        }
        if changed("tags") {
            update.tags = Some(self.tags.clone());
        }
        if changed("identity") {
            update.identity = Some(self.expand_identity());
        }
        if changed("zones") && !self.zones.is_empty() {
            update.zones = Some(self.zones.clone());
        }
        if changed("public_ip_address_id") {
            props.public_ip_address_id = self.public_ip_address_id.clone();
        }
        if changed("notification_sender_email") {
            props.notification_sender_email =
                Some(self.notification_sender_email.clone().unwrap_or_default());
        }
        if changed("virtual_network_type") {
            props.virtual_network_type = Some(self.virtual_network_type.clone());
            if self.virtual_network_type != VIRTUAL_NETWORK_TYPE_NONE {
                props.virtual_network_configuration = self.expand_virtual_network();
            }
        }
        if changed("virtual_network_configuration") {
            props.virtual_network_configuration = self.expand_virtual_network();
        }
        if changed("security") || changed("protocols") {
            props.custom_properties = Some(self.custom_properties(sku.name == CONSUMPTION));
        }
        if changed("certificate") {
            props.certificates = Some(self.expand_certificates());
        }
        if changed("public_network_access_enabled") {
            props.public_network_access = Some(self.public_network_access());
        }
        if changed("publisher_name") {
            props.publisher_name = Some(self.publisher_name.clone());
        }
        if changed("publisher_email") {
            props.publisher_email = Some(self.publisher_email.clone());
        }
        if changed("hostname_configuration") {
            props.hostname_configurations = Some(self.expand_hostnames());
        }
        if changed("additional_location") {
            props.additional_locations = Some(self.expand_additional_locations(&sku));
        }
        if changed("client_certificate_enabled") {
            props.enable_client_certificate = Some(self.client_certificate_enabled);
        }
        if changed("gateway_disabled") {
            props.disable_gateway = Some(self.gateway_disabled);
        }
        if changed("min_api_version") {
            props.api_version_constraint = Some(ApiVersionConstraint {
                min_api_version: self.min_api_version.clone(),
            });
        }

        if props != ServiceProperties::default() {
            update.properties = Some(props);
        }
        Ok(update)
    }

    /// Model from the live service. Secrets the service never returns
    /// (certificates and their passwords) are carried over from `source`.
    pub fn flatten(
        id: &ServiceId,
        service: &ServiceContract,
        portal: Option<&PortalSettings>,
        source: &DynamicValue,
        include_built_in_hostnames: bool,
    ) -> Result<Self, Diagnostic> {
        let source_reader = ObjectReader::new(source);
        let mut model = Self {
            name: id.service_name.clone(),
            resource_group_name: id.resource_group_name.clone(),
            location: service.location.clone().unwrap_or_default(),
            virtual_network_type: VIRTUAL_NETWORK_TYPE_NONE.to_string(),
            public_network_access_enabled: true,
            tags: service.tags.clone().unwrap_or_default(),
            zones: service.zones.clone().unwrap_or_default(),
            ..Default::default()
        };

        // Keep the configured spelling when it names the same region.
        if let Ok(Some(configured)) = source_reader.string("location") {
            if normalize_location(&configured) == normalize_location(&model.location) {
                model.location = configured;
            }
        }

        let consumption = service.sku.as_ref().is_some_and(|s| s.name == CONSUMPTION);
        if let Some(sku) = &service.sku {
            model.sku_name = format_sku(sku);
        }

        model.identity = service
            .identity
            .as_ref()
            .filter(|i| !i.identity_type.eq_ignore_ascii_case("None"))
            .map(|i| {
                let mut identity_ids: Vec<String> = i
                    .user_assigned_identities
                    .iter()
                    .flat_map(|m| m.keys().cloned())
                    .collect();
                identity_ids.sort();
                IdentityModel {
                    identity_type: i.identity_type.clone(),
                    identity_ids,
                    principal_id: i.principal_id.clone(),
                    tenant_id: i.tenant_id.clone(),
                }
            });

        if let Some(props) = &service.properties {
            model.publisher_name = props.publisher_name.clone().unwrap_or_default();
            model.publisher_email = props.publisher_email.clone().unwrap_or_default();
            model.notification_sender_email = props.notification_sender_email.clone();
            model.gateway_url = props.gateway_url.clone();
            model.gateway_regional_url = props.gateway_regional_url.clone();
            model.portal_url = props.portal_url.clone();
            model.developer_portal_url = props.developer_portal_url.clone();
            model.management_api_url = props.management_api_url.clone();
            model.scm_url = props.scm_url.clone();
            model.public_ip_addresses = props.public_ip_addresses.clone().unwrap_or_default();
            model.private_ip_addresses = props.private_ip_addresses.clone().unwrap_or_default();
            model.public_ip_address_id = props.public_ip_address_id.clone();
            model.public_network_access_enabled = !props
                .public_network_access
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case("Disabled"));
            if let Some(vnet_type) = &props.virtual_network_type {
                model.virtual_network_type = vnet_type.clone();
            }
            model.client_certificate_enabled = props.enable_client_certificate.unwrap_or(false);
            model.gateway_disabled = props.disable_gateway.unwrap_or(false);
            model.min_api_version = props
                .api_version_constraint
                .as_ref()
                .and_then(|c| c.min_api_version.clone());
            model.subnet_id = flatten_subnet(props.virtual_network_configuration.as_ref())?;

            let custom = props.custom_properties.clone().unwrap_or_default();
            model.security = SECURITY_PROPERTIES
                .iter()
                .map(|p| {
                    let enabled = (!consumption || p.allowed_on_consumption) && parse_flag(&custom, p.key);
                    (p.attribute, enabled)
                })
                .collect();
            model.http2_enabled = Some(parse_flag(&custom, HTTP2_PROTOCOL));

            model.hostnames = flatten_hostnames(
                props.hostname_configurations.as_deref().unwrap_or_default(),
                &source_reader,
                include_built_in_hostnames,
            )?;
            model.additional_locations =
                flatten_additional_locations(props.additional_locations.as_deref().unwrap_or_default(), &source_reader)?;
            model.certificates =
                flatten_certificates(props.certificates.as_deref().unwrap_or_default(), &source_reader)?;
        }

        if let Some(portal) = portal {
            model.sign_in = Some(
                portal
                    .sign_in
                    .properties
                    .as_ref()
                    .and_then(|p| p.enabled)
                    .unwrap_or(false),
            );
            model.sign_up = Some(flatten_sign_up(&portal.sign_up));
            model.delegation = Some(flatten_delegation(&portal.delegation, &portal.delegation_secrets));
            model.tenant_access = Some(TenantAccessModel::flatten(&portal.tenant_access));
        }

        Ok(model)
    }

    /// Top-level attributes shared with the data source.
    pub fn state_builder(&self, id: &ServiceId) -> ObjectBuilder {
        ObjectBuilder::new()
            .string("id", id.to_string())
            .string("name", &self.name)
            .string("resource_group_name", &self.resource_group_name)
            .string("location", &self.location)
            .string("publisher_name", &self.publisher_name)
            .string("publisher_email", &self.publisher_email)
            .string("sku_name", &self.sku_name)
            .opt_string("notification_sender_email", self.notification_sender_email.clone())
            .opt_string("gateway_url", self.gateway_url.clone())
            .opt_string("gateway_regional_url", self.gateway_regional_url.clone())
            .opt_string("management_api_url", self.management_api_url.clone())
            .opt_string("portal_url", self.portal_url.clone())
            .opt_string("developer_portal_url", self.developer_portal_url.clone())
            .opt_string("scm_url", self.scm_url.clone())
            .string_list("public_ip_addresses", self.public_ip_addresses.iter().cloned())
            .string_list("private_ip_addresses", self.private_ip_addresses.iter().cloned())
            .opt_string("public_ip_address_id", self.public_ip_address_id.clone())
            .bool("public_network_access_enabled", self.public_network_access_enabled)
            .string_list("zones", self.zones.iter().cloned())
            .string_map("tags", &self.tags)
            .block(
                "identity",
                self.identity.as_ref().map(|i| {
                    ObjectBuilder::new()
                        .string("type", &i.identity_type)
                        .string_list("identity_ids", i.identity_ids.iter().cloned())
                        .opt_string("principal_id", i.principal_id.clone())
                        .opt_string("tenant_id", i.tenant_id.clone())
                }),
            )
            .block("hostname_configuration", self.hostname_configuration_builder())
            .blocks(
                "additional_location",
                self.additional_locations
                    .iter()
                    .map(|l| {
                        ObjectBuilder::new()
                            .string("location", &l.location)
                            .int("capacity", l.capacity)
                            .string_list("zones", l.zones.iter().cloned())
                            .opt_string("public_ip_address_id", l.public_ip_address_id.clone())
                            .block("virtual_network_configuration", subnet_builder(l.subnet_id.as_ref()))
                            .bool("gateway_disabled", l.gateway_disabled)
                            .opt_string("gateway_regional_url", l.gateway_regional_url.clone())
                            .string_list("public_ip_addresses", l.public_ip_addresses.iter().cloned())
                            .string_list("private_ip_addresses", l.private_ip_addresses.iter().cloned())
                    })
                    .collect(),
            )
    }

    fn hostname_configuration_builder(&self) -> Option<ObjectBuilder> {
        if self.hostnames.is_empty() {
            return None;
        }
        let builder = HostnameKind::ALL
            .into_iter()
            .fold(ObjectBuilder::new(), |builder, kind| {
                builder.blocks(
                    kind.attribute(),
                    self.hostnames
                        .iter()
                        .filter(|h| h.kind == kind)
                        .map(HostnameModel::to_builder)
                        .collect(),
                )
            });
        Some(builder)
    }

    /// Optional blocks that only carry defaults are written back only when
    /// `source` has them, so an omitted block does not show up as a diff.
    pub fn to_state(&self, id: &ServiceId, source: &DynamicValue) -> DynamicValue {
        let source_reader = ObjectReader::new(source);
        let keep = |name: &str, non_default: bool| source_reader.is_set(name) || non_default;
        let consumption = self.is_consumption();

        let security = keep("security", self.security.values().any(|v| *v)).then(|| {
            SECURITY_PROPERTIES
                .iter()
                .filter(|p| !consumption || p.allowed_on_consumption)
                .fold(ObjectBuilder::new(), |b, p| b.bool(p.attribute, self.security_flag(p.attribute)))
        });
        let protocols = self
            .http2_enabled
            .filter(|enabled| keep("protocols", *enabled))
            .map(|enabled| ObjectBuilder::new().bool("http2_enabled", enabled));

        let builder = self
            .state_builder(id)
            .string("virtual_network_type", &self.virtual_network_type)
            .block("virtual_network_configuration", subnet_builder(self.subnet_id.as_ref()))
            .bool("client_certificate_enabled", self.client_certificate_enabled)
            .bool("gateway_disabled", self.gateway_disabled)
            .opt_string("min_api_version", self.min_api_version.clone())
            .blocks(
                "certificate",
                self.certificates
                    .iter()
                    .map(|c| {
                        ObjectBuilder::new()
                            .opt_string("encoded_certificate", c.encoded_certificate.clone())
                            .opt_string("certificate_password", c.certificate_password.clone())
                            .string("store_name", &c.store_name)
                            .opt_string("expiry", c.expiry.clone())
                            .opt_string("subject", c.subject.clone())
                            .opt_string("thumbprint", c.thumbprint.clone())
                    })
                    .collect(),
            )
            .block("security", security)
            .block("protocols", protocols)
            .block(
                "sign_in",
                self.sign_in
                    .filter(|enabled| keep("sign_in", *enabled))
                    .map(|enabled| ObjectBuilder::new().bool("enabled", enabled)),
            )
            .block(
                "sign_up",
                self.sign_up
                    .as_ref()
                    .filter(|s| keep("sign_up", s.enabled))
                    .map(|s| {
                        ObjectBuilder::new().bool("enabled", s.enabled).block(
                            "terms_of_service",
                            s.terms_of_service.as_ref().map(|t| {
                                ObjectBuilder::new()
                                    .bool("enabled", t.enabled)
                                    .bool("consent_required", t.consent_required)
                                    .opt_string("text", t.text.clone())
                            }),
                        )
                    }),
            )
            .block(
                "delegation",
                self.delegation
                    .as_ref()
                    .filter(|d| keep("delegation", d.subscriptions_enabled || d.user_registration_enabled))
                    .map(|d| {
                        ObjectBuilder::new()
                            .bool("subscriptions_enabled", d.subscriptions_enabled)
                            .bool("user_registration_enabled", d.user_registration_enabled)
                            .opt_string("url", d.url.clone())
                            .opt_string("validation_key", d.validation_key.clone())
                    }),
            )
            .block(
                "tenant_access",
                self.tenant_access
                    .as_ref()
                    .filter(|t| keep("tenant_access", t.enabled))
                    .map(TenantAccessModel::to_builder),
            );
        common::with_timeouts(builder, source).into_value()
    }
}

fn subnet_builder(subnet_id: Option<&String>) -> Option<ObjectBuilder> {
    subnet_id.map(|s| ObjectBuilder::new().string("subnet_id", s))
}

fn flatten_subnet(config: Option<&VirtualNetworkConfiguration>) -> Result<Option<String>, Diagnostic> {
    let Some(raw) = config.and_then(|c| c.subnet_resource_id.as_deref()) else {
        return Ok(None);
    };
    SubnetId::parse(raw)
        .map(|id| Some(id.to_string()))
        .map_err(common::invalid_id)
}

/// Service hostnames grouped by kind. Certificates and passwords are never
/// returned and come from the matching `source` entry.
fn flatten_hostnames(
    configs: &[HostnameConfiguration],
    source: &ObjectReader,
    include_built_in: bool,
) -> Result<Vec<HostnameModel>, Diagnostic> {
    let source_block = source.block("hostname_configuration")?;
    let mut hostnames = Vec::new();
    for config in configs {
        if !include_built_in
            && config
                .certificate_source
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(BUILT_IN_CERTIFICATE_SOURCE))
        {
            continue;
        }
        let Some(kind) = HostnameKind::from_api_type(&config.hostname_type) else {
            tracing::warn!("Ignoring hostname {} of unknown type {}", config.host_name, config.hostname_type);
            continue;
        };
        let mut hostname = HostnameModel::flatten(kind, config);
        if let Some(block) = &source_block {
            for prior in block.blocks(kind.attribute())? {
                if prior.string("host_name")?.as_deref() == Some(config.host_name.as_str()) {
                    hostname.certificate = prior.non_empty_string("certificate")?;
                    hostname.certificate_password = prior.non_empty_string("certificate_password")?;
                }
            }
        }
        hostnames.push(hostname);
    }
    Ok(hostnames)
}

fn flatten_additional_locations(
    locations: &[AdditionalLocation],
    source: &ObjectReader,
) -> Result<Vec<AdditionalLocationModel>, Diagnostic> {
    let prior = source.blocks("additional_location")?;
    locations
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let mut location = l.location.clone();
            if let Some(configured) = prior.get(i).map(|p| p.string("location")).transpose()?.flatten() {
                if normalize_location(&configured) == normalize_location(&location) {
                    location = configured;
                }
            }
            Ok(AdditionalLocationModel {
                location,
                capacity: l.sku.as_ref().map(|s| s.capacity).unwrap_or(0),
                zones: l.zones.clone().unwrap_or_default(),
                public_ip_address_id: l.public_ip_address_id.clone(),
                subnet_id: flatten_subnet(l.virtual_network_configuration.as_ref())?,
                gateway_disabled: l.disable_gateway.unwrap_or(false),
                gateway_regional_url: l.gateway_regional_url.clone(),
                public_ip_addresses: l.public_ip_addresses.clone().unwrap_or_default(),
                private_ip_addresses: l.private_ip_addresses.clone().unwrap_or_default(),
            })
        })
        .collect()
}

fn flatten_certificates(
    certificates: &[CertificateConfiguration],
    source: &ObjectReader,
) -> Result<Vec<CertificateModel>, Diagnostic> {
    let prior = source.blocks("certificate")?;
    certificates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let prior = prior.get(i);
            let info = c.certificate.as_ref();
            Ok(CertificateModel {
                encoded_certificate: prior
                    .map(|p| p.non_empty_string("encoded_certificate"))
                    .transpose()?
                    .flatten(),
                certificate_password: prior
                    .map(|p| p.non_empty_string("certificate_password"))
                    .transpose()?
                    .flatten(),
                store_name: c.store_name.clone(),
                expiry: info.and_then(|i| i.expiry.as_deref()).map(format_expiry),
                subject: info.and_then(|i| i.subject.clone()),
                thumbprint: info.and_then(|i| i.thumbprint.clone()),
            })
        })
        .collect()
}

fn flatten_sign_up(settings: &SignUpSettings) -> SignUpModel {
    let props = settings.properties.as_ref();
    SignUpModel {
        enabled: props.and_then(|p| p.enabled).unwrap_or(false),
        terms_of_service: props
            .and_then(|p| p.terms_of_service.as_ref())
            .map(|t| TermsOfServiceModel {
                enabled: t.enabled.unwrap_or(false),
                consent_required: t.consent_required.unwrap_or(false),
                text: t.text.clone(),
            }),
    }
}

fn flatten_delegation(settings: &DelegationSettings, secrets: &DelegationSecrets) -> DelegationModel {
    let props = settings.properties.as_ref();
    DelegationModel {
        subscriptions_enabled: props
            .and_then(|p| p.subscriptions.as_ref())
            .and_then(|s| s.enabled)
            .unwrap_or(false),
        user_registration_enabled: props
            .and_then(|p| p.user_registration.as_ref())
            .and_then(|s| s.enabled)
            .unwrap_or(false),
        url: props.and_then(|p| p.url.clone()).filter(|u| !u.is_empty()),
        validation_key: secrets.validation_key.clone(),
    }
}

pub fn expand_sign_up(model: Option<&SignUpModel>) -> SignUpSettings {
    let properties = match model {
        Some(s) => SignUpProperties {
            enabled: Some(s.enabled),
            terms_of_service: s.terms_of_service.as_ref().map(|t| TermsOfService {
                enabled: Some(t.enabled),
                consent_required: Some(t.consent_required),
                text: Some(t.text.clone().unwrap_or_default()),
            }),
        },
        None => SignUpProperties {
            enabled: Some(false),
            terms_of_service: Some(TermsOfService {
                enabled: Some(false),
                consent_required: Some(false),
                text: Some(String::new()),
            }),
        },
    };
    ArmResource::with_properties(properties)
}

/// Disabled delegation still needs a URL and key; placeholders fill in
/// whatever is not configured.
pub fn expand_delegation(model: &DelegationModel) -> DelegationSettings {
    let disabled = !model.subscriptions_enabled && !model.user_registration_enabled;
    let placeholder = |value: &Option<String>, fallback: &str| {
        value
            .clone()
            .or_else(|| disabled.then(|| fallback.to_string()))
    };
    ArmResource::with_properties(DelegationProperties {
        url: placeholder(&model.url, DELEGATION_URL_PLACEHOLDER),
        validation_key: placeholder(&model.validation_key, DELEGATION_VALIDATION_KEY_PLACEHOLDER),
        subscriptions: Some(DelegationToggle {
            enabled: Some(model.subscriptions_enabled),
        }),
        user_registration: Some(DelegationToggle {
            enabled: Some(model.user_registration_enabled),
        }),
    })
}

fn invalid(attribute: &str, detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error("Invalid configuration", detail.into()).with_attribute(AttributePath::new(attribute))
}

/// Rules that depend on the SKU tier or span several attributes. Unknown
/// values count as set and skip the checks that depend on them.
pub fn validate_config(config: &DynamicValue) -> Vec<Diagnostic> {
    let r = ObjectReader::new(config);
    let present = |name: &str| r.is_set(name) || r.is_unknown(name);
    let mut diagnostics = Vec::new();

    let tier = r
        .string("sku_name")
        .ok()
        .flatten()
        .and_then(|s| parse_sku(&s))
        .map(|s| s.name);
    let tier = tier.as_deref();
    let vnet_type = if r.is_unknown("virtual_network_type") {
        None
    } else {
        Some(
            r.string("virtual_network_type")
                .ok()
                .flatten()
                .unwrap_or_else(|| VIRTUAL_NETWORK_TYPE_NONE.to_string()),
        )
    };
    let no_vnet = vnet_type.as_deref() == Some(VIRTUAL_NETWORK_TYPE_NONE);

    if let Some(tier) = tier {
        if r.is_set("public_ip_address_id") && tier != PREMIUM && tier != DEVELOPER && no_vnet {
            diagnostics.push(invalid(
                "public_ip_address_id",
                "`public_ip_address_id` is only supported when sku type is `Developer` or `Premium`, and the APIM instance is deployed in a virtual network",
            ));
        }
        if r.bool("client_certificate_enabled").ok().flatten() == Some(true) && tier != CONSUMPTION {
            diagnostics.push(invalid(
                "client_certificate_enabled",
                "`client_certificate_enabled` is only supported when sku type is `Consumption`",
            ));
        }
        if r.string_list("zones").is_ok_and(|z| !z.is_empty()) && tier != PREMIUM {
            diagnostics.push(invalid("zones", "`zones` is only supported when sku type is `Premium`"));
        }
        if tier == CONSUMPTION {
            if let Ok(Some(security)) = r.block("security") {
                for property in SECURITY_PROPERTIES.iter().filter(|p| !p.allowed_on_consumption) {
                    if security.bool(property.attribute).ok().flatten() == Some(true) {
                        diagnostics.push(invalid(
                            "security",
                            format!("`{}` is not supported for Sku Tier `Consumption`", property.attribute),
                        ));
                    }
                }
            }
            for setting in PORTAL_SETTINGS {
                if r.is_set(setting) {
                    diagnostics.push(invalid(
                        setting,
                        format!("`{}` is not supported for sku tier `Consumption`", setting),
                    ));
                }
            }
        }
    }

    if r.bool("gateway_disabled").ok().flatten() == Some(true) && !present("additional_location") {
        diagnostics.push(invalid(
            "gateway_disabled",
            "`gateway_disabled` is only supported when `additional_location` is set",
        ));
    }

    if let Some(vnet_type) = &vnet_type {
        if vnet_type != VIRTUAL_NETWORK_TYPE_NONE && !present("virtual_network_configuration") {
            diagnostics.push(invalid(
                "virtual_network_configuration",
                format!(
                    "you must specify `virtual_network_configuration` when `virtual_network_type` is {:?}",
                    vnet_type
                ),
            ));
        }
        if no_vnet && r.is_set("virtual_network_configuration") {
            diagnostics.push(invalid(
                "virtual_network_type",
                "you must specify `virtual_network_type` when specifying `virtual_network_configuration`",
            ));
        }
    }

    let parent_vnet = present("virtual_network_configuration");
    for location in r.blocks("additional_location").unwrap_or_default() {
        let child_vnet =
            location.is_set("virtual_network_configuration") || location.is_unknown("virtual_network_configuration");
        if parent_vnet && !child_vnet {
            diagnostics.push(invalid(
                "additional_location",
                "`virtual_network_configuration` must be specified in any `additional_location` block when top-level `virtual_network_configuration` is supplied",
            ));
        }
        if !parent_vnet && child_vnet {
            diagnostics.push(invalid(
                "additional_location",
                "`virtual_network_configuration` must be empty in all `additional_location` blocks when top-level `virtual_network_configuration` is not supplied",
            ));
        }
        if location.is_set("public_ip_address_id") && tier.is_some_and(|t| t != PREMIUM) && !child_vnet {
            diagnostics.push(invalid(
                "additional_location",
                "`public_ip_address_id` for an additional location is only supported when sku type is `Premium`, and the APIM instance is deployed in a virtual network",
            ));
        }
    }

    if let Ok(Some(identity)) = r.block("identity") {
        if let Ok(Some(identity_type)) = identity.string("type") {
            let ids = identity.string_list("identity_ids").unwrap_or_default();
            let user_assigned = identity_type.contains("UserAssigned");
            if user_assigned && ids.is_empty() && !identity.is_unknown("identity_ids") {
                diagnostics.push(invalid(
                    "identity",
                    "`identity_ids` must be specified when `type` includes `UserAssigned`",
                ));
            }
            if !user_assigned && !ids.is_empty() {
                diagnostics.push(invalid(
                    "identity",
                    "`identity_ids` can only be specified when `type` includes `UserAssigned`",
                ));
            }
        }
    }

    diagnostics
}

fn ensure_valid(config: &DynamicValue) -> Result<(), Diagnostic> {
    match validate_config(config).into_iter().next() {
        Some(diag) => Err(diag),
        None => Ok(()),
    }
}

/// Sign-in, sign-up, delegation (with its validation key) and tenant access
/// (with its keys).
pub async fn read_portal_settings(
    ctx: &Context,
    client: &Client,
    id: &ServiceId,
) -> Result<PortalSettings, Diagnostic> {
    let portal = client.portal_settings();
    let sign_in = common::within(ctx, portal.get_sign_in(id))
        .await
        .map_err(|e| common::api_diagnostic("retrieving Sign In Settings for", id, e))?;
    let sign_up = common::within(ctx, portal.get_sign_up(id))
        .await
        .map_err(|e| common::api_diagnostic("retrieving Sign Up Settings for", id, e))?;
    let delegation = common::within(ctx, portal.get_delegation(id))
        .await
        .map_err(|e| common::api_diagnostic("retrieving Delegation Settings for", id, e))?;
    let delegation_secrets = common::within(ctx, portal.list_delegation_secrets(id))
        .await
        .map_err(|e| common::api_diagnostic("retrieving Delegation Validation Key for", id, e))?;
    let tenant_access = common::within(ctx, portal.list_tenant_access_secrets(id))
        .await
        .map_err(|e| common::api_diagnostic("retrieving tenant access properties for", id, e))?;
    Ok(PortalSettings {
        sign_in,
        sign_up,
        delegation,
        delegation_secrets,
        tenant_access,
    })
}

fn string_set(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::set_of(AttributeType::String))
        .description(description)
        .optional()
        .build()
}

fn optional_bool(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .optional()
        .default(StaticDefault::bool(false))
        .build()
}

fn ip_list(name: &str) -> Attribute {
    common::computed(name, AttributeType::list_of(AttributeType::String), "IP addresses of the gateway")
}

fn subnet_block() -> NestedBlock {
    NestedBlockBuilder::list("virtual_network_configuration")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("subnet_id", AttributeType::String)
                .required()
                .validator(IsResourceId::create())
                .build(),
        )
        .build()
}

fn hostname_block(kind: HostnameKind) -> NestedBlock {
    let builder = NestedBlockBuilder::list(kind.attribute())
        .attribute(common::required_string("host_name", "The hostname to use"))
        .attribute(
            AttributeBuilder::new("key_vault_certificate_id", AttributeType::String)
                .description("Key Vault secret holding the certificate")
                .optional()
                .validator(IsUrl::https())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("certificate", AttributeType::String)
                .description("Base64 encoded PFX certificate")
                .optional()
                .sensitive()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("certificate_password", AttributeType::String)
                .optional()
                .sensitive()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .attribute(optional_bool("negotiate_client_certificate"))
        .attribute(
            AttributeBuilder::new("ssl_keyvault_identity_client_id", AttributeType::String)
                .optional()
                .validator(is_uuid())
                .build(),
        )
        .attribute(common::computed("expiry", AttributeType::String, "Certificate expiry"))
        .attribute(common::computed("thumbprint", AttributeType::String, "Certificate thumbprint"))
        .attribute(common::computed("subject", AttributeType::String, "Certificate subject"))
        .attribute(common::computed("certificate_source", AttributeType::String, "Where the certificate comes from"))
        .attribute(common::computed("certificate_status", AttributeType::String, "Status of the certificate"));

    match kind {
        HostnameKind::Proxy => builder
            .attribute(
                AttributeBuilder::new("default_ssl_binding", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .build(),
        _ => builder.build(),
    }
}

fn security_block() -> NestedBlock {
    SECURITY_PROPERTIES
        .iter()
        .fold(NestedBlockBuilder::list("security").max_items(1), |b, p| {
            b.attribute(optional_bool(p.attribute))
        })
        .build()
}

fn sign_up_block() -> NestedBlock {
    NestedBlockBuilder::list("sign_up")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("enabled", AttributeType::Bool)
                .required()
                .build(),
        )
        .block(
            NestedBlockBuilder::list("terms_of_service")
                .min_items(1)
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("enabled", AttributeType::Bool)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("consent_required", AttributeType::Bool)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("text", AttributeType::String)
                        .optional()
                        .build(),
                )
                .build(),
        )
        .build()
}

fn delegation_block() -> NestedBlock {
    NestedBlockBuilder::list("delegation")
        .max_items(1)
        .attribute(optional_bool("subscriptions_enabled"))
        .attribute(optional_bool("user_registration_enabled"))
        .attribute(
            AttributeBuilder::new("url", AttributeType::String)
                .optional()
                .validator(IsUrl::http_or_https())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("validation_key", AttributeType::String)
                .optional()
                .sensitive()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .build()
}

fn additional_location_block() -> NestedBlock {
    NestedBlockBuilder::list("additional_location")
        .attribute(
            AttributeBuilder::new("location", AttributeType::String)
                .required()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("capacity", AttributeType::Number)
                .description("Scale units in this location; 0 uses the capacity of `sku_name`")
                .optional()
                .computed()
                .validator(NumberRange::int_between(0, 50))
                .build(),
        )
        .attribute(string_set("zones", "Availability zones for the location"))
        .attribute(
            AttributeBuilder::new("public_ip_address_id", AttributeType::String)
                .optional()
                .validator(IsResourceId::create())
                .build(),
        )
        .attribute(optional_bool("gateway_disabled"))
        .attribute(common::computed("gateway_regional_url", AttributeType::String, "Regional gateway URL"))
        .attribute(ip_list("public_ip_addresses"))
        .attribute(ip_list("private_ip_addresses"))
        .block(subnet_block())
        .build()
}

#[derive(Default)]
pub struct ServiceResource {
    provider_data: Option<ApiManagementProviderData>,
}

impl ServiceResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &ServiceId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.services().get(id)).await;
        let Some(service) = common::read_outcome(id, result)? else {
            return Ok(None);
        };

        let consumption = service.sku.as_ref().is_some_and(|s| s.name == CONSUMPTION);
        let portal = if consumption {
            None
        } else {
            Some(read_portal_settings(ctx, &data.client, id).await?)
        };
        let model = ServiceModel::flatten(id, &service, portal.as_ref(), source, false)?;
        Ok(Some(model.to_state(id, source)))
    }

    /// Returns `true` when a soft-deleted service was brought back.
    async fn recover_soft_deleted(
        &self,
        ctx: &Context,
        data: &ApiManagementProviderData,
        id: &ServiceId,
        model: &ServiceModel,
    ) -> Result<bool, Diagnostic> {
        let location = normalize_location(&model.location);
        let deleted_id = DeletedServiceId::new(&id.subscription_id, &location, &id.service_name);
        match common::within(ctx, data.client.deleted_services().get(&deleted_id)).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() || err.is_forbidden() => return Ok(false),
            Err(err) => {
                return Err(common::api_diagnostic(
                    "checking for the presence of a soft-deleted",
                    &deleted_id,
                    err,
                ))
            }
        }

        if !data.features.recover_soft_deleted {
            return Err(Diagnostic::error(
                "Soft-deleted API Management exists",
                opted_out_of_recovery_message(&id.service_name, &model.location),
            ));
        }

        tracing::info!("Recovering soft-deleted {} in {}", id, location);
        let body = ServiceContract {
            location: Some(location),
            sku: Some(model.sku()?),
            properties: Some(ServiceProperties {
                restore: Some(true),
                publisher_name: Some(model.publisher_name.clone()),
                publisher_email: Some(model.publisher_email.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let services = data.client.services();
        retry_if(ctx, data.retry_policy, is_bad_request, || {
            common::within(ctx, services.create_or_update(id, &body))
        })
        .await
        .map_err(|e| common::api_diagnostic("recovering soft-deleted", id, e))?;
        wait_for_provisioning(ctx, provisioning_waiter(), || services.get(id))
            .await
            .map_err(|e| common::poll_diagnostic("recovery of", id, e))?;
        Ok(true)
    }

    /// New services come with an echo API and starter/unlimited products.
    async fn remove_sample_content(
        &self,
        ctx: &Context,
        data: &ApiManagementProviderData,
        id: &ServiceId,
    ) -> Result<(), Diagnostic> {
        let apis = data.client.apis();
        let sample_apis = common::within(ctx, apis.list(id))
            .await
            .map_err(|e| common::api_diagnostic("listing APIs after creation of", id, e))?;
        try_join_all(sample_apis.into_iter().filter_map(|api| api.name).map(|name| {
            let api_id = ApiId::from_service(id, name);
            let apis = &apis;
            async move {
                tracing::debug!("Removing sample {}", api_id);
                common::delete_outcome(&api_id, common::within(ctx, apis.delete(&api_id, true)).await)
            }
        }))
        .await?;

        let products = data.client.products();
        let sample_products = common::within(ctx, products.list(id))
            .await
            .map_err(|e| common::api_diagnostic("listing products after creation of", id, e))?;
        try_join_all(sample_products.into_iter().filter_map(|p| p.name).map(|name| {
            let product_id = ProductId::from_service(id, name);
            let products = &products;
            async move {
                tracing::debug!("Removing sample {}", product_id);
                common::delete_outcome(
                    &product_id,
                    common::within(ctx, products.delete(&product_id, true)).await,
                )
            }
        }))
        .await?;
        Ok(())
    }

    async fn apply_portal_settings(
        &self,
        ctx: &Context,
        data: &ApiManagementProviderData,
        id: &ServiceId,
        model: &ServiceModel,
        changed: &(dyn Fn(&str) -> bool + Sync),
    ) -> Result<(), Diagnostic> {
        let portal = data.client.portal_settings();

        if changed("sign_in") {
            let body = ArmResource::with_properties(SignInProperties {
                enabled: Some(model.sign_in.unwrap_or(false)),
            });
            common::within(ctx, portal.put_sign_in(id, &body))
                .await
                .map_err(|e| common::api_diagnostic("setting Sign In settings for", id, e))?;
        }

        if changed("sign_up") {
            let body = expand_sign_up(model.sign_up.as_ref());
            common::within(ctx, portal.put_sign_up(id, &body))
                .await
                .map_err(|e| common::api_diagnostic("setting Sign Up settings for", id, e))?;
        }

        if changed("delegation") {
            if let Some(delegation) = &model.delegation {
                common::within(ctx, portal.put_delegation(id, &expand_delegation(delegation)))
                    .await
                    .map_err(|e| common::api_diagnostic("setting Delegation settings for", id, e))?;
            }
        }

        if changed("tenant_access") {
            let enabled = model.tenant_access.as_ref().is_some_and(|t| t.enabled);
            common::within(ctx, portal.update_tenant_access(id, enabled))
                .await
                .map_err(|e| common::api_diagnostic("updating tenant access settings for", id, e))?;
        }
        Ok(())
    }

    async fn create_service(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, SERVICE_TIMEOUTS, planned, Operation::Create)?;
        ensure_valid(planned)?;
        let model = ServiceModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let services = data.client.services();

        common::check_not_exists(
            self.type_name(),
            &id,
            common::within(&ctx, services.get(&id)).await,
        )?;

        if self.recover_soft_deleted(&ctx, data, &id, &model).await? {
            tracing::info!("{} recovered, applying configuration", id);
        }

        let body = model.expand()?;
        common::within(&ctx, services.create_or_update(&id, &body))
            .await
            .map_err(|e| common::api_diagnostic("creating/updating", &id, e))?;
        wait_for_provisioning(&ctx, provisioning_waiter(), || services.get(&id))
            .await
            .map_err(|e| common::poll_diagnostic("creation of", &id, e))?;

        self.remove_sample_content(&ctx, data, &id).await?;

        if !model.is_consumption() {
            let config = ObjectReader::new(planned);
            let changed =
                |name: &str| matches!(name, "sign_in" | "sign_up") || config.is_set(name);
            self.apply_portal_settings(&ctx, data, &id, &model, &changed)
                .await?;
        }

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after create"))
    }

    async fn update_service(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, SERVICE_TIMEOUTS, planned, Operation::Update)?;
        ensure_valid(planned)?;
        let id = common::state_id(prior, ServiceId::parse)?;
        let model = ServiceModel::from_config(planned)?;
        let changed = |name: &str| {
            let path = AttributePath::new(name);
            planned.get(&path) != prior.get(&path)
        };
        let services = data.client.services();

        let update = model.expand_update(changed)?;
        if !update.is_empty() {
            common::within(&ctx, services.update(&id, &update))
                .await
                .map_err(|e| common::api_diagnostic("updating", &id, e))?;
            let waiter = if changed("hostname_configuration") {
                custom_domain_waiter()
            } else {
                provisioning_waiter()
            };
            wait_for_provisioning(&ctx, waiter, || services.get(&id))
                .await
                .map_err(|e| common::poll_diagnostic("update of", &id, e))?;
        }

        if !model.is_consumption() {
            self.apply_portal_settings(&ctx, data, &id, &model, &changed)
                .await?;
        }

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after update"))
    }

    async fn delete_service(&self, ctx: &Context, prior: &DynamicValue) -> Result<(), Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, SERVICE_TIMEOUTS, prior, Operation::Delete)?;
        let id = common::state_id(prior, ServiceId::parse)?;
        let services = data.client.services();

        let service = match common::read_outcome(&id, common::within(&ctx, services.get(&id)).await)? {
            Some(service) => service,
            None => return Ok(()),
        };

        tracing::info!("Deleting {}", id);
        common::delete_outcome(&id, common::within(&ctx, services.delete(&id)).await)?;
        wait_for_deletion(&ctx, deletion_waiter(), || services.get(&id))
            .await
            .map_err(|e| common::poll_diagnostic("deletion of", &id, e))?;

        if !data.features.purge_soft_delete_on_destroy {
            return Ok(());
        }

        let location = normalize_location(service.location.as_deref().unwrap_or_default());
        let deleted_id = DeletedServiceId::new(&id.subscription_id, location, &id.service_name);
        let deleted = data.client.deleted_services();
        let found = common::read_outcome(&deleted_id, common::within(&ctx, deleted.get(&deleted_id)).await)?;
        if found.is_none() {
            return Ok(());
        }

        tracing::info!("Purging soft-deleted {}", deleted_id);
        match common::within(&ctx, deleted.purge(&deleted_id)).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(common::api_diagnostic("purging", &deleted_id, err)),
        }
        wait_for_deletion(&ctx, deletion_waiter(), || deleted.get(&deleted_id))
            .await
            .map_err(|e| common::poll_diagnostic("purge of", &deleted_id, e))
    }
}

#[async_trait]
impl Resource for ServiceResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management"
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
        let hostname_configuration = HostnameKind::ALL
            .into_iter()
            .fold(
                NestedBlockBuilder::list("hostname_configuration").max_items(1),
                |b, kind| b.block(hostname_block(kind)),
            )
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an API Management Service")
            .attribute(common::id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the API Management Service")
                    .required()
                    .validator(common::service_name_validator())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::resource_group_name_attribute())
            .attribute(common::force_new_string("location", "The Azure region of the service"))
            .attribute(
                AttributeBuilder::new("publisher_name", AttributeType::String)
                    .required()
                    .validator(StringLength::between(1, 100))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("publisher_email", AttributeType::String)
                    .required()
                    .validator(StringMatches::create(
                        r"^[\w!#$%&'*+/=?^`{|}~.-]+@[\w.-]+$",
                        "must be an email address",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sku_name", AttributeType::String)
                    .description("`<tier>_<capacity>`, e.g. `Developer_1`")
                    .required()
                    .validator(StringMatches::create(
                        SKU_NAME_PATTERN,
                        "must be `Consumption_0` or a tier followed by a positive capacity",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("virtual_network_type", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string(VIRTUAL_NETWORK_TYPE_NONE))
                    .validator(StringOneOf::create(&VIRTUAL_NETWORK_TYPES))
                    .build(),
            )
            .attribute(optional_bool("client_certificate_enabled"))
            .attribute(optional_bool("gateway_disabled"))
            .attribute(
                AttributeBuilder::new("min_api_version", AttributeType::String)
                    .optional()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("notification_sender_email", AttributeType::String)
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zones", AttributeType::set_of(AttributeType::String))
                    .optional()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_ip_address_id", AttributeType::String)
                    .optional()
                    .validator(IsResourceId::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("public_network_access_enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(common::computed("gateway_url", AttributeType::String, "URL of the gateway"))
            .attribute(common::computed("gateway_regional_url", AttributeType::String, "Regional URL of the gateway"))
            .attribute(common::computed("management_api_url", AttributeType::String, "URL of the management API"))
            .attribute(common::computed("portal_url", AttributeType::String, "URL of the publisher portal"))
            .attribute(common::computed("developer_portal_url", AttributeType::String, "URL of the developer portal"))
            .attribute(common::computed("scm_url", AttributeType::String, "URL of the SCM endpoint"))
            .attribute(ip_list("public_ip_addresses"))
            .attribute(ip_list("private_ip_addresses"))
            .block(
                NestedBlockBuilder::list("identity")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("type", AttributeType::String)
                            .required()
                            .validator(StringOneOf::create(&IDENTITY_TYPES))
                            .build(),
                    )
                    .attribute(string_set("identity_ids", "User assigned identity IDs"))
                    .attribute(common::computed("principal_id", AttributeType::String, "Principal of the system assigned identity"))
                    .attribute(common::computed("tenant_id", AttributeType::String, "Tenant of the system assigned identity"))
                    .build(),
            )
            .block(subnet_block())
            .block(additional_location_block())
            .block(
                NestedBlockBuilder::list("certificate")
                    .max_items(10)
                    .attribute(
                        AttributeBuilder::new("encoded_certificate", AttributeType::String)
                            .required()
                            .sensitive()
                            .validator(StringNotEmpty::create())
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("certificate_password", AttributeType::String)
                            .optional()
                            .sensitive()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("store_name", AttributeType::String)
                            .required()
                            .validator(StringOneOf::create(&CERTIFICATE_STORE_NAMES))
                            .build(),
                    )
                    .attribute(common::computed("expiry", AttributeType::String, "Certificate expiry"))
                    .attribute(common::computed("subject", AttributeType::String, "Certificate subject"))
                    .attribute(common::computed("thumbprint", AttributeType::String, "Certificate thumbprint"))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("protocols")
                    .max_items(1)
                    .attribute(optional_bool("http2_enabled"))
                    .build(),
            )
            .block(security_block())
            .block(hostname_configuration)
            .block(
                NestedBlockBuilder::list("sign_in")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("enabled", AttributeType::Bool)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .block(sign_up_block())
            .block(delegation_block())
            .block(
                NestedBlockBuilder::list("tenant_access")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("enabled", AttributeType::Bool)
                            .required()
                            .build(),
                    )
                    .attribute(common::computed("tenant_id", AttributeType::String, "Tenant access identifier"))
                    .attribute(
                        AttributeBuilder::new("primary_key", AttributeType::String)
                            .computed()
                            .sensitive()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("secondary_key", AttributeType::String)
                            .computed()
                            .sensitive()
                            .build(),
                    )
                    .build(),
            )
            .block(timeouts_block())
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_config(&request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_service(&ctx, &request.planned_state).await {
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
                SERVICE_TIMEOUTS,
                &request.current_state,
                Operation::Read,
            )?;
            let id = common::state_id(&request.current_state, ServiceId::parse)?;
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
        match self
            .update_service(&ctx, &request.prior_state, &request.planned_state)
            .await
        {
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
        let result = self.delete_service(&ctx, &request.prior_state).await;
        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ServiceResource {
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
impl ResourceWithImportState for ServiceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, ServiceId::parse);
        response
    }
}
