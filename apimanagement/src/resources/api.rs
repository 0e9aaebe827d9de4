//! `azurerm_api_management_api`
//!
//! An API revision. The ARM name is `{name};rev={revision}`. Definitions
//! supplied through `import` are submitted in a separate PUT before the
//! regular properties, since the service rejects both in one request.

use super::common;
use crate::api::apis::{
    soap_api_type, ApiContact, ApiContract, ApiLicense, ApiProperties, AuthenticationSettings,
    OAuth2AuthenticationSettings, OpenIdAuthenticationSettings, SubscriptionKeyParameterNames,
    WsdlSelector,
};
use crate::api::ids::{api_id_with_revision, ApiId};
use crate::api::poll::{provisioning_waiter, wait_for_provisioning, StateWaiter};
use crate::api::retry::{is_precondition_failed, retry_if};
use crate::api::common::ArmResource;
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use crate::ApiManagementProviderData;
use async_trait::async_trait;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::object::{ObjectBuilder, ObjectReader};
use tfplug::plan_modifier::RequiresReplace;
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
use tfplug::validator::{is_email, IsResourceId, IsUrl, StringMatches, StringNotEmpty, StringOneOf};
use tfplug::Operation;

pub const API_TYPES: [&str; 4] = ["graphql", "http", "soap", "websocket"];
pub const DEFAULT_API_TYPE: &str = "http";
pub const PROTOCOLS: [&str; 4] = ["http", "https", "ws", "wss"];
pub const BEARER_TOKEN_SENDING_METHODS: [&str; 2] = ["authorizationHeader", "query"];
pub const CONTENT_FORMATS: [&str; 10] = [
    "openapi",
    "openapi+json",
    "openapi+json-link",
    "openapi-link",
    "swagger-json",
    "swagger-link-json",
    "wadl-link-json",
    "wadl-xml",
    "wsdl",
    "wsdl-link",
];

const IMPORT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportModel {
    pub content_value: String,
    pub content_format: String,
    /// `(service_name, endpoint_name)`
    pub wsdl_selector: Option<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiModel {
    pub name: String,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub revision: String,
    pub revision_description: Option<String>,
    pub display_name: Option<String>,
    pub path: Option<String>,
    pub protocols: Vec<String>,
    pub api_type: Option<String>,
    pub contact: Option<ApiContact>,
    pub description: Option<String>,
    pub import: Option<ImportModel>,
    pub license: Option<ApiLicense>,
    pub service_url: Option<String>,
    pub subscription_key_parameter_names: Option<SubscriptionKeyParameterNames>,
    pub subscription_required: bool,
    pub terms_of_service_url: Option<String>,
    pub source_api_id: Option<String>,
    pub oauth2_authorization: Option<OAuth2AuthenticationSettings>,
    pub openid_authentication: Option<OpenIdAuthenticationSettings>,
    pub is_current: bool,
    pub is_online: bool,
    pub version: Option<String>,
    pub version_description: Option<String>,
    pub version_set_id: Option<String>,
}

impl ApiModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);

        let import = match r.block("import")? {
            Some(i) => Some(ImportModel {
                content_value: i.required_string("content_value")?,
                content_format: i.required_string("content_format")?,
                wsdl_selector: match i.block("wsdl_selector")? {
                    Some(w) => Some((
                        w.required_string("service_name")?,
                        w.required_string("endpoint_name")?,
                    )),
                    None => None,
                },
            }),
            None => None,
        };

        let contact = match r.block("contact")? {
            Some(c) => Some(ApiContact {
                email: c.non_empty_string("email")?,
                name: c.non_empty_string("name")?,
                url: c.non_empty_string("url")?,
            }),
            None => None,
        };

        let license = match r.block("license")? {
            Some(l) => Some(ApiLicense {
                name: l.non_empty_string("name")?,
                url: l.non_empty_string("url")?,
            }),
            None => None,
        };

        let subscription_key_parameter_names = match r.block("subscription_key_parameter_names")? {
            Some(k) => Some(SubscriptionKeyParameterNames {
                header: k.non_empty_string("header")?,
                query: k.non_empty_string("query")?,
            }),
            None => None,
        };

        let oauth2_authorization = match r.block("oauth2_authorization")? {
            Some(o) => Some(OAuth2AuthenticationSettings {
                authorization_server_id: Some(o.required_string("authorization_server_name")?),
                scope: o.non_empty_string("scope")?,
            }),
            None => None,
        };

        let openid_authentication = match r.block("openid_authentication")? {
            Some(o) => {
                let methods = o.string_list("bearer_token_sending_methods")?;
                Some(OpenIdAuthenticationSettings {
                    openid_provider_id: Some(o.required_string("openid_provider_name")?),
                    bearer_token_sending_methods: (!methods.is_empty()).then_some(methods),
                })
            }
            None => None,
        };

        Ok(Self {
            name: r.required_string("name")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            revision: r.required_string("revision")?,
            revision_description: r.non_empty_string("revision_description")?,
            display_name: r.non_empty_string("display_name")?,
            path: r.string("path")?,
            protocols: r.string_list("protocols")?,
            api_type: r.non_empty_string("api_type")?,
            contact,
            description: r.string("description")?,
            import,
            license,
            service_url: r.non_empty_string("service_url")?,
            subscription_key_parameter_names,
            subscription_required: r.bool_or("subscription_required", true)?,
            terms_of_service_url: r.non_empty_string("terms_of_service_url")?,
            source_api_id: r.non_empty_string("source_api_id")?,
            oauth2_authorization,
            openid_authentication,
            is_current: false,
            is_online: false,
            version: r.non_empty_string("version")?,
            version_description: r.non_empty_string("version_description")?,
            version_set_id: r.non_empty_string("version_set_id")?,
        })
    }

    pub fn id(&self, subscription_id: &str) -> ApiId {
        ApiId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            &api_id_with_revision(&self.name, &self.revision),
        )
    }

    pub fn api_type(&self) -> &str {
        self.api_type.as_deref().unwrap_or(DEFAULT_API_TYPE)
    }

    fn authentication_settings(&self) -> AuthenticationSettings {
        AuthenticationSettings {
            oauth2: self.oauth2_authorization.clone(),
            openid: self.openid_authentication.clone(),
        }
    }

    /// Body of the definition import, or `None` without an `import` block.
    pub fn expand_import(&self) -> Option<ApiContract> {
        let import = self.import.as_ref()?;
        Some(ArmResource::with_properties(ApiProperties {
            api_type: Some(self.api_type().to_string()),
            soap_api_type: Some(soap_api_type(self.api_type()).to_string()),
            format: Some(import.content_format.clone()),
            value: Some(import.content_value.clone()),
            path: Some(self.path.clone().unwrap_or_default()),
            wsdl_selector: import
                .wsdl_selector
                .as_ref()
                .map(|(service, endpoint)| WsdlSelector {
                    wsdl_service_name: service.clone(),
                    wsdl_endpoint_name: endpoint.clone(),
                }),
            service_url: self.service_url.clone(),
            api_version: self.version.clone(),
            api_version_set_id: self.version_set_id.clone(),
            ..Default::default()
        }))
    }

    pub fn expand(&self) -> ApiContract {
        ArmResource::with_properties(ApiProperties {
            api_type: Some(self.api_type().to_string()),
            soap_api_type: Some(soap_api_type(self.api_type()).to_string()),
            path: Some(self.path.clone().unwrap_or_default()),
            protocols: (!self.protocols.is_empty()).then(|| self.protocols.clone()),
            service_url: Some(self.service_url.clone().unwrap_or_default()),
            subscription_key_parameter_names: self.subscription_key_parameter_names.clone(),
            subscription_required: Some(self.subscription_required),
            authentication_settings: Some(self.authentication_settings()),
            api_revision_description: Some(self.revision_description.clone().unwrap_or_default()),
            api_version_description: Some(self.version_description.clone().unwrap_or_default()),
            contact: self.contact.clone(),
            license: self.license.clone(),
            source_api_id: self.source_api_id.clone(),
            description: self.description.clone().filter(|d| !d.is_empty()),
            display_name: self.display_name.clone(),
            api_version: self.version.clone(),
            api_version_set_id: self.version_set_id.clone(),
            terms_of_service_url: self.terms_of_service_url.clone(),
            ..Default::default()
        })
    }

    /// The update body: the live properties with only the fields that
    /// changed between `prior` and the plan replaced.
    pub fn merge_update(
        &self,
        existing: &ApiProperties,
        changed: impl Fn(&str) -> bool,
    ) -> ApiProperties {
        let existing_type = existing.api_type.as_deref();
        let mut props = ApiProperties {
            path: existing.path.clone(),
            protocols: existing.protocols.clone(),
            service_url: existing.service_url.clone(),
            description: existing.description.clone(),
            api_version_description: existing.api_version_description.clone(),
            api_revision_description: existing.api_revision_description.clone(),
            subscription_required: existing.subscription_required,
            subscription_key_parameter_names: existing.subscription_key_parameter_names.clone(),
            contact: existing.contact.clone(),
            license: existing.license.clone(),
            source_api_id: existing.source_api_id.clone(),
            display_name: existing.display_name.clone(),
            api_version: existing.api_version.clone(),
            api_version_set_id: existing.api_version_set_id.clone(),
            terms_of_service_url: existing.terms_of_service_url.clone(),
            api_type: existing.api_type.clone(),
            soap_api_type: Some(
                soap_api_type(existing_type.unwrap_or(self.api_type())).to_string(),
            ),
            ..Default::default()
        };

        // The service rejects a body carrying both, or the list-valued
        // variants it returns alongside them.
        if let Some(auth) = &existing.authentication_settings {
            if auth.oauth2.is_some() || auth.openid.is_some() {
                props.authentication_settings = Some(AuthenticationSettings {
                    oauth2: auth.oauth2.clone(),
                    openid: auth.openid.clone(),
                });
            }
        }

        if changed("path") {
            props.path = Some(self.path.clone().unwrap_or_default());
        }
        if changed("protocols") {
            props.protocols = (!self.protocols.is_empty()).then(|| self.protocols.clone());
        }
        if changed("api_type") {
            props.api_type = Some(self.api_type().to_string());
            props.soap_api_type = Some(soap_api_type(self.api_type()).to_string());
        }
        if changed("service_url") {
            props.service_url = Some(self.service_url.clone().unwrap_or_default());
        }
        if changed("description") {
            props.description = Some(self.description.clone().unwrap_or_default());
        }
        if changed("revision_description") {
            props.api_revision_description = Some(self.revision_description.clone().unwrap_or_default());
        }
        if changed("version_description") {
            props.api_version_description = Some(self.version_description.clone().unwrap_or_default());
        }
        if changed("subscription_required") {
            props.subscription_required = Some(self.subscription_required);
        }
        if changed("subscription_key_parameter_names") {
            props.subscription_key_parameter_names = self.subscription_key_parameter_names.clone();
        }
        if changed("oauth2_authorization") {
            props.authentication_settings = Some(AuthenticationSettings {
                oauth2: self.oauth2_authorization.clone(),
                openid: None,
            });
        }
        if changed("openid_authentication") {
            props.authentication_settings = Some(AuthenticationSettings {
                oauth2: None,
                openid: self.openid_authentication.clone(),
            });
        }
        if changed("contact") {
            props.contact = self.contact.clone();
        }
        if changed("license") {
            props.license = self.license.clone();
        }
        if changed("source_api_id") {
            props.source_api_id = Some(self.source_api_id.clone().unwrap_or_default());
        }
        if changed("display_name") {
            props.display_name = Some(self.display_name.clone().unwrap_or_default());
        }
        if changed("version") {
            props.api_version = Some(self.version.clone().unwrap_or_default());
        }
        if changed("version_set_id") {
            props.api_version_set_id = Some(self.version_set_id.clone().unwrap_or_default());
        }
        if changed("terms_of_service_url") {
            props.terms_of_service_url = Some(self.terms_of_service_url.clone().unwrap_or_default());
        }
        props
    }

    /// `import` is not returned by the service and is kept from `source`.
    pub fn flatten(id: &ApiId, contract: &ApiContract, source: &DynamicValue) -> Result<Self, Diagnostic> {
        let mut model = Self {
            name: id.api_name().to_string(),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            revision: id.revision().unwrap_or_default().to_string(),
            import: ObjectReader::new(source)
                .is_set("import")
                .then(|| Self::from_config(source).ok().and_then(|m| m.import))
                .flatten(),
            ..Default::default()
        };

        let Some(props) = &contract.properties else {
            return Ok(model);
        };

        model.api_type = Some(
            props
                .api_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_API_TYPE.to_string()),
        );
        model.description = props.description.clone();
        model.display_name = props.display_name.clone();
        model.is_current = props.is_current.unwrap_or(false);
        model.is_online = props.is_online.unwrap_or(false);
        model.path = props.path.clone();
        model.service_url = props.service_url.clone();
        if let Some(revision) = props.api_revision.clone() {
            model.revision = revision;
        }
        model.subscription_required = props.subscription_required.unwrap_or(false);
        model.version = props.api_version.clone();
        model.version_set_id = props.api_version_set_id.clone();
        model.revision_description = props.api_revision_description.clone();
        model.version_description = props.api_version_description.clone();
        model.terms_of_service_url = props.terms_of_service_url.clone();
        model.protocols = props.protocols.clone().unwrap_or_default();
        model.subscription_key_parameter_names = props.subscription_key_parameter_names.clone();
        model.oauth2_authorization = props
            .authentication_settings
            .as_ref()
            .and_then(|a| a.oauth2.clone());
        model.openid_authentication = props
            .authentication_settings
            .as_ref()
            .and_then(|a| a.openid.clone());
        model.contact = props.contact.clone();
        model.license = props.license.clone();
        model.source_api_id = props.source_api_id.clone();
        Ok(model)
    }

    /// State attributes shared with the data source.
    pub fn state_builder(&self, id: &ApiId) -> ObjectBuilder {
        ObjectBuilder::new()
            .string("id", id.to_string())
            .string("name", &self.name)
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .string("revision", &self.revision)
            .opt_string("revision_description", self.revision_description.clone())
            .opt_string("display_name", self.display_name.clone())
            .opt_string("path", self.path.clone())
            .string_list("protocols", self.protocols.iter().cloned())
            .string("api_type", self.api_type())
            .opt_string("description", self.description.clone())
            .opt_string("service_url", self.service_url.clone())
            .bool("subscription_required", self.subscription_required)
            .opt_string("terms_of_service_url", self.terms_of_service_url.clone())
            .bool("is_current", self.is_current)
            .bool("is_online", self.is_online)
            .opt_string("version", self.version.clone())
            .opt_string("version_description", self.version_description.clone())
            .opt_string("version_set_id", self.version_set_id.clone())
            .block(
                "subscription_key_parameter_names",
                self.subscription_key_parameter_names.as_ref().map(|k| {
                    ObjectBuilder::new()
                        .opt_string("header", k.header.clone())
                        .opt_string("query", k.query.clone())
                }),
            )
    }

    pub fn to_state(&self, id: &ApiId, source: &DynamicValue) -> DynamicValue {
        let builder = self
            .state_builder(id)
            .opt_string("source_api_id", self.source_api_id.clone())
            .block(
                "contact",
                self.contact.as_ref().map(|c| {
                    ObjectBuilder::new()
                        .opt_string("email", c.email.clone())
                        .opt_string("name", c.name.clone())
                        .opt_string("url", c.url.clone())
                }),
            )
            .block(
                "license",
                self.license.as_ref().map(|l| {
                    ObjectBuilder::new()
                        .opt_string("name", l.name.clone())
                        .opt_string("url", l.url.clone())
                }),
            )
            .block(
                "oauth2_authorization",
                self.oauth2_authorization.as_ref().map(|o| {
                    ObjectBuilder::new()
                        .opt_string("authorization_server_name", o.authorization_server_id.clone())
                        .opt_string("scope", o.scope.clone())
                }),
            )
            .block(
                "openid_authentication",
                self.openid_authentication.as_ref().map(|o| {
                    ObjectBuilder::new()
                        .opt_string("openid_provider_name", o.openid_provider_id.clone())
                        .string_list(
                            "bearer_token_sending_methods",
                            o.bearer_token_sending_methods.iter().flatten().cloned(),
                        )
                }),
            )
            .block(
                "import",
                self.import.as_ref().map(|i| {
                    ObjectBuilder::new()
                        .string("content_value", &i.content_value)
                        .string("content_format", &i.content_format)
                        .block(
                            "wsdl_selector",
                            i.wsdl_selector.as_ref().map(|(service, endpoint)| {
                                ObjectBuilder::new()
                                    .string("service_name", service)
                                    .string("endpoint_name", endpoint)
                            }),
                        )
                }),
            );
        common::with_timeouts(builder, source).into_value()
    }
}

/// Config checks that span several attributes. Unknown values count as set.
pub fn validate_config(config: &DynamicValue) -> Vec<Diagnostic> {
    let r = ObjectReader::new(config);
    let present = |name: &str| r.is_set(name) || r.is_unknown(name);
    let mut diagnostics = vec![];

    if r.is_set("version") && !present("version_set_id") {
        diagnostics.push(
            Diagnostic::error(
                "Invalid configuration",
                "setting `version` without the required `version_set_id`",
            )
            .with_attribute(AttributePath::new("version_set_id")),
        );
    }

    if !present("source_api_id") && (!present("display_name") || !present("protocols")) {
        diagnostics.push(Diagnostic::error(
            "Invalid configuration",
            "`display_name`, `protocols` are required when `source_api_id` is not set",
        ));
    }

    if let Ok(protocols) = r.string_list("protocols") {
        diagnostics.extend(common::check_list_values(
            &protocols,
            &PROTOCOLS,
            AttributePath::new("protocols"),
        ));
    }
    if let Ok(Some(openid)) = r.block("openid_authentication") {
        if let Ok(methods) = openid.string_list("bearer_token_sending_methods") {
            diagnostics.extend(common::check_list_values(
                &methods,
                &BEARER_TOKEN_SENDING_METHODS,
                AttributePath::new("openid_authentication")
                    .index(0)
                    .attribute("bearer_token_sending_methods"),
            ));
        }
    }
    diagnostics
}

fn import_waiter() -> StateWaiter {
    provisioning_waiter().with_min_interval(IMPORT_POLL_INTERVAL)
}

fn optional_url(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .validator(IsUrl::http_or_https())
        .build()
}

fn optional_non_empty(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .validator(StringNotEmpty::create())
        .build()
}

fn child_name_reference(name: &str, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .validator(StringMatches::create(
            r"^[a-zA-Z0-9](?:[a-zA-Z0-9_.-]{0,78}[a-zA-Z0-9])?$",
            "must be the name of an API Management child entity",
        ))
        .build()
}

fn import_block() -> NestedBlock {
    NestedBlockBuilder::list("import")
        .max_items(1)
        .attribute(common::required_string("content_value", "The API definition or a URL to it"))
        .attribute(
            AttributeBuilder::new("content_format", AttributeType::String)
                .required()
                .validator(StringOneOf::create(&CONTENT_FORMATS))
                .build(),
        )
        .block(
            NestedBlockBuilder::list("wsdl_selector")
                .max_items(1)
                .attribute(common::required_string("service_name", "The WSDL service to import"))
                .attribute(common::required_string("endpoint_name", "The WSDL endpoint to import"))
                .build(),
        )
        .build()
}

#[derive(Default)]
pub struct ApiResource {
    provider_data: Option<ApiManagementProviderData>,
}

impl ApiResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &ApiId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.apis().get(id)).await;
        match common::read_outcome(id, result)? {
            Some(contract) => Ok(Some(ApiModel::flatten(id, &contract, source)?.to_state(id, source))),
            None => Ok(None),
        }
    }

    async fn import_definition(
        &self,
        ctx: &Context,
        data: &ApiManagementProviderData,
        id: &ApiId,
        model: &ApiModel,
    ) -> Result<(), Diagnostic> {
        let Some(body) = model.expand_import() else {
            return Ok(());
        };
        let apis = data.client.apis();
        tracing::info!("Importing definition for {}", id);
        common::within(ctx, apis.create_or_update(id, &body, None))
            .await
            .map_err(|e| common::api_diagnostic("creating with import of", id, e))?;
        wait_for_provisioning(ctx, import_waiter(), || apis.get(id))
            .await
            .map_err(|e| common::poll_diagnostic("import of", id, e))?;
        Ok(())
    }

    /// PUT with `If-Match: *`. A 412 while a previous revision settles is
    /// retried.
    async fn put_api(
        &self,
        ctx: &Context,
        data: &ApiManagementProviderData,
        id: &ApiId,
        body: &ApiContract,
    ) -> Result<(), Diagnostic> {
        let apis = data.client.apis();
        retry_if(ctx, data.retry_policy, is_precondition_failed, || {
            common::within(ctx, apis.create_or_update(id, body, Some("*")))
        })
        .await
        .map_err(|e| common::api_diagnostic("creating/updating", id, e))?;
        wait_for_provisioning(ctx, import_waiter(), || apis.get(id))
            .await
            .map_err(|e| common::poll_diagnostic("creating/updating", id, e))?;
        Ok(())
    }

    async fn create_api(&self, ctx: &Context, planned: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Create)?;
        let model = ApiModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());

        common::check_not_exists(
            self.type_name(),
            &id,
            common::within(&ctx, data.client.apis().get(&id)).await,
        )?;

        self.import_definition(&ctx, data, &id, &model).await?;
        self.put_api(&ctx, data, &id, &model.expand()).await?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after create"))
    }

    async fn update_api(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Update)?;
        let id = common::state_id(prior, ApiId::parse)?;
        let model = ApiModel::from_config(planned)?;
        let changed = |name: &str| {
            let path = AttributePath::new(name);
            planned.get(&path) != prior.get(&path)
        };

        if changed("import") {
            self.import_definition(&ctx, data, &id, &model).await?;
        }

        let existing = common::within(&ctx, data.client.apis().get(&id))
            .await
            .map_err(|e| common::api_diagnostic("retrieving", &id, e))?;
        let existing = existing
            .properties
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "`properties` was nil"))?;

        let body = ArmResource::with_properties(model.merge_update(&existing, changed));
        self.put_api(&ctx, data, &id, &body).await?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after update"))
    }
}

#[async_trait]
impl Resource for ApiResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_api"
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
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Manages an API within an API Management Service")
            .attribute(common::id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the API")
                    .required()
                    .validator(StringMatches::create(
                        r"^[^*#&+:<>?]+$",
                        "must not contain any of the characters *#&+:<>?",
                    ))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(common::force_new_string("revision", "The revision of the API"))
            .attribute(optional_non_empty("revision_description"))
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("path", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringMatches::create(
                        r"^(?:|[\w.][\w/.-]{0,398}[\w-])$",
                        "must be at most 400 characters, not start with `-` or `/` and not end with `/` or `.`",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocols", AttributeType::set_of(AttributeType::String))
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_type", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringOneOf::create(&API_TYPES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("service_url", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("subscription_required", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(optional_url("terms_of_service_url"))
            .attribute(
                AttributeBuilder::new("source_api_id", AttributeType::String)
                    .optional()
                    .validator(IsResourceId::create())
                    .build(),
            )
            .attribute(common::computed("is_current", AttributeType::Bool, "Whether this is the current revision"))
            .attribute(common::computed("is_online", AttributeType::Bool, "Whether this revision is online"))
            .attribute(
                AttributeBuilder::new("version", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(optional_non_empty("version_description"))
            .attribute(
                AttributeBuilder::new("version_set_id", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("contact")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("email", AttributeType::String)
                            .optional()
                            .validator(is_email())
                            .build(),
                    )
                    .attribute(optional_non_empty("name"))
                    .attribute(optional_url("url"))
                    .build(),
            )
            .block(import_block())
            .block(
                NestedBlockBuilder::list("license")
                    .max_items(1)
                    .attribute(optional_non_empty("name"))
                    .attribute(optional_url("url"))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("subscription_key_parameter_names")
                    .max_items(1)
                    .attribute(common::required_string("header", "Header carrying the subscription key"))
                    .attribute(common::required_string("query", "Query parameter carrying the subscription key"))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("oauth2_authorization")
                    .max_items(1)
                    .attribute(child_name_reference(
                        "authorization_server_name",
                        "The OAuth2 authorization server",
                    ))
                    .attribute(
                        AttributeBuilder::new("scope", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("openid_authentication")
                    .max_items(1)
                    .attribute(child_name_reference("openid_provider_name", "The OpenID Connect provider"))
                    .attribute(
                        AttributeBuilder::new(
                            "bearer_token_sending_methods",
                            AttributeType::set_of(AttributeType::String),
                        )
                        .optional()
                        .build(),
                    )
                    .build(),
            )
            .block(timeouts_block())
            .constraint(BlockConstraint::ConflictsWith(vec![
                "oauth2_authorization".to_string(),
                "openid_authentication".to_string(),
            ]))
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
        match self.create_api(&ctx, &request.planned_state).await {
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
            let id = common::state_id(&request.current_state, ApiId::parse)?;
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
            .update_api(&ctx, &request.prior_state, &request.planned_state)
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
        let result = async {
            let data = common::provider_data(&self.provider_data)?;
            let ctx = common::operation_context(
                &ctx,
                CHILD_RESOURCE_TIMEOUTS,
                &request.prior_state,
                Operation::Delete,
            )?;
            let id = common::state_id(&request.prior_state, ApiId::parse)?;
            let result = common::within(&ctx, data.client.apis().delete(&id, true)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiResource {
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
impl ResourceWithImportState for ApiResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, ApiId::parse);
        response
    }
}
