//! `azurerm_api_management_identity_provider_{aad,facebook,google,microsoft,twitter}`
//!
//! One handler serves all five types. Each service has at most one provider
//! of each type, so the last ID segment is the type itself. Social providers
//! keep their native names for the client ID and secret.

use super::common;
use crate::api::common::ArmResource;
use crate::api::identity_providers::{IdentityProviderContract, IdentityProviderProperties};
use crate::api::ids::IdentityProviderId;
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import_state_with;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{ListLength, StringNotEmpty, StringOneOf};
use tfplug::Operation;

pub const CLIENT_LIBRARIES: [&str; 2] = ["ADAL", "MSAL-2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProviderKind {
    Aad,
    Facebook,
    Google,
    Microsoft,
    Twitter,
}

impl IdentityProviderKind {
    pub const ALL: [IdentityProviderKind; 5] = [
        Self::Aad,
        Self::Facebook,
        Self::Google,
        Self::Microsoft,
        Self::Twitter,
    ];

    /// The `type` property and the last segment of the ARM ID.
    pub fn provider_type(self) -> &'static str {
        match self {
            Self::Aad => "aad",
            Self::Facebook => "facebook",
            Self::Google => "google",
            Self::Microsoft => "microsoft",
            Self::Twitter => "twitter",
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Aad => "azurerm_api_management_identity_provider_aad",
            Self::Facebook => "azurerm_api_management_identity_provider_facebook",
            Self::Google => "azurerm_api_management_identity_provider_google",
            Self::Microsoft => "azurerm_api_management_identity_provider_microsoft",
            Self::Twitter => "azurerm_api_management_identity_provider_twitter",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Aad => "Azure Active Directory",
            Self::Facebook => "Facebook",
            Self::Google => "Google",
            Self::Microsoft => "Microsoft",
            Self::Twitter => "Twitter",
        }
    }

    /// Attribute names holding `clientId` and `clientSecret`.
    pub fn credential_fields(self) -> (&'static str, &'static str) {
        match self {
            Self::Facebook => ("app_id", "app_secret"),
            Self::Twitter => ("api_key", "api_secret_key"),
            Self::Aad | Self::Google | Self::Microsoft => ("client_id", "client_secret"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AadSettings {
    pub allowed_tenants: Vec<String>,
    pub signin_tenant: Option<String>,
    pub client_library: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderModel {
    pub kind: IdentityProviderKind,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub aad: Option<AadSettings>,
}

impl IdentityProviderModel {
    pub fn from_config(kind: IdentityProviderKind, value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        let (id_field, secret_field) = kind.credential_fields();
        let aad = match kind {
            IdentityProviderKind::Aad => Some(AadSettings {
                allowed_tenants: r.string_list("allowed_tenants")?,
                signin_tenant: r.non_empty_string("signin_tenant")?,
                client_library: r.non_empty_string("client_library")?,
            }),
            _ => None,
        };
        Ok(Self {
            kind,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            client_id: r.required_string(id_field)?,
            client_secret: r.non_empty_string(secret_field)?,
            aad,
        })
    }

    pub fn id(&self, subscription_id: &str) -> IdentityProviderId {
        IdentityProviderId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            self.kind.provider_type(),
        )
    }

    pub fn expand(&self) -> IdentityProviderContract {
        let aad = self.aad.clone().unwrap_or_default();
        ArmResource::with_properties(IdentityProviderProperties {
            provider_type: Some(self.kind.provider_type().to_string()),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            allowed_tenants: self.aad.as_ref().map(|_| aad.allowed_tenants.clone()),
            signin_tenant: aad.signin_tenant,
            client_library: aad.client_library,
        })
    }

    /// The secret is kept from `prior`; GET never returns it.
    pub fn flatten(
        kind: IdentityProviderKind,
        id: &IdentityProviderId,
        contract: &IdentityProviderContract,
        prior: &DynamicValue,
    ) -> Result<Self, Diagnostic> {
        let props = contract.properties.clone().unwrap_or_default();
        let (_, secret_field) = kind.credential_fields();
        let aad = (kind == IdentityProviderKind::Aad).then(|| AadSettings {
            allowed_tenants: props.allowed_tenants.clone().unwrap_or_default(),
            signin_tenant: props.signin_tenant.clone().filter(|s| !s.is_empty()),
            client_library: props.client_library.clone().filter(|s| !s.is_empty()),
        });
        Ok(Self {
            kind,
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            client_id: props.client_id,
            client_secret: ObjectReader::new(prior).non_empty_string(secret_field)?,
            aad,
        })
    }

    pub fn to_state(&self, id: &IdentityProviderId, source: &DynamicValue) -> DynamicValue {
        let (id_field, secret_field) = self.kind.credential_fields();
        let mut builder = ObjectBuilder::new()
            .string("id", id.to_string())
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .string(id_field, &self.client_id)
            .opt_string(secret_field, self.client_secret.clone());
        if let Some(aad) = &self.aad {
            builder = builder
                .string_list("allowed_tenants", aad.allowed_tenants.iter().cloned())
                .opt_string("signin_tenant", aad.signin_tenant.clone())
                .opt_string("client_library", aad.client_library.clone());
        }
        common::with_timeouts(builder, source).into_value()
    }
}

pub struct IdentityProviderResource {
    kind: IdentityProviderKind,
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl IdentityProviderResource {
    pub fn new(kind: IdentityProviderKind) -> Self {
        Self {
            kind,
            provider_data: None,
        }
    }

    fn parse_id(&self, raw: &str) -> Result<IdentityProviderId, Diagnostic> {
        let id = IdentityProviderId::parse(raw).map_err(common::invalid_id)?;
        if id.identity_provider_name != self.kind.provider_type() {
            return Err(Diagnostic::error(
                "Invalid resource ID",
                format!(
                    "{} is not a {:?} identity provider ID",
                    raw,
                    self.kind.provider_type()
                ),
            ));
        }
        Ok(id)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &IdentityProviderId,
        prior: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.identity_providers().get(id)).await;
        let Some(contract) = common::read_outcome(id, result)? else {
            return Ok(None);
        };
        let model = IdentityProviderModel::flatten(self.kind, id, &contract, prior)?;
        Ok(Some(model.to_state(id, prior)))
    }

    async fn apply(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
        operation: Operation,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, operation)?;
        let model = IdentityProviderModel::from_config(self.kind, planned)?;
        let id = model.id(data.client.subscription_id());
        let providers = data.client.identity_providers();

        if operation == Operation::Create {
            common::check_not_exists(
                self.type_name(),
                &id,
                common::within(&ctx, providers.get(&id)).await,
            )?;
        }

        let verb = if operation == Operation::Create { "creating" } else { "updating" };
        common::within(&ctx, providers.create_or_update(&id, &model.expand()))
            .await
            .map_err(|e| common::api_diagnostic(verb, &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after write"))
    }
}

#[async_trait]
impl Resource for IdentityProviderResource {
    fn type_name(&self) -> &str {
        self.kind.type_name()
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
        let (id_field, secret_field) = self.kind.credential_fields();
        let description = format!(
            "Manages an API Management {} Identity Provider",
            self.kind.display_name()
        );
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description(&description)
            .attribute(common::id_attribute())
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(
                AttributeBuilder::new(id_field, AttributeType::String)
                    .required()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(secret_field, AttributeType::String)
                    .required()
                    .sensitive()
                    .validator(StringNotEmpty::create())
                    .build(),
            );

        if self.kind == IdentityProviderKind::Aad {
            builder = builder
                .attribute(
                    AttributeBuilder::new("allowed_tenants", AttributeType::list_of(AttributeType::String))
                        .description("Tenants allowed to sign in")
                        .required()
                        .validator(ListLength::at_least(1))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("signin_tenant", AttributeType::String)
                        .optional()
                        .validator(StringNotEmpty::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("client_library", AttributeType::String)
                        .optional()
                        .validator(StringOneOf::create(&CLIENT_LIBRARIES))
                        .build(),
                );
        }

        ResourceSchemaResponse {
            schema: builder.block(timeouts_block()).build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
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
            let id = common::state_id(&request.current_state, IdentityProviderId::parse)?;
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
            let id = common::state_id(&request.prior_state, IdentityProviderId::parse)?;
            let result = common::within(&ctx, data.client.identity_providers().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for IdentityProviderResource {
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
impl ResourceWithImportState for IdentityProviderResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_with(&request, &mut response, |raw| {
            let id = self.parse_id(raw)?;
            Ok(ObjectBuilder::new().string("id", id.to_string()).into_value())
        });
        response
    }
}
