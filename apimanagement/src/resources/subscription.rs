//! `azurerm_api_management_subscription`
//!
//! A subscription is scoped to a product, a single API, or every API of the
//! service (`{service}/apis`). Keys are only available through
//! `listSecrets`.

use super::common;
use crate::api::common::ArmResource;
use crate::api::ids::{ServiceId, SubscriptionId};
use crate::api::subscriptions::{
    SubscriptionContract, SubscriptionKeys, SubscriptionProperties, SubscriptionUpdate,
    SubscriptionUpdateProperties,
};
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
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
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, BlockConstraint, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{IsResourceId, StringLength, StringNotEmpty, StringOneOf};
use tfplug::Operation;

pub const SUBSCRIPTION_STATES: [&str; 6] = [
    "active",
    "cancelled",
    "expired",
    "rejected",
    "submitted",
    "suspended",
];
pub const DEFAULT_STATE: &str = "submitted";

/// What a subscription's `scope` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionScope {
    Product(String),
    Api(String),
    AllApis,
}

impl SubscriptionScope {
    pub fn to_arm(&self, service: &ServiceId) -> String {
        match self {
            Self::Product(id) | Self::Api(id) => id.clone(),
            Self::AllApis => format!("{}/apis", service),
        }
    }

    pub fn from_arm(scope: &str) -> Self {
        let lower = scope.to_ascii_lowercase();
        if lower.contains("/products/") {
            Self::Product(scope.to_string())
        } else if lower.trim_end_matches('/').ends_with("/apis") {
            Self::AllApis
        } else if lower.contains("/apis/") {
            Self::Api(scope.to_string())
        } else {
            Self::AllApis
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionModel {
    /// `None` until generated on create.
    pub subscription_id: Option<String>,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub display_name: String,
    pub user_id: Option<String>,
    pub scope: SubscriptionScope,
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
    pub state: String,
    pub allow_tracing: bool,
}

impl SubscriptionModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        let scope = match (r.non_empty_string("product_id")?, r.non_empty_string("api_id")?) {
            (Some(product), _) => SubscriptionScope::Product(product),
            (None, Some(api)) => SubscriptionScope::Api(api),
            (None, None) => SubscriptionScope::AllApis,
        };
        Ok(Self {
            subscription_id: r.non_empty_string("subscription_id")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            display_name: r.required_string("display_name")?,
            user_id: r.non_empty_string("user_id")?,
            scope,
            primary_key: r.non_empty_string("primary_key")?,
            secondary_key: r.non_empty_string("secondary_key")?,
            state: r.string_or("state", DEFAULT_STATE)?,
            allow_tracing: r.bool_or("allow_tracing", true)?,
        })
    }

    pub fn service_id(&self, subscription_id: &str) -> ServiceId {
        ServiceId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
        )
    }

    /// The ID for this subscription, generating a UUID when none was given.
    pub fn id(&mut self, azure_subscription_id: &str) -> SubscriptionId {
        let name = self
            .subscription_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        SubscriptionId::from_service(&self.service_id(azure_subscription_id), name)
    }

    pub fn expand(&self, service: &ServiceId) -> SubscriptionContract {
        ArmResource::with_properties(SubscriptionProperties {
            scope: self.scope.to_arm(service),
            display_name: Some(self.display_name.clone()),
            owner_id: self.user_id.clone(),
            state: Some(self.state.clone()),
            allow_tracing: Some(self.allow_tracing),
            primary_key: self.primary_key.clone(),
            secondary_key: self.secondary_key.clone(),
        })
    }

    pub fn expand_update(&self) -> SubscriptionUpdate {
        SubscriptionUpdate {
            properties: SubscriptionUpdateProperties {
                display_name: Some(self.display_name.clone()),
                state: Some(self.state.clone()),
                allow_tracing: Some(self.allow_tracing),
                primary_key: self.primary_key.clone(),
                secondary_key: self.secondary_key.clone(),
            },
        }
    }

    pub fn flatten(id: &SubscriptionId, contract: &SubscriptionContract, keys: &SubscriptionKeys) -> Self {
        let props = contract.properties.clone().unwrap_or_default();
        Self {
            subscription_id: Some(id.subscription_name.clone()),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            display_name: props.display_name.unwrap_or_default(),
            user_id: props.owner_id.filter(|o| !o.is_empty()),
            scope: SubscriptionScope::from_arm(&props.scope),
            primary_key: keys.primary_key.clone(),
            secondary_key: keys.secondary_key.clone(),
            state: props.state.unwrap_or_else(|| DEFAULT_STATE.to_string()),
            allow_tracing: props.allow_tracing.unwrap_or(true),
        }
    }

    /// Attributes shared with the subscription data source.
    pub fn state_builder(&self) -> ObjectBuilder {
        let (product_id, api_id) = match &self.scope {
            SubscriptionScope::Product(id) => (Some(id.clone()), None),
            SubscriptionScope::Api(id) => (None, Some(id.clone())),
            SubscriptionScope::AllApis => (None, None),
        };
        ObjectBuilder::new()
            .opt_string("subscription_id", self.subscription_id.clone())
            .string("display_name", &self.display_name)
            .opt_string("user_id", self.user_id.clone())
            .opt_string("product_id", product_id)
            .opt_string("api_id", api_id)
            .opt_string("primary_key", self.primary_key.clone())
            .opt_string("secondary_key", self.secondary_key.clone())
            .string("state", &self.state)
            .bool("allow_tracing", self.allow_tracing)
    }

    pub fn to_state(&self, id: &SubscriptionId, source: &DynamicValue) -> DynamicValue {
        let builder = self
            .state_builder()
            .string("id", id.to_string())
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name);
        common::with_timeouts(builder, source).into_value()
    }
}

fn force_new_optional(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .validator(IsResourceId::create())
        .plan_modifier(RequiresReplace::create())
        .build()
}

fn key_attribute(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .computed()
        .sensitive()
        .validator(StringLength::at_least(8))
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

#[derive(Default)]
pub struct SubscriptionResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl SubscriptionResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &SubscriptionId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let subscriptions = data.client.subscriptions();
        let result = common::within(ctx, subscriptions.get(id)).await;
        let Some(contract) = common::read_outcome(id, result)? else {
            return Ok(None);
        };
        let keys = common::within(ctx, subscriptions.list_secrets(id))
            .await
            .map_err(|e| common::api_diagnostic("listing secrets for", id, e))?;
        Ok(Some(SubscriptionModel::flatten(id, &contract, &keys).to_state(id, source)))
    }

    async fn create_subscription(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Create)?;
        let mut model = SubscriptionModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let subscriptions = data.client.subscriptions();

        common::check_not_exists(
            self.type_name(),
            &id,
            common::within(&ctx, subscriptions.get(&id)).await,
        )?;

        tracing::debug!("Creating {} with scope {:?}", id, model.scope);
        common::within(&ctx, subscriptions.create_or_update(&id, &model.expand(&id.service_id())))
            .await
            .map_err(|e| common::api_diagnostic("creating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after create"))
    }

    async fn update_subscription(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Update)?;
        let id = common::state_id(planned, SubscriptionId::parse)?;
        let model = SubscriptionModel::from_config(planned)?;

        common::within(&ctx, data.client.subscriptions().update(&id, &model.expand_update()))
            .await
            .map_err(|e| common::api_diagnostic("updating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after update"))
    }
}

#[async_trait]
impl Resource for SubscriptionResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_subscription"
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
            .version(0)
            .description("Manages a Subscription within an API Management Service")
            .attribute(common::id_attribute())
            .attribute(
                AttributeBuilder::new("subscription_id", AttributeType::String)
                    .description("An identifier for this subscription, generated when omitted")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .required()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(force_new_optional("user_id", "The ID of the user owning this subscription"))
            .attribute(force_new_optional("product_id", "The ID of the product this subscription is scoped to"))
            .attribute(force_new_optional("api_id", "The ID of the API this subscription is scoped to"))
            .attribute(key_attribute("primary_key"))
            .attribute(key_attribute("secondary_key"))
            .attribute(
                AttributeBuilder::new("state", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string(DEFAULT_STATE))
                    .validator(StringOneOf::create(&SUBSCRIPTION_STATES))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("allow_tracing", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .constraint(BlockConstraint::ConflictsWith(vec![
                "product_id".to_string(),
                "api_id".to_string(),
            ]))
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
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_subscription(&ctx, &request.planned_state).await {
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
            let id = common::state_id(&request.current_state, SubscriptionId::parse)?;
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
        match self.update_subscription(&ctx, &request.planned_state).await {
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
            let id = common::state_id(&request.prior_state, SubscriptionId::parse)?;
            let result = common::within(&ctx, data.client.subscriptions().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for SubscriptionResource {
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
impl ResourceWithImportState for SubscriptionResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, SubscriptionId::parse);
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
    use tfplug::types::AttributePath;

    fn service() -> ServiceId {
        ServiceId::new(TEST_SUBSCRIPTION, "rg1", "apim1")
    }

    fn base() -> ObjectBuilder {
        ObjectBuilder::new()
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("display_name", "Partner")
            .string("state", "active")
            .bool("allow_tracing", false)
    }

    fn resource(url: &str) -> SubscriptionResource {
        SubscriptionResource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    #[test]
    fn empty_subscription_id_generates_uuid() {
        let mut model = SubscriptionModel::from_config(&base().into_value()).unwrap();
        let id = model.id(TEST_SUBSCRIPTION);
        let parsed = uuid::Uuid::parse_str(&id.subscription_name).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(model.subscription_id.as_deref(), Some(id.subscription_name.as_str()));
    }

    #[test]
    fn scope_round_trips() {
        let product = format!("{}/products/starter", service());
        let api = format!("{}/apis/echo", service());

        let model = SubscriptionModel::from_config(&base().string("product_id", product.as_str()).into_value()).unwrap();
        assert_eq!(model.expand(&service()).properties.unwrap().scope, product);
        assert_eq!(SubscriptionScope::from_arm(&product), SubscriptionScope::Product(product.clone()));

        assert_eq!(SubscriptionScope::from_arm(&api), SubscriptionScope::Api(api.clone()));

        let all = SubscriptionModel::from_config(&base().into_value()).unwrap();
        let scope = all.expand(&service()).properties.unwrap().scope;
        assert_eq!(scope, format!("{}/apis", service()));
        assert_eq!(SubscriptionScope::from_arm(&scope), SubscriptionScope::AllApis);
    }

    #[tokio::test]
    async fn create_reads_keys_from_list_secrets() {
        let mut server = Server::new_async().await;
        let path = format!("{}/subscriptions/partner", service());
        let _missing = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", path.as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"scope": format!("{}/apis", service()), "state": "active", "allowTracing": false}
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"properties":{{"scope":"{}/apis","displayName":"Partner","state":"active","allowTracing":false}}}}"#,
                service()
            ))
            .create_async()
            .await;
        let _secrets = server
            .mock("POST", format!("{}/listSecrets", path).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"primaryKey":"pk-123456","secondaryKey":"sk-123456"}"#)
            .create_async()
            .await;

        let planned = base().string("subscription_id", "partner").into_value();
        let state = resource(&server.url())
            .create_subscription(&Context::new(), &planned)
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(state.get_string(&AttributePath::new("primary_key")).unwrap(), "pk-123456");
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), path);
        assert!(state.get(&AttributePath::new("product_id")).unwrap().is_null());
    }
}
