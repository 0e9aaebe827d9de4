//! `azurerm_api_management_named_value`

use super::common;
use crate::api::common::ArmResource;
use crate::api::ids::NamedValueId;
use crate::api::named_values::{KeyVaultReference, NamedValueContract, NamedValueProperties};
use crate::api::poll::{provisioning_waiter, wait_for_provisioning};
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, BlockConstraint, NestedBlockBuilder, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{is_uuid, IsUrl, StringMatches, StringNotEmpty};
use tfplug::Operation;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyVaultValueModel {
    pub secret_id: String,
    pub identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedValueModel {
    pub name: String,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub display_name: String,
    pub value: Option<String>,
    pub value_from_key_vault: Option<KeyVaultValueModel>,
    pub secret: bool,
    pub tags: Vec<String>,
}

impl NamedValueModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        let value_from_key_vault = match r.block("value_from_key_vault")? {
            Some(block) => Some(KeyVaultValueModel {
                secret_id: block.required_string("secret_id")?,
                identity_client_id: block.non_empty_string("identity_client_id")?,
            }),
            None => None,
        };
        Ok(Self {
            name: r.required_string("name")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            display_name: r.required_string("display_name")?,
            value: r.string("value")?,
            value_from_key_vault,
            secret: r.bool_or("secret", false)?,
            tags: r.string_list("tags")?,
        })
    }

    pub fn id(&self, subscription_id: &str) -> NamedValueId {
        NamedValueId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            &self.name,
        )
    }

    pub fn expand(&self) -> NamedValueContract {
        ArmResource::with_properties(NamedValueProperties {
            display_name: self.display_name.clone(),
            value: self.value.clone(),
            secret: Some(self.secret),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            key_vault: self.value_from_key_vault.as_ref().map(|kv| KeyVaultReference {
                secret_identifier: Some(kv.secret_id.clone()),
                identity_client_id: kv.identity_client_id.clone(),
            }),
            provisioning_state: None,
        })
    }

    /// A secret value is never returned by GET; it is kept from `prior`.
    pub fn flatten(
        id: &NamedValueId,
        contract: &NamedValueContract,
        prior: &DynamicValue,
    ) -> Result<Self, Diagnostic> {
        let mut model = Self {
            name: id.named_value_id.clone(),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            ..Default::default()
        };
        let Some(props) = &contract.properties else {
            return Ok(model);
        };

        model.display_name = props.display_name.clone();
        model.secret = props.secret.unwrap_or(false);
        model.tags = props.tags.clone().unwrap_or_default();
        model.value_from_key_vault = props.key_vault.as_ref().and_then(|kv| {
            kv.secret_identifier.as_ref().map(|secret_id| KeyVaultValueModel {
                secret_id: secret_id.clone(),
                identity_client_id: kv.identity_client_id.clone().filter(|c| !c.is_empty()),
            })
        });
        if model.value_from_key_vault.is_none() {
            model.value = if model.secret {
                ObjectReader::new(prior).string("value")?
            } else {
                props.value.clone()
            };
        }
        Ok(model)
    }

    pub fn to_state(&self, id: &NamedValueId, source: &DynamicValue) -> DynamicValue {
        let builder = ObjectBuilder::new()
            .string("id", id.to_string())
            .string("name", &self.name)
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .string("display_name", &self.display_name)
            .opt_string("value", self.value.clone())
            .bool("secret", self.secret)
            .string_list("tags", self.tags.iter().cloned())
            .block(
                "value_from_key_vault",
                self.value_from_key_vault.as_ref().map(|kv| {
                    ObjectBuilder::new()
                        .string("secret_id", &kv.secret_id)
                        .opt_string("identity_client_id", kv.identity_client_id.clone())
                }),
            );
        common::with_timeouts(builder, source).into_value()
    }
}

#[derive(Default)]
pub struct NamedValueResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl NamedValueResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &NamedValueId,
        prior: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.named_values().get(id)).await;
        let Some(contract) = common::read_outcome(id, result)? else {
            return Ok(None);
        };
        Ok(Some(NamedValueModel::flatten(id, &contract, prior)?.to_state(id, prior)))
    }

    /// Create and update share the PUT-then-poll sequence.
    async fn apply(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
        operation: Operation,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, operation)?;
        let model = NamedValueModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let named_values = data.client.named_values();

        if operation == Operation::Create {
            common::check_not_exists(
                self.type_name(),
                &id,
                common::within(&ctx, named_values.get(&id)).await,
            )?;
        }

        let verb = if operation == Operation::Create { "creating" } else { "updating" };
        tracing::debug!("{} {}", verb, id);
        common::within(&ctx, named_values.create_or_update(&id, &model.expand()))
            .await
            .map_err(|e| common::api_diagnostic(verb, &id, e))?;

        let contract = wait_for_provisioning(&ctx, provisioning_waiter(), || named_values.get(&id))
            .await
            .map_err(|e| common::poll_diagnostic(verb, &id, e))?;

        Ok(NamedValueModel::flatten(&id, &contract, planned)?.to_state(&id, planned))
    }
}

#[async_trait]
impl Resource for NamedValueResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_named_value"
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
            .description("Manages an API Management Named Value")
            .attribute(common::id_attribute())
            .attribute(common::child_name_attribute("The name of the Named Value"))
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .required()
                    .validator(StringMatches::create(
                        r"^[A-Za-z0-9-._]+$",
                        "may only contain alphanumeric characters, periods, underscores and dashes",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .optional()
                    .sensitive()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::List(Box::new(AttributeType::String)))
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("value_from_key_vault")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("secret_id", AttributeType::String)
                            .description("The resource ID of the Key Vault secret")
                            .required()
                            .validator(IsUrl::https())
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("identity_client_id", AttributeType::String)
                            .optional()
                            .validator(is_uuid())
                            .build(),
                    )
                    .build(),
            )
            .constraint(BlockConstraint::ExactlyOneOf(vec![
                "value".to_string(),
                "value_from_key_vault".to_string(),
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
            let id = common::state_id(&request.current_state, NamedValueId::parse)?;
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
            let id = common::state_id(&request.prior_state, NamedValueId::parse)?;
            let result = common::within(&ctx, data.client.named_values().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for NamedValueResource {
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
impl ResourceWithImportState for NamedValueResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, NamedValueId::parse);
        response
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use crate::config::ApiManagementFeatures;
    use crate::ApiManagementProviderData;
    use mockito::{Matcher, Server};
    use tfplug::types::AttributePath;

    const NAMED_VALUE_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1/namedValues/nv1";

    fn config(secret: bool) -> DynamicValue {
        ObjectBuilder::new()
            .string("name", "nv1")
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("display_name", "My-Value")
            .string("value", "s3cret")
            .bool("secret", secret)
            .string_list("tags", ["a", "b"])
            .into_value()
    }

    fn resource(url: &str) -> NamedValueResource {
        NamedValueResource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    #[test]
    fn expand_key_vault_reference() {
        let value = ObjectBuilder::new()
            .string("name", "nv1")
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("display_name", "kv")
            .block(
                "value_from_key_vault",
                Some(ObjectBuilder::new().string("secret_id", "https://vault.vault.azure.net/secrets/s1")),
            )
            .into_value();
        let contract = NamedValueModel::from_config(&value).unwrap().expand();
        let props = contract.properties.unwrap();
        assert!(props.value.is_none());
        assert!(props.tags.is_none());
        assert_eq!(
            props.key_vault.unwrap().secret_identifier.as_deref(),
            Some("https://vault.vault.azure.net/secrets/s1")
        );
    }

    #[test]
    fn flatten_keeps_secret_value_from_prior_state() {
        let contract = NamedValueContract::with_properties(NamedValueProperties {
            display_name: "My-Value".to_string(),
            secret: Some(true),
            ..Default::default()
        });
        let id = NamedValueId::parse(NAMED_VALUE_PATH).unwrap();

        let model = NamedValueModel::flatten(&id, &contract, &config(true)).unwrap();
        assert_eq!(model.value.as_deref(), Some("s3cret"));

        let imported = ObjectBuilder::new().string("id", NAMED_VALUE_PATH).into_value();
        let model = NamedValueModel::flatten(&id, &contract, &imported).unwrap();
        assert!(model.value.is_none());
    }

    #[tokio::test]
    async fn create_puts_then_polls() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"not found"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"displayName": "My-Value", "value": "plain", "secret": false}
            })))
            .with_status(202)
            .create_async()
            .await;
        let _get = server
            .mock("GET", NAMED_VALUE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"properties":{"displayName":"My-Value","value":"plain","secret":false,"tags":["a","b"],"provisioningState":"Succeeded"}}"#)
            .create_async()
            .await;

        let planned = ObjectBuilder::new()
            .string("name", "nv1")
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("display_name", "My-Value")
            .string("value", "plain")
            .bool("secret", false)
            .into_value();
        let state = resource(&server.url())
            .apply(&Context::new(), &planned, Operation::Create)
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(state.get_string(&AttributePath::new("value")).unwrap(), "plain");
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), NAMED_VALUE_PATH);
    }
}
