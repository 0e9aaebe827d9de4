//! `azurerm_api_management_workspace`

use super::common;
use crate::api::common::ArmResource;
use crate::api::ids::{ServiceId, WorkspaceId};
use crate::api::workspaces::{WorkspaceContract, WorkspaceProperties};
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
use tfplug::context::Context;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{IsResourceId, StringNotEmpty};
use tfplug::Operation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceModel {
    pub name: String,
    pub api_management_id: ServiceId,
    pub display_name: String,
    pub description: Option<String>,
}

impl WorkspaceModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        let api_management_id = ServiceId::parse(&r.required_string("api_management_id")?)
            .map_err(|e| {
                common::invalid_id(e).with_attribute(AttributePath::new("api_management_id"))
            })?;
        Ok(Self {
            name: r.required_string("name")?,
            api_management_id,
            display_name: r.required_string("display_name")?,
            description: r.non_empty_string("description")?,
        })
    }

    pub fn id(&self) -> WorkspaceId {
        WorkspaceId::from_service(&self.api_management_id, &self.name)
    }

    pub fn expand(&self) -> WorkspaceContract {
        ArmResource::with_properties(WorkspaceProperties {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
        })
    }

    pub fn flatten(id: &WorkspaceId, contract: &WorkspaceContract) -> Self {
        let props = contract.properties.clone().unwrap_or_default();
        Self {
            name: id.workspace_id.clone(),
            api_management_id: id.service_id(),
            display_name: props.display_name,
            description: props.description.filter(|d| !d.is_empty()),
        }
    }

    pub fn to_state(&self, source: &DynamicValue) -> DynamicValue {
        let builder = ObjectBuilder::new()
            .string("id", self.id().to_string())
            .string("name", &self.name)
            .string("api_management_id", self.api_management_id.to_string())
            .string("display_name", &self.display_name)
            .opt_string("description", self.description.clone());
        common::with_timeouts(builder, source).into_value()
    }
}

#[derive(Default)]
pub struct WorkspaceResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl WorkspaceResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &WorkspaceId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.workspaces().get(id)).await;
        Ok(common::read_outcome(id, result)?
            .map(|contract| WorkspaceModel::flatten(id, &contract).to_state(source)))
    }

    async fn apply(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
        operation: Operation,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, operation)?;
        let model = WorkspaceModel::from_config(planned)?;
        let id = model.id();
        let workspaces = data.client.workspaces();

        let verb = match operation {
            Operation::Create => {
                common::check_not_exists(
                    self.type_name(),
                    &id,
                    common::within(&ctx, workspaces.get(&id)).await,
                )?;
                "creating"
            }
            _ => "updating",
        };

        common::within(&ctx, workspaces.create_or_update(&id, &model.expand()))
            .await
            .map_err(|e| common::api_diagnostic(verb, &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after write"))
    }
}

#[async_trait]
impl Resource for WorkspaceResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_workspace"
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
            .description("Manages an API Management Workspace")
            .attribute(common::id_attribute())
            .attribute(common::child_name_attribute("The name of the Workspace"))
            .attribute(
                AttributeBuilder::new("api_management_id", AttributeType::String)
                    .description("The ID of the API Management service holding the Workspace")
                    .required()
                    .validator(IsResourceId::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("display_name", AttributeType::String)
                    .required()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
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
        let r = ObjectReader::new(&request.config);
        let mut diagnostics = vec![];
        if let Ok(Some(raw)) = r.string("api_management_id") {
            if let Err(e) = ServiceId::parse(&raw) {
                diagnostics.push(
                    common::invalid_id(e).with_attribute(AttributePath::new("api_management_id")),
                );
            }
        }
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
            let id = common::state_id(&request.current_state, WorkspaceId::parse)?;
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
            let id = common::state_id(&request.prior_state, WorkspaceId::parse)?;
            let result = common::within(&ctx, data.client.workspaces().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for WorkspaceResource {
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
impl ResourceWithImportState for WorkspaceResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, WorkspaceId::parse);
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

    const SERVICE: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1";

    fn config(api_management_id: &str) -> DynamicValue {
        ObjectBuilder::new()
            .string("name", "ws1")
            .string("api_management_id", api_management_id)
            .string("display_name", "Workspace One")
            .into_value()
    }

    #[test]
    fn id_is_built_from_service_id() {
        let model = WorkspaceModel::from_config(&config(SERVICE)).unwrap();
        assert_eq!(model.id().to_string(), format!("{}/workspaces/ws1", SERVICE));
    }

    #[test]
    fn rejects_non_service_id() {
        let err = WorkspaceModel::from_config(&config("/subscriptions/sub/resourceGroups/rg1"))
            .unwrap_err();
        assert_eq!(err.summary, "Invalid resource ID");
        assert_eq!(err.attribute, Some(AttributePath::new("api_management_id")));
    }

    #[tokio::test]
    async fn delete_treats_404_as_success() {
        let mut server = Server::new_async().await;
        let path = format!("{}/workspaces/ws1", SERVICE);
        let _m = server
            .mock("DELETE", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#)
            .create_async()
            .await;

        let mut resource = WorkspaceResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(std::sync::Arc::new(ApiManagementProviderData::new(
                        create_test_client(&server.url()),
                        ApiManagementFeatures::default(),
                    ))),
                },
            )
            .await;

        let prior = ObjectBuilder::new().string("id", path.as_str()).into_value();
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "azurerm_api_management_workspace".to_string(),
                    prior_state: prior,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }
}
