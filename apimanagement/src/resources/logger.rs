//! `azurerm_api_management_logger`
//!
//! The logger type follows from which sink block is configured: Application
//! Insights, Event Hub, or Azure Monitor when neither is. Credentials are
//! write-only on the service side, so reads keep them from prior state.

use super::common;
use crate::api::ids::LoggerId;
use crate::api::loggers::{
    LoggerContract, LoggerProperties, LoggerUpdate, LoggerUpdateProperties,
    LOGGER_TYPE_APPLICATION_INSIGHTS, LOGGER_TYPE_AZURE_MONITOR, LOGGER_TYPE_EVENT_HUB,
};
use crate::api::common::ArmResource;
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
use std::collections::HashMap;
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
use tfplug::schema::{AttributeBuilder, AttributeType, BlockConstraint, NestedBlockBuilder, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{IsResourceId, IsUrl, StringLength, StringNotEmpty};
use tfplug::Operation;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationInsightsModel {
    pub instrumentation_key: Option<String>,
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHubModel {
    pub name: String,
    pub connection_string: Option<String>,
    pub endpoint_uri: Option<String>,
    pub user_assigned_identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerModel {
    pub name: String,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub buffered: bool,
    pub application_insights: Option<ApplicationInsightsModel>,
    pub eventhub: Option<EventHubModel>,
}

impl LoggerModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        let eventhub = match r.block("eventhub")? {
            Some(block) => Some(EventHubModel {
                name: block.required_string("name")?,
                connection_string: block.non_empty_string("connection_string")?,
                endpoint_uri: block.non_empty_string("endpoint_uri")?,
                user_assigned_identity_client_id: block
                    .non_empty_string("user_assigned_identity_client_id")?,
            }),
            None => None,
        };

        Ok(Self {
            name: r.required_string("name")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            resource_id: r.non_empty_string("resource_id")?,
            description: r.non_empty_string("description")?,
            buffered: r.bool_or("buffered", true)?,
            application_insights: read_application_insights(&r)?,
            eventhub,
        })
    }

    pub fn id(&self, subscription_id: &str) -> LoggerId {
        LoggerId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            &self.name,
        )
    }

    pub fn logger_type(&self) -> &'static str {
        if self.eventhub.is_some() {
            LOGGER_TYPE_EVENT_HUB
        } else if self.application_insights.is_some() {
            LOGGER_TYPE_APPLICATION_INSIGHTS
        } else {
            LOGGER_TYPE_AZURE_MONITOR
        }
    }

    pub fn credentials(&self) -> Option<HashMap<String, String>> {
        let mut credentials = HashMap::new();
        if let Some(eventhub) = &self.eventhub {
            credentials.insert("name".to_string(), eventhub.name.clone());
            if let Some(connection_string) = &eventhub.connection_string {
                credentials.insert("connectionString".to_string(), connection_string.clone());
            }
            if let Some(endpoint) = &eventhub.endpoint_uri {
                credentials.insert("endpointAddress".to_string(), endpoint.clone());
            }
            if let Some(client_id) = &eventhub.user_assigned_identity_client_id {
                credentials.insert("identityClientId".to_string(), client_id.clone());
            }
        } else if let Some(insights) = &self.application_insights {
            if let Some(key) = &insights.instrumentation_key {
                credentials.insert("instrumentationKey".to_string(), key.clone());
            }
            if let Some(connection_string) = &insights.connection_string {
                credentials.insert("connectionString".to_string(), connection_string.clone());
            }
        } else {
            return None;
        }
        Some(credentials)
    }

    pub fn expand(&self) -> LoggerContract {
        ArmResource::with_properties(LoggerProperties {
            logger_type: self.logger_type().to_string(),
            description: self.description.clone(),
            credentials: self.credentials(),
            is_buffered: Some(self.buffered),
            resource_id: self.resource_id.clone(),
        })
    }

    pub fn expand_update(&self) -> LoggerUpdate {
        LoggerUpdate {
            properties: LoggerUpdateProperties {
                logger_type: self.logger_type().to_string(),
                description: self.description.clone(),
                credentials: self.credentials(),
                is_buffered: Some(self.buffered),
            },
        }
    }

    /// Secrets are not returned by the service; they come from `prior`.
    pub fn flatten(
        id: &LoggerId,
        contract: &LoggerContract,
        prior: &DynamicValue,
    ) -> Result<Self, Diagnostic> {
        let prior = ObjectReader::new(prior);
        let mut model = Self {
            name: id.logger_id.clone(),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            buffered: true,
            ..Default::default()
        };
        let Some(props) = &contract.properties else {
            return Ok(model);
        };

        model.description = props.description.clone().filter(|d| !d.is_empty());
        model.buffered = props.is_buffered.unwrap_or(true);
        model.resource_id = props.resource_id.clone().filter(|r| !r.is_empty());

        let credentials = props.credentials.clone().unwrap_or_default();
        match props.logger_type.as_str() {
            LOGGER_TYPE_EVENT_HUB => {
                let prior_eventhub = prior.block("eventhub")?;
                let prior_connection_string = match &prior_eventhub {
                    Some(block) => block.non_empty_string("connection_string")?,
                    None => None,
                };
                model.eventhub = Some(EventHubModel {
                    name: credentials.get("name").cloned().unwrap_or_default(),
                    connection_string: prior_connection_string,
                    endpoint_uri: credentials.get("endpointAddress").cloned(),
                    user_assigned_identity_client_id: credentials.get("identityClientId").cloned(),
                });
            }
            LOGGER_TYPE_APPLICATION_INSIGHTS => {
                model.application_insights =
                    Some(read_application_insights(&prior)?.unwrap_or_default());
            }
            _ => {}
        }
        Ok(model)
    }

    pub fn to_state(&self, id: &LoggerId, source: &DynamicValue) -> DynamicValue {
        let builder = ObjectBuilder::new()
            .string("id", id.to_string())
            .string("name", &self.name)
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .opt_string("resource_id", self.resource_id.clone())
            .opt_string("description", self.description.clone())
            .bool("buffered", self.buffered)
            .block(
                "application_insights",
                self.application_insights.as_ref().map(|insights| {
                    ObjectBuilder::new()
                        .opt_string("instrumentation_key", insights.instrumentation_key.clone())
                        .opt_string("connection_string", insights.connection_string.clone())
                }),
            )
            .block(
                "eventhub",
                self.eventhub.as_ref().map(|eventhub| {
                    ObjectBuilder::new()
                        .string("name", &eventhub.name)
                        .opt_string("connection_string", eventhub.connection_string.clone())
                        .opt_string("endpoint_uri", eventhub.endpoint_uri.clone())
                        .opt_string(
                            "user_assigned_identity_client_id",
                            eventhub.user_assigned_identity_client_id.clone(),
                        )
                }),
            );
        common::with_timeouts(builder, source).into_value()
    }
}

fn read_application_insights(
    r: &ObjectReader<'_>,
) -> Result<Option<ApplicationInsightsModel>, Diagnostic> {
    let Some(block) = r.block("application_insights")? else {
        return Ok(None);
    };
    Ok(Some(ApplicationInsightsModel {
        instrumentation_key: block.non_empty_string("instrumentation_key")?,
        connection_string: block.non_empty_string("connection_string")?,
    }))
}

#[derive(Default)]
pub struct LoggerResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl LoggerResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &LoggerId,
        prior: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.loggers().get(id)).await;
        let Some(contract) = common::read_outcome(id, result)? else {
            return Ok(None);
        };
        Ok(Some(LoggerModel::flatten(id, &contract, prior)?.to_state(id, prior)))
    }

    async fn create_logger(&self, ctx: &Context, planned: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Create)?;
        let model = LoggerModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let loggers = data.client.loggers();

        common::check_not_exists(self.type_name(), &id, common::within(&ctx, loggers.get(&id)).await)?;

        tracing::debug!("Creating {} ({})", id, model.logger_type());
        common::within(&ctx, loggers.create_or_update(&id, &model.expand()))
            .await
            .map_err(|e| common::api_diagnostic("creating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after create"))
    }

    async fn update_logger(&self, ctx: &Context, planned: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, Operation::Update)?;
        let model = LoggerModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());

        tracing::debug!("Updating {}", id);
        common::within(&ctx, data.client.loggers().update(&id, &model.expand_update()))
            .await
            .map_err(|e| common::api_diagnostic("updating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after update"))
    }
}

#[async_trait]
impl Resource for LoggerResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_logger"
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
            .description("Manages a Logger within an API Management Service")
            .attribute(common::id_attribute())
            .attribute(common::child_name_attribute("The name of this Logger"))
            .attribute(common::resource_group_name_attribute())
            .attribute(common::api_management_name_attribute())
            .attribute(
                AttributeBuilder::new("resource_id", AttributeType::String)
                    .description("The target resource id which will be linked in the API-Management portal page")
                    .optional()
                    .validator(IsResourceId::create())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("buffered", AttributeType::Bool)
                    .description("Specifies whether records should be buffered in the Logger prior to publishing")
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("application_insights")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("instrumentation_key", AttributeType::String)
                            .optional()
                            .sensitive()
                            .validator(StringNotEmpty::create())
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("connection_string", AttributeType::String)
                            .optional()
                            .sensitive()
                            .validator(StringNotEmpty::create())
                            .build(),
                    )
                    .constraint(BlockConstraint::ExactlyOneOf(vec![
                        "instrumentation_key".to_string(),
                        "connection_string".to_string(),
                    ]))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("eventhub")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .validator(StringLength::between(1, 256))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("connection_string", AttributeType::String)
                            .optional()
                            .sensitive()
                            .validator(StringNotEmpty::create())
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("endpoint_uri", AttributeType::String)
                            .optional()
                            .validator(IsUrl::https())
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("user_assigned_identity_client_id", AttributeType::String)
                            .optional()
                            .validator(tfplug::validator::is_uuid())
                            .build(),
                    )
                    .constraint(BlockConstraint::ExactlyOneOf(vec![
                        "connection_string".to_string(),
                        "endpoint_uri".to_string(),
                    ]))
                    .build(),
            )
            .constraint(BlockConstraint::ConflictsWith(vec![
                "application_insights".to_string(),
                "eventhub".to_string(),
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
        match self.create_logger(&ctx, &request.planned_state).await {
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
            let id = common::state_id(&request.current_state, LoggerId::parse)?;
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
        match self.update_logger(&ctx, &request.planned_state).await {
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
            let id = common::state_id(&request.prior_state, LoggerId::parse)?;
            tracing::debug!("Deleting {}", id);
            let result = common::within(&ctx, data.client.loggers().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for LoggerResource {
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
impl ResourceWithImportState for LoggerResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, LoggerId::parse);
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

    const LOGGER_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1/loggers/logger1";

    fn base() -> ObjectBuilder {
        ObjectBuilder::new()
            .string("name", "logger1")
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .bool("buffered", true)
    }

    fn resource(url: &str) -> LoggerResource {
        LoggerResource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    #[test]
    fn logger_type_follows_configured_sink() {
        let insights = base()
            .block(
                "application_insights",
                Some(ObjectBuilder::new().string("instrumentation_key", "ikey")),
            )
            .into_value();
        let model = LoggerModel::from_config(&insights).unwrap();
        assert_eq!(model.logger_type(), LOGGER_TYPE_APPLICATION_INSIGHTS);
        assert_eq!(
            model.credentials().unwrap().get("instrumentationKey").map(String::as_str),
            Some("ikey")
        );

        let monitor = LoggerModel::from_config(&base().into_value()).unwrap();
        assert_eq!(monitor.logger_type(), LOGGER_TYPE_AZURE_MONITOR);
        assert!(monitor.credentials().is_none());
    }

    #[test]
    fn eventhub_identity_credentials() {
        let value = base()
            .block(
                "eventhub",
                Some(
                    ObjectBuilder::new()
                        .string("name", "hub1")
                        .string("endpoint_uri", "https://ns.servicebus.windows.net")
                        .string("user_assigned_identity_client_id", "11111111-1111-1111-1111-111111111111"),
                ),
            )
            .into_value();
        let credentials = LoggerModel::from_config(&value).unwrap().credentials().unwrap();
        assert_eq!(credentials["name"], "hub1");
        assert_eq!(credentials["endpointAddress"], "https://ns.servicebus.windows.net");
        assert!(!credentials.contains_key("connectionString"));
    }

    #[test]
    fn flatten_keeps_secrets_from_prior_state() {
        let prior = base()
            .block(
                "application_insights",
                Some(ObjectBuilder::new().string("connection_string", "InstrumentationKey=abc")),
            )
            .into_value();
        let contract: LoggerContract = serde_json::from_value(serde_json::json!({
            "properties": {
                "loggerType": "applicationInsights",
                "credentials": {"connectionString": "{{Logger-Credentials--1234}}"},
                "isBuffered": false
            }
        }))
        .unwrap();

        let id = LoggerId::parse(LOGGER_PATH).unwrap();
        let model = LoggerModel::flatten(&id, &contract, &prior).unwrap();
        assert!(!model.buffered);
        assert_eq!(
            model.application_insights.unwrap().connection_string.as_deref(),
            Some("InstrumentationKey=abc")
        );
    }

    #[tokio::test]
    async fn create_fails_when_logger_exists() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", LOGGER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"properties":{"loggerType":"azureMonitor"}}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", LOGGER_PATH)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = resource(&server.url())
            .create_logger(&Context::new(), &base().into_value())
            .await
            .unwrap_err();

        assert_eq!(err.summary, common::RESOURCE_ALREADY_EXISTS);
        assert!(err.detail.contains(LOGGER_PATH));
        put.assert_async().await;
    }

    #[tokio::test]
    async fn update_sends_patch() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", LOGGER_PATH)
            .match_query(Matcher::Any)
            .match_header("if-match", "*")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"loggerType": "azureMonitor", "description": "changed"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let _get = server
            .mock("GET", LOGGER_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"properties":{"loggerType":"azureMonitor","description":"changed","isBuffered":true}}"#)
            .create_async()
            .await;

        let planned = base().string("description", "changed").into_value();
        let state = resource(&server.url())
            .update_logger(&Context::new(), &planned)
            .await
            .unwrap();

        patch.assert_async().await;
        assert_eq!(
            state.get_string(&AttributePath::new("description")).unwrap(),
            "changed"
        );
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), LOGGER_PATH);
    }
}
