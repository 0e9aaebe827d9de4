//! `azurerm_api_management_api_diagnostic`

use super::common;
use crate::api::api_diagnostics::{
    BodyDiagnosticSettings, DataMasking, DataMaskingEntity, DiagnosticContract,
    DiagnosticProperties, HttpMessageDiagnostic, PipelineDiagnosticSettings, SamplingSettings,
    ALWAYS_LOG_ALL_ERRORS, SAMPLING_TYPE_FIXED,
};
use crate::api::common::ArmResource;
use crate::api::ids::{ApiDiagnosticId, ApiId};
use crate::config::CHILD_RESOURCE_TIMEOUTS;
use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, SchemaBuilder};
use tfplug::timeouts::timeouts_block;
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{IsResourceId, NumberRange, StringOneOf};
use tfplug::Operation;

pub const IDENTIFIER_APPLICATION_INSIGHTS: &str = "applicationinsights";
pub const IDENTIFIER_AZURE_MONITOR: &str = "azuremonitor";
pub const DEFAULT_OPERATION_NAME_FORMAT: &str = "Name";

const ADDITIONAL_CONTENT_BLOCKS: [&str; 4] = [
    "frontend_request",
    "frontend_response",
    "backend_request",
    "backend_response",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingEntity {
    pub mode: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataMaskingModel {
    pub query: Vec<MaskingEntity>,
    pub headers: Vec<MaskingEntity>,
}

/// One of the `frontend_*` / `backend_*` blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpMessageModel {
    pub body_bytes: Option<i64>,
    pub headers_to_log: Vec<String>,
    pub data_masking: Option<DataMaskingModel>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiDiagnosticModel {
    pub identifier: String,
    pub resource_group_name: String,
    pub api_management_name: String,
    pub api_name: String,
    pub api_management_logger_id: String,
    pub sampling_percentage: Option<f64>,
    pub always_log_errors: Option<bool>,
    pub verbosity: Option<String>,
    pub log_client_ip: Option<bool>,
    pub http_correlation_protocol: Option<String>,
    pub frontend_request: Option<HttpMessageModel>,
    pub frontend_response: Option<HttpMessageModel>,
    pub backend_request: Option<HttpMessageModel>,
    pub backend_response: Option<HttpMessageModel>,
    pub operation_name_format: String,
}

impl ApiDiagnosticModel {
    pub fn from_config(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let r = ObjectReader::new(value);
        Ok(Self {
            identifier: r.required_string("identifier")?,
            resource_group_name: r.required_string("resource_group_name")?,
            api_management_name: r.required_string("api_management_name")?,
            api_name: r.required_string("api_name")?,
            api_management_logger_id: r.required_string("api_management_logger_id")?,
            sampling_percentage: r.number("sampling_percentage")?,
            always_log_errors: r.bool("always_log_errors")?,
            verbosity: r.non_empty_string("verbosity")?,
            log_client_ip: r.bool("log_client_ip")?,
            http_correlation_protocol: r.non_empty_string("http_correlation_protocol")?,
            frontend_request: read_http_message(&r, "frontend_request")?,
            frontend_response: read_http_message(&r, "frontend_response")?,
            backend_request: read_http_message(&r, "backend_request")?,
            backend_response: read_http_message(&r, "backend_response")?,
            operation_name_format: r.string_or("operation_name_format", DEFAULT_OPERATION_NAME_FORMAT)?,
        })
    }

    pub fn id(&self, subscription_id: &str) -> ApiDiagnosticId {
        let api = ApiId::new(
            subscription_id,
            &self.resource_group_name,
            &self.api_management_name,
            &self.api_name,
        );
        ApiDiagnosticId::new(&api, &self.identifier)
    }

    pub fn expand(&self) -> DiagnosticContract {
        let mut properties = DiagnosticProperties {
            logger_id: self.api_management_logger_id.clone(),
            sampling: self.sampling_percentage.map(|percentage| SamplingSettings {
                sampling_type: Some(SAMPLING_TYPE_FIXED.to_string()),
                percentage: Some(percentage),
            }),
            always_log: (self.always_log_errors == Some(true))
                .then(|| ALWAYS_LOG_ALL_ERRORS.to_string()),
            verbosity: self.verbosity.clone(),
            log_client_ip: self.log_client_ip,
            http_correlation_protocol: self.http_correlation_protocol.clone(),
            frontend: expand_pipeline(&self.frontend_request, &self.frontend_response),
            backend: expand_pipeline(&self.backend_request, &self.backend_response),
            operation_name_format: None,
        };

        if self.identifier == IDENTIFIER_APPLICATION_INSIGHTS {
            properties.operation_name_format = Some(self.operation_name_format.clone());
        }

        ArmResource::with_properties(properties)
    }

    pub fn flatten(id: &ApiDiagnosticId, contract: &DiagnosticContract) -> Self {
        let mut model = Self {
            identifier: id.diagnostic_id.clone(),
            resource_group_name: id.resource_group_name.clone(),
            api_management_name: id.service_name.clone(),
            api_name: id.api().api_name().to_string(),
            operation_name_format: DEFAULT_OPERATION_NAME_FORMAT.to_string(),
            ..Default::default()
        };
        let Some(props) = &contract.properties else {
            return model;
        };

        model.api_management_logger_id = props.logger_id.clone();
        model.sampling_percentage = props.sampling.as_ref().and_then(|s| s.percentage);
        model.always_log_errors = Some(props.always_log.as_deref() == Some(ALWAYS_LOG_ALL_ERRORS));
        model.verbosity = props.verbosity.clone();
        model.log_client_ip = props.log_client_ip;
        model.http_correlation_protocol = props.http_correlation_protocol.clone();
        if let Some(frontend) = &props.frontend {
            model.frontend_request = frontend.request.as_ref().map(flatten_http_message);
            model.frontend_response = frontend.response.as_ref().map(flatten_http_message);
        }
        if let Some(backend) = &props.backend {
            model.backend_request = backend.request.as_ref().map(flatten_http_message);
            model.backend_response = backend.response.as_ref().map(flatten_http_message);
        }
        if let Some(format) = props.operation_name_format.as_deref().filter(|f| !f.is_empty()) {
            model.operation_name_format = format.to_string();
        }
        model
    }

    pub fn to_state(&self, id: &ApiDiagnosticId, source: &DynamicValue) -> DynamicValue {
        let builder = ObjectBuilder::new()
            .string("id", id.to_string())
            .string("identifier", &self.identifier)
            .string("resource_group_name", &self.resource_group_name)
            .string("api_management_name", &self.api_management_name)
            .string("api_name", &self.api_name)
            .string("api_management_logger_id", &self.api_management_logger_id)
            .opt_number("sampling_percentage", self.sampling_percentage)
            .opt_bool("always_log_errors", self.always_log_errors)
            .opt_string("verbosity", self.verbosity.clone())
            .opt_bool("log_client_ip", self.log_client_ip)
            .opt_string("http_correlation_protocol", self.http_correlation_protocol.clone())
            .block("frontend_request", self.frontend_request.as_ref().map(http_message_state))
            .block("frontend_response", self.frontend_response.as_ref().map(http_message_state))
            .block("backend_request", self.backend_request.as_ref().map(http_message_state))
            .block("backend_response", self.backend_response.as_ref().map(http_message_state))
            .string("operation_name_format", &self.operation_name_format);
        common::with_timeouts(builder, source).into_value()
    }
}

fn read_http_message(r: &ObjectReader<'_>, name: &str) -> Result<Option<HttpMessageModel>, Diagnostic> {
    let Some(block) = r.block(name)? else {
        return Ok(None);
    };
    let data_masking = match block.block("data_masking")? {
        Some(masking) => Some(DataMaskingModel {
            query: read_masking_entities(&masking, "query")?,
            headers: read_masking_entities(&masking, "headers")?,
        }),
        None => None,
    };
    Ok(Some(HttpMessageModel {
        body_bytes: block.int("body_bytes")?,
        headers_to_log: block.string_list("headers_to_log")?,
        data_masking,
    }))
}

fn read_masking_entities(r: &ObjectReader<'_>, name: &str) -> Result<Vec<MaskingEntity>, Diagnostic> {
    r.blocks(name)?
        .iter()
        .map(|entity| {
            Ok(MaskingEntity {
                mode: entity.required_string("mode")?,
                value: entity.required_string("value")?,
            })
        })
        .collect()
}

fn expand_pipeline(
    request: &Option<HttpMessageModel>,
    response: &Option<HttpMessageModel>,
) -> Option<PipelineDiagnosticSettings> {
    if request.is_none() && response.is_none() {
        return None;
    }
    Some(PipelineDiagnosticSettings {
        request: request.as_ref().map(expand_http_message),
        response: response.as_ref().map(expand_http_message),
    })
}

fn expand_http_message(model: &HttpMessageModel) -> HttpMessageDiagnostic {
    HttpMessageDiagnostic {
        headers: (!model.headers_to_log.is_empty()).then(|| model.headers_to_log.clone()),
        body: Some(BodyDiagnosticSettings {
            bytes: model.body_bytes.filter(|b| *b > 0),
        }),
        data_masking: model.data_masking.as_ref().map(|masking| DataMasking {
            query: Some(expand_masking_entities(&masking.query)),
            headers: Some(expand_masking_entities(&masking.headers)),
        }),
    }
}

fn expand_masking_entities(entities: &[MaskingEntity]) -> Vec<DataMaskingEntity> {
    entities
        .iter()
        .map(|e| DataMaskingEntity {
            mode: Some(e.mode.clone()),
            value: Some(e.value.clone()),
        })
        .collect()
}

fn flatten_http_message(message: &HttpMessageDiagnostic) -> HttpMessageModel {
    HttpMessageModel {
        body_bytes: message.body.as_ref().and_then(|b| b.bytes),
        headers_to_log: message.headers.clone().unwrap_or_default(),
        data_masking: message.data_masking.as_ref().map(|masking| DataMaskingModel {
            query: flatten_masking_entities(masking.query.as_deref()),
            headers: flatten_masking_entities(masking.headers.as_deref()),
        }),
    }
}

fn flatten_masking_entities(entities: Option<&[DataMaskingEntity]>) -> Vec<MaskingEntity> {
    entities
        .unwrap_or_default()
        .iter()
        .map(|e| MaskingEntity {
            mode: e.mode.clone().unwrap_or_default(),
            value: e.value.clone().unwrap_or_default(),
        })
        .collect()
}

fn http_message_state(model: &HttpMessageModel) -> ObjectBuilder {
    let masking_state = |entities: &[MaskingEntity]| {
        entities
            .iter()
            .map(|e| {
                ObjectBuilder::new()
                    .string("mode", &e.mode)
                    .string("value", &e.value)
            })
            .collect::<Vec<_>>()
    };

    ObjectBuilder::new()
        .opt_int("body_bytes", model.body_bytes)
        .string_list("headers_to_log", model.headers_to_log.clone())
        .block(
            "data_masking",
            model.data_masking.as_ref().map(|masking| {
                ObjectBuilder::new()
                    .blocks("query", masking_state(&masking.query))
                    .blocks("headers", masking_state(&masking.headers))
            }),
        )
}

fn masking_entity_block(name: &str) -> NestedBlock {
    NestedBlockBuilder::list(name)
        .attribute(
            AttributeBuilder::new("mode", AttributeType::String)
                .required()
                .validator(StringOneOf::create(&["Hide", "Mask"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", AttributeType::String)
                .required()
                .build(),
        )
        .build()
}

fn additional_content_block(name: &str) -> NestedBlock {
    NestedBlockBuilder::list(name)
        .max_items(1)
        .attribute(
            AttributeBuilder::new("body_bytes", AttributeType::Number)
                .description("Number of payload bytes to log, up to 8192")
                .optional()
                .validator(NumberRange::int_between(0, 8192))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("headers_to_log", AttributeType::set_of(AttributeType::String))
                .optional()
                .build(),
        )
        .block(
            NestedBlockBuilder::list("data_masking")
                .max_items(1)
                .block(masking_entity_block("query"))
                .block(masking_entity_block("headers"))
                .build(),
        )
        .build()
}

#[derive(Default)]
pub struct ApiDiagnosticResource {
    provider_data: Option<crate::ApiManagementProviderData>,
}

impl ApiDiagnosticResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        id: &ApiDiagnosticId,
        source: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let result = common::within(ctx, data.client.api_diagnostics().get(id)).await;
        let Some(contract) = common::read_outcome(id, result)? else {
            return Ok(None);
        };
        Ok(Some(ApiDiagnosticModel::flatten(id, &contract).to_state(id, source)))
    }

    async fn apply(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
        operation: Operation,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = common::operation_context(ctx, CHILD_RESOURCE_TIMEOUTS, planned, operation)?;
        let model = ApiDiagnosticModel::from_config(planned)?;
        let id = model.id(data.client.subscription_id());
        let api = data.client.api_diagnostics();

        if operation == Operation::Create {
            common::check_not_exists(self.type_name(), &id, common::within(&ctx, api.get(&id)).await)?;
        }

        tracing::debug!("Writing {}", id);
        common::within(&ctx, api.create_or_update(&id, &model.expand()))
            .await
            .map_err(|e| common::api_diagnostic("creating/updating", &id, e))?;

        self.read_state(&ctx, &id, planned)
            .await?
            .ok_or_else(|| common::api_diagnostic("retrieving", &id, "not found after write"))
    }
}

#[async_trait]
impl Resource for ApiDiagnosticResource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_api_diagnostic"
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
        let mut schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an API Management Service API Diagnostics Logs")
            .attribute(common::id_attribute())
            .attribute(
                AttributeBuilder::new("identifier", AttributeType::String)
                    .description("Identifier of the diagnostics logs")
                    .required()
                    .validator(StringOneOf::create(&[
                        IDENTIFIER_APPLICATION_INSIGHTS,
                        IDENTIFIER_AZURE_MONITOR,
                    ]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(common::force_new_string("api_name", "The name of the API"))
            .attribute(common::api_management_name_attribute())
            .attribute(common::resource_group_name_attribute())
            .attribute(
                AttributeBuilder::new("api_management_logger_id", AttributeType::String)
                    .description("The ID of the API Management Logger to use")
                    .required()
                    .validator(IsResourceId::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sampling_percentage", AttributeType::Number)
                    .optional()
                    .computed()
                    .validator(NumberRange::between(0.0, 100.0))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("always_log_errors", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("verbosity", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringOneOf::create(&["verbose", "information", "error"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("log_client_ip", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("http_correlation_protocol", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringOneOf::create(&["None", "Legacy", "W3C"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("operation_name_format", AttributeType::String)
                    .optional()
                    .validator(StringOneOf::create(&["Name", "Url"]))
                    .default(StaticDefault::string(DEFAULT_OPERATION_NAME_FORMAT))
                    .build(),
            )
            .block(timeouts_block());

        for name in ADDITIONAL_CONTENT_BLOCKS {
            schema = schema.block(additional_content_block(name));
        }

        ResourceSchemaResponse {
            schema: schema.build(),
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
            let id = common::state_id(&request.current_state, ApiDiagnosticId::parse)?;
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
            let id = common::state_id(&request.prior_state, ApiDiagnosticId::parse)?;
            tracing::debug!("Deleting {}", id);
            let result = common::within(&ctx, data.client.api_diagnostics().delete(&id)).await;
            common::delete_outcome(&id, result)
        }
        .await;

        DeleteResourceResponse {
            diagnostics: result.err().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ApiDiagnosticResource {
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
impl ResourceWithImportState for ApiDiagnosticResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        common::import_by_id(&request, &mut response, ApiDiagnosticId::parse);
        response
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::ids::LoggerId;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use crate::config::ApiManagementFeatures;
    use crate::ApiManagementProviderData;
    use mockito::{Matcher, Server};
    use tfplug::types::AttributePath;

    const DIAGNOSTIC_PATH: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/apim1/apis/echo-api/diagnostics/azuremonitor";

    fn logger_id() -> String {
        LoggerId::new(TEST_SUBSCRIPTION, "rg1", "apim1", "logger1").to_string()
    }

    fn config() -> DynamicValue {
        ObjectBuilder::new()
            .string("identifier", IDENTIFIER_AZURE_MONITOR)
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("api_name", "echo-api")
            .string("api_management_logger_id", logger_id())
            .bool("always_log_errors", true)
            .string("operation_name_format", "Name")
            .into_value()
    }

    fn resource(url: &str) -> ApiDiagnosticResource {
        ApiDiagnosticResource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    #[test]
    fn unset_sampling_sends_no_sampling_object() {
        let model = ApiDiagnosticModel::from_config(&config()).unwrap();
        let contract = model.expand();
        let props = contract.properties.unwrap();

        assert!(props.sampling.is_none());
        assert_eq!(props.always_log.as_deref(), Some(ALWAYS_LOG_ALL_ERRORS));
        assert!(props.operation_name_format.is_none());
        assert!(props.frontend.is_none());

        let body = serde_json::to_value(ArmResource::with_properties(props)).unwrap();
        assert!(body["properties"].get("sampling").is_none());
    }

    #[test]
    fn sampling_percentage_is_fixed_sampling() {
        let mut model = ApiDiagnosticModel::from_config(&config()).unwrap();
        model.sampling_percentage = Some(0.0);
        let sampling = model.expand().properties.unwrap().sampling.unwrap();
        assert_eq!(sampling.sampling_type.as_deref(), Some(SAMPLING_TYPE_FIXED));
        assert_eq!(sampling.percentage, Some(0.0));
    }

    #[test]
    fn operation_name_format_only_for_application_insights() {
        let mut model = ApiDiagnosticModel::from_config(&config()).unwrap();
        model.identifier = IDENTIFIER_APPLICATION_INSIGHTS.to_string();
        model.operation_name_format = "Url".to_string();
        let props = model.expand().properties.unwrap();
        assert_eq!(props.operation_name_format.as_deref(), Some("Url"));
    }

    #[test]
    fn flatten_defaults_operation_name_format() {
        let id = ApiDiagnosticId::parse(DIAGNOSTIC_PATH).unwrap();
        let contract: DiagnosticContract = serde_json::from_value(serde_json::json!({
            "properties": {
                "loggerId": logger_id(),
                "alwaysLog": "allErrors"
            }
        }))
        .unwrap();

        let model = ApiDiagnosticModel::flatten(&id, &contract);
        assert_eq!(model.operation_name_format, "Name");
        assert_eq!(model.sampling_percentage, None);
        assert_eq!(model.always_log_errors, Some(true));
        assert_eq!(model.api_name, "echo-api");
        assert!(model.frontend_request.is_none());
    }

    #[test]
    fn http_message_blocks_round_trip() {
        let value = ObjectBuilder::new()
            .string("identifier", IDENTIFIER_APPLICATION_INSIGHTS)
            .string("resource_group_name", "rg1")
            .string("api_management_name", "apim1")
            .string("api_name", "echo-api")
            .string("api_management_logger_id", logger_id())
            .block(
                "frontend_request",
                Some(
                    ObjectBuilder::new()
                        .int("body_bytes", 512)
                        .string_list("headers_to_log", ["content-type"])
                        .block(
                            "data_masking",
                            Some(
                                ObjectBuilder::new()
                                    .blocks(
                                        "query",
                                        vec![ObjectBuilder::new()
                                            .string("mode", "Hide")
                                            .string("value", "sig")],
                                    )
                                    .blocks("headers", vec![]),
                            ),
                        ),
                ),
            )
            .into_value();

        let model = ApiDiagnosticModel::from_config(&value).unwrap();
        let contract = model.expand();
        let frontend = contract.properties.as_ref().unwrap().frontend.as_ref().unwrap();
        assert!(frontend.response.is_none());
        let request = frontend.request.as_ref().unwrap();
        assert_eq!(request.body.as_ref().unwrap().bytes, Some(512));

        let id = model.id(TEST_SUBSCRIPTION);
        let flattened = ApiDiagnosticModel::flatten(&id, &contract);
        assert_eq!(flattened.frontend_request, model.frontend_request);
    }

    #[tokio::test]
    async fn create_reads_back_state() {
        let mut server = Server::new_async().await;
        let _exists = server
            .mock("GET", DIAGNOSTIC_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", DIAGNOSTIC_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"alwaysLog": "allErrors"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let _read = server
            .mock("GET", DIAGNOSTIC_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"properties":{{"loggerId":"{}","alwaysLog":"allErrors"}}}}"#,
                logger_id()
            ))
            .create_async()
            .await;

        let resource = resource(&server.url());
        let state = resource
            .apply(&Context::new(), &config(), Operation::Create)
            .await;

        let state = state.unwrap();
        put.assert_async().await;
        assert!(state.get(&AttributePath::new("sampling_percentage")).unwrap().is_null());
        assert!(state.get_bool(&AttributePath::new("always_log_errors")).unwrap());
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            DIAGNOSTIC_PATH
        );
    }

    #[tokio::test]
    async fn read_clears_state_on_404() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", DIAGNOSTIC_PATH)
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .create_async()
            .await;

        let state = ObjectBuilder::new().string("id", DIAGNOSTIC_PATH).into_value();
        let resource = resource(&server.url());
        let result = resource
            .read_state(&Context::new(), &ApiDiagnosticId::parse(DIAGNOSTIC_PATH).unwrap(), &state)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
