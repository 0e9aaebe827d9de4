//! `data.azurerm_api_management_api`

use super::{computed_bool, computed_list, computed_string, lookup, read_context};
use crate::api::ids::{api_id_with_revision, ApiId};
use crate::resources::api::ApiModel;
use crate::resources::common;
use crate::ApiManagementProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::object::ObjectReader;
use tfplug::schema::{NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

#[derive(Default)]
pub struct ApiDataSource {
    provider_data: Option<ApiManagementProviderData>,
}

impl ApiDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_api(&self, ctx: &Context, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = read_context(ctx);
        let r = ObjectReader::new(config);
        let id = ApiId::new(
            data.client.subscription_id(),
            r.required_string("resource_group_name")?,
            r.required_string("api_management_name")?,
            api_id_with_revision(&r.required_string("name")?, &r.required_string("revision")?),
        );

        let contract = lookup(&id, common::within(&ctx, data.client.apis().get(&id)).await)?;
        let model = ApiModel::flatten(&id, &contract, &DynamicValue::null())?;
        Ok(model.state_builder(&id).into_value())
    }
}

#[async_trait]
impl DataSource for ApiDataSource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_api"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Looks up one revision of an API")
            .attribute(computed_string("id"))
            .attribute(common::required_string("name", "The name of the API"))
            .attribute(common::required_string(
                "api_management_name",
                "The API Management Service holding the API",
            ))
            .attribute(common::required_string(
                "resource_group_name",
                "The resource group holding the service",
            ))
            .attribute(common::required_string("revision", "The revision to look up"));
        for name in [
            "revision_description",
            "display_name",
            "path",
            "api_type",
            "description",
            "service_url",
            "terms_of_service_url",
            "version",
            "version_description",
            "version_set_id",
        ] {
            builder = builder.attribute(computed_string(name));
        }

        let schema = builder
            .attribute(computed_list("protocols"))
            .attribute(computed_bool("subscription_required"))
            .attribute(computed_bool("is_current"))
            .attribute(computed_bool("is_online"))
            .block(
                NestedBlockBuilder::list("subscription_key_parameter_names")
                    .attribute(computed_string("header"))
                    .attribute(computed_string("query"))
                    .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_api(&ctx, &request.config).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
                deferred: None,
            },
            Err(diag) => ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![diag],
                deferred: None,
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ApiDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let (provider_data, diagnostics) = common::configure(request.provider_data);
        self.provider_data = provider_data;
        ConfigureDataSourceResponse { diagnostics }
    }
}
