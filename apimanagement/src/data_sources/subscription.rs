//! `data.azurerm_api_management_subscription`

use super::{computed_bool, computed_string, lookup, read_context};
use crate::api::ids::{ServiceId, SubscriptionId};
use crate::resources::common;
use crate::resources::subscription::SubscriptionModel;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

#[derive(Default)]
pub struct SubscriptionDataSource {
    provider_data: Option<ApiManagementProviderData>,
}

impl SubscriptionDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn service_id(config: &DynamicValue) -> Result<ServiceId, Diagnostic> {
        let raw = ObjectReader::new(config).required_string("api_management_id")?;
        ServiceId::parse(&raw).map_err(common::invalid_id)
    }

    async fn read_subscription(
        &self,
        ctx: &Context,
        config: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = read_context(ctx);
        let service = Self::service_id(config)?;
        let name = ObjectReader::new(config).required_string("subscription_id")?;
        let id = SubscriptionId::from_service(&service, name);

        let subscriptions = data.client.subscriptions();
        let contract = lookup(&id, common::within(&ctx, subscriptions.get(&id)).await)?;
        let keys = common::within(&ctx, subscriptions.list_secrets(&id))
            .await
            .map_err(|e| common::api_diagnostic("listing secrets for", &id, e))?;

        Ok(SubscriptionModel::flatten(&id, &contract, &keys)
            .state_builder()
            .string("id", id.to_string())
            .string("api_management_id", service.to_string())
            .into_value())
    }
}

#[async_trait]
impl DataSource for SubscriptionDataSource {
    fn type_name(&self) -> &str {
        "azurerm_api_management_subscription"
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
        let secret = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .sensitive()
                .build()
        };
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Looks up an API Management subscription")
            .attribute(computed_string("id"))
            .attribute(common::required_string(
                "api_management_id",
                "The ID of the API Management Service",
            ))
            .attribute(common::required_string(
                "subscription_id",
                "The identifier of the subscription within the service",
            ))
            .attribute(computed_string("display_name"))
            .attribute(computed_string("user_id"))
            .attribute(computed_string("product_id"))
            .attribute(computed_string("api_id"))
            .attribute(computed_string("state"))
            .attribute(computed_bool("allow_tracing"))
            .attribute(secret("primary_key"))
            .attribute(secret("secondary_key"))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        let diagnostics = match ObjectReader::new(&request.config).get("api_management_id") {
            Some(_) => Self::service_id(&request.config)
                .err()
                .map(|d| d.with_attribute(tfplug::types::AttributePath::new("api_management_id")))
                .into_iter()
                .collect(),
            None => vec![],
        };
        ValidateDataSourceConfigResponse { diagnostics }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        match self.read_subscription(&ctx, &request.config).await {
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
impl DataSourceWithConfigure for SubscriptionDataSource {
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

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, TEST_SUBSCRIPTION};
    use crate::config::ApiManagementFeatures;
    use mockito::{Matcher, Server};
    use tfplug::types::AttributePath;
    use tfplug::ObjectBuilder;

    fn data_source(url: &str) -> SubscriptionDataSource {
        SubscriptionDataSource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    fn config(service: &ServiceId) -> DynamicValue {
        ObjectBuilder::new()
            .string("api_management_id", service.to_string())
            .string("subscription_id", "partner")
            .into_value()
    }

    #[tokio::test]
    async fn reads_subscription_with_keys() {
        let mut server = Server::new_async().await;
        let service = ServiceId::new(TEST_SUBSCRIPTION, "rg1", "apim1");
        let id = SubscriptionId::from_service(&service, "partner");
        let product = format!("{}/products/starter", service);
        let _get = server
            .mock("GET", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"properties":{{"displayName":"Partner","scope":"{}","state":"active","allowTracing":false}}}}"#,
                product
            ))
            .create_async()
            .await;
        let _secrets = server
            .mock("POST", format!("{}/listSecrets", id).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"primaryKey":"pk","secondaryKey":"sk"}"#)
            .create_async()
            .await;

        let state = data_source(&server.url())
            .read_subscription(&Context::new(), &config(&service))
            .await
            .unwrap();

        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), id.to_string());
        assert_eq!(
            state.get_string(&AttributePath::new("api_management_id")).unwrap(),
            service.to_string()
        );
        assert_eq!(state.get_string(&AttributePath::new("product_id")).unwrap(), product);
        assert_eq!(state.get_string(&AttributePath::new("primary_key")).unwrap(), "pk");
        assert!(!state.get_bool(&AttributePath::new("allow_tracing")).unwrap());
    }

    #[tokio::test]
    async fn rejects_malformed_service_id() {
        let config = ObjectBuilder::new()
            .string("api_management_id", "/subscriptions/sub/resourceGroups/rg1")
            .string("subscription_id", "partner")
            .into_value();
        let response = SubscriptionDataSource::new()
            .validate(
                Context::new(),
                ValidateDataSourceConfigRequest {
                    type_name: "azurerm_api_management_subscription".to_string(),
                    config,
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
    }
}
