//! `data.azurerm_api_management`

use super::{computed_bool, computed_list, computed_string, lookup, read_context};
use crate::api::ids::ServiceId;
use crate::resources::common;
use crate::resources::service::{HostnameKind, ServiceModel, TenantAccessModel, CONSUMPTION};
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

fn hostname_block(kind: HostnameKind) -> NestedBlock {
    let builder = NestedBlockBuilder::list(kind.attribute())
        .attribute(computed_string("host_name"))
        .attribute(computed_string("key_vault_certificate_id"))
        .attribute(computed_bool("negotiate_client_certificate"))
        .attribute(computed_string("ssl_keyvault_identity_client_id"))
        .attribute(computed_string("expiry"))
        .attribute(computed_string("thumbprint"))
        .attribute(computed_string("subject"))
        .attribute(computed_string("certificate_source"))
        .attribute(computed_string("certificate_status"))
        .attribute(computed_string("certificate"))
        .attribute(computed_string("certificate_password"));
    if kind == HostnameKind::Proxy {
        builder.attribute(computed_bool("default_ssl_binding")).build()
    } else {
        builder.build()
    }
}

#[derive(Default)]
pub struct ServiceDataSource {
    provider_data: Option<ApiManagementProviderData>,
}

impl ServiceDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_service(&self, ctx: &Context, config: &DynamicValue) -> Result<DynamicValue, Diagnostic> {
        let data = common::provider_data(&self.provider_data)?;
        let ctx = read_context(ctx);
        let r = ObjectReader::new(config);
        let id = ServiceId::new(
            data.client.subscription_id(),
            r.required_string("resource_group_name")?,
            r.required_string("name")?,
        );

        let service = lookup(&id, common::within(&ctx, data.client.services().get(&id)).await)?;
        let model = ServiceModel::flatten(&id, &service, None, &DynamicValue::null(), true)?;

        let consumption = service.sku.as_ref().is_some_and(|s| s.name == CONSUMPTION);
        let tenant_access = if consumption {
            None
        } else {
            let secrets = common::within(&ctx, data.client.portal_settings().list_tenant_access_secrets(&id))
                .await
                .map_err(|e| common::api_diagnostic("retrieving tenant access properties for", &id, e))?;
            Some(TenantAccessModel::flatten(&secrets).to_builder())
        };

        Ok(model
            .state_builder(&id)
            .block("tenant_access", tenant_access)
            .into_value())
    }
}

#[async_trait]
impl DataSource for ServiceDataSource {
    fn type_name(&self) -> &str {
        "azurerm_api_management"
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
        let hostname_configuration = HostnameKind::ALL
            .into_iter()
            .fold(NestedBlockBuilder::list("hostname_configuration"), |b, kind| {
                b.block(hostname_block(kind))
            })
            .build();

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Looks up an existing API Management Service")
            .attribute(computed_string("id"))
            .attribute(common::required_string("name", "The name of the API Management Service"))
            .attribute(common::required_string(
                "resource_group_name",
                "The resource group holding the service",
            ));
        for name in [
            "location",
            "publisher_name",
            "publisher_email",
            "sku_name",
            "notification_sender_email",
            "gateway_url",
            "gateway_regional_url",
            "management_api_url",
            "portal_url",
            "developer_portal_url",
            "scm_url",
            "public_ip_address_id",
        ] {
            builder = builder.attribute(computed_string(name));
        }

        let schema = builder
            .attribute(computed_list("public_ip_addresses"))
            .attribute(computed_list("private_ip_addresses"))
            .attribute(computed_list("zones"))
            .attribute(computed_bool("public_network_access_enabled"))
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map_of(AttributeType::String))
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("identity")
                    .attribute(computed_string("type"))
                    .attribute(computed_list("identity_ids"))
                    .attribute(computed_string("principal_id"))
                    .attribute(computed_string("tenant_id"))
                    .build(),
            )
            .block(hostname_configuration)
            .block(
                NestedBlockBuilder::list("additional_location")
                    .attribute(computed_string("location"))
                    .attribute(
                        AttributeBuilder::new("capacity", AttributeType::Number)
                            .computed()
                            .build(),
                    )
                    .attribute(computed_list("zones"))
                    .attribute(computed_string("public_ip_address_id"))
                    .attribute(computed_bool("gateway_disabled"))
                    .attribute(computed_string("gateway_regional_url"))
                    .attribute(computed_list("public_ip_addresses"))
                    .attribute(computed_list("private_ip_addresses"))
                    .block(
                        NestedBlockBuilder::list("virtual_network_configuration")
                            .attribute(computed_string("subnet_id"))
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("tenant_access")
                    .attribute(computed_bool("enabled"))
                    .attribute(computed_string("tenant_id"))
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
        match self.read_service(&ctx, &request.config).await {
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
impl DataSourceWithConfigure for ServiceDataSource {
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
    use tfplug::types::{AttributePath, Dynamic};
    use tfplug::ObjectBuilder;

    fn data_source(url: &str) -> ServiceDataSource {
        ServiceDataSource {
            provider_data: Some(ApiManagementProviderData::new(
                create_test_client(url),
                ApiManagementFeatures::default(),
            )),
        }
    }

    fn config() -> DynamicValue {
        ObjectBuilder::new()
            .string("name", "apim1")
            .string("resource_group_name", "rg1")
            .into_value()
    }

    #[tokio::test]
    async fn reads_all_hostnames_and_tenant_access() {
        let mut server = Server::new_async().await;
        let id = ServiceId::new(TEST_SUBSCRIPTION, "rg1", "apim1");
        let _get = server
            .mock("GET", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{
                "location": "westeurope",
                "sku": {"name": "Premium", "capacity": 1},
                "tags": {"env": "prod"},
                "properties": {
                    "publisherName": "Contoso",
                    "publisherEmail": "admin@contoso.com",
                    "gatewayUrl": "https://apim1.azure-api.net",
                    "publicIPAddresses": ["20.1.2.3"],
                    "hostnameConfigurations": [
                        {"type": "Proxy", "hostName": "apim1.azure-api.net", "certificateSource": "BuiltIn", "defaultSslBinding": true},
                        {"type": "Management", "hostName": "mgmt.contoso.com", "certificateSource": "KeyVault"}
                    ]
                }
            }"#,
            )
            .create_async()
            .await;
        let _secrets = server
            .mock("POST", format!("{}/tenant/access/listSecrets", id).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"access","enabled":false,"primaryKey":"p","secondaryKey":"s"}"#)
            .create_async()
            .await;

        let state = data_source(&server.url())
            .read_service(&Context::new(), &config())
            .await
            .unwrap();

        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), id.to_string());
        assert_eq!(state.get_string(&AttributePath::new("sku_name")).unwrap(), "Premium_1");
        let hostnames = AttributePath::new("hostname_configuration").index(0);
        assert_eq!(
            state
                .get_string(&hostnames.clone().attribute("proxy").index(0).attribute("host_name"))
                .unwrap(),
            "apim1.azure-api.net"
        );
        assert_eq!(
            state
                .get_string(&hostnames.attribute("management").index(0).attribute("host_name"))
                .unwrap(),
            "mgmt.contoso.com"
        );
        assert_eq!(
            state
                .get_string(&AttributePath::new("tenant_access").index(0).attribute("primary_key"))
                .unwrap(),
            "p"
        );
        assert_eq!(
            state.get(&AttributePath::new("public_ip_addresses")),
            Some(&Dynamic::List(vec![Dynamic::String("20.1.2.3".to_string())]))
        );
    }

    #[tokio::test]
    async fn missing_service_is_an_error() {
        let mut server = Server::new_async().await;
        let id = ServiceId::new(TEST_SUBSCRIPTION, "rg1", "apim1");
        let _get = server
            .mock("GET", id.to_string().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"missing"}}"#)
            .create_async()
            .await;

        let err = data_source(&server.url())
            .read_service(&Context::new(), &config())
            .await
            .unwrap_err();
        assert_eq!(err.summary, "Not found");
        assert!(err.detail.contains(&id.to_string()));
    }
}
