//! Azure API Management provider
//!
//! [`ApiManagementProvider`] builds one ARM [`api::Client`] in `configure`
//! and hands it to every resource and data source through
//! [`ApiManagementProviderData`].

pub mod api;
pub mod config;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use provider_data::ApiManagementProviderData;

use api::{ClientSecretCredential, StaticTokenCredential, TokenCredential};
use async_trait::async_trait;
use config::ApiManagementFeatures;
use resources::identity_provider::IdentityProviderKind;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetaSchemaRequest, ProviderMetaSchemaResponse, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    StopProviderRequest, StopProviderResponse, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue, ServerCapabilities};
use tfplug::{DataSourceWithConfigure, ManagedResource, ObjectReader};

pub const PROVIDER_TYPE_NAME: &str = "azurerm";

#[derive(Default)]
pub struct ApiManagementProvider;

impl ApiManagementProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Configured value, else the environment variable. Empty strings count as
/// unset in both places.
fn setting(reader: &ObjectReader, name: &str, env_var: &str) -> Result<Option<String>, Diagnostic> {
    if let Some(value) = reader.non_empty_string(name)? {
        return Ok(Some(value));
    }
    Ok(std::env::var(env_var).ok().filter(|v| !v.is_empty()))
}

fn required_setting(reader: &ObjectReader, name: &str, env_var: &str) -> Result<String, Diagnostic> {
    setting(reader, name, env_var)?.ok_or_else(|| {
        Diagnostic::error(
            format!("{} is required", name),
            format!("set {} in the provider block or the {} environment variable", name, env_var),
        )
        .with_attribute(AttributePath::new(name))
    })
}

fn parse_features(reader: &ObjectReader) -> Result<ApiManagementFeatures, Diagnostic> {
    let mut features = ApiManagementFeatures::default();
    let Some(block) = reader.block("features")? else {
        return Ok(features);
    };
    if let Some(apim) = block.block("api_management")? {
        features.purge_soft_delete_on_destroy =
            apim.bool_or("purge_soft_delete_on_destroy", features.purge_soft_delete_on_destroy)?;
        features.recover_soft_deleted =
            apim.bool_or("recover_soft_deleted", features.recover_soft_deleted)?;
    }
    Ok(features)
}

fn build_credential(
    reader: &ObjectReader,
    endpoint: &str,
) -> Result<Arc<dyn TokenCredential>, Diagnostic> {
    if let Some(token) = setting(reader, "access_token", config::ENV_ACCESS_TOKEN)? {
        tracing::debug!("Authenticating with a static access token");
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }

    let tenant_id = required_setting(reader, "tenant_id", config::ENV_TENANT_ID)?;
    let client_id = required_setting(reader, "client_id", config::ENV_CLIENT_ID)?;
    let client_secret = required_setting(reader, "client_secret", config::ENV_CLIENT_SECRET)?;
    let authority_host = setting(reader, "authority_host", config::ENV_AUTHORITY_HOST)?
        .unwrap_or_else(|| config::DEFAULT_AUTHORITY_HOST.to_string());

    tracing::debug!("Authenticating as client {} in tenant {}", client_id, tenant_id);
    Ok(Arc::new(ClientSecretCredential::new(
        reqwest::Client::new(),
        &authority_host,
        &tenant_id,
        client_id,
        client_secret,
        endpoint,
    )))
}

fn build_provider_data(config: &DynamicValue) -> Result<ApiManagementProviderData, Diagnostic> {
    let reader = ObjectReader::new(config);
    let subscription_id = required_setting(&reader, "subscription_id", config::ENV_SUBSCRIPTION_ID)?;
    let endpoint = setting(
        &reader,
        "resource_manager_endpoint",
        config::ENV_RESOURCE_MANAGER_ENDPOINT,
    )?
    .unwrap_or_else(|| config::DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string());
    let features = parse_features(&reader)?;

    let credential = build_credential(&reader, &endpoint)?;
    let client = api::Client::new(&endpoint, &subscription_id, credential)
        .map_err(|e| Diagnostic::error("Failed to create API client", e.to_string()))?;

    tracing::info!(
        "Configured API Management provider for subscription {} against {}",
        subscription_id,
        endpoint
    );
    Ok(ApiManagementProviderData::new(client, features))
}

#[async_trait]
impl Provider for ApiManagementProvider {
    fn type_name(&self) -> &str {
        PROVIDER_TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let optional = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .optional()
                .description(description)
                .build()
        };
        let secret = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .optional()
                .sensitive()
                .description(description)
                .build()
        };
        let feature_flag = |name: &str| {
            AttributeBuilder::new(name, AttributeType::Bool)
                .optional()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .attribute(optional("subscription_id", "Azure subscription ID. Falls back to ARM_SUBSCRIPTION_ID"))
            .attribute(optional("tenant_id", "Azure AD tenant ID. Falls back to ARM_TENANT_ID"))
            .attribute(optional("client_id", "Service principal client ID. Falls back to ARM_CLIENT_ID"))
            .attribute(secret("client_secret", "Service principal secret. Falls back to ARM_CLIENT_SECRET"))
            .attribute(secret("access_token", "Static bearer token. Falls back to ARM_ACCESS_TOKEN"))
            .attribute(optional(
                "resource_manager_endpoint",
                "Resource Manager endpoint. Falls back to ARM_RESOURCE_MANAGER_ENDPOINT",
            ))
            .attribute(optional("authority_host", "Azure AD authority. Falls back to ARM_AUTHORITY_HOST"))
            .block(
                NestedBlockBuilder::list("features")
                    .max_items(1)
                    .block(
                        NestedBlockBuilder::list("api_management")
                            .max_items(1)
                            .attribute(feature_flag("purge_soft_delete_on_destroy"))
                            .attribute(feature_flag("recover_soft_deleted"))
                            .build(),
                    )
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn meta_schema(
        &self,
        _ctx: Context,
        _request: ProviderMetaSchemaRequest,
    ) -> ProviderMetaSchemaResponse {
        ProviderMetaSchemaResponse {
            schema: None,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        match build_provider_data(&request.config) {
            Ok(data) => ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
            },
            Err(diag) => ConfigureProviderResponse {
                diagnostics: vec![diag],
                provider_data: None,
            },
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let reader = ObjectReader::new(&request.config);
        let mut diagnostics = Vec::new();
        if let Ok(Some(endpoint)) = reader.non_empty_string("resource_manager_endpoint") {
            if url::Url::parse(&endpoint).is_err() {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid resource_manager_endpoint",
                        format!("{} is not a valid URL", endpoint),
                    )
                    .with_attribute(AttributePath::new("resource_manager_endpoint")),
                );
            }
        }
        ValidateProviderConfigResponse { diagnostics }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "azurerm_api_management".to_string(),
            Box::new(|| Box::new(resources::ServiceResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_api".to_string(),
            Box::new(|| Box::new(resources::ApiResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_api_diagnostic".to_string(),
            Box::new(|| Box::new(resources::ApiDiagnosticResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_backend".to_string(),
            Box::new(|| Box::new(resources::BackendResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_logger".to_string(),
            Box::new(|| Box::new(resources::LoggerResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_named_value".to_string(),
            Box::new(|| Box::new(resources::NamedValueResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_workspace".to_string(),
            Box::new(|| Box::new(resources::WorkspaceResource::new()) as Box<dyn ManagedResource>),
        );
        factories.insert(
            "azurerm_api_management_subscription".to_string(),
            Box::new(|| Box::new(resources::SubscriptionResource::new()) as Box<dyn ManagedResource>),
        );
        for kind in IdentityProviderKind::ALL {
            factories.insert(
                kind.type_name().to_string(),
                Box::new(move || {
                    Box::new(resources::IdentityProviderResource::new(kind)) as Box<dyn ManagedResource>
                }),
            );
        }
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "azurerm_api_management".to_string(),
            Box::new(|| Box::new(data_sources::ServiceDataSource::new()) as Box<dyn DataSourceWithConfigure>),
        );
        factories.insert(
            "azurerm_api_management_api".to_string(),
            Box::new(|| Box::new(data_sources::ApiDataSource::new()) as Box<dyn DataSourceWithConfigure>),
        );
        factories.insert(
            "azurerm_api_management_subscription".to_string(),
            Box::new(|| {
                Box::new(data_sources::SubscriptionDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::ClientCapabilities;
    use tfplug::{DataSource, ObjectBuilder, Resource};

    const ENV_VARS: [&str; 7] = [
        config::ENV_SUBSCRIPTION_ID,
        config::ENV_TENANT_ID,
        config::ENV_CLIENT_ID,
        config::ENV_CLIENT_SECRET,
        config::ENV_ACCESS_TOKEN,
        config::ENV_RESOURCE_MANAGER_ENDPOINT,
        config::ENV_AUTHORITY_HOST,
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    async fn configure(config: DynamicValue) -> ConfigureProviderResponse {
        ApiManagementProvider::new()
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    fn provider_data(response: &ConfigureProviderResponse) -> &ApiManagementProviderData {
        response
            .provider_data
            .as_ref()
            .unwrap()
            .downcast_ref::<ApiManagementProviderData>()
            .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn configures_from_env_vars() {
        clear_env();
        std::env::set_var(config::ENV_SUBSCRIPTION_ID, "sub-from-env");
        std::env::set_var(config::ENV_TENANT_ID, "tenant");
        std::env::set_var(config::ENV_CLIENT_ID, "client");
        std::env::set_var(config::ENV_CLIENT_SECRET, "secret");

        let response = configure(ObjectBuilder::new().into_value()).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let data = provider_data(&response);
        assert_eq!(data.client.subscription_id(), "sub-from-env");
        assert_eq!(data.features, ApiManagementFeatures::default());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn config_takes_precedence_over_env() {
        clear_env();
        std::env::set_var(config::ENV_SUBSCRIPTION_ID, "sub-from-env");

        let config = ObjectBuilder::new()
            .string("subscription_id", "sub-from-config")
            .string("access_token", "token")
            .into_value();
        let response = configure(config).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(provider_data(&response).client.subscription_id(), "sub-from-config");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn missing_subscription_is_reported() {
        clear_env();

        let config = ObjectBuilder::new().string("access_token", "token").into_value();
        let response = configure(config).await;
        assert!(response.provider_data.is_none());
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "subscription_id is required");
        assert!(response.diagnostics[0].detail.contains("ARM_SUBSCRIPTION_ID"));
    }

    #[tokio::test]
    #[serial]
    async fn client_secret_required_without_access_token() {
        clear_env();

        let config = ObjectBuilder::new()
            .string("subscription_id", "sub")
            .string("tenant_id", "tenant")
            .string("client_id", "client")
            .into_value();
        let response = configure(config).await;
        assert!(response.provider_data.is_none());
        assert_eq!(response.diagnostics[0].summary, "client_secret is required");
    }

    #[tokio::test]
    #[serial]
    async fn reads_feature_flags() {
        clear_env();

        let config = ObjectBuilder::new()
            .string("subscription_id", "sub")
            .string("access_token", "token")
            .block(
                "features",
                Some(ObjectBuilder::new().block(
                    "api_management",
                    Some(ObjectBuilder::new().bool("purge_soft_delete_on_destroy", false)),
                )),
            )
            .into_value();
        let response = configure(config).await;
        let features = provider_data(&response).features;
        assert!(!features.purge_soft_delete_on_destroy);
        assert!(features.recover_soft_deleted);
    }

    #[tokio::test]
    async fn validate_rejects_bad_endpoint() {
        let response = ApiManagementProvider::new()
            .validate(
                Context::new(),
                ValidateProviderConfigRequest {
                    config: ObjectBuilder::new()
                        .string("resource_manager_endpoint", "not a url")
                        .into_value(),
                },
            )
            .await;
        assert_eq!(response.diagnostics.len(), 1);
    }

    #[test]
    fn registers_every_handler() {
        let provider = ApiManagementProvider::new();
        let resources = provider.resources();
        assert_eq!(resources.len(), 13);
        for name in [
            "azurerm_api_management",
            "azurerm_api_management_api",
            "azurerm_api_management_identity_provider_aad",
            "azurerm_api_management_identity_provider_twitter",
            "azurerm_api_management_workspace",
        ] {
            assert!(resources.contains_key(name), "{} missing", name);
        }
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name);
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 3);
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name);
        }
    }
}
