//! In-process provider host
//!
//! [`ProviderHost`] drives a [`Provider`] the way Terraform core does over
//! the plugin protocol: configure once, then for every request build a
//! fresh resource from its factory, hand it the provider data and dispatch.
//! Apply picks create, update or delete from the prior and planned states.
//! The gRPC service in [`crate::grpc`] is a thin layer over this type.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::plan::{plan_resource_change, validate_config, PlannedChange};
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderMetadataRequest, ProviderSchemaRequest,
    StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ImportResourceStateResponse, ManagedResource,
    ReadResourceRequest, ReadResourceResponse, ResourceSchemaRequest, UpdateResourceRequest,
    ValidateResourceConfigRequest,
};
use crate::data_source::DataSourceWithConfigure;
use crate::schema::{Block, Schema};
use crate::types::{
    has_errors, ClientCapabilities, Diagnostic, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct ProviderHost<P: Provider> {
    provider: RwLock<P>,
    provider_data: RwLock<Option<Arc<dyn Any + Send + Sync>>>,
}

/// Outcome of an apply; `new_state: None` after a successful delete.
pub struct ApplyResult {
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderSchemas {
    pub provider: Schema,
    pub resources: BTreeMap<String, Schema>,
    pub data_sources: BTreeMap<String, Schema>,
}

impl<P: Provider> ProviderHost<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: RwLock::new(provider),
            provider_data: RwLock::new(None),
        }
    }

    pub async fn schemas(&self, ctx: &Context) -> ProviderSchemas {
        let provider = self.provider.read().await;
        let provider_schema = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await
            .schema;

        let mut resources = BTreeMap::new();
        for (name, factory) in provider.resources() {
            let schema = factory().schema(ctx.clone(), ResourceSchemaRequest).await.schema;
            resources.insert(name, schema);
        }

        let mut data_sources = BTreeMap::new();
        for (name, factory) in provider.data_sources() {
            let schema = factory()
                .schema(ctx.clone(), DataSourceSchemaRequest)
                .await
                .schema;
            data_sources.insert(name, schema);
        }

        ProviderSchemas {
            provider: provider_schema,
            resources,
            data_sources,
        }
    }

    /// Resource and data source type names, without building their schemas.
    pub async fn type_names(&self) -> (Vec<String>, Vec<String>) {
        let provider = self.provider.read().await;
        let mut resources: Vec<String> = provider.resources().into_keys().collect();
        let mut data_sources: Vec<String> = provider.data_sources().into_keys().collect();
        resources.sort();
        data_sources.sort();
        (resources, data_sources)
    }

    pub async fn server_capabilities(&self, ctx: &Context) -> ServerCapabilities {
        let provider = self.provider.read().await;
        provider
            .metadata(ctx.clone(), ProviderMetadataRequest)
            .await
            .server_capabilities
    }

    pub async fn validate_provider_config(&self, ctx: &Context, config: &DynamicValue) -> Vec<Diagnostic> {
        let provider = self.provider.read().await;
        validate_provider(&*provider, ctx, config).await
    }

    pub async fn configure(&self, ctx: &Context, config: DynamicValue) -> Vec<Diagnostic> {
        self.configure_with_version(ctx, String::new(), config).await
    }

    pub async fn configure_with_version(
        &self,
        ctx: &Context,
        terraform_version: String,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let mut provider = self.provider.write().await;

        let mut diagnostics = validate_provider(&*provider, ctx, &config).await;
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let response = provider
            .configure(
                ctx.clone(),
                ConfigureProviderRequest {
                    terraform_version,
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);
        *self.provider_data.write().await = response.provider_data;
        diagnostics
    }

    pub async fn stop(&self, ctx: &Context) -> Option<String> {
        let provider = self.provider.read().await;
        provider.stop(ctx.clone(), StopProviderRequest).await.error
    }

    async fn resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn ManagedResource>, Vec<Diagnostic>> {
        let factory_output = {
            let provider = self.provider.read().await;
            provider.resources().get(type_name).map(|factory| factory())
        };
        let Some(mut resource) = factory_output else {
            let err = TfplugError::ResourceNotFound(type_name.to_string());
            return Err(vec![Diagnostic::error("Unknown resource type", err.to_string())]);
        };

        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(resource)
    }

    async fn data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory_output = {
            let provider = self.provider.read().await;
            provider.data_sources().get(type_name).map(|factory| factory())
        };
        let Some(mut data_source) = factory_output else {
            let err = TfplugError::DataSourceNotFound(type_name.to_string());
            return Err(vec![Diagnostic::error("Unknown data source type", err.to_string())]);
        };

        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }
        Ok(data_source)
    }

    pub async fn validate_resource_config(
        &self,
        ctx: &Context,
        type_name: &str,
        config: &DynamicValue,
    ) -> Vec<Diagnostic> {
        let resource = match self.resource(ctx, type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => return diagnostics,
        };

        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await.schema;
        let mut diagnostics = validate_config(&schema, config);
        if has_errors(&diagnostics) {
            return diagnostics;
        }
        diagnostics.extend(
            resource
                .validate(
                    ctx.clone(),
                    ValidateResourceConfigRequest {
                        type_name: type_name.to_string(),
                        config: config.clone(),
                        client_capabilities: ClientCapabilities::default(),
                    },
                )
                .await
                .diagnostics,
        );
        diagnostics
    }

    pub async fn validate_data_source_config(
        &self,
        ctx: &Context,
        type_name: &str,
        config: &DynamicValue,
    ) -> Vec<Diagnostic> {
        let data_source = match self.data_source(ctx, type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => return diagnostics,
        };

        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let mut diagnostics = validate_config(&schema, config);
        if has_errors(&diagnostics) {
            return diagnostics;
        }
        diagnostics.extend(
            data_source
                .validate(
                    ctx.clone(),
                    ValidateDataSourceConfigRequest {
                        type_name: type_name.to_string(),
                        config: config.clone(),
                    },
                )
                .await
                .diagnostics,
        );
        diagnostics
    }

    /// Brings stored state forward to the current schema. Every schema is at
    /// version 0, so this only drops attributes the schema no longer has.
    pub async fn upgrade_resource_state(
        &self,
        ctx: &Context,
        type_name: &str,
        version: i64,
        raw_state: DynamicValue,
    ) -> Result<DynamicValue, Vec<Diagnostic>> {
        let resource = self.resource(ctx, type_name).await?;
        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await.schema;
        if version > schema.version {
            return Err(vec![Diagnostic::error(
                "Unsupported state version",
                format!(
                    "{} state is at version {}, newer than the schema version {}",
                    type_name, version, schema.version
                ),
            )]);
        }
        Ok(DynamicValue::new(conform_to_block(&schema.block, raw_state.value)))
    }

    pub async fn plan_resource_change(
        &self,
        ctx: &Context,
        type_name: &str,
        prior_state: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<PlannedChange, Vec<Diagnostic>> {
        let resource = self.resource(ctx, type_name).await?;
        let schema = resource.schema(ctx.clone(), ResourceSchemaRequest).await.schema;
        let change = plan_resource_change(&schema, prior_state, config);
        if has_errors(&change.diagnostics) {
            return Err(change.diagnostics);
        }
        Ok(change)
    }

    pub async fn apply_resource_change(
        &self,
        ctx: &Context,
        type_name: &str,
        prior_state: &DynamicValue,
        planned_state: &DynamicValue,
        config: &DynamicValue,
    ) -> ApplyResult {
        let resource = match self.resource(ctx, type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ApplyResult {
                    new_state: None,
                    diagnostics,
                }
            }
        };

        match (prior_state.is_null(), planned_state.is_null()) {
            (true, false) => {
                tracing::debug!("Applying create for {}", type_name);
                let response = resource
                    .create(
                        ctx.clone(),
                        CreateResourceRequest {
                            type_name: type_name.to_string(),
                            planned_state: planned_state.clone(),
                            config: config.clone(),
                            planned_private: Vec::new(),
                            provider_meta: None,
                        },
                    )
                    .await;
                let failed = has_errors(&response.diagnostics);
                ApplyResult {
                    new_state: (!failed || !response.new_state.is_null())
                        .then_some(response.new_state),
                    diagnostics: response.diagnostics,
                }
            }
            (false, true) => {
                tracing::debug!("Applying delete for {}", type_name);
                let response = resource
                    .delete(
                        ctx.clone(),
                        DeleteResourceRequest {
                            type_name: type_name.to_string(),
                            prior_state: prior_state.clone(),
                            planned_private: Vec::new(),
                            provider_meta: None,
                        },
                    )
                    .await;
                let failed = has_errors(&response.diagnostics);
                ApplyResult {
                    new_state: failed.then(|| prior_state.clone()),
                    diagnostics: response.diagnostics,
                }
            }
            (false, false) => {
                tracing::debug!("Applying update for {}", type_name);
                let response = resource
                    .update(
                        ctx.clone(),
                        UpdateResourceRequest {
                            type_name: type_name.to_string(),
                            prior_state: prior_state.clone(),
                            planned_state: planned_state.clone(),
                            config: config.clone(),
                            planned_private: Vec::new(),
                            provider_meta: None,
                        },
                    )
                    .await;
                let failed = has_errors(&response.diagnostics);
                ApplyResult {
                    new_state: Some(if failed {
                        prior_state.clone()
                    } else {
                        response.new_state
                    }),
                    diagnostics: response.diagnostics,
                }
            }
            (true, true) => ApplyResult {
                new_state: None,
                diagnostics: Vec::new(),
            },
        }
    }

    /// Validate, plan and apply in one step. A plan that requires replacement
    /// deletes the old object before creating the new one.
    pub async fn apply(
        &self,
        ctx: &Context,
        type_name: &str,
        prior_state: &DynamicValue,
        config: &DynamicValue,
    ) -> ApplyResult {
        if !config.is_null() {
            let diagnostics = self.validate_resource_config(ctx, type_name, config).await;
            if has_errors(&diagnostics) {
                return ApplyResult {
                    new_state: (!prior_state.is_null()).then(|| prior_state.clone()),
                    diagnostics,
                };
            }
        }

        let change = match self
            .plan_resource_change(ctx, type_name, prior_state, config)
            .await
        {
            Ok(change) => change,
            Err(diagnostics) => {
                return ApplyResult {
                    new_state: (!prior_state.is_null()).then(|| prior_state.clone()),
                    diagnostics,
                }
            }
        };

        if change.requires_replace() {
            let destroyed = self
                .apply_resource_change(ctx, type_name, prior_state, &DynamicValue::null(), &DynamicValue::null())
                .await;
            if has_errors(&destroyed.diagnostics) {
                return destroyed;
            }
            let fresh = plan_resource_change_for_create(self, ctx, type_name, config).await;
            return match fresh {
                Ok(planned) => {
                    self.apply_resource_change(ctx, type_name, &DynamicValue::null(), &planned, config)
                        .await
                }
                Err(diagnostics) => ApplyResult {
                    new_state: None,
                    diagnostics,
                },
            };
        }

        self.apply_resource_change(ctx, type_name, prior_state, &change.planned_state, config)
            .await
    }

    pub async fn read_resource(
        &self,
        ctx: &Context,
        type_name: &str,
        current_state: &DynamicValue,
    ) -> ReadResourceResponse {
        let resource = match self.resource(ctx, type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ReadResourceResponse {
                    new_state: Some(current_state.clone()),
                    diagnostics,
                    private: Vec::new(),
                    deferred: None,
                }
            }
        };

        resource
            .read(
                ctx.clone(),
                ReadResourceRequest {
                    type_name: type_name.to_string(),
                    current_state: current_state.clone(),
                    private: Vec::new(),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    pub async fn import_resource_state(
        &self,
        ctx: &Context,
        type_name: &str,
        id: &str,
    ) -> ImportResourceStateResponse {
        let resource = match self.resource(ctx, type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ImportResourceStateResponse {
                    diagnostics,
                    ..Default::default()
                }
            }
        };

        resource
            .import_state(
                ctx.clone(),
                ImportResourceStateRequest {
                    type_name: type_name.to_string(),
                    id: id.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    pub async fn read_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
        config: &DynamicValue,
    ) -> ReadDataSourceResponse {
        let data_source = match self.data_source(ctx, type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                }
            }
        };

        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;
        let diagnostics = validate_config(&schema, config);
        if has_errors(&diagnostics) {
            return ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics,
                deferred: None,
            };
        }

        data_source
            .read(
                ctx.clone(),
                ReadDataSourceRequest {
                    type_name: type_name.to_string(),
                    config: config.clone(),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }
}

async fn validate_provider<P: Provider>(
    provider: &P,
    ctx: &Context,
    config: &DynamicValue,
) -> Vec<Diagnostic> {
    let schema = provider
        .schema(ctx.clone(), ProviderSchemaRequest)
        .await
        .schema;
    let mut diagnostics = validate_config(&schema, config);
    diagnostics.extend(
        provider
            .validate(
                ctx.clone(),
                ValidateProviderConfigRequest {
                    config: config.clone(),
                },
            )
            .await
            .diagnostics,
    );
    diagnostics
}

fn conform_to_block(block: &Block, value: Dynamic) -> Dynamic {
    let Dynamic::Map(mut fields) = value else {
        return value;
    };
    fields.retain(|name, _| block.has_field(name));
    for nested in &block.block_types {
        if let Some(items) = fields.remove(&nested.type_name) {
            let conformed = match items {
                Dynamic::List(items) => Dynamic::List(
                    items
                        .into_iter()
                        .map(|item| conform_to_block(&nested.block, item))
                        .collect(),
                ),
                other => conform_to_block(&nested.block, other),
            };
            fields.insert(nested.type_name.clone(), conformed);
        }
    }
    Dynamic::Map(fields)
}

async fn plan_resource_change_for_create<P: Provider>(
    host: &ProviderHost<P>,
    ctx: &Context,
    type_name: &str,
    config: &DynamicValue,
) -> Result<DynamicValue, Vec<Diagnostic>> {
    host.plan_resource_change(ctx, type_name, &DynamicValue::null(), config)
        .await
        .map(|change| change.planned_state)
}
