//! gRPC service for Terraform Plugin Protocol 6
//!
//! [`GrpcProviderServer`] decodes each request, hands it to a shared
//! [`ProviderHost`] and encodes the answer. Handler failures travel back as
//! diagnostics; only undecodable payloads become gRPC errors.

use crate::context::Context;
use crate::host::ProviderHost;
use crate::proto::{self, ProviderServer, ProviderService};
use crate::provider::Provider;
use crate::types::DynamicValue;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct GrpcProviderServer<P: Provider> {
    host: Arc<ProviderHost<P>>,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        Self::from_host(Arc::new(ProviderHost::new(provider)))
    }

    pub fn from_host(host: Arc<ProviderHost<P>>) -> Self {
        Self { host }
    }

    pub fn into_service(self) -> ProviderServer<Self> {
        ProviderServer::new(self)
    }
}

#[allow(clippy::result_large_err)]
fn decode(value: Option<&proto::DynamicValue>, field: &str) -> Result<DynamicValue, Status> {
    proto::decode_value(value)
        .map_err(|e| Status::invalid_argument(format!("Failed to decode {}: {}", field, e)))
}

#[allow(clippy::result_large_err)]
fn encode(value: &DynamicValue) -> Result<proto::DynamicValue, Status> {
    proto::encode_value(value).map_err(|e| Status::internal(format!("Failed to encode msgpack: {}", e)))
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        tracing::debug!("GetMetadata");
        let ctx = Context::new();
        let (resources, data_sources) = self.host.type_names().await;
        let capabilities = self.host.server_capabilities(&ctx).await;

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some((&capabilities).into()),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        tracing::debug!("GetProviderSchema");
        let ctx = Context::new();
        let schemas = self.host.schemas(&ctx).await;
        let capabilities = self.host.server_capabilities(&ctx).await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some((&schemas.provider).into()),
            resource_schemas: schemas
                .resources
                .iter()
                .map(|(name, schema)| (name.clone(), schema.into()))
                .collect(),
            data_source_schemas: schemas
                .data_sources
                .iter()
                .map(|(name, schema)| (name.clone(), schema.into()))
                .collect(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some((&capabilities).into()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let request = request.into_inner();
        let config = decode(request.config.as_ref(), "config")?;
        let diagnostics = self
            .host
            .validate_provider_config(&Context::new(), &config)
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: proto::diagnostics(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "ValidateResourceConfig");
        let config = decode(request.config.as_ref(), "config")?;
        let diagnostics = self
            .host
            .validate_resource_config(&Context::new(), &request.type_name, &config)
            .await;

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: proto::diagnostics(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "ValidateDataResourceConfig");
        let config = decode(request.config.as_ref(), "config")?;
        let diagnostics = self
            .host
            .validate_data_source_config(&Context::new(), &request.type_name, &config)
            .await;

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: proto::diagnostics(&diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, version = request.version, "UpgradeResourceState");

        // Flatmap states predate protocol 6; only the JSON form is accepted.
        let raw_state = match request.raw_state.as_ref().map(|raw| raw.json.as_slice()) {
            Some(json) if !json.is_empty() => DynamicValue::decode_json(json)
                .map_err(|e| Status::invalid_argument(format!("Failed to decode raw_state: {}", e)))?,
            _ => DynamicValue::null(),
        };

        let response = match self
            .host
            .upgrade_resource_state(&Context::new(), &request.type_name, request.version, raw_state)
            .await
        {
            Ok(upgraded) => proto::upgrade_resource_state::Response {
                upgraded_state: Some(encode(&upgraded)?),
                diagnostics: vec![],
            },
            Err(diagnostics) => proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: proto::diagnostics(&diagnostics),
            },
        };
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let request = request.into_inner();
        tracing::info!(terraform_version = %request.terraform_version, "ConfigureProvider");
        let config = decode(request.config.as_ref(), "config")?;
        let diagnostics = self
            .host
            .configure_with_version(&Context::new(), request.terraform_version, config)
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: proto::diagnostics(&diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "ReadResource");
        let current_state = decode(request.current_state.as_ref(), "current_state")?;
        let response = self
            .host
            .read_resource(&Context::new(), &request.type_name, &current_state)
            .await;

        let new_state = response.new_state.unwrap_or_else(DynamicValue::null);
        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode(&new_state)?),
            diagnostics: proto::diagnostics(&response.diagnostics),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "PlanResourceChange");
        let prior_state = decode(request.prior_state.as_ref(), "prior_state")?;
        let config = decode(request.config.as_ref(), "config")?;

        let response = match self
            .host
            .plan_resource_change(&Context::new(), &request.type_name, &prior_state, &config)
            .await
        {
            Ok(change) => proto::plan_resource_change::Response {
                planned_state: Some(encode(&change.planned_state)?),
                requires_replace: change.requires_replace.iter().map(Into::into).collect(),
                planned_private: request.prior_private,
                diagnostics: proto::diagnostics(&change.diagnostics),
                legacy_type_system: false,
            },
            Err(diagnostics) => proto::plan_resource_change::Response {
                planned_state: None,
                requires_replace: vec![],
                planned_private: vec![],
                diagnostics: proto::diagnostics(&diagnostics),
                legacy_type_system: false,
            },
        };
        Ok(Response::new(response))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "ApplyResourceChange");
        let prior_state = decode(request.prior_state.as_ref(), "prior_state")?;
        let planned_state = decode(request.planned_state.as_ref(), "planned_state")?;
        let config = decode(request.config.as_ref(), "config")?;

        let result = self
            .host
            .apply_resource_change(
                &Context::new(),
                &request.type_name,
                &prior_state,
                &planned_state,
                &config,
            )
            .await;

        let new_state = result.new_state.unwrap_or_else(DynamicValue::null);
        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode(&new_state)?),
            private: request.planned_private,
            diagnostics: proto::diagnostics(&result.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, id = %request.id, "ImportResourceState");
        let response = self
            .host
            .import_resource_state(&Context::new(), &request.type_name, &request.id)
            .await;

        let imported_resources = response
            .imported_resources
            .into_iter()
            .map(|imported| {
                Ok(proto::import_resource_state::ImportedResource {
                    type_name: imported.type_name,
                    state: Some(encode(&imported.state)?),
                    private: imported.private,
                })
            })
            .collect::<Result<Vec<_>, Status>>()?;

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: proto::diagnostics(&response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let request = request.into_inner();
        tracing::debug!(type_name = %request.type_name, "ReadDataSource");
        let config = decode(request.config.as_ref(), "config")?;
        let response = self
            .host
            .read_data_source(&Context::new(), &request.type_name, &config)
            .await;

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode(&response.state)?),
            diagnostics: proto::diagnostics(&response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("StopProvider");
        let error = self.host.stop(&Context::new()).await;
        Ok(Response::new(proto::stop_provider::Response {
            error: error.unwrap_or_default(),
        }))
    }
}
