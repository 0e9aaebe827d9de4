//! tfplug - Terraform plugin framework for Rust
//!
//! The value model, schema system, planning rules and the resource, data
//! source and provider traits that a provider implements. Providers are
//! driven through [`host::ProviderHost`], either in-process or behind the
//! protocol 6 gRPC service started by [`server::serve`].

// Core modules
pub mod context;
pub mod error;
pub mod object;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod plan;
pub mod plan_modifier;
pub mod timeouts;
pub mod validator;

pub mod host;

// Transport modules
pub mod grpc;
pub mod proto;
pub mod server;

pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use host::ProviderHost;
pub use import::{import_state_passthrough_id, import_state_with};
pub use object::{ObjectBuilder, ObjectReader};
pub use provider::Provider;
pub use server::{serve, serve_default, ServerConfig};
pub use resource::{ManagedResource, Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
pub use timeouts::{Operation, Timeouts};
pub use types::{Diagnostic, Dynamic, DynamicValue, PrivateStateData};
