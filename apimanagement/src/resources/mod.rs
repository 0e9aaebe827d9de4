//! Managed resources

pub mod api;
pub mod api_diagnostic;
pub mod backend;
pub mod common;
pub mod identity_provider;
pub mod logger;
pub mod named_value;
pub mod service;
pub mod subscription;
pub mod workspace;

pub use api::ApiResource;
pub use api_diagnostic::ApiDiagnosticResource;
pub use backend::BackendResource;
pub use identity_provider::IdentityProviderResource;
pub use logger::LoggerResource;
pub use named_value::NamedValueResource;
pub use service::ServiceResource;
pub use subscription::SubscriptionResource;
pub use workspace::WorkspaceResource;
