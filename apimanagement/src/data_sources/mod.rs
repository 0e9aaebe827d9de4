//! Read-only lookups of existing API Management objects

pub mod api;
pub mod service;
pub mod subscription;

pub use api::ApiDataSource;
pub use service::ServiceDataSource;
pub use subscription::SubscriptionDataSource;

use crate::api::ApiError;
use crate::config::DATA_SOURCE_READ_TIMEOUT_MINUTES;
use crate::resources::common;
use std::fmt::Display;
use std::time::Duration;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::Diagnostic;
use tfplug::Context;

pub fn read_context(ctx: &Context) -> Context {
    ctx.with_timeout(Duration::from_secs(DATA_SOURCE_READ_TIMEOUT_MINUTES * 60))
}

/// Unlike a resource read, a missing object is an error here.
pub fn lookup<T>(id: &impl Display, result: Result<T, ApiError>) -> Result<T, Diagnostic> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_not_found() => Err(Diagnostic::error(
            "Not found",
            format!("{} was not found", id),
        )),
        Err(err) => Err(common::api_diagnostic("retrieving", id, err)),
    }
}

pub fn computed_string(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .build()
}

pub fn computed_bool(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .computed()
        .build()
}

pub fn computed_list(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::list_of(AttributeType::String))
        .computed()
        .build()
}
