//! Default values for optional attributes
//!
//! Defaults are applied during planning when an optional attribute is absent
//! from configuration. An attribute with a default is always optional and
//! computed, so the default lands in the plan and then in state.
//!
//! ```no_run
//! use tfplug::defaults::{EnvDefault, StaticDefault};
//! use tfplug::schema::{AttributeBuilder, AttributeType};
//!
//! let subscription_required = AttributeBuilder::new("subscription_required", AttributeType::Bool)
//!     .default(StaticDefault::bool(true))
//!     .build();
//!
//! let endpoint = AttributeBuilder::new("resource_manager_endpoint", AttributeType::String)
//!     .default(EnvDefault::create(
//!         "ARM_RESOURCE_MANAGER_ENDPOINT",
//!         "https://management.azure.com",
//!     ))
//!     .build();
//! ```

use crate::schema::{DefaultRequest, DefaultResponse, DefaultValue};
use crate::types::{Dynamic, DynamicValue};
use std::env;

pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn DefaultValue> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn DefaultValue> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn DefaultValue> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn DefaultValue> {
        Self::create(Dynamic::Bool(value))
    }

    pub fn list(values: Vec<Dynamic>) -> Box<dyn DefaultValue> {
        Self::create(Dynamic::List(values))
    }
}

impl DefaultValue for StaticDefault {
    fn description(&self) -> String {
        format!("defaults to {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

/// Reads the default from an environment variable, with an optional fallback
pub struct EnvDefault {
    env_var: String,
    fallback: Option<String>,
}

impl EnvDefault {
    pub fn create(env_var: &str, fallback: &str) -> Box<dyn DefaultValue> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: Some(fallback.to_string()),
        })
    }

    /// Without a fallback the attribute stays null when the variable is unset.
    pub fn create_required(env_var: &str) -> Box<dyn DefaultValue> {
        Box::new(Self {
            env_var: env_var.to_string(),
            fallback: None,
        })
    }

    /// Empty variables count as unset.
    pub fn lookup(env_var: &str) -> Option<String> {
        env::var(env_var).ok().filter(|v| !v.is_empty())
    }
}

impl DefaultValue for EnvDefault {
    fn description(&self) -> String {
        match &self.fallback {
            Some(fallback) => format!("defaults to ${} or {:?}", self.env_var, fallback),
            None => format!("defaults to ${}", self.env_var),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        let value = Self::lookup(&self.env_var)
            .or_else(|| self.fallback.clone())
            .map_or(Dynamic::Null, Dynamic::String);

        DefaultResponse {
            value: DynamicValue::new(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;
    use serial_test::serial;

    fn resolve(default: Box<dyn DefaultValue>) -> Dynamic {
        default
            .default_value(DefaultRequest {
                path: AttributePath::new("test"),
            })
            .value
            .value
    }

    #[test]
    fn static_defaults() {
        assert_eq!(resolve(StaticDefault::string("submitted")), "submitted".into());
        assert_eq!(resolve(StaticDefault::number(5.0)), Dynamic::Number(5.0));
        assert_eq!(resolve(StaticDefault::bool(true)), Dynamic::Bool(true));
        assert_eq!(resolve(StaticDefault::list(vec![])), Dynamic::List(vec![]));
    }

    #[test]
    #[serial]
    fn env_default_uses_fallback_when_unset() {
        env::remove_var("TFPLUG_TEST_ENDPOINT");
        let default = EnvDefault::create("TFPLUG_TEST_ENDPOINT", "https://management.azure.com");

        assert_eq!(resolve(default), "https://management.azure.com".into());
    }

    #[test]
    #[serial]
    fn env_default_prefers_environment() {
        env::set_var("TFPLUG_TEST_ENDPOINT", "https://management.usgovcloudapi.net");
        let default = EnvDefault::create("TFPLUG_TEST_ENDPOINT", "https://management.azure.com");

        assert_eq!(resolve(default), "https://management.usgovcloudapi.net".into());
        env::remove_var("TFPLUG_TEST_ENDPOINT");
    }

    #[test]
    #[serial]
    fn env_default_treats_empty_as_unset() {
        env::set_var("TFPLUG_TEST_TENANT", "");
        assert_eq!(resolve(EnvDefault::create_required("TFPLUG_TEST_TENANT")), Dynamic::Null);
        env::remove_var("TFPLUG_TEST_TENANT");
    }
}
