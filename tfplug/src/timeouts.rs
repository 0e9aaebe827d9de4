//! Per-operation timeouts
//!
//! Each resource declares default create/read/update/delete durations and
//! exposes an optional `timeouts` block so users can override them with
//! Terraform duration strings (`"45m"`, `"1h30m"`, `"90s"`).

use crate::error::{Result, TfplugError};
use crate::object::ObjectReader;
use crate::schema::{
    AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, Validator, ValidatorRequest,
    ValidatorResponse,
};
use crate::types::{Diagnostic, DynamicValue};
use std::fmt;
use std::time::Duration;

pub const TIMEOUTS_BLOCK: &str = "timeouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Applies overrides from the `timeouts` block of a config or state value.
    pub fn with_overrides(mut self, value: &DynamicValue) -> std::result::Result<Self, Diagnostic> {
        let reader = ObjectReader::new(value);
        let Some(block) = reader.block(TIMEOUTS_BLOCK)? else {
            return Ok(self);
        };

        for operation in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            let Some(raw) = block.non_empty_string(operation.as_str())? else {
                continue;
            };
            let parsed = parse_duration(&raw).map_err(|e| {
                Diagnostic::error("Invalid timeout", e.to_string())
                    .with_attribute(block.path().clone().attribute(operation.as_str()))
            })?;
            match operation {
                Operation::Create => self.create = parsed,
                Operation::Read => self.read = parsed,
                Operation::Update => self.update = parsed,
                Operation::Delete => self.delete = parsed,
            }
        }
        Ok(self)
    }
}

/// Schema for the optional `timeouts` block.
pub fn timeouts_block() -> NestedBlock {
    let attribute = |name: &str| {
        AttributeBuilder::new(name, AttributeType::String)
            .optional()
            .validator(Box::new(DurationString))
            .build()
    };

    NestedBlockBuilder::list(TIMEOUTS_BLOCK)
        .max_items(1)
        .attribute(attribute("create"))
        .attribute(attribute("read"))
        .attribute(attribute("update"))
        .attribute(attribute("delete"))
        .build()
}

/// Parses `<number><unit>` sequences with units `h`, `m`, `s` and `ms`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |reason: &str| TfplugError::InvalidDuration(input.to_string(), reason.to_string());

    if input.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("missing unit"))?;
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid("number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += match unit {
            "h" => Duration::from_secs(amount * 3600),
            "m" => Duration::from_secs(amount * 60),
            "s" => Duration::from_secs(amount),
            "ms" => Duration::from_millis(amount),
            _ => return Err(invalid("unknown unit")),
        };
    }
    Ok(total)
}

struct DurationString;

impl Validator for DurationString {
    fn description(&self) -> String {
        "must be a duration such as \"30m\" or \"1h30m\"".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let diagnostics = match request.config_value.value.as_str().map(parse_duration) {
            Some(Err(e)) => vec![Diagnostic::error("Invalid timeout", e.to_string())
                .with_attribute(request.path)],
            _ => Vec::new(),
        };
        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::object::ObjectBuilder;

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["", "30", "m", "5d", "1h-2m"] {
            assert!(parse_duration(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn overrides_only_configured_operations() {
        let config = ObjectBuilder::new()
            .block(
                TIMEOUTS_BLOCK,
                Some(ObjectBuilder::new().string("create", "2h").value("read", crate::types::Dynamic::Null)),
            )
            .into_value();

        let timeouts = Timeouts::minutes(30, 5, 30, 30).with_overrides(&config).unwrap();

        assert_eq!(timeouts.create, Duration::from_secs(7200));
        assert_eq!(timeouts.get(Operation::Read), Duration::from_secs(300));
    }

    #[test]
    fn bad_override_is_attribute_scoped() {
        let config = ObjectBuilder::new()
            .block(TIMEOUTS_BLOCK, Some(ObjectBuilder::new().string("delete", "soon")))
            .into_value();

        let diag = Timeouts::minutes(1, 1, 1, 1).with_overrides(&config).unwrap_err();
        assert_eq!(diag.attribute.unwrap().to_string(), "timeouts[0].delete");
    }
}
