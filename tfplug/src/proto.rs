//! Protocol buffer types for Terraform Plugin Protocol 6
//!
//! The messages and the `Provider` service are generated from
//! `proto/tfplugin6.proto` by tonic_build. Several generated types share a
//! name with framework types (`DynamicValue`, `Diagnostic`, `Schema`,
//! `AttributePath`); inside this module the bare names are the wire types
//! and the framework ones are reached through `fw` and `fw_schema`.
//!
//! The conversions below are the only place wire and framework types meet.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

use crate::error::Result;
use crate::schema as fw_schema;
use crate::types as fw;
use serde_json::{json, Map, Value};

/// msgpack wins when both encodings are set; neither means null.
pub fn decode_value(value: Option<&DynamicValue>) -> Result<fw::DynamicValue> {
    match value {
        Some(v) if !v.msgpack.is_empty() => fw::DynamicValue::decode_msgpack(&v.msgpack),
        Some(v) if !v.json.is_empty() => fw::DynamicValue::decode_json(&v.json),
        _ => Ok(fw::DynamicValue::null()),
    }
}

pub fn encode_value(value: &fw::DynamicValue) -> Result<DynamicValue> {
    Ok(DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: Vec::new(),
    })
}

/// Terraform's JSON type constraint for an attribute type.
pub fn type_constraint(attr_type: &fw_schema::AttributeType) -> Value {
    use fw_schema::AttributeType;

    match attr_type {
        AttributeType::String => json!("string"),
        AttributeType::Number => json!("number"),
        AttributeType::Bool => json!("bool"),
        AttributeType::List(elem) => json!(["list", type_constraint(elem)]),
        AttributeType::Set(elem) => json!(["set", type_constraint(elem)]),
        AttributeType::Map(elem) => json!(["map", type_constraint(elem)]),
        AttributeType::Object(fields) => {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(name, t)| (name.clone(), type_constraint(t)))
                .collect();
            json!(["object", fields])
        }
    }
}

impl From<&fw::AttributePath> for AttributePath {
    fn from(path: &fw::AttributePath) -> Self {
        use attribute_path::step::Selector;

        AttributePath {
            steps: path
                .steps
                .iter()
                .map(|step| attribute_path::Step {
                    selector: Some(match step {
                        fw::AttributePathStep::AttributeName(name) => {
                            Selector::AttributeName(name.clone())
                        }
                        fw::AttributePathStep::ElementKeyString(key) => {
                            Selector::ElementKeyString(key.clone())
                        }
                        fw::AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                    }),
                })
                .collect(),
        }
    }
}

impl From<&fw::Diagnostic> for Diagnostic {
    fn from(diag: &fw::Diagnostic) -> Self {
        let severity = match diag.severity {
            fw::DiagnosticSeverity::Invalid => diagnostic::Severity::Invalid,
            fw::DiagnosticSeverity::Error => diagnostic::Severity::Error,
            fw::DiagnosticSeverity::Warning => diagnostic::Severity::Warning,
        };
        Diagnostic {
            severity: severity as i32,
            summary: diag.summary.clone(),
            detail: diag.detail.clone(),
            attribute: diag.attribute.as_ref().map(AttributePath::from),
        }
    }
}

pub fn diagnostics(diags: &[fw::Diagnostic]) -> Vec<Diagnostic> {
    diags.iter().map(Diagnostic::from).collect()
}

fn string_kind(kind: fw_schema::StringKind) -> i32 {
    match kind {
        fw_schema::StringKind::Plain => StringKind::Plain as i32,
        fw_schema::StringKind::Markdown => StringKind::Markdown as i32,
    }
}

impl From<&fw_schema::Attribute> for schema::Attribute {
    fn from(attr: &fw_schema::Attribute) -> Self {
        schema::Attribute {
            name: attr.name.clone(),
            r#type: type_constraint(&attr.r#type).to_string().into_bytes(),
            nested_type: None,
            description: attr.description.clone(),
            required: attr.required,
            optional: attr.optional,
            computed: attr.computed,
            sensitive: attr.sensitive,
            description_kind: StringKind::Plain as i32,
            deprecated: attr.deprecated,
        }
    }
}

impl From<&fw_schema::NestedBlock> for schema::NestedBlock {
    fn from(nested: &fw_schema::NestedBlock) -> Self {
        use schema::nested_block::NestingMode;

        let nesting = match nested.nesting {
            fw_schema::NestingMode::Invalid => NestingMode::Invalid,
            fw_schema::NestingMode::Single => NestingMode::Single,
            fw_schema::NestingMode::List => NestingMode::List,
            fw_schema::NestingMode::Set => NestingMode::Set,
            fw_schema::NestingMode::Map => NestingMode::Map,
            fw_schema::NestingMode::Group => NestingMode::Group,
        };
        schema::NestedBlock {
            type_name: nested.type_name.clone(),
            block: Some(schema::Block::from(&nested.block)),
            nesting: nesting as i32,
            min_items: nested.min_items,
            max_items: nested.max_items,
        }
    }
}

impl From<&fw_schema::Block> for schema::Block {
    fn from(block: &fw_schema::Block) -> Self {
        schema::Block {
            version: block.version,
            attributes: block.attributes.iter().map(schema::Attribute::from).collect(),
            block_types: block
                .block_types
                .iter()
                .map(schema::NestedBlock::from)
                .collect(),
            description: block.description.clone(),
            description_kind: string_kind(block.description_kind),
            deprecated: block.deprecated,
        }
    }
}

impl From<&fw_schema::Schema> for Schema {
    fn from(schema: &fw_schema::Schema) -> Self {
        Schema {
            version: schema.version,
            block: Some(schema::Block::from(&schema.block)),
        }
    }
}

impl From<&fw::ServerCapabilities> for ServerCapabilities {
    fn from(caps: &fw::ServerCapabilities) -> Self {
        ServerCapabilities {
            plan_destroy: caps.plan_destroy,
            get_provider_schema_optional: caps.get_provider_schema_optional,
            move_resource_state: caps.move_resource_state,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use crate::ObjectBuilder;
    use std::collections::HashMap;

    #[test]
    fn type_constraints_match_terraform_json() {
        assert_eq!(type_constraint(&AttributeType::String).to_string(), r#""string""#);
        assert_eq!(
            type_constraint(&AttributeType::set_of(AttributeType::String)).to_string(),
            r#"["set","string"]"#
        );
        assert_eq!(
            type_constraint(&AttributeType::map_of(AttributeType::list_of(AttributeType::Number)))
                .to_string(),
            r#"["map",["list","number"]]"#
        );

        let mut fields = HashMap::new();
        fields.insert("enabled".to_string(), AttributeType::Bool);
        assert_eq!(
            type_constraint(&AttributeType::Object(fields)).to_string(),
            r#"["object",{"enabled":"bool"}]"#
        );
    }

    #[test]
    fn schema_keeps_nested_blocks_and_flags() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("primary_key", AttributeType::String)
                    .computed()
                    .sensitive()
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("sign_in")
                    .max_items(1)
                    .attribute(AttributeBuilder::new("enabled", AttributeType::Bool).required().build())
                    .build(),
            )
            .build();

        let wire = Schema::from(&schema);
        let block = wire.block.unwrap();
        assert!(block.attributes[0].computed);
        assert!(block.attributes[0].sensitive);
        assert_eq!(block.attributes[0].r#type, br#""string""#.to_vec());

        let nested = &block.block_types[0];
        assert_eq!(nested.type_name, "sign_in");
        assert_eq!(nested.nesting, schema::nested_block::NestingMode::List as i32);
        assert_eq!(nested.max_items, 1);
        assert!(nested.block.as_ref().unwrap().attributes[0].required);
    }

    #[test]
    fn diagnostics_carry_severity_and_path() {
        let diag = fw::Diagnostic::error("Invalid value", "bad sku")
            .with_attribute(fw::AttributePath::new("hostname_configuration").index(0).attribute("proxy"));
        let wire = Diagnostic::from(&diag);

        assert_eq!(wire.severity, diagnostic::Severity::Error as i32);
        let steps = wire.attribute.unwrap().steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[1].selector,
            Some(attribute_path::step::Selector::ElementKeyInt(0))
        );

        let warning = Diagnostic::from(&fw::Diagnostic::warning("Deprecated", ""));
        assert_eq!(warning.severity, diagnostic::Severity::Warning as i32);
        assert!(warning.attribute.is_none());
    }

    #[test]
    fn values_decode_from_either_encoding() {
        let value = ObjectBuilder::new().string("name", "apim1").into_value();

        let wire = encode_value(&value).unwrap();
        assert!(wire.json.is_empty());
        assert_eq!(decode_value(Some(&wire)).unwrap(), value);

        let json = DynamicValue {
            msgpack: Vec::new(),
            json: br#"{"name":"apim1"}"#.to_vec(),
        };
        assert_eq!(decode_value(Some(&json)).unwrap(), value);

        assert!(decode_value(None).unwrap().is_null());
        assert!(decode_value(Some(&DynamicValue::default())).unwrap().is_null());
    }
}
