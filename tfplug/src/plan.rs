//! Schema-driven configuration validation and planning
//!
//! [`validate_config`] runs every check that needs no network access:
//! required attributes, types, unsupported arguments, attribute validators,
//! nested block item counts and block constraints. [`plan_resource_change`]
//! computes the planned state from prior state and configuration: defaults
//! fill absent optional attributes, computed attributes become unknown on
//! create and keep their prior value on update, then plan modifiers run and
//! report the paths that force replacement.

use crate::schema::{
    AttributeType, Block, BlockConstraint, DefaultRequest, PlanModifierRequest, Schema,
    ValidatorRequest,
};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;

pub fn validate_config(schema: &Schema, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, &config.value, &AttributePath::root(), &mut diagnostics);
    diagnostics
}

fn validate_block(
    block: &Block,
    value: &Dynamic,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let empty = HashMap::new();
    let fields = match value {
        Dynamic::Unknown => return,
        Dynamic::Map(m) => m,
        Dynamic::Null => &empty,
        other => {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid block",
                    format!("expected an object, got {}", other.type_name()),
                )
                .with_attribute(path.clone()),
            );
            return;
        }
    };

    for name in fields.keys() {
        if !block.has_field(name) {
            diagnostics.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!("An argument named {:?} is not expected here.", name),
                )
                .with_attribute(path.clone().attribute(name)),
            );
        }
    }

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = fields.get(&attr.name).unwrap_or(&Dynamic::Null);

        if value.is_null() {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument {:?} is required, but no definition was found.", attr.name),
                    )
                    .with_attribute(attr_path),
                );
            }
            continue;
        }
        if value.is_unknown() {
            continue;
        }
        if !attr.optional && !attr.required && attr.computed {
            diagnostics.push(
                Diagnostic::error(
                    "Value for unconfigurable attribute",
                    format!("Can't configure a value for {:?}: its value will be decided automatically.", attr.name),
                )
                .with_attribute(attr_path),
            );
            continue;
        }
        if !conforms(value, &attr.r#type) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!("{:?} expects {:?}, got {}", attr.name, attr.r#type, value.type_name()),
                )
                .with_attribute(attr_path),
            );
            continue;
        }
        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(value.clone()),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        let items: Vec<&Dynamic> = match fields.get(&nested.type_name) {
            None | Some(Dynamic::Null) => Vec::new(),
            Some(Dynamic::Unknown) => continue,
            Some(Dynamic::List(items)) => items.iter().collect(),
            Some(single @ Dynamic::Map(_)) => vec![single],
            Some(other) => {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid block",
                        format!("expected {:?} blocks, got {}", nested.type_name, other.type_name()),
                    )
                    .with_attribute(nested_path),
                );
                continue;
            }
        };

        let count = items.len() as i64;
        if count < nested.min_items {
            diagnostics.push(
                Diagnostic::error(
                    "Insufficient blocks",
                    format!("At least {} {:?} blocks are required.", nested.min_items, nested.type_name),
                )
                .with_attribute(nested_path.clone()),
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            diagnostics.push(
                Diagnostic::error(
                    "Too many blocks",
                    format!("No more than {} {:?} blocks are allowed.", nested.max_items, nested.type_name),
                )
                .with_attribute(nested_path.clone()),
            );
        }
        for (i, item) in items.into_iter().enumerate() {
            validate_block(&nested.block, item, &nested_path.clone().index(i as i64), diagnostics);
        }
    }

    for constraint in &block.constraints {
        check_constraint(constraint, fields, path, diagnostics);
    }
}

enum Presence {
    Set,
    Unset,
    Unknown,
}

fn presence(fields: &HashMap<String, Dynamic>, name: &str) -> Presence {
    match fields.get(name) {
        None | Some(Dynamic::Null) => Presence::Unset,
        Some(Dynamic::Unknown) => Presence::Unknown,
        Some(Dynamic::List(items)) if items.is_empty() => Presence::Unset,
        Some(_) => Presence::Set,
    }
}

fn check_constraint(
    constraint: &BlockConstraint,
    fields: &HashMap<String, Dynamic>,
    path: &AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let count_set = |names: &[String]| -> (usize, bool) {
        names.iter().fold((0, false), |(set, unknown), name| match presence(fields, name) {
            Presence::Set => (set + 1, unknown),
            Presence::Unknown => (set, true),
            Presence::Unset => (set, unknown),
        })
    };
    let listed = |names: &[String]| {
        names
            .iter()
            .map(|n| format!("`{}`", n))
            .collect::<Vec<_>>()
            .join(",")
    };

    match constraint {
        BlockConstraint::ConflictsWith(names) => {
            let (set, _) = count_set(names);
            if set > 1 {
                diagnostics.push(
                    Diagnostic::error(
                        "Conflicting configuration arguments",
                        format!("only one of {} can be specified", listed(names)),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
        BlockConstraint::ExactlyOneOf(names) => {
            let (set, unknown) = count_set(names);
            if set > 1 || (set == 0 && !unknown) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid combination of arguments",
                        format!("exactly one of {} must be specified", listed(names)),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
        BlockConstraint::AtLeastOneOf(names) => {
            let (set, unknown) = count_set(names);
            if set == 0 && !unknown {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("one of {} must be specified", listed(names)),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
        BlockConstraint::RequiredWith(trigger, names) => {
            if !matches!(presence(fields, trigger), Presence::Set) {
                return;
            }
            for name in names {
                if matches!(presence(fields, name), Presence::Unset) {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("{:?}: all of `{}`,`{}` must be specified", trigger, trigger, name),
                        )
                        .with_attribute(path.clone().attribute(name)),
                    );
                }
            }
        }
    }
}

fn conforms(value: &Dynamic, expected: &AttributeType) -> bool {
    match (value, expected) {
        (Dynamic::Null, _) | (Dynamic::Unknown, _) => true,
        (Dynamic::String(_), AttributeType::String) => true,
        (Dynamic::Number(_), AttributeType::Number) => true,
        (Dynamic::Bool(_), AttributeType::Bool) => true,
        (Dynamic::List(items), AttributeType::List(elem))
        | (Dynamic::List(items), AttributeType::Set(elem)) => {
            items.iter().all(|item| conforms(item, elem))
        }
        (Dynamic::Map(entries), AttributeType::Map(elem)) => {
            entries.values().all(|item| conforms(item, elem))
        }
        (Dynamic::Map(entries), AttributeType::Object(attrs)) => entries
            .iter()
            .all(|(k, v)| attrs.get(k).is_some_and(|t| conforms(v, t))),
        _ => false,
    }
}

pub struct PlannedChange {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PlannedChange {
    pub fn requires_replace(&self) -> bool {
        !self.requires_replace.is_empty()
    }
}

pub fn plan_resource_change(
    schema: &Schema,
    prior_state: &DynamicValue,
    config: &DynamicValue,
) -> PlannedChange {
    let mut change = PlannedChange {
        planned_state: DynamicValue::null(),
        requires_replace: Vec::new(),
        diagnostics: Vec::new(),
    };

    if config.is_null() {
        return change;
    }

    let prior = (!prior_state.is_null()).then_some(&prior_state.value);
    change.planned_state = DynamicValue::new(plan_block(
        &schema.block,
        prior,
        &config.value,
        &AttributePath::root(),
        &mut change,
    ));
    change
}

fn plan_block(
    block: &Block,
    prior: Option<&Dynamic>,
    config: &Dynamic,
    path: &AttributePath,
    change: &mut PlannedChange,
) -> Dynamic {
    let prior_fields = prior.and_then(Dynamic::as_map);
    let config_fields = config.as_map();
    let mut planned = HashMap::new();

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let config_value = config_fields
            .and_then(|m| m.get(&attr.name))
            .cloned()
            .unwrap_or(Dynamic::Null);
        let prior_value = prior_fields
            .and_then(|m| m.get(&attr.name))
            .cloned()
            .unwrap_or(Dynamic::Null);

        let mut value = if !config_value.is_null() {
            config_value.clone()
        } else if let Some(default) = &attr.default {
            default
                .default_value(DefaultRequest {
                    path: attr_path.clone(),
                })
                .value
                .value
        } else if attr.computed {
            match prior {
                Some(_) => prior_value.clone(),
                None => Dynamic::Unknown,
            }
        } else {
            Dynamic::Null
        };

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(prior_value.clone()),
                plan_value: DynamicValue::new(value),
                path: attr_path.clone(),
            });
            value = response.plan_value.value;
            change.diagnostics.extend(response.diagnostics);
            if response.requires_replace && prior.is_some() {
                change.requires_replace.push(attr_path.clone());
            }
        }

        planned.insert(attr.name.clone(), value);
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        let config_items = match config_fields.and_then(|m| m.get(&nested.type_name)) {
            Some(Dynamic::List(items)) => items.clone(),
            Some(single @ Dynamic::Map(_)) => vec![single.clone()],
            Some(Dynamic::Unknown) => {
                planned.insert(nested.type_name.clone(), Dynamic::Unknown);
                continue;
            }
            _ => Vec::new(),
        };
        let prior_items = prior_fields
            .and_then(|m| m.get(&nested.type_name))
            .and_then(Dynamic::as_list)
            .unwrap_or(&[]);

        let items = config_items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                plan_block(
                    &nested.block,
                    prior_items.get(i),
                    item,
                    &nested_path.clone().index(i as i64),
                    change,
                )
            })
            .collect();
        planned.insert(nested.type_name.clone(), Dynamic::List(items));
    }

    Dynamic::Map(planned)
}
