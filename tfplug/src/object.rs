//! Typed access to object-shaped values
//!
//! [`ObjectReader`] pulls typed fields out of a configuration, plan or state
//! object. Absent, null, unknown and empty-list values all read as "unset",
//! so nested blocks declared as lists of at most one element read as
//! `Option`. Type mismatches come back as attribute-scoped diagnostics.
//!
//! [`ObjectBuilder`] is the inverse used when writing state. Every attribute
//! is written: unset scalars become null and empty collections become `[]`,
//! never null.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct ObjectReader<'a> {
    fields: Option<&'a HashMap<String, Dynamic>>,
    path: AttributePath,
}

impl<'a> ObjectReader<'a> {
    pub fn new(value: &'a DynamicValue) -> Self {
        Self::at(&value.value, AttributePath::root())
    }

    pub fn at(value: &'a Dynamic, path: AttributePath) -> Self {
        Self {
            fields: value.as_map(),
            path,
        }
    }

    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    fn child_path(&self, name: &str) -> AttributePath {
        self.path.clone().attribute(name)
    }

    fn type_error(&self, name: &str, expected: &str, actual: &Dynamic) -> Diagnostic {
        let path = self.child_path(name);
        Diagnostic::error(
            format!("Invalid type for {}", path),
            format!("expected {}, got {}", expected, actual.type_name()),
        )
        .with_attribute(path)
    }

    /// Raw value, or `None` when absent, null or unknown.
    pub fn get(&self, name: &str) -> Option<&'a Dynamic> {
        self.fields
            .and_then(|m| m.get(name))
            .filter(|v| v.is_known())
    }

    pub fn is_unknown(&self, name: &str) -> bool {
        self.fields
            .and_then(|m| m.get(name))
            .is_some_and(Dynamic::is_unknown)
    }

    pub fn is_set(&self, name: &str) -> bool {
        match self.get(name) {
            Some(Dynamic::List(items)) => !items.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<String>, Diagnostic> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(name, "string", other)),
        }
    }

    /// Like [`Self::string`] but treats `""` as unset.
    pub fn non_empty_string(&self, name: &str) -> Result<Option<String>, Diagnostic> {
        Ok(self.string(name)?.filter(|s| !s.is_empty()))
    }

    pub fn required_string(&self, name: &str) -> Result<String, Diagnostic> {
        self.non_empty_string(name)?.ok_or_else(|| {
            let path = self.child_path(name);
            Diagnostic::error(
                format!("Missing required attribute {}", path),
                format!("The attribute {} must be set", path),
            )
            .with_attribute(path)
        })
    }

    pub fn string_or(&self, name: &str, default: &str) -> Result<String, Diagnostic> {
        Ok(self
            .non_empty_string(name)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>, Diagnostic> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.type_error(name, "bool", other)),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, Diagnostic> {
        Ok(self.bool(name)?.unwrap_or(default))
    }

    pub fn number(&self, name: &str) -> Result<Option<f64>, Diagnostic> {
        match self.get(name) {
            None => Ok(None),
            Some(Dynamic::Number(n)) => Ok(Some(*n)),
            Some(other) => Err(self.type_error(name, "number", other)),
        }
    }

    /// Whole numbers only; fractional or out-of-range values are rejected.
    pub fn int(&self, name: &str) -> Result<Option<i64>, Diagnostic> {
        match self.number(name)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 => {
                Ok(Some(n as i64))
            }
            Some(n) => {
                let path = self.child_path(name);
                Err(Diagnostic::error(
                    format!("Invalid value for {}", path),
                    format!("expected a whole number, got {}", n),
                )
                .with_attribute(path))
            }
        }
    }

    /// Elements of a list or set of strings; unset reads as empty.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, Diagnostic> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Dynamic::List(items)) => items
                .iter()
                .filter(|v| v.is_known())
                .map(|v| match v {
                    Dynamic::String(s) => Ok(s.clone()),
                    other => Err(self.type_error(name, "list of string", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(name, "list of string", other)),
        }
    }

    /// Like [`string_list`](Self::string_list), but ordered and deduplicated.
    pub fn string_set(&self, name: &str) -> Result<BTreeSet<String>, Diagnostic> {
        Ok(self.string_list(name)?.into_iter().collect())
    }

    pub fn string_map(&self, name: &str) -> Result<HashMap<String, String>, Diagnostic> {
        match self.get(name) {
            None => Ok(HashMap::new()),
            Some(Dynamic::Map(entries)) => entries
                .iter()
                .filter(|(_, v)| v.is_known())
                .map(|(k, v)| match v {
                    Dynamic::String(s) => Ok((k.clone(), s.clone())),
                    other => Err(self.type_error(name, "map of string", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(name, "map of string", other)),
        }
    }

    /// First element of a nested block list, or the object itself for
    /// single-nested attributes.
    pub fn block(&self, name: &str) -> Result<Option<ObjectReader<'a>>, Diagnostic> {
        Ok(self.blocks(name)?.into_iter().next())
    }

    pub fn blocks(&self, name: &str) -> Result<Vec<ObjectReader<'a>>, Diagnostic> {
        let path = self.child_path(name);
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(value @ Dynamic::Map(_)) => Ok(vec![ObjectReader::at(value, path)]),
            Some(Dynamic::List(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.is_known())
                .map(|(i, item)| match item {
                    Dynamic::Map(_) => Ok(ObjectReader::at(item, path.clone().index(i as i64))),
                    other => Err(self.type_error(name, "object", other)),
                })
                .collect(),
            Some(other) => Err(self.type_error(name, "list of object", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectBuilder {
    fields: HashMap<String, Dynamic>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, name: &str, value: Dynamic) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn string(self, name: &str, value: impl Into<String>) -> Self {
        self.value(name, Dynamic::String(value.into()))
    }

    pub fn opt_string(self, name: &str, value: Option<impl Into<String>>) -> Self {
        self.value(name, value.map_or(Dynamic::Null, |v| Dynamic::String(v.into())))
    }

    pub fn bool(self, name: &str, value: bool) -> Self {
        self.value(name, Dynamic::Bool(value))
    }

    pub fn opt_bool(self, name: &str, value: Option<bool>) -> Self {
        self.value(name, value.map_or(Dynamic::Null, Dynamic::Bool))
    }

    pub fn number(self, name: &str, value: f64) -> Self {
        self.value(name, Dynamic::Number(value))
    }

    pub fn int(self, name: &str, value: i64) -> Self {
        self.value(name, Dynamic::Number(value as f64))
    }

    pub fn opt_int(self, name: &str, value: Option<i64>) -> Self {
        self.value(name, value.map_or(Dynamic::Null, |n| Dynamic::Number(n as f64)))
    }

    pub fn opt_number(self, name: &str, value: Option<f64>) -> Self {
        self.value(name, value.map_or(Dynamic::Null, Dynamic::Number))
    }

    pub fn string_list<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.value(
            name,
            Dynamic::List(
                values
                    .into_iter()
                    .map(|s| Dynamic::String(s.into()))
                    .collect(),
            ),
        )
    }

    pub fn string_map(self, name: &str, values: &HashMap<String, String>) -> Self {
        self.value(
            name,
            Dynamic::Map(
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                    .collect(),
            ),
        )
    }

    /// A block holding zero or one object.
    pub fn block(self, name: &str, value: Option<ObjectBuilder>) -> Self {
        self.blocks(name, value.into_iter().collect())
    }

    pub fn blocks(self, name: &str, values: Vec<ObjectBuilder>) -> Self {
        self.value(
            name,
            Dynamic::List(values.into_iter().map(ObjectBuilder::build).collect()),
        )
    }

    pub fn build(self) -> Dynamic {
        Dynamic::Map(self.fields)
    }

    pub fn into_value(self) -> DynamicValue {
        DynamicValue::new(self.build())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn sample() -> DynamicValue {
        ObjectBuilder::new()
            .string("name", "apim-1")
            .string("empty", "")
            .bool("enabled", true)
            .int("capacity", 2)
            .string_list("zones", ["1", "2"])
            .value("pending", Dynamic::Unknown)
            .block(
                "protocols",
                Some(ObjectBuilder::new().bool("http2_enabled", true)),
            )
            .blocks("sign_up", vec![])
            .into_value()
    }

    #[test]
    fn string_set_sorts_and_dedups() {
        let value = ObjectBuilder::new()
            .string_list("ids", ["b", "a", "b"])
            .into_value();
        let ids = ObjectReader::new(&value).string_set("ids").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn int_rejects_fractional_numbers() {
        let value = ObjectBuilder::new()
            .value("capacity", Dynamic::Number(2.5))
            .value("count", Dynamic::Number(3.0))
            .into_value();
        let reader = ObjectReader::new(&value);

        assert_eq!(reader.int("count").unwrap(), Some(3));
        let err = reader.int("capacity").unwrap_err();
        assert_eq!(err.detail, "expected a whole number, got 2.5");
        assert_eq!(err.attribute, Some(AttributePath::new("capacity")));
    }

    #[test]
    fn reads_scalars() {
        let value = sample();
        let r = ObjectReader::new(&value);

        assert_eq!(r.string("name").unwrap().as_deref(), Some("apim-1"));
        assert_eq!(r.string("empty").unwrap().as_deref(), Some(""));
        assert_eq!(r.non_empty_string("empty").unwrap(), None);
        assert_eq!(r.bool("enabled").unwrap(), Some(true));
        assert_eq!(r.int("capacity").unwrap(), Some(2));
        assert_eq!(r.string_list("zones").unwrap(), vec!["1", "2"]);
        assert_eq!(r.string("missing").unwrap(), None);
        assert!(r.string_list("missing").unwrap().is_empty());
    }

    #[test]
    fn unknown_reads_as_unset() {
        let value = sample();
        let r = ObjectReader::new(&value);

        assert_eq!(r.string("pending").unwrap(), None);
        assert!(r.is_unknown("pending"));
        assert!(!r.is_set("pending"));
    }

    #[test]
    fn nested_blocks_and_paths() {
        let value = sample();
        let r = ObjectReader::new(&value);

        let protocols = r.block("protocols").unwrap().unwrap();
        assert_eq!(protocols.bool("http2_enabled").unwrap(), Some(true));
        assert_eq!(protocols.path().to_string(), "protocols[0]");
        assert!(r.block("sign_up").unwrap().is_none());
        assert!(!r.is_set("sign_up"));
    }

    #[test]
    fn type_mismatch_is_attribute_scoped() {
        let value = sample();
        let r = ObjectReader::new(&value);

        let diag = r.bool("name").unwrap_err();
        assert_eq!(diag.attribute, Some(AttributePath::new("name")));
        assert!(diag.detail.contains("expected bool"));
    }

    #[test]
    fn required_string_reports_missing() {
        let value = sample();
        let diag = ObjectReader::new(&value)
            .required_string("empty")
            .unwrap_err();
        assert!(diag.summary.contains("empty"));
    }

    #[test]
    fn builder_writes_null_and_empty_collections() {
        let built = ObjectBuilder::new()
            .opt_string("description", None::<String>)
            .string_list("tags", Vec::<String>::new())
            .block("contact", None)
            .build();
        let map = built.as_map().unwrap();

        assert_eq!(map["description"], Dynamic::Null);
        assert_eq!(map["tags"], Dynamic::List(vec![]));
        assert_eq!(map["contact"], Dynamic::List(vec![]));
    }
}
