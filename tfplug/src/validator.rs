//! Built-in attribute validators
//!
//! Validators see only known, non-null values; null and unknown values are
//! filtered out by [`crate::plan::validate_config`] before they are called.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{AttributePath, Diagnostic, Dynamic};
use regex::Regex;

fn invalid(path: &AttributePath, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(path.clone())],
    }
}

fn ok() -> ValidatorResponse {
    ValidatorResponse::default()
}

pub struct StringLength {
    min: usize,
    max: Option<usize>,
}

impl StringLength {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min,
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self { min, max: None })
    }
}

impl Validator for StringLength {
    fn description(&self) -> String {
        match self.max {
            Some(max) => format!("length must be between {} and {}", self.min, max),
            None => format!("length must be at least {}", self.min),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        let len = s.chars().count();
        if len < self.min || self.max.is_some_and(|max| len > max) {
            return invalid(
                &request.path,
                format!("Invalid length for {}", request.path),
                format!("{}, got {}", self.description(), len),
            );
        }
        ok()
    }
}

pub struct StringNotEmpty;

impl StringNotEmpty {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for StringNotEmpty {
    fn description(&self) -> String {
        "must not be empty".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if s.trim().is_empty() => invalid(
                &request.path,
                format!("Empty value for {}", request.path),
                format!("expected {} to not be an empty string", request.path),
            ),
            _ => ok(),
        }
    }
}

pub struct StringOneOf {
    allowed: Vec<String>,
    ignore_case: bool,
}

impl StringOneOf {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            ignore_case: false,
        })
    }

    pub fn ignoring_case(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            ignore_case: true,
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("must be one of [{}]", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        let found = self.allowed.iter().any(|a| {
            if self.ignore_case {
                a.eq_ignore_ascii_case(s)
            } else {
                a == s
            }
        });
        if found {
            ok()
        } else {
            invalid(
                &request.path,
                format!("Invalid value for {}", request.path),
                format!("expected {} to be one of [{}], got {}", request.path, self.allowed.join(", "), s),
            )
        }
    }
}

/// Regex match. A pattern that fails to compile rejects every value.
pub struct StringMatches {
    pattern: Option<Regex>,
    source: String,
    message: String,
}

impl StringMatches {
    pub fn create(pattern: &str, message: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern: Regex::new(pattern).ok(),
            source: pattern.to_string(),
            message: message.to_string(),
        })
    }
}

impl Validator for StringMatches {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        match &self.pattern {
            Some(re) if re.is_match(s) => ok(),
            Some(_) => invalid(
                &request.path,
                format!("Invalid value for {}", request.path),
                format!("{}, got {:?}", self.message, s),
            ),
            None => invalid(
                &request.path,
                "Invalid validator pattern".to_string(),
                format!("pattern {:?} does not compile", self.source),
            ),
        }
    }
}

pub struct NumberRange {
    min: f64,
    max: f64,
    integer: bool,
}

impl NumberRange {
    pub fn between(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min,
            max,
            integer: false,
        })
    }

    /// Whole numbers only
    pub fn int_between(min: i64, max: i64) -> Box<dyn Validator> {
        Box::new(Self {
            min: min as f64,
            max: max as f64,
            integer: true,
        })
    }

    pub fn int_at_least(min: i64) -> Box<dyn Validator> {
        Box::new(Self {
            min: min as f64,
            max: f64::MAX,
            integer: true,
        })
    }
}

impl Validator for NumberRange {
    fn description(&self) -> String {
        if self.max == f64::MAX {
            format!("must be at least {}", self.min)
        } else {
            format!("must be between {} and {}", self.min, self.max)
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.value.as_number() else {
            return ok();
        };
        if self.integer && n.fract() != 0.0 {
            return invalid(
                &request.path,
                format!("Invalid value for {}", request.path),
                format!("expected a whole number, got {}", n),
            );
        }
        if n < self.min || n > self.max {
            return invalid(
                &request.path,
                format!("Value out of range for {}", request.path),
                format!("expected {} to be in the range ({} - {}), got {}", request.path, self.min, self.max, n),
            );
        }
        ok()
    }
}

/// Absolute http(s) URL
pub struct IsUrl {
    https_only: bool,
}

impl IsUrl {
    pub fn http_or_https() -> Box<dyn Validator> {
        Box::new(Self { https_only: false })
    }

    pub fn https() -> Box<dyn Validator> {
        Box::new(Self { https_only: true })
    }
}

impl Validator for IsUrl {
    fn description(&self) -> String {
        if self.https_only {
            "must be an https URL".to_string()
        } else {
            "must be an http or https URL".to_string()
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        let rest = s
            .strip_prefix("https://")
            .or_else(|| if self.https_only { None } else { s.strip_prefix("http://") });
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') && !host.contains(char::is_whitespace) => ok(),
            _ => invalid(
                &request.path,
                format!("Invalid URL for {}", request.path),
                format!("expected {} to be a valid URL, got {:?}", self.description(), s),
            ),
        }
    }
}

/// Azure resource ID (`/subscriptions/.../providers/...`)
pub struct IsResourceId;

impl IsResourceId {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for IsResourceId {
    fn description(&self) -> String {
        "must be an Azure resource ID".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        let segments: Vec<&str> = s.trim_start_matches('/').split('/').collect();
        let well_formed = s.starts_with('/')
            && segments.len() >= 2
            && segments.len() % 2 == 0
            && segments[0].eq_ignore_ascii_case("subscriptions")
            && segments.iter().all(|seg| !seg.is_empty());
        if well_formed {
            ok()
        } else {
            invalid(
                &request.path,
                format!("Invalid resource ID for {}", request.path),
                format!("expected {} to be an Azure resource ID, got {:?}", request.path, s),
            )
        }
    }
}

/// RFC 4122 textual UUID
pub fn is_uuid() -> Box<dyn Validator> {
    StringMatches::create(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        "must be a UUID",
    )
}

pub fn is_email() -> Box<dyn Validator> {
    StringMatches::create(r"^[^@\s]+@[^@\s]+\.[^@\s]+$", "must be an email address")
}

/// ISO-8601 duration such as `PT1M` or `P1DT12H`
pub struct IsIso8601Duration;

impl IsIso8601Duration {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for IsIso8601Duration {
    fn description(&self) -> String {
        "must be an ISO-8601 duration".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return ok();
        };
        if is_iso8601_duration(s) {
            ok()
        } else {
            invalid(
                &request.path,
                format!("Invalid duration for {}", request.path),
                format!("expected {} to be an ISO-8601 duration, got {:?}", request.path, s),
            )
        }
    }
}

fn is_iso8601_duration(s: &str) -> bool {
    let Ok(re) = Regex::new(
        r"^P(\d+Y)?(\d+M)?(\d+W)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$",
    ) else {
        return false;
    };
    re.is_match(s) && s != "P" && !s.ends_with('T')
}

pub struct ListLength {
    min: usize,
    max: Option<usize>,
}

impl ListLength {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min,
            max: Some(max),
        })
    }

    pub fn at_least(min: usize) -> Box<dyn Validator> {
        Box::new(Self { min, max: None })
    }
}

impl Validator for ListLength {
    fn description(&self) -> String {
        match self.max {
            Some(max) => format!("must have between {} and {} items", self.min, max),
            None => format!("must have at least {} items", self.min),
        }
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return ok();
        };
        if items.len() < self.min || self.max.is_some_and(|max| items.len() > max) {
            return invalid(
                &request.path,
                format!("Invalid number of items for {}", request.path),
                format!("{}, got {}", self.description(), items.len()),
            );
        }
        ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DynamicValue;

    fn run(validator: &dyn Validator, value: Dynamic) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: DynamicValue::new(value),
                path: AttributePath::new("field"),
            })
            .diagnostics
    }

    #[test]
    fn string_length_bounds() {
        let v = StringLength::between(1, 5);
        assert!(run(v.as_ref(), "abc".into()).is_empty());
        assert_eq!(run(v.as_ref(), "".into()).len(), 1);
        assert_eq!(run(v.as_ref(), "abcdef".into()).len(), 1);
    }

    #[test]
    fn one_of_respects_case_mode() {
        assert!(run(StringOneOf::create(&["http", "soap"]).as_ref(), "soap".into()).is_empty());
        assert_eq!(run(StringOneOf::create(&["http"]).as_ref(), "HTTP".into()).len(), 1);
        assert!(run(StringOneOf::ignoring_case(&["http"]).as_ref(), "HTTP".into()).is_empty());
    }

    #[test]
    fn pattern_and_broken_pattern() {
        let v = StringMatches::create(r"^[A-Za-z0-9-._]+$", "invalid display name");
        assert!(run(v.as_ref(), "my-value.1".into()).is_empty());
        assert_eq!(run(v.as_ref(), "has space".into()).len(), 1);

        let broken = StringMatches::create(r"(", "never");
        assert_eq!(run(broken.as_ref(), "x".into())[0].summary, "Invalid validator pattern");
    }

    #[test]
    fn number_ranges() {
        let v = NumberRange::int_between(0, 8192);
        assert!(run(v.as_ref(), Dynamic::Number(1024.0)).is_empty());
        assert_eq!(run(v.as_ref(), Dynamic::Number(8193.0)).len(), 1);
        assert_eq!(run(v.as_ref(), Dynamic::Number(1.5)).len(), 1);
        assert!(run(NumberRange::between(0.0, 100.0).as_ref(), Dynamic::Number(12.5)).is_empty());
    }

    #[test]
    fn urls() {
        assert!(run(IsUrl::http_or_https().as_ref(), "http://backend.example.com/api".into()).is_empty());
        assert_eq!(run(IsUrl::https().as_ref(), "http://backend.example.com".into()).len(), 1);
        assert_eq!(run(IsUrl::http_or_https().as_ref(), "ftp://x".into()).len(), 1);
        assert_eq!(run(IsUrl::http_or_https().as_ref(), "https://".into()).len(), 1);
    }

    #[test]
    fn resource_ids() {
        let v = IsResourceId::create();
        assert!(run(
            v.as_ref(),
            "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.ApiManagement/service/svc".into()
        )
        .is_empty());
        assert_eq!(run(v.as_ref(), "/subscriptions/0000/resourceGroups".into()).len(), 1);
        assert_eq!(run(v.as_ref(), "subscriptions/0000".into()).len(), 1);
    }

    #[test]
    fn durations_uuids_emails() {
        assert!(is_iso8601_duration("PT1M"));
        assert!(is_iso8601_duration("P1DT12H"));
        assert!(!is_iso8601_duration("P"));
        assert!(!is_iso8601_duration("P1DT"));
        assert!(!is_iso8601_duration("1 minute"));
        assert!(run(is_uuid().as_ref(), "8a2b6a1e-50c1-4a55-a2b0-2dd1b8c5b7b0".into()).is_empty());
        assert_eq!(run(is_email().as_ref(), "not-an-email".into()).len(), 1);
    }

    #[test]
    fn list_length() {
        let v = ListLength::between(1, 2);
        assert_eq!(run(v.as_ref(), Dynamic::List(vec![])).len(), 1);
        assert!(run(v.as_ref(), Dynamic::List(vec!["a".into()])).is_empty());
    }

    #[test]
    fn non_matching_types_are_ignored() {
        assert!(run(StringNotEmpty::create().as_ref(), Dynamic::Bool(true)).is_empty());
        assert_eq!(run(StringNotEmpty::create().as_ref(), "  ".into()).len(), 1);
    }
}
