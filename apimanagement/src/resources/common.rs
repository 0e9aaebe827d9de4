//! CRUD plumbing shared by every resource handler
//!
//! Handlers follow the same shape: check for an existing object before
//! creating, translate 404s into "gone" on read and "done" on delete, and
//! report every other failure as a diagnostic carrying the operation name and
//! the resource ID.

use crate::api::ids::IdError;
use crate::api::poll::PollError;
use crate::api::ApiError;
use crate::ApiManagementProviderData;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tfplug::import_state_with;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{ImportResourceStateRequest, ImportResourceStateResponse};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::timeouts::TIMEOUTS_BLOCK;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{StringMatches, StringNotEmpty};
use tfplug::{Context, ObjectBuilder, Operation, Timeouts};

pub const RESOURCE_ALREADY_EXISTS: &str = "Resource already exists";

/// Pulls [`ApiManagementProviderData`] out of the value handed to `configure`.
pub fn configure(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> (Option<ApiManagementProviderData>, Vec<Diagnostic>) {
    let Some(data) = provider_data else {
        return (
            None,
            vec![Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            )],
        );
    };

    match data.downcast_ref::<ApiManagementProviderData>() {
        Some(provider_data) => (Some(provider_data.clone()), Vec::new()),
        None => (
            None,
            vec![Diagnostic::error(
                "Invalid provider data",
                "Failed to extract ApiManagementProviderData from provider data",
            )],
        ),
    }
}

pub fn provider_data(
    data: &Option<ApiManagementProviderData>,
) -> Result<&ApiManagementProviderData, Diagnostic> {
    data.as_ref().ok_or_else(|| {
        Diagnostic::error(
            "Provider not configured",
            "Provider data was not properly configured",
        )
    })
}

/// Error with the failing operation in the summary and the resource ID in
/// the detail.
pub fn api_diagnostic(operation: &str, id: &impl Display, err: impl Display) -> Diagnostic {
    Diagnostic::error(
        format!("Failed {}", operation),
        format!("{} {}: {}", operation, id, err),
    )
}

pub fn poll_diagnostic(operation: &str, id: &impl Display, err: PollError) -> Diagnostic {
    api_diagnostic(&format!("waiting for {}", operation), id, err)
}

pub fn invalid_id(err: IdError) -> Diagnostic {
    Diagnostic::error("Invalid resource ID", err.to_string())
}

/// Turns the pre-create lookup into "go ahead" or the import-as-exists error.
pub fn check_not_exists<T>(
    type_name: &str,
    id: &impl Display,
    existing: Result<T, ApiError>,
) -> Result<(), Diagnostic> {
    match existing {
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(api_diagnostic(
            "checking for presence of existing",
            id,
            err,
        )),
        Ok(_) => Err(Diagnostic::error(
            RESOURCE_ALREADY_EXISTS,
            format!(
                "A resource with the ID \"{}\" already exists - to be managed via Terraform \
                 this resource needs to be imported into the State. Please see the resource \
                 documentation for \"{}\" for more information.",
                id, type_name
            ),
        )),
    }
}

/// `Ok(None)` when the object is gone, so the caller drops it from state.
pub fn read_outcome<T>(id: &impl Display, result: Result<T, ApiError>) -> Result<Option<T>, Diagnostic> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => {
            tracing::info!("{} does not exist - removing from state", id);
            Ok(None)
        }
        Err(err) => Err(api_diagnostic("retrieving", id, err)),
    }
}

pub fn delete_outcome(id: &impl Display, result: Result<(), ApiError>) -> Result<(), Diagnostic> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => {
            tracing::debug!("{} was already gone", id);
            Ok(())
        }
        Err(err) => Err(api_diagnostic("deleting", id, err)),
    }
}

/// Child context bounded by the operation's timeout, honouring any override
/// in the `timeouts` block of `value`.
pub fn operation_context(
    ctx: &Context,
    defaults: Timeouts,
    value: &DynamicValue,
    operation: Operation,
) -> Result<Context, Diagnostic> {
    let timeouts = defaults.with_overrides(value)?;
    Ok(ctx.with_timeout(timeouts.get(operation)))
}

/// Runs one API call, giving up when `ctx` is cancelled or times out first.
pub async fn within<T>(
    ctx: &Context,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    if ctx.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    let started = Instant::now();
    tokio::select! {
        result = call => result,
        _ = ctx.done() => Err(if ctx.is_deadline_exceeded() {
            ApiError::Timeout(started.elapsed().as_secs())
        } else {
            ApiError::Cancelled
        }),
    }
}

/// Imports by ARM ID. The ID is validated and normalized here; the read that
/// follows fills in the rest of the state.
pub fn import_by_id<T: Display>(
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
    parse: impl FnOnce(&str) -> Result<T, IdError>,
) {
    import_state_with(request, response, |raw| {
        let id = parse(raw).map_err(invalid_id)?;
        Ok(ObjectBuilder::new().string("id", id.to_string()).into_value())
    });
}

/// Copies the `timeouts` block of `source` into the state being built.
pub fn with_timeouts(builder: ObjectBuilder, source: &DynamicValue) -> ObjectBuilder {
    let timeouts = source
        .get(&AttributePath::new(TIMEOUTS_BLOCK))
        .filter(|v| v.is_known())
        .cloned()
        .unwrap_or(Dynamic::List(Vec::new()));
    builder.value(TIMEOUTS_BLOCK, timeouts)
}

/// The `id` attribute of an existing state, parsed with `parse`.
pub fn state_id<T>(
    state: &DynamicValue,
    parse: impl FnOnce(&str) -> Result<T, IdError>,
) -> Result<T, Diagnostic> {
    let raw = state.get_string(&AttributePath::new("id")).map_err(|e| {
        Diagnostic::error("Missing resource ID", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })?;
    parse(&raw).map_err(invalid_id)
}

pub fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The ARM resource ID")
        .computed()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

/// A required, replace-on-change string attribute.
pub fn force_new_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .validator(StringNotEmpty::create())
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub fn resource_group_name_attribute() -> Attribute {
    AttributeBuilder::new("resource_group_name", AttributeType::String)
        .description("The resource group holding the API Management service")
        .required()
        .validator(StringMatches::create(
            r"^[-\w._()]{1,90}$",
            "must be a resource group name of 1-90 word characters, periods, hyphens or parentheses",
        ))
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub fn api_management_name_attribute() -> Attribute {
    AttributeBuilder::new("api_management_name", AttributeType::String)
        .description("The name of the API Management service")
        .required()
        .validator(service_name_validator())
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub fn service_name_validator() -> Box<dyn tfplug::schema::Validator> {
    StringMatches::create(
        r"^[a-zA-Z](?:[a-zA-Z0-9-]{0,48}[a-zA-Z0-9])?$",
        "must start with a letter, end with a letter or digit, contain only letters, digits and hyphens and be at most 50 characters",
    )
}

/// `name` of a service child entity.
pub fn child_name_attribute(description: &str) -> Attribute {
    AttributeBuilder::new("name", AttributeType::String)
        .description(description)
        .required()
        .validator(StringMatches::create(
            r"^[a-zA-Z0-9](?:[a-zA-Z0-9_.-]{0,78}[a-zA-Z0-9])?$",
            "must be 1-80 characters, start and end with a letter or digit and contain only letters, digits, hyphens, periods and underscores",
        ))
        .plan_modifier(RequiresReplace::create())
        .build()
}

/// Lookup attribute of a data source.
pub fn required_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .validator(StringNotEmpty::create())
        .build()
}

/// Element check for list and set attributes; the string validators only
/// look at scalar values.
pub fn check_list_values(
    values: &[String],
    allowed: &[&str],
    path: AttributePath,
) -> Option<Diagnostic> {
    let invalid: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|v| !allowed.contains(v))
        .collect();
    if invalid.is_empty() {
        return None;
    }
    Some(
        Diagnostic::error(
            format!("Invalid value for {}", path),
            format!(
                "expected every element of {} to be one of [{}], got [{}]",
                path,
                allowed.join(", "),
                invalid.join(", ")
            ),
        )
        .with_attribute(path),
    )
}

pub fn computed(name: &str, type_: AttributeType, description: &str) -> Attribute {
    AttributeBuilder::new(name, type_)
        .description(description)
        .computed()
        .build()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::ids::LoggerId;
    use crate::api::test_helpers::create_test_client;
    use crate::config::ApiManagementFeatures;
    use std::time::Duration;

    fn not_found() -> ApiError {
        ApiError::Api {
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: "not found".to_string(),
        }
    }

    fn logger_id() -> LoggerId {
        LoggerId::new("sub", "rg", "apim", "logger1")
    }

    #[test]
    fn check_not_exists_reports_import_error() {
        let id = logger_id();
        let diag = check_not_exists("azurerm_api_management_logger", &id, Ok(())).unwrap_err();

        assert_eq!(diag.summary, RESOURCE_ALREADY_EXISTS);
        assert!(diag.detail.contains(&format!("\"{}\"", id)));
        assert!(diag.detail.contains("\"azurerm_api_management_logger\""));
        assert!(diag.detail.contains("needs to be imported into the State"));
    }

    #[test]
    fn check_not_exists_proceeds_on_404() {
        assert!(check_not_exists::<()>("t", &logger_id(), Err(not_found())).is_ok());
    }

    #[test]
    fn check_not_exists_surfaces_other_errors() {
        let err = ApiError::Api {
            status: 500,
            code: "InternalError".to_string(),
            message: "boom".to_string(),
        };
        let diag = check_not_exists::<()>("t", &logger_id(), Err(err)).unwrap_err();
        assert!(diag.summary.contains("checking for presence of existing"));
        assert!(diag.detail.contains("logger1"));
    }

    #[test]
    fn read_outcome_clears_on_404() {
        let result = read_outcome::<()>(&logger_id(), Err(not_found())).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn delete_outcome_accepts_404() {
        assert!(delete_outcome(&logger_id(), Err(not_found())).is_ok());
        let diag = delete_outcome(&logger_id(), Err(ApiError::ServiceUnavailable)).unwrap_err();
        assert!(diag.detail.contains(&logger_id().to_string()));
    }

    #[test]
    fn operation_context_uses_override() {
        let config = ObjectBuilder::new()
            .blocks(
                TIMEOUTS_BLOCK,
                vec![ObjectBuilder::new().string("create", "2m")],
            )
            .into_value();
        let ctx = operation_context(
            &Context::new(),
            Timeouts::minutes(30, 5, 30, 30),
            &config,
            Operation::Create,
        )
        .unwrap();
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(120));
    }

    #[test]
    fn configure_downcasts_provider_data() {
        let data = ApiManagementProviderData::new(
            create_test_client("http://localhost"),
            ApiManagementFeatures::default(),
        );
        let (configured, diagnostics) = configure(Some(Arc::new(data)));
        assert!(configured.is_some());
        assert!(diagnostics.is_empty());

        let (configured, diagnostics) = configure(Some(Arc::new("wrong")));
        assert!(configured.is_none());
        assert_eq!(diagnostics[0].summary, "Invalid provider data");
    }

    #[tokio::test]
    async fn within_stops_at_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let result: Result<(), ApiError> = within(&ctx, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ApiError::Timeout(_))));
    }

    #[test]
    fn import_normalizes_id() {
        let raw = "/subscriptions/sub/resourcegroups/rg/providers/Microsoft.ApiManagement/service/apim/loggers/logger1";
        let request = ImportResourceStateRequest {
            type_name: "azurerm_api_management_logger".to_string(),
            id: raw.to_string(),
            client_capabilities: Default::default(),
        };
        let mut response = ImportResourceStateResponse::default();
        import_by_id(&request, &mut response, LoggerId::parse);

        let state = &response.imported_resources[0].state;
        assert_eq!(
            state.get_string(&AttributePath::new("id")).unwrap(),
            logger_id().to_string()
        );

        let mut response = ImportResourceStateResponse::default();
        let request = ImportResourceStateRequest {
            id: "/subscriptions/sub".to_string(),
            ..request
        };
        import_by_id(&request, &mut response, LoggerId::parse);
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid resource ID");
    }

    #[test]
    fn state_id_parses() {
        let state = ObjectBuilder::new()
            .string("id", logger_id().to_string())
            .into_value();
        assert_eq!(state_id(&state, LoggerId::parse).unwrap(), logger_id());
    }

    #[test]
    fn list_values_outside_allowed_set_are_reported() {
        let path = AttributePath::new("protocols");
        assert!(check_list_values(&["https".to_string()], &["http", "https"], path.clone()).is_none());

        let diag = check_list_values(
            &["https".to_string(), "ftp".to_string()],
            &["http", "https"],
            path.clone(),
        )
        .unwrap();
        assert!(diag.detail.contains("[ftp]"));
        assert_eq!(diag.attribute, Some(path));
    }
}
