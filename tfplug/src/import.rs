//! Import helpers

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID verbatim into `attr_path` of an otherwise empty state.
/// The following read fills in everything else.
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    import_state_with(request, response, |id| {
        let mut state = DynamicValue::null();
        state.set_string(&attr_path, id.to_string()).map_err(|e| {
            Diagnostic::error(
                "Failed to set import ID",
                format!("Could not set {} to {:?}: {}", attr_path, id, e),
            )
            .with_attribute(attr_path.clone())
        })?;
        Ok(state)
    });
}

/// Builds the imported state with `build`, which usually parses the ID.
/// A parse failure is reported as a diagnostic and nothing is imported.
pub fn import_state_with<F>(
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
    build: F,
) where
    F: FnOnce(&str) -> Result<DynamicValue, Diagnostic>,
{
    match build(&request.id) {
        Ok(state) => response.imported_resources.push(ImportedResource {
            type_name: request.type_name.clone(),
            state,
            private: Vec::new(),
        }),
        Err(diagnostic) => response.diagnostics.push(diagnostic),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "azurerm_api_management_logger".to_string(),
            id: id.to_string(),
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[test]
    fn passthrough_sets_id() {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request("/subscriptions/s/x"),
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "/subscriptions/s/x");
    }

    #[test]
    fn builder_errors_become_diagnostics() {
        let mut response = ImportResourceStateResponse::default();
        import_state_with(&request("garbage"), &mut response, |id| {
            Err(Diagnostic::error("Invalid import ID", id.to_string()))
        });

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].detail, "garbage");
    }
}
