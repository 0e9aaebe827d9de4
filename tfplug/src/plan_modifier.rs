//! Built-in plan modifiers
//!
//! [`RequiresReplace`] marks ForceNew attributes: any change to a known value
//! on an existing resource forces destroy-and-recreate. [`UseStateForUnknown`]
//! keeps a computed attribute stable across plans when nothing will change it
//! (resource IDs, generated keys).

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;

        // nothing to replace during create, and unknowns are settled at apply
        let requires_replace = !state.is_null()
            && !plan.is_unknown()
            && !state.is_unknown()
            && !state.semantically_equals(plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Replacement only when the predicate says so for a changed value
pub struct RequiresReplaceIf<F>
where
    F: Fn(&Dynamic, &Dynamic) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&Dynamic, &Dynamic) -> bool + Send + Sync + 'static,
{
    pub fn create(predicate: F, description: impl Into<String>) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.into(),
        })
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&Dynamic, &Dynamic) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;
        let requires_replace = state.is_known()
            && plan.is_known()
            && !state.semantically_equals(plan)
            && (self.predicate)(state, plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value is unchanged by later plans".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("name"),
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let response = RequiresReplace.modify(request("old".into(), "new".into()));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_create_and_unknown() {
        assert!(!RequiresReplace.modify(request(Dynamic::Null, "new".into())).requires_replace);
        assert!(!RequiresReplace.modify(request("old".into(), Dynamic::Unknown)).requires_replace);
        assert!(!RequiresReplace.modify(request("same".into(), "same".into())).requires_replace);
    }

    #[test]
    fn requires_replace_if_consults_predicate() {
        let case_only = RequiresReplaceIf::create(
            |old: &Dynamic, new: &Dynamic| match (old.as_str(), new.as_str()) {
                (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
                _ => true,
            },
            "changing the location forces a new resource",
        );

        assert!(!case_only.modify(request("westeurope".into(), "WestEurope".into())).requires_replace);
        assert!(case_only.modify(request("westeurope".into(), "eastus".into())).requires_replace);
    }

    #[test]
    fn use_state_for_unknown_copies_prior() {
        let response = UseStateForUnknown.modify(request("id-1".into(), Dynamic::Unknown));
        assert_eq!(response.plan_value.value, "id-1".into());

        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert!(response.plan_value.is_unknown());
    }
}
