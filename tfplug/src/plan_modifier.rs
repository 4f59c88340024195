//! Plan modifiers and resource change planning
//!
//! `plan_resource_change` produces the planned state for a resource from its
//! prior state and configuration: defaults are applied, unset computed
//! attributes become unknown, then each attribute's plan modifiers run.

use crate::schema::{
    child_path, Block, NestingMode, PlanModifier, PlanModifierRequest, PlanModifierResponse,
    Schema,
};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces the resource to be replaced".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let state = &request.state_value.value;
        let plan = &request.plan_value.value;
        // Nothing to replace during create, and unknown values are settled at apply
        let requires_replace = !state.is_null() && !plan.is_unknown() && state != plan;

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Uses the prior state value when the planned value is unknown
///
/// Keeps computed attributes such as `id` stable across plans.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
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
            diagnostics: vec![],
        }
    }
}

/// Outcome of planning a resource change
#[derive(Debug)]
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
    let mut planned_state = config.clone();
    schema.apply_defaults(&mut planned_state);

    let mut change = PlannedChange {
        planned_state,
        requires_replace: vec![],
        diagnostics: vec![],
    };
    plan_block(
        &schema.block,
        &AttributePath::root(),
        prior_state,
        config,
        &mut change,
    );
    change
}

fn plan_block(
    block: &Block,
    base: &AttributePath,
    prior_state: &DynamicValue,
    config: &DynamicValue,
    change: &mut PlannedChange,
) {
    for attr in &block.attributes {
        let path = child_path(base, &attr.name);
        let mut plan_value = value_at(&change.planned_state, &path);
        if attr.computed && plan_value.is_null() {
            plan_value = DynamicValue::new(Dynamic::Unknown);
        }

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: value_at(config, &path),
                state_value: value_at(prior_state, &path),
                plan_value,
                path: path.clone(),
            });
            plan_value = response.plan_value;
            change.diagnostics.extend(response.diagnostics);
            if response.requires_replace {
                tracing::debug!("Attribute {} requires replacement", path);
                change.requires_replace.push(path.clone());
            }
        }

        let _ = change.planned_state.set(&path, plan_value.value);
    }

    for nested in &block.block_types {
        let path = child_path(base, &nested.type_name);
        let present = matches!(change.planned_state.get(&path), Ok(Dynamic::Map(_)));
        if nested.nesting == NestingMode::Single && present {
            plan_block(&nested.block, &path, prior_state, config, change);
        }
    }
}

fn value_at(value: &DynamicValue, path: &AttributePath) -> DynamicValue {
    DynamicValue::new(value.get(path).cloned().unwrap_or(Dynamic::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::schema::{AttributeBuilder, AttributeType, BlockBuilder, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .block(
                BlockBuilder::new()
                    .attribute(
                        AttributeBuilder::new("durable", AttributeType::Bool)
                            .optional()
                            .default(StaticDefault::bool(true))
                            .plan_modifier(RequiresReplace::create())
                            .build(),
                    )
                    .single("settings"),
            )
            .build()
    }

    fn config(name: &str, durable: Option<bool>) -> DynamicValue {
        let mut value = DynamicValue::object();
        value.set_string(&AttributePath::new("name"), name).unwrap();
        value
            .set_map(&AttributePath::new("settings"), Default::default())
            .unwrap();
        if let Some(durable) = durable {
            value
                .set_bool(&AttributePath::new("settings").attribute("durable"), durable)
                .unwrap();
        }
        value
    }

    fn state(name: &str, durable: bool) -> DynamicValue {
        let mut value = config(name, Some(durable));
        value
            .set_string(&AttributePath::new("id"), format!("{}@/", name))
            .unwrap();
        value
    }

    #[test]
    fn create_marks_computed_unknown_and_applies_defaults() {
        let change = plan_resource_change(&schema(), &DynamicValue::null(), &config("q1", None));

        assert!(!change.requires_replace());
        assert!(change
            .planned_state
            .get(&AttributePath::new("id"))
            .unwrap()
            .is_unknown());
        assert!(change
            .planned_state
            .get_bool(&AttributePath::new("settings").attribute("durable"))
            .unwrap());
    }

    #[test]
    fn unchanged_config_keeps_state_id() {
        let change = plan_resource_change(&schema(), &state("q1", true), &config("q1", None));

        assert!(!change.requires_replace());
        assert_eq!(
            change.planned_state.get_string(&AttributePath::new("id")).unwrap(),
            "q1@/"
        );
    }

    #[test]
    fn nested_change_requires_replace() {
        let change =
            plan_resource_change(&schema(), &state("q1", true), &config("q1", Some(false)));

        assert_eq!(
            change.requires_replace,
            vec![AttributePath::new("settings").attribute("durable")]
        );
    }

    #[test]
    fn rename_requires_replace() {
        let change = plan_resource_change(&schema(), &state("q1", true), &config("q2", None));

        assert!(change.requires_replace.contains(&AttributePath::new("name")));
    }
}
