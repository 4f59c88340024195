//! Resource implementations

pub mod binding;
pub mod exchange;
pub mod limit;
pub mod queue;
pub mod user;
pub mod vhost;

pub use binding::BindingResource;
pub use exchange::ExchangeResource;
pub use limit::LimitResource;
pub use queue::QueueResource;
pub use user::UserResource;
pub use vhost::VhostResource;

use crate::api::ApiError;
use crate::identifier::{parse_id, settings_id};
use crate::settings::{Settings, DEFAULT_AUTO_DELETE, DEFAULT_DURABLE};
use crate::RabbitMqProviderData;
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::RequiresReplace;
use tfplug::schema::{AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Validator};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub(crate) const DEFAULT_VHOST: &str = "/";

/// Races an API call against cancellation of the request context
pub(crate) async fn call<T, F>(ctx: &Context, request: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ApiError::Cancelled),
        result = request => result,
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub(crate) fn api_error(summary: impl Into<String>, error: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", error))
}

/// Extracts the shared provider data handed to `configure`
pub(crate) fn provider_data_from(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<RabbitMqProviderData> {
    match provider_data {
        Some(data) => match data.downcast_ref::<RabbitMqProviderData>() {
            Some(provider_data) => Some(provider_data.clone()),
            None => {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract RabbitMqProviderData from provider data",
                ));
                None
            }
        },
        None => {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided",
            ));
            None
        }
    }
}

pub(crate) fn required_string(value: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    value
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Diagnostic::error(
                format!("Missing {}", name),
                format!("The '{}' attribute is required", name),
            )
            .with_attribute(AttributePath::new(name))
        })
}

pub(crate) fn optional_string(value: &DynamicValue, name: &str) -> Option<String> {
    value
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
}

/// Writes a remote optional string into state without turning an unset
/// attribute into an empty string
pub(crate) fn reconcile_optional_string(
    state: &mut DynamicValue,
    name: &str,
    remote: Option<String>,
) {
    let path = AttributePath::new(name);
    match remote.filter(|v| !v.is_empty()) {
        Some(value) => {
            let _ = state.set_string(&path, value);
        }
        None => {
            if optional_string(state, name).is_some_and(|v| !v.is_empty()) {
                let _ = state.set_null(&path);
            }
        }
    }
}

/// `settings { type durable auto_delete arguments }`, every attribute forcing
/// replacement
pub(crate) fn settings_schema_block(
    type_description: &str,
    type_validator: Option<Box<dyn Validator>>,
) -> NestedBlock {
    let mut kind = AttributeBuilder::new("type", AttributeType::String)
        .description(type_description)
        .required()
        .plan_modifier(RequiresReplace::create());
    if let Some(validator) = type_validator {
        kind = kind.validator(validator);
    }

    BlockBuilder::new()
        .description("Declaration settings")
        .attribute(kind.build())
        .attribute(
            AttributeBuilder::new("durable", AttributeType::Bool)
                .description("Survive broker restarts")
                .optional()
                .default(StaticDefault::bool(DEFAULT_DURABLE))
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("auto_delete", AttributeType::Bool)
                .description("Delete once the last consumer or binding goes away")
                .optional()
                .default(StaticDefault::bool(DEFAULT_AUTO_DELETE))
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("arguments", AttributeType::Dynamic)
                .description("Optional arguments passed to the broker as-is")
                .optional()
                .plan_modifier(RequiresReplace::create())
                .build(),
        )
        .single("settings")
}

/// Name and vhost of an exchange or queue, taken from its identifier
pub(crate) fn name_and_vhost(state: &DynamicValue) -> Result<(String, String), Diagnostic> {
    let Some(id) = optional_string(state, "id").filter(|id| !id.is_empty()) else {
        let name = required_string(state, "name")?;
        let vhost = optional_string(state, "vhost").unwrap_or_else(|| DEFAULT_VHOST.to_string());
        return Ok((name, vhost));
    };

    let parsed = parse_id(&id).map_err(|e| {
        Diagnostic::error("Invalid identifier", e.to_string())
            .with_attribute(AttributePath::new("id"))
    })?;
    Ok((
        parsed.name,
        parsed.vhost.unwrap_or_else(|| DEFAULT_VHOST.to_string()),
    ))
}

pub(crate) fn settings_id_for(
    name: &str,
    vhost: &str,
    settings: &Settings,
) -> Result<String, Diagnostic> {
    settings_id(
        name,
        vhost,
        settings.durable,
        settings.auto_delete,
        &settings.arguments,
    )
    .map_err(|e| Diagnostic::error("Failed to build identifier", e.to_string()))
}

/// Reads the `settings` block of a planned state
pub(crate) fn settings_from_state(state: &DynamicValue) -> Result<Settings, Diagnostic> {
    let path = AttributePath::new("settings");
    let block = state
        .get_optional_map(&path)
        .ok()
        .flatten()
        .ok_or_else(|| {
            Diagnostic::error("Missing settings", "The 'settings' block is required")
                .with_attribute(path.clone())
        })?;
    Settings::from_block(&block)
        .map_err(|e| Diagnostic::error("Invalid settings", e.to_string()).with_attribute(path))
}

/// Whether the state's `settings.arguments` lists `key` itself
pub(crate) fn declares_argument(state: &DynamicValue, key: &str) -> bool {
    state
        .get_optional_map(&AttributePath::new("settings").attribute("arguments"))
        .ok()
        .flatten()
        .is_some_and(|arguments| arguments.contains_key(key))
}

/// Remote settings as a state block; an argument map the user never set
/// stays null while the broker reports none
pub(crate) fn settings_block(state: &DynamicValue, remote: &Settings) -> BTreeMap<String, Dynamic> {
    let mut block = remote.to_block();
    let prior_arguments = state
        .get(&AttributePath::new("settings").attribute("arguments"))
        .cloned()
        .unwrap_or(Dynamic::Null);
    if remote.arguments.is_empty() && prior_arguments.is_null() {
        block.insert("arguments".to_string(), Dynamic::Null);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ArgumentValue, Arguments};

    #[tokio::test]
    async fn cancelled_context_short_circuits_calls() {
        let ctx = Context::new();
        ctx.cancel();

        let result = call(&ctx, std::future::pending::<Result<(), ApiError>>()).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }

    #[test]
    fn declared_arguments_are_detected() {
        let mut state = DynamicValue::object();
        assert!(!declares_argument(&state, "x-queue-type"));

        state
            .set_string(
                &AttributePath::new("settings")
                    .attribute("arguments")
                    .key("x-queue-type"),
                "quorum",
            )
            .unwrap();
        assert!(declares_argument(&state, "x-queue-type"));
        assert!(!declares_argument(&state, "x-message-ttl"));
    }

    #[test]
    fn name_and_vhost_prefer_identifier() {
        let mut state = DynamicValue::object();
        state
            .set_string(&AttributePath::new("id"), "jobs@/@true:false:{}")
            .unwrap();
        state.set_string(&AttributePath::new("name"), "other").unwrap();

        assert_eq!(
            name_and_vhost(&state).unwrap(),
            ("jobs".to_string(), "/".to_string())
        );
    }

    #[test]
    fn name_and_vhost_fall_back_to_attributes() {
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new("name"), "jobs").unwrap();
        assert_eq!(
            name_and_vhost(&state).unwrap(),
            ("jobs".to_string(), DEFAULT_VHOST.to_string())
        );

        let diag = name_and_vhost(&DynamicValue::object()).unwrap_err();
        assert_eq!(diag.summary, "Missing name");
    }

    #[tokio::test]
    async fn live_context_returns_call_result() {
        let ctx = Context::new();
        let result = call(&ctx, async { Ok::<_, ApiError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn provider_data_must_be_present_and_typed() {
        let mut diagnostics = vec![];
        assert!(provider_data_from(None, &mut diagnostics).is_none());
        assert_eq!(diagnostics[0].summary, "No provider data");

        let mut diagnostics = vec![];
        let wrong: Arc<dyn Any + Send + Sync> = Arc::new("not provider data");
        assert!(provider_data_from(Some(wrong), &mut diagnostics).is_none());
        assert_eq!(diagnostics[0].summary, "Invalid provider data");
    }

    #[test]
    fn optional_strings_stay_null_when_remote_is_empty() {
        let mut state = DynamicValue::object();
        reconcile_optional_string(&mut state, "description", Some(String::new()));
        assert_eq!(optional_string(&state, "description"), None);

        reconcile_optional_string(&mut state, "description", Some("orders".to_string()));
        assert_eq!(optional_string(&state, "description").as_deref(), Some("orders"));

        reconcile_optional_string(&mut state, "description", None);
        assert_eq!(optional_string(&state, "description"), None);
    }

    #[test]
    fn unset_arguments_stay_null() {
        let mut state = DynamicValue::object();
        state
            .set_map(&AttributePath::new("settings"), BTreeMap::new())
            .unwrap();
        let remote = Settings {
            kind: "direct".to_string(),
            durable: true,
            auto_delete: false,
            arguments: Arguments::new(),
        };

        let block = settings_block(&state, &remote);
        assert_eq!(block.get("arguments"), Some(&Dynamic::Null));

        let remote = Settings {
            arguments: Arguments::from([(
                "alternate-exchange".to_string(),
                ArgumentValue::String("ae".to_string()),
            )]),
            ..remote
        };
        let block = settings_block(&state, &remote);
        assert!(matches!(block.get("arguments"), Some(Dynamic::Map(m)) if m.len() == 1));
    }
}
