//! Binding resource implementation
//!
//! Bindings have no name of their own. The broker assigns a properties key
//! on creation, and the binding is found again by scanning its vhost.

use super::{api_error, call, not_configured, optional_string, provider_data_from, required_string};
use crate::api::bindings::{BindingInfo, BindingSettings, DestinationType};
use crate::deleted::check_deleted;
use crate::identifier::BindingId;
use crate::settings::{
    arguments_from_dynamic, arguments_from_json, arguments_to_dynamic, arguments_to_json,
    Arguments,
};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ImportedResource,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validate_config;
use tfplug::validator::{ConflictsWith, StringOneOf};

#[derive(Default)]
pub struct BindingResource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl BindingResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a RabbitMQ binding between an exchange and a queue or exchange")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("vhost#destination_type#properties_key#source#destination")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vhost", AttributeType::String)
                    .description("Virtual host of the binding")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source", AttributeType::String)
                    .description("Source exchange")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("destination", AttributeType::String)
                    .description("Destination queue or exchange")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("destination_type", AttributeType::String)
                    .description("Either queue or exchange")
                    .required()
                    .validator(StringOneOf::create(&["queue", "exchange"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("routing_key", AttributeType::String)
                    .description("Routing key of the binding")
                    .optional()
                    .default(StaticDefault::string(""))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arguments", AttributeType::Dynamic)
                    .description("Binding arguments as a map")
                    .optional()
                    .validator(ConflictsWith::create(&["arguments_json"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arguments_json", AttributeType::String)
                    .description("Binding arguments as a JSON object")
                    .optional()
                    .validator(ConflictsWith::create(&["arguments"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("properties_key", AttributeType::String)
                    .description("Key assigned by the broker to tell bindings apart")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .build()
    }

    /// `arguments_json` wins when it is set and non-empty
    fn arguments_from_state(state: &DynamicValue) -> Result<Arguments, Diagnostic> {
        if let Some(json) = optional_string(state, "arguments_json").filter(|j| !j.is_empty()) {
            return arguments_from_json(&json).map_err(|e| {
                Diagnostic::error("Invalid arguments_json", e.to_string())
                    .with_attribute(AttributePath::new("arguments_json"))
            });
        }
        let arguments = state
            .get(&AttributePath::new("arguments"))
            .cloned()
            .unwrap_or(Dynamic::Null);
        arguments_from_dynamic(&arguments).map_err(|e| {
            Diagnostic::error("Invalid arguments", e.to_string())
                .with_attribute(AttributePath::new("arguments"))
        })
    }

    fn destination_type(state: &DynamicValue) -> Result<DestinationType, Diagnostic> {
        required_string(state, "destination_type")?
            .parse::<DestinationType>()
            .map_err(|reason| {
                Diagnostic::error("Invalid destination_type", reason)
                    .with_attribute(AttributePath::new("destination_type"))
            })
    }

    #[allow(clippy::type_complexity)]
    fn planned_binding(
        state: &DynamicValue,
    ) -> Result<(String, String, String, DestinationType, BindingSettings), Diagnostic> {
        Ok((
            required_string(state, "vhost")?,
            required_string(state, "source")?,
            required_string(state, "destination")?,
            Self::destination_type(state)?,
            BindingSettings {
                routing_key: optional_string(state, "routing_key").unwrap_or_default(),
                arguments: Self::arguments_from_state(state)?,
            },
        ))
    }

    fn binding_id(state: &DynamicValue) -> Result<BindingId, Diagnostic> {
        let id = required_string(state, "id")?;
        BindingId::parse(&id).map_err(|e| {
            Diagnostic::error("Invalid identifier", e.to_string())
                .with_attribute(AttributePath::new("id"))
        })
    }

    /// Writes arguments back in whichever form the configuration used
    fn reconcile_arguments(state: &mut DynamicValue, remote: &Arguments) -> Result<(), Diagnostic> {
        if let Some(json) = optional_string(state, "arguments_json").filter(|j| !j.is_empty()) {
            let unchanged = arguments_from_json(&json).is_ok_and(|current| &current == remote);
            if !unchanged {
                let encoded = arguments_to_json(remote)
                    .map_err(|e| Diagnostic::error("Failed to encode arguments", e.to_string()))?;
                let _ = state.set_string(&AttributePath::new("arguments_json"), encoded);
            }
            return Ok(());
        }

        let path = AttributePath::new("arguments");
        let unset = state.get(&path).map(Dynamic::is_null).unwrap_or(true);
        if !(remote.is_empty() && unset) {
            let _ = state.set(&path, arguments_to_dynamic(remote));
        }
        Ok(())
    }

    fn apply_remote(
        state: &mut DynamicValue,
        id: &BindingId,
        info: BindingInfo,
    ) -> Result<(), Diagnostic> {
        let _ = state.set_string(&AttributePath::new("id"), id.encode());
        let _ = state.set_string(&AttributePath::new("vhost"), info.vhost);
        let _ = state.set_string(&AttributePath::new("source"), info.source);
        let _ = state.set_string(&AttributePath::new("destination"), info.destination);
        let _ = state.set_string(
            &AttributePath::new("destination_type"),
            info.destination_type.as_str(),
        );
        let _ = state.set_string(&AttributePath::new("properties_key"), info.properties_key);
        let _ = state.set_string(&AttributePath::new("routing_key"), info.routing_key);
        Self::reconcile_arguments(state, &info.arguments)
    }

    async fn read_remote(
        &self,
        ctx: &Context,
        provider_data: &crate::RabbitMqProviderData,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let id = Self::binding_id(&state)?;

        tracing::debug!(
            "RabbitMQ: Attempting to find binding {} -> {} in vhost {}",
            id.source,
            id.destination,
            id.vhost
        );
        let found = check_deleted(
            call(
                ctx,
                provider_data.client.bindings().find(
                    &id.vhost,
                    id.destination_type,
                    &id.properties_key,
                    &id.source,
                    &id.destination,
                ),
            )
            .await,
        )
        .map_err(|e| api_error("Failed to read binding", &e))?;

        match found.flatten() {
            Some(info) => {
                Self::apply_remote(&mut state, &id, info)?;
                Ok(Some(state))
            }
            None => {
                tracing::warn!(
                    "RabbitMQ: binding {} no longer exists, removing from state",
                    id.encode()
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Resource for BindingResource {
    fn type_name(&self) -> &str {
        "rabbitmq_binding"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_definition(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = validate_config(&Self::schema_definition(), &request.config);

        if let Some(json) = optional_string(&request.config, "arguments_json").filter(|j| !j.is_empty())
        {
            if let Err(e) = arguments_from_json(&json) {
                diagnostics.push(
                    Diagnostic::error("Invalid arguments_json", e.to_string())
                        .with_attribute(AttributePath::new("arguments_json")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(not_configured());
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let (vhost, source, destination, destination_type, settings) =
            match Self::planned_binding(&request.planned_state) {
                Ok(declared) => declared,
                Err(diag) => {
                    diagnostics.push(diag);
                    return CreateResourceResponse {
                        new_state: request.planned_state,
                        diagnostics,
                    };
                }
            };

        tracing::info!(
            "RabbitMQ: Attempting to create binding {} -> {} {} in vhost {}",
            source,
            destination_type,
            destination,
            vhost
        );
        let properties_key = match call(
            &ctx,
            provider_data.client.bindings().declare(
                &vhost,
                &source,
                destination_type,
                &destination,
                &settings,
            ),
        )
        .await
        {
            Ok(key) => key,
            Err(e) => {
                tracing::error!("RabbitMQ: Binding creation error: {}", e);
                diagnostics.push(api_error("Failed to create binding", &e));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let id = BindingId {
            vhost,
            destination_type,
            properties_key: properties_key.clone(),
            source,
            destination,
        };
        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.encode());
        let _ = state.set_string(&AttributePath::new("properties_key"), properties_key);

        match self.read_remote(&ctx, provider_data, state).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create binding",
                    format!("Binding {} was not found after creation", id.encode()),
                ));
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![not_configured()],
                };
            }
        };

        match self
            .read_remote(&ctx, provider_data, request.current_state.clone())
            .await
        {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(not_configured());
                return DeleteResourceResponse { diagnostics };
            }
        };

        let id = match Self::binding_id(&request.prior_state) {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        tracing::info!("RabbitMQ: Attempting to delete binding {}", id.encode());
        if let Err(e) = check_deleted(
            call(
                &ctx,
                provider_data.client.bindings().delete(
                    &id.vhost,
                    &id.source,
                    id.destination_type,
                    &id.destination,
                    &id.properties_key,
                ),
            )
            .await,
        ) {
            tracing::error!("RabbitMQ: Binding deletion error: {}", e);
            diagnostics.push(api_error("Failed to delete binding", &e));
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let id = match BindingId::parse(&request.id) {
            Ok(id) => id,
            Err(e) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics: vec![Diagnostic::error("Invalid import identifier", e.to_string())],
                };
            }
        };

        let mut state = DynamicValue::object();
        let _ = state.set_string(&AttributePath::new("id"), request.id.clone());
        let _ = state.set_string(&AttributePath::new("vhost"), id.vhost);
        let _ = state.set_string(&AttributePath::new("source"), id.source);
        let _ = state.set_string(&AttributePath::new("destination"), id.destination);
        let _ = state.set_string(
            &AttributePath::new("destination_type"),
            id.destination_type.as_str(),
        );
        let _ = state.set_string(&AttributePath::new("properties_key"), id.properties_key);

        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state,
            }],
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for BindingResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ArgumentValue;
    use std::collections::BTreeMap;

    fn config() -> DynamicValue {
        let mut config = DynamicValue::object();
        config.set_string(&AttributePath::new("vhost"), "/").unwrap();
        config.set_string(&AttributePath::new("source"), "src").unwrap();
        config.set_string(&AttributePath::new("destination"), "dst").unwrap();
        config
            .set_string(&AttributePath::new("destination_type"), "queue")
            .unwrap();
        config
    }

    #[test]
    fn arguments_and_arguments_json_conflict() {
        let mut config = config();
        config
            .set_string(&AttributePath::new("arguments_json"), r#"{"x-match":"all"}"#)
            .unwrap();
        config
            .set_map(
                &AttributePath::new("arguments"),
                BTreeMap::from([("x-match".to_string(), Dynamic::from("any"))]),
            )
            .unwrap();

        let diagnostics = validate_config(&BindingResource::schema_definition(), &config);
        assert!(diagnostics
            .iter()
            .all(|d| d.summary == "Conflicting configuration arguments"));
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn invalid_destination_type_is_rejected() {
        let mut config = config();
        config
            .set_string(&AttributePath::new("destination_type"), "topic")
            .unwrap();

        let diagnostics = validate_config(&BindingResource::schema_definition(), &config);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn arguments_json_takes_precedence() {
        let mut state = config();
        state
            .set_string(&AttributePath::new("arguments_json"), r#"{"x-match":"all"}"#)
            .unwrap();

        let arguments = BindingResource::arguments_from_state(&state).unwrap();
        assert_eq!(
            arguments.get("x-match"),
            Some(&ArgumentValue::String("all".to_string()))
        );
    }

    #[test]
    fn missing_arguments_are_empty() {
        assert!(BindingResource::arguments_from_state(&config())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn equivalent_arguments_json_is_kept() {
        let mut state = config();
        state
            .set_string(&AttributePath::new("arguments_json"), r#"{ "x-match": "all" }"#)
            .unwrap();
        let remote = Arguments::from([(
            "x-match".to_string(),
            ArgumentValue::String("all".to_string()),
        )]);

        BindingResource::reconcile_arguments(&mut state, &remote).unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new("arguments_json")).unwrap(),
            r#"{ "x-match": "all" }"#
        );

        let drifted = Arguments::from([(
            "x-match".to_string(),
            ArgumentValue::String("any".to_string()),
        )]);
        BindingResource::reconcile_arguments(&mut state, &drifted).unwrap();
        assert_eq!(
            state.get_string(&AttributePath::new("arguments_json")).unwrap(),
            r#"{"x-match":"any"}"#
        );
    }

    #[test]
    fn unset_arguments_stay_null_when_remote_has_none() {
        let mut state = config();
        BindingResource::reconcile_arguments(&mut state, &Arguments::new()).unwrap();
        assert!(state
            .get(&AttributePath::new("arguments"))
            .map(Dynamic::is_null)
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn import_splits_binding_identifier() {
        let response = BindingResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "rabbitmq_binding".to_string(),
                    id: "%2F#queue#k1#src#dst".to_string(),
                },
            )
            .await;

        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("vhost")).unwrap(), "/");
        assert_eq!(
            state.get_string(&AttributePath::new("properties_key")).unwrap(),
            "k1"
        );
        assert_eq!(
            state.get_string(&AttributePath::new("destination_type")).unwrap(),
            "queue"
        );
    }

    #[tokio::test]
    async fn import_rejects_short_identifier() {
        let response = BindingResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "rabbitmq_binding".to_string(),
                    id: "%2F#queue#k1#src".to_string(),
                },
            )
            .await;

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import identifier");
    }
}
