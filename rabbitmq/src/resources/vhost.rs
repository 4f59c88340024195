//! Virtual host resource implementation

use super::{
    api_error, call, not_configured, optional_string, provider_data_from,
    reconcile_optional_string, required_string,
};
use crate::api::vhosts::VhostSettings;
use crate::deleted::check_deleted;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringOneOf;
use tfplug::validate_config;

#[derive(Default)]
pub struct VhostResource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl VhostResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a RabbitMQ virtual host")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The vhost name")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the virtual host")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Free-form description")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("queue_type", AttributeType::String)
                    .description("Default queue type for queues declared without one")
                    .optional()
                    .validator(StringOneOf::create(&["classic", "quorum", "stream"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tracing", AttributeType::Bool)
                    .description("Enable message tracing")
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .build()
    }

    fn settings_from_state(state: &DynamicValue) -> VhostSettings {
        VhostSettings {
            description: optional_string(state, "description"),
            default_queue_type: optional_string(state, "queue_type"),
            tracing: state
                .get_optional_bool(&AttributePath::new("tracing"))
                .ok()
                .flatten()
                .unwrap_or(false),
        }
    }

    /// Refreshes `state` from the broker; `Ok(None)` when the vhost is gone
    async fn read_remote(
        &self,
        ctx: &Context,
        provider_data: &crate::RabbitMqProviderData,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let name = match optional_string(&state, "name") {
            Some(name) => name,
            None => required_string(&state, "id")?,
        };

        tracing::debug!("RabbitMQ: Attempting to read vhost: {}", name);
        let info = match check_deleted(call(ctx, provider_data.client.vhosts().get(&name)).await)
        {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::warn!("RabbitMQ: vhost {} no longer exists, removing from state", name);
                return Ok(None);
            }
            Err(e) => return Err(api_error("Failed to read vhost", &e)),
        };

        let _ = state.set_string(&AttributePath::new("id"), info.name.clone());
        let _ = state.set_string(&AttributePath::new("name"), info.name);
        reconcile_optional_string(&mut state, "description", info.description);
        reconcile_optional_string(&mut state, "queue_type", info.default_queue_type);
        let _ = state.set_bool(&AttributePath::new("tracing"), info.tracing);

        Ok(Some(state))
    }
}

#[async_trait]
impl Resource for VhostResource {
    fn type_name(&self) -> &str {
        "rabbitmq_vhost"
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
        ValidateResourceConfigResponse {
            diagnostics: validate_config(&Self::schema_definition(), &request.config),
        }
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

        let name = match required_string(&request.planned_state, "name") {
            Ok(name) => name,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let settings = Self::settings_from_state(&request.planned_state);
        tracing::info!("RabbitMQ: Attempting to create vhost: {}", name);
        if let Err(e) = call(&ctx, provider_data.client.vhosts().put(&name, &settings)).await {
            tracing::error!("RabbitMQ: Vhost creation error: {}", e);
            diagnostics.push(api_error("Failed to create vhost", &e));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), name.clone());

        match self.read_remote(&ctx, provider_data, state).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create vhost",
                    format!("Vhost {} was not found after creation", name),
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

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                diagnostics.push(not_configured());
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let name = match required_string(&request.planned_state, "name") {
            Ok(name) => name,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let settings = Self::settings_from_state(&request.planned_state);
        tracing::info!("RabbitMQ: Attempting to update vhost: {}", name);
        if let Err(e) = call(&ctx, provider_data.client.vhosts().put(&name, &settings)).await {
            tracing::error!("RabbitMQ: Vhost update error: {}", e);
            diagnostics.push(api_error("Failed to update vhost", &e));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        }

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), name);

        match self.read_remote(&ctx, provider_data, state.clone()).await {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => UpdateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: state,
                    diagnostics,
                }
            }
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

        let name = match required_string(&request.prior_state, "name")
            .or_else(|_| required_string(&request.prior_state, "id"))
        {
            Ok(name) => name,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        tracing::info!("RabbitMQ: Attempting to delete vhost: {}", name);
        if let Err(e) = check_deleted(call(&ctx, provider_data.client.vhosts().delete(&name)).await)
        {
            tracing::error!("RabbitMQ: Vhost deletion error: {}", e);
            diagnostics.push(api_error("Failed to delete vhost", &e));
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(AttributePath::new("id"), &request, &mut response);

        for imported in &mut response.imported_resources {
            let _ = imported
                .state
                .set_string(&AttributePath::new("name"), request.id.clone());
        }
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for VhostResource {
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

    #[test]
    fn schema_marks_name_as_required() {
        let schema = VhostResource::schema_definition();
        let name = schema.block.attribute("name").unwrap();
        assert!(name.required);
        assert!(schema.block.attribute("id").unwrap().computed);
    }

    #[test]
    fn validate_rejects_unknown_queue_type() {
        let mut config = DynamicValue::object();
        config.set_string(&AttributePath::new("name"), "test").unwrap();
        config
            .set_string(&AttributePath::new("queue_type"), "lazy")
            .unwrap();

        let diagnostics = validate_config(&VhostResource::schema_definition(), &config);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn settings_default_tracing_to_false() {
        let mut state = DynamicValue::object();
        state
            .set_string(&AttributePath::new("description"), "orders")
            .unwrap();

        let settings = VhostResource::settings_from_state(&state);
        assert_eq!(settings.description.as_deref(), Some("orders"));
        assert!(!settings.tracing);
        assert!(settings.default_queue_type.is_none());
    }

    #[tokio::test]
    async fn operations_before_configure_report_diagnostic() {
        let resource = VhostResource::new();
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "rabbitmq_vhost".to_string(),
                    prior_state: DynamicValue::object(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn import_sets_id_and_name() {
        let resource = VhostResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "rabbitmq_vhost".to_string(),
                    id: "staging".to_string(),
                },
            )
            .await;

        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "staging");
        assert_eq!(state.get_string(&AttributePath::new("name")).unwrap(), "staging");
    }
}
