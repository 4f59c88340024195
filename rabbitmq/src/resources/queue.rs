//! Queue resource implementation

use super::{
    api_error, call, declares_argument, name_and_vhost, not_configured, optional_string,
    provider_data_from, required_string, settings_block, settings_from_state, settings_id_for,
    settings_schema_block, DEFAULT_VHOST,
};
use crate::deleted::check_deleted;
use crate::identifier::parse_id;
use crate::settings::{Settings, QUEUE_TYPE_ARGUMENT};
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
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validate_config;
use tfplug::validator::StringOneOf;

pub const QUEUE_TYPES: [&str; 3] = ["classic", "quorum", "stream"];

#[derive(Default)]
pub struct QueueResource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl QueueResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a RabbitMQ queue")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("name@vhost@durable:auto_delete:arguments")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the queue")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vhost", AttributeType::String)
                    .description("Virtual host of the queue")
                    .optional()
                    .default(StaticDefault::string(DEFAULT_VHOST))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .block(settings_schema_block(
                "Queue type: classic, quorum or stream",
                Some(StringOneOf::create(&QUEUE_TYPES)),
            ))
            .build()
    }

    async fn read_remote(
        &self,
        ctx: &Context,
        provider_data: &crate::RabbitMqProviderData,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let (name, vhost) = name_and_vhost(&state)?;

        tracing::debug!("RabbitMQ: Attempting to read queue {} in vhost {}", name, vhost);
        let info = match check_deleted(
            call(ctx, provider_data.client.queues().get(&vhost, &name)).await,
        ) {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::warn!(
                    "RabbitMQ: queue {} in vhost {} no longer exists, removing from state",
                    name,
                    vhost
                );
                return Ok(None);
            }
            Err(e) => return Err(api_error("Failed to read queue", &e)),
        };

        let mut remote = Settings::from_queue(&info);
        if declares_argument(&state, QUEUE_TYPE_ARGUMENT) {
            remote = remote.with_queue_type_argument();
        }
        let block = settings_block(&state, &remote);
        let id = settings_id_for(&info.name, &info.vhost, &remote)?;
        let _ = state.set_string(&AttributePath::new("id"), id);
        let _ = state.set_string(&AttributePath::new("name"), info.name);
        let _ = state.set_string(&AttributePath::new("vhost"), info.vhost);
        let _ = state.set_map(&AttributePath::new("settings"), block);

        Ok(Some(state))
    }
}

#[async_trait]
impl Resource for QueueResource {
    fn type_name(&self) -> &str {
        "rabbitmq_queue"
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

        let declared = required_string(&request.planned_state, "name").and_then(|name| {
            let vhost = optional_string(&request.planned_state, "vhost")
                .unwrap_or_else(|| DEFAULT_VHOST.to_string());
            let settings = settings_from_state(&request.planned_state)?;
            let id = settings_id_for(&name, &vhost, &settings)?;
            Ok((name, vhost, settings, id))
        });
        let (name, vhost, settings, id) = match declared {
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
            "RabbitMQ: Attempting to declare {} queue {} in vhost {}",
            settings.kind,
            name,
            vhost
        );
        if let Err(e) = call(
            &ctx,
            provider_data
                .client
                .queues()
                .declare(&vhost, &name, &settings.to_queue_settings()),
        )
        .await
        {
            tracing::error!("RabbitMQ: Queue declaration error: {}", e);
            diagnostics.push(api_error("Failed to create queue", &e));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), id);
        let _ = state.set_string(&AttributePath::new("vhost"), vhost.clone());

        match self.read_remote(&ctx, provider_data, state).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create queue",
                    format!("Queue {} in vhost {} was not found after creation", name, vhost),
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

        let (name, vhost) = match name_and_vhost(&request.prior_state) {
            Ok(keys) => keys,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        tracing::info!("RabbitMQ: Attempting to delete queue {} in vhost {}", name, vhost);
        if let Err(e) =
            check_deleted(call(&ctx, provider_data.client.queues().delete(&vhost, &name)).await)
        {
            tracing::error!("RabbitMQ: Queue deletion error: {}", e);
            diagnostics.push(api_error("Failed to delete queue", &e));
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let parsed = match parse_id(&request.id) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics: vec![Diagnostic::error("Invalid import identifier", e.to_string())],
                };
            }
        };

        let mut state = DynamicValue::object();
        let _ = state.set_string(&AttributePath::new("id"), request.id.clone());
        let _ = state.set_string(&AttributePath::new("name"), parsed.name);
        let _ = state.set_string(
            &AttributePath::new("vhost"),
            parsed.vhost.unwrap_or_else(|| DEFAULT_VHOST.to_string()),
        );

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
impl ResourceWithConfigure for QueueResource {
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
