//! Vhost and user limit resource implementation

use super::{api_error, call, not_configured, optional_string, provider_data_from, required_string};
use crate::api::limits::LimitScope;
use crate::deleted::check_deleted;
use crate::identifier::{decode_pair, encode_id};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tfplug::context::Context;
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
use tfplug::validator::StringOneOf;

#[derive(Default)]
pub struct LimitResource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl LimitResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages limits of a RabbitMQ vhost or user")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("scope@name")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("scope", AttributeType::String)
                    .description("Either vhost or user")
                    .required()
                    .validator(StringOneOf::create(&["vhost", "user"]))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the vhost or user the limits apply to")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("limits", AttributeType::Map(Box::new(AttributeType::Number)))
                    .description("Limit values keyed by limit name, e.g. max-connections")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .build()
    }

    fn parse_scope(scope: &str) -> Result<LimitScope, Diagnostic> {
        scope.parse::<LimitScope>().map_err(|reason| {
            Diagnostic::error("Invalid scope", reason).with_attribute(AttributePath::new("scope"))
        })
    }

    /// Scope and name from the identifier, or from the attributes before one exists
    fn scope_and_name(state: &DynamicValue) -> Result<(LimitScope, String), Diagnostic> {
        let Some(id) = optional_string(state, "id").filter(|id| !id.is_empty()) else {
            let scope = Self::parse_scope(&required_string(state, "scope")?)?;
            return Ok((scope, required_string(state, "name")?));
        };

        let (scope, name) = decode_pair(&id).map_err(|e| {
            Diagnostic::error("Invalid identifier", e.to_string())
                .with_attribute(AttributePath::new("id"))
        })?;
        Ok((Self::parse_scope(&scope)?, name))
    }

    fn limits_from_state(state: &DynamicValue) -> Result<BTreeMap<String, i64>, Diagnostic> {
        let path = AttributePath::new("limits");
        let limits = state
            .get_optional_map(&path)
            .map_err(|e| Diagnostic::error("Invalid limits", e.to_string()))?
            .unwrap_or_default();

        limits
            .into_iter()
            .map(|(limit, value)| match value.as_f64() {
                Some(n) if n.fract() == 0.0 => Ok((limit, n as i64)),
                _ => Err(Diagnostic::error(
                    "Invalid limits",
                    format!("Limit '{}' must be a whole number", limit),
                )
                .with_attribute(path.clone().key(&limit))),
            })
            .collect()
    }

    async fn read_remote(
        &self,
        ctx: &Context,
        provider_data: &crate::RabbitMqProviderData,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        let (scope, name) = Self::scope_and_name(&state)?;

        tracing::debug!("RabbitMQ: Attempting to read {} limits for {}", scope, name);
        let limits = match check_deleted(
            call(ctx, provider_data.client.limits().get(scope, &name)).await,
        ) {
            Ok(Some(Some(limits))) if !limits.is_empty() => limits,
            Ok(_) => {
                tracing::warn!(
                    "RabbitMQ: {} limits for {} no longer exist, removing from state",
                    scope,
                    name
                );
                return Ok(None);
            }
            Err(e) => return Err(api_error("Failed to read limits", &e)),
        };

        let _ = state.set_string(
            &AttributePath::new("id"),
            encode_id(&[scope.as_str(), name.as_str()]),
        );
        let _ = state.set_string(&AttributePath::new("scope"), scope.as_str());
        let _ = state.set_string(&AttributePath::new("name"), name);
        let _ = state.set_map(
            &AttributePath::new("limits"),
            limits
                .into_iter()
                .map(|(limit, value)| (limit, Dynamic::Number(value as f64)))
                .collect(),
        );

        Ok(Some(state))
    }
}

#[async_trait]
impl Resource for LimitResource {
    fn type_name(&self) -> &str {
        "rabbitmq_limit"
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

        // Unknown values are checked again at apply time
        let known = request
            .config
            .get(&AttributePath::new("limits"))
            .ok()
            .and_then(Dynamic::as_map)
            .is_some_and(|limits| limits.values().all(|v| !v.is_unknown()));
        if known {
            if let Err(diag) = Self::limits_from_state(&request.config) {
                diagnostics.push(diag);
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

        let declared = required_string(&request.planned_state, "scope")
            .and_then(|scope| Self::parse_scope(&scope))
            .and_then(|scope| {
                let name = required_string(&request.planned_state, "name")?;
                let limits = Self::limits_from_state(&request.planned_state)?;
                Ok((scope, name, limits))
            });
        let (scope, name, limits) = match declared {
            Ok(declared) => declared,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        for (limit, value) in &limits {
            tracing::info!(
                "RabbitMQ: Attempting to set {} limit {}={} for {}",
                scope,
                limit,
                value,
                name
            );
            if let Err(e) = call(
                &ctx,
                provider_data.client.limits().put(scope, &name, limit, *value),
            )
            .await
            {
                tracing::error!("RabbitMQ: Limit creation error: {}", e);
                diagnostics.push(api_error("Failed to create limit", &e));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        }

        let mut state = request.planned_state.clone();
        let _ = state.set_string(
            &AttributePath::new("id"),
            encode_id(&[scope.as_str(), name.as_str()]),
        );

        match self.read_remote(&ctx, provider_data, state).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create limit",
                    format!("Limits for {} {} were not found after creation", scope, name),
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

        let keys = Self::scope_and_name(&request.prior_state).and_then(|(scope, name)| {
            Ok((scope, name, Self::limits_from_state(&request.prior_state)?))
        });
        let (scope, name, limits) = match keys {
            Ok(keys) => keys,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        for limit in limits.keys() {
            tracing::info!(
                "RabbitMQ: Attempting to delete {} limit {} for {}",
                scope,
                limit,
                name
            );
            if let Err(e) = check_deleted(
                call(&ctx, provider_data.client.limits().delete(scope, &name, limit)).await,
            ) {
                tracing::error!("RabbitMQ: Limit deletion error: {}", e);
                diagnostics.push(api_error("Failed to delete limit", &e));
            }
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut state = DynamicValue::object();
        let _ = state.set_string(&AttributePath::new("id"), request.id.clone());

        let (scope, name) = match Self::scope_and_name(&state) {
            Ok(keys) => keys,
            Err(diag) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics: vec![diag],
                };
            }
        };
        let _ = state.set_string(&AttributePath::new("scope"), scope.as_str());
        let _ = state.set_string(&AttributePath::new("name"), name);

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
impl ResourceWithConfigure for LimitResource {
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
