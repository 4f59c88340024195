//! User resource implementation

use super::{
    api_error, call, not_configured, optional_string, provider_data_from, required_string,
};
use crate::api::users::{split_tags, UserSettings};
use crate::deleted::check_deleted;
use async_trait::async_trait;
use tfplug::context::Context;
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
use tfplug::validate_config;

#[derive(Default)]
pub struct UserResource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl UserResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages a RabbitMQ user")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The user name")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the user")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Password of the user")
                    .required()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::String)
                    .description("Comma-separated user tags, e.g. \"administrator,management\"")
                    .optional()
                    .build(),
            )
            .build()
    }

    fn settings_from_state(state: &DynamicValue) -> Result<UserSettings, Diagnostic> {
        Ok(UserSettings {
            password: required_string(state, "password")?,
            tags: optional_string(state, "tags")
                .map(|tags| split_tags(&tags))
                .unwrap_or_default(),
        })
    }

    /// Keeps the configured tag string when it names the same tags the
    /// broker reports
    fn reconcile_tags(state: &mut DynamicValue, remote: &[String]) {
        let current = optional_string(state, "tags");
        let unchanged = match &current {
            Some(tags) => split_tags(tags) == remote,
            None => remote.is_empty(),
        };
        if !unchanged {
            let _ = state.set_string(&AttributePath::new("tags"), remote.join(","));
        }
    }

    /// Refreshes `state` from the broker. The password is never read back.
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

        tracing::debug!("RabbitMQ: Attempting to read user: {}", name);
        let info = match check_deleted(call(ctx, provider_data.client.users().get(&name)).await) {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::warn!("RabbitMQ: user {} no longer exists, removing from state", name);
                return Ok(None);
            }
            Err(e) => return Err(api_error("Failed to read user", &e)),
        };

        let _ = state.set_string(&AttributePath::new("id"), info.name.clone());
        let _ = state.set_string(&AttributePath::new("name"), info.name);
        Self::reconcile_tags(&mut state, &info.tags);

        Ok(Some(state))
    }

    async fn put_user(
        &self,
        ctx: &Context,
        provider_data: &crate::RabbitMqProviderData,
        state: &DynamicValue,
        action: &str,
    ) -> Result<String, Diagnostic> {
        let name = required_string(state, "name")?;
        let settings = Self::settings_from_state(state)?;

        tracing::info!("RabbitMQ: Attempting to {} user: {}", action, name);
        call(ctx, provider_data.client.users().put(&name, &settings))
            .await
            .map_err(|e| {
                tracing::error!("RabbitMQ: User {} error: {}", action, e);
                api_error(format!("Failed to {} user", action), &e)
            })?;
        Ok(name)
    }
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &str {
        "rabbitmq_user"
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
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![not_configured()],
                };
            }
        };

        let name = match self
            .put_user(&ctx, provider_data, &request.planned_state, "create")
            .await
        {
            Ok(name) => name,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                };
            }
        };

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), name.clone());

        match self.read_remote(&ctx, provider_data, state).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![Diagnostic::error(
                    "Failed to create user",
                    format!("User {} was not found after creation", name),
                )],
            },
            Err(diag) => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![diag],
            },
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
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![not_configured()],
                };
            }
        };

        let name = match self
            .put_user(&ctx, provider_data, &request.planned_state, "update")
            .await
        {
            Ok(name) => name,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                };
            }
        };

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), name);

        match self.read_remote(&ctx, provider_data, state.clone()).await {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: state,
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: state,
                diagnostics: vec![diag],
            },
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

        tracing::info!("RabbitMQ: Attempting to delete user: {}", name);
        if let Err(e) = check_deleted(call(&ctx, provider_data.client.users().delete(&name)).await) {
            tracing::error!("RabbitMQ: User deletion error: {}", e);
            diagnostics.push(api_error("Failed to delete user", &e));
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
impl ResourceWithConfigure for UserResource {
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

    fn state_with_tags(tags: Option<&str>) -> DynamicValue {
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new("name"), "mctest").unwrap();
        state
            .set_string(&AttributePath::new("password"), "foobar")
            .unwrap();
        if let Some(tags) = tags {
            state.set_string(&AttributePath::new("tags"), tags).unwrap();
        }
        state
    }

    #[test]
    fn password_is_sensitive() {
        let schema = UserResource::schema_definition();
        let password = schema.block.attribute("password").unwrap();
        assert!(password.sensitive);
        assert!(password.required);
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        let settings =
            UserResource::settings_from_state(&state_with_tags(Some("management, policymaker,")))
                .unwrap();
        assert_eq!(settings.tags, vec!["management", "policymaker"]);
        assert_eq!(settings.password, "foobar");
    }

    #[test]
    fn equivalent_tag_string_is_kept() {
        let mut state = state_with_tags(Some("management, policymaker"));
        UserResource::reconcile_tags(
            &mut state,
            &["management".to_string(), "policymaker".to_string()],
        );
        assert_eq!(
            state.get_string(&AttributePath::new("tags")).unwrap(),
            "management, policymaker"
        );
    }

    #[test]
    fn drifted_tags_are_replaced() {
        let mut state = state_with_tags(Some("management"));
        UserResource::reconcile_tags(&mut state, &["administrator".to_string()]);
        assert_eq!(
            state.get_string(&AttributePath::new("tags")).unwrap(),
            "administrator"
        );

        let mut state = state_with_tags(None);
        UserResource::reconcile_tags(&mut state, &[]);
        assert!(optional_string(&state, "tags").is_none());
    }

    #[test]
    fn missing_password_is_reported() {
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new("name"), "mctest").unwrap();
        assert!(UserResource::settings_from_state(&state).is_err());
    }
}
