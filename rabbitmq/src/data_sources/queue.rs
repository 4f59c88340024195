//! Queue data source implementation

use super::read_error;
use crate::resources::{
    call, not_configured, optional_string, provider_data_from, required_string, settings_id_for,
    DEFAULT_VHOST,
};
use crate::settings::Settings;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, DynamicValue};
use tfplug::validate_config;

#[derive(Default)]
pub struct QueueDataSource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl QueueDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up an existing RabbitMQ queue")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("name@vhost@durable:auto_delete:arguments")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the queue")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vhost", AttributeType::String)
                    .description("Virtual host of the queue, defaults to /")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("durable", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_delete", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl DataSource for QueueDataSource {
    fn type_name(&self) -> &str {
        "rabbitmq_queue"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_definition(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: validate_config(&Self::schema_definition(), &request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![not_configured()],
                };
            }
        };

        let name = match required_string(&request.config, "name") {
            Ok(name) => name,
            Err(diag) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![diag],
                };
            }
        };
        let vhost =
            optional_string(&request.config, "vhost").unwrap_or_else(|| DEFAULT_VHOST.to_string());

        tracing::debug!("RabbitMQ: Looking up queue {} in vhost {}", name, vhost);
        let info = match call(&ctx, provider_data.client.queues().get(&vhost, &name)).await {
            Ok(info) => info,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![read_error("Queue", &name, &e)],
                };
            }
        };

        let settings = Settings::from_queue(&info);
        let id = match settings_id_for(&info.name, &info.vhost, &settings) {
            Ok(id) => id,
            Err(diag) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics: vec![diag],
                };
            }
        };

        let mut state = request.config;
        let _ = state.set_string(&AttributePath::new("id"), id);
        let _ = state.set_string(&AttributePath::new("name"), info.name);
        let _ = state.set_string(&AttributePath::new("vhost"), info.vhost);
        let _ = state.set_string(&AttributePath::new("type"), settings.kind);
        let _ = state.set_bool(&AttributePath::new("durable"), settings.durable);
        let _ = state.set_bool(&AttributePath::new("auto_delete"), settings.auto_delete);

        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for QueueDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureDataSourceResponse { diagnostics }
    }
}
