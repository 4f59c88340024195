//! Vhost data source implementation

use super::read_error;
use crate::resources::{call, not_configured, provider_data_from, required_string};
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
pub struct VhostDataSource {
    provider_data: Option<crate::RabbitMqProviderData>,
}

impl VhostDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Looks up an existing RabbitMQ virtual host")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The vhost name")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the virtual host")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("queue_type", AttributeType::String)
                    .description("Default queue type of the vhost")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tracing", AttributeType::Bool)
                    .computed()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl DataSource for VhostDataSource {
    fn type_name(&self) -> &str {
        "rabbitmq_vhost"
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

        tracing::debug!("RabbitMQ: Looking up vhost: {}", name);
        match call(&ctx, provider_data.client.vhosts().get(&name)).await {
            Ok(info) => {
                let mut state = request.config;
                let _ = state.set_string(&AttributePath::new("id"), info.name.clone());
                let _ = state.set_string(&AttributePath::new("name"), info.name);
                let _ = state.set_string(
                    &AttributePath::new("description"),
                    info.description.unwrap_or_default(),
                );
                let _ = state.set_string(
                    &AttributePath::new("queue_type"),
                    info.default_queue_type.unwrap_or_default(),
                );
                let _ = state.set_bool(&AttributePath::new("tracing"), info.tracing);

                ReadDataSourceResponse {
                    state,
                    diagnostics: vec![],
                }
            }
            Err(e) => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![read_error("Vhost", &name, &e)],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for VhostDataSource {
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
