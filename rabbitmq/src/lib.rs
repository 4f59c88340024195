pub mod api;
pub mod config;
pub mod data_sources;
pub mod deleted;
pub mod identifier;
pub mod logging;
pub mod provider_data;
pub mod resources;
pub mod settings;

pub use provider_data::RabbitMqProviderData;

use async_trait::async_trait;
use config::ProviderConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{DataSourceFactory, DataSourceWithConfigure};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse,
};
use tfplug::resource::{ResourceFactory, ResourceWithConfigure};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::Diagnostic;

/// Stateless provider; the configured client travels to handlers in the
/// configure response
#[derive(Default)]
pub struct RabbitMqProvider;

impl RabbitMqProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_definition() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Manages RabbitMQ through its HTTP management API")
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Management API URL, e.g. http://localhost:15672. Falls back to RABBITMQ_ENDPOINT")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("Falls back to RABBITMQ_USERNAME")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Falls back to RABBITMQ_PASSWORD")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cacert_file", AttributeType::String)
                    .description("PEM file with the CA certificate to trust")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("clientcert_file", AttributeType::String)
                    .description("PEM client certificate, requires clientkey_file")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("clientkey_file", AttributeType::String)
                    .description("PEM client key, requires clientcert_file")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("proxy", AttributeType::String)
                    .description("Proxy URL, overrides HTTP_PROXY and HTTPS_PROXY")
                    .optional()
                    .build(),
            )
            .build()
    }
}

fn new_resource<R>() -> Box<dyn ResourceWithConfigure>
where
    R: ResourceWithConfigure + Default + 'static,
{
    Box::new(R::default())
}

fn new_data_source<D>() -> Box<dyn DataSourceWithConfigure>
where
    D: DataSourceWithConfigure + Default + 'static,
{
    Box::new(D::default())
}

fn register_resource<R>(factories: &mut HashMap<String, ResourceFactory>)
where
    R: ResourceWithConfigure + Default + 'static,
{
    let factory: ResourceFactory = new_resource::<R>;
    factories.insert(R::default().type_name().to_string(), factory);
}

fn register_data_source<D>(factories: &mut HashMap<String, DataSourceFactory>)
where
    D: DataSourceWithConfigure + Default + 'static,
{
    let factory: DataSourceFactory = new_data_source::<D>;
    factories.insert(D::default().type_name().to_string(), factory);
}

#[async_trait]
impl Provider for RabbitMqProvider {
    fn type_name(&self) -> &str {
        "rabbitmq"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema_definition(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        logging::init_tracing();

        let client = ProviderConfig::from_config(&request.config).and_then(|config| {
            tracing::debug!("Configuring RabbitMQ provider: {:?}", config);
            config.build_client()
        });

        match client {
            Ok(client) => {
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(RabbitMqProviderData::new(client))),
                }
            }
            Err(e) => {
                tracing::error!("RabbitMQ: provider configuration error: {}", e);
                ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Invalid provider configuration",
                        e.to_string(),
                    )],
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories = HashMap::new();
        register_resource::<resources::VhostResource>(&mut factories);
        register_resource::<resources::UserResource>(&mut factories);
        register_resource::<resources::ExchangeResource>(&mut factories);
        register_resource::<resources::QueueResource>(&mut factories);
        register_resource::<resources::BindingResource>(&mut factories);
        register_resource::<resources::LimitResource>(&mut factories);
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories = HashMap::new();
        register_data_source::<data_sources::VhostDataSource>(&mut factories);
        register_data_source::<data_sources::UserDataSource>(&mut factories);
        register_data_source::<data_sources::ExchangeDataSource>(&mut factories);
        register_data_source::<data_sources::QueueDataSource>(&mut factories);
        factories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::data_source::DataSource;
    use tfplug::resource::Resource;
    use tfplug::types::{AttributePath, DynamicValue};

    fn clear_env() {
        std::env::remove_var(config::ENDPOINT_ENV);
        std::env::remove_var(config::USERNAME_ENV);
        std::env::remove_var(config::PASSWORD_ENV);
    }

    fn request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var(config::ENDPOINT_ENV, "http://localhost:15672");
        std::env::set_var(config::USERNAME_ENV, "guest");
        std::env::set_var(config::PASSWORD_ENV, "guest");

        let mut provider = RabbitMqProvider::new();
        let response = provider
            .configure(Context::new(), request(DynamicValue::null()))
            .await;
        clear_env();

        assert!(response.diagnostics.is_empty());
        assert!(response
            .provider_data
            .unwrap()
            .downcast_ref::<RabbitMqProviderData>()
            .is_some());
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_endpoint() {
        clear_env();
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("username"), "guest")
            .unwrap();
        config
            .set_string(&AttributePath::new("password"), "guest")
            .unwrap();

        let mut provider = RabbitMqProvider::new();
        let response = provider.configure(Context::new(), request(config)).await;

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("endpoint"));
        assert!(response.provider_data.is_none());
    }

    #[tokio::test]
    async fn metadata_reports_crate_version() {
        let provider = RabbitMqProvider::new();
        let response = provider
            .metadata(Context::new(), ProviderMetadataRequest)
            .await;

        assert_eq!(response.type_name, "rabbitmq");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn schema_attributes_are_optional_and_password_is_sensitive() {
        let schema = RabbitMqProvider::schema_definition();
        assert_eq!(schema.block.attributes.len(), 8);
        assert!(schema.block.attributes.iter().all(|a| a.optional && !a.required));
        assert!(schema.block.attribute("password").unwrap().sensitive);
    }

    #[test]
    fn provider_registers_all_resources_and_data_sources() {
        let provider = RabbitMqProvider::new();

        let mut resources: Vec<_> = provider.resources().into_keys().collect();
        resources.sort();
        assert_eq!(
            resources,
            vec![
                "rabbitmq_binding",
                "rabbitmq_exchange",
                "rabbitmq_limit",
                "rabbitmq_queue",
                "rabbitmq_user",
                "rabbitmq_vhost",
            ]
        );

        let mut data_sources: Vec<_> = provider.data_sources().into_keys().collect();
        data_sources.sort();
        assert_eq!(
            data_sources,
            vec![
                "rabbitmq_exchange",
                "rabbitmq_queue",
                "rabbitmq_user",
                "rabbitmq_vhost",
            ]
        );
    }

    #[test]
    fn factories_produce_matching_type_names() {
        let provider = RabbitMqProvider::new();
        for (name, factory) in provider.resources() {
            assert_eq!(factory().type_name(), name);
        }
        for (name, factory) in provider.data_sources() {
            assert_eq!(factory().type_name(), name);
        }
    }
}
