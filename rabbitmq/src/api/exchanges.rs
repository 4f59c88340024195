//! Exchange API

use super::client::segment;
use super::{ApiError, Client};
use crate::settings::Arguments;
use serde::{Deserialize, Serialize};

/// Response from GET /api/exchanges/{vhost}/{name}
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub name: String,
    pub vhost: String,
    #[serde(rename = "type")]
    pub exchange_type: String,
    pub durable: bool,
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

/// Request body for PUT /api/exchanges/{vhost}/{name}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeSettings {
    #[serde(rename = "type")]
    pub exchange_type: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

pub struct ExchangesApi<'a> {
    client: &'a Client,
}

impl<'a> ExchangesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(vhost: &str, name: &str) -> String {
        format!("/api/exchanges/{}/{}", segment(vhost), segment(name))
    }

    /// GET /api/exchanges/{vhost}/{name}
    pub async fn get(&self, vhost: &str, name: &str) -> Result<ExchangeInfo, ApiError> {
        self.client.get(&Self::path(vhost, name)).await
    }

    /// PUT /api/exchanges/{vhost}/{name}
    pub async fn declare(
        &self,
        vhost: &str,
        name: &str,
        settings: &ExchangeSettings,
    ) -> Result<(), ApiError> {
        self.client.put(&Self::path(vhost, name), settings).await
    }

    /// DELETE /api/exchanges/{vhost}/{name}
    pub async fn delete(&self, vhost: &str, name: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(vhost, name)).await
    }
}
