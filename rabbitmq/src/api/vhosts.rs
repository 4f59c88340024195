//! Virtual host API

use super::client::segment;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};

/// Response from GET /api/vhosts/{vhost}
#[derive(Debug, Clone, Deserialize)]
pub struct VhostInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_queue_type: Option<String>,
    #[serde(default)]
    pub tracing: bool,
}

/// Request body for PUT /api/vhosts/{vhost}
#[derive(Debug, Clone, Default, Serialize)]
pub struct VhostSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_queue_type: Option<String>,
    pub tracing: bool,
}

pub struct VhostsApi<'a> {
    client: &'a Client,
}

impl<'a> VhostsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(name: &str) -> String {
        format!("/api/vhosts/{}", segment(name))
    }

    /// GET /api/vhosts/{vhost}
    pub async fn get(&self, name: &str) -> Result<VhostInfo, ApiError> {
        self.client.get(&Self::path(name)).await
    }

    /// PUT /api/vhosts/{vhost}
    pub async fn put(&self, name: &str, settings: &VhostSettings) -> Result<(), ApiError> {
        self.client.put(&Self::path(name), settings).await
    }

    /// DELETE /api/vhosts/{vhost}
    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(name)).await
    }
}
