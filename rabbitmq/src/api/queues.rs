//! Queue API

use super::client::segment;
use super::{ApiError, Client};
use crate::settings::Arguments;
use serde::{Deserialize, Serialize};

/// Response from GET /api/queues/{vhost}/{name}
#[derive(Debug, Clone, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub vhost: String,
    /// Missing on brokers older than 3.8
    #[serde(rename = "type", default)]
    pub queue_type: Option<String>,
    pub durable: bool,
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Arguments,
}

/// Request body for PUT /api/queues/{vhost}/{name}
///
/// The queue type travels inside `arguments` as `x-queue-type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSettings {
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

pub struct QueuesApi<'a> {
    client: &'a Client,
}

impl<'a> QueuesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(vhost: &str, name: &str) -> String {
        format!("/api/queues/{}/{}", segment(vhost), segment(name))
    }

    /// GET /api/queues/{vhost}/{name}
    pub async fn get(&self, vhost: &str, name: &str) -> Result<QueueInfo, ApiError> {
        self.client.get(&Self::path(vhost, name)).await
    }

    /// PUT /api/queues/{vhost}/{name}
    pub async fn declare(
        &self,
        vhost: &str,
        name: &str,
        settings: &QueueSettings,
    ) -> Result<(), ApiError> {
        self.client.put(&Self::path(vhost, name), settings).await
    }

    /// DELETE /api/queues/{vhost}/{name}
    pub async fn delete(&self, vhost: &str, name: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(vhost, name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_info_without_type() {
        let info: QueueInfo = serde_json::from_str(
            r#"{"name":"jobs","vhost":"/","durable":true,"auto_delete":false,"arguments":{}}"#,
        )
        .unwrap();

        assert_eq!(info.queue_type, None);
        assert!(info.arguments.is_empty());
    }
}
