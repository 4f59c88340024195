//! Binding API

use super::client::segment;
use super::{ApiError, Client};
use crate::settings::Arguments;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of object a binding routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Queue,
    Exchange,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Queue => "queue",
            DestinationType::Exchange => "exchange",
        }
    }

    /// Short form used in binding URLs
    fn path_letter(&self) -> &'static str {
        match self {
            DestinationType::Queue => "q",
            DestinationType::Exchange => "e",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(DestinationType::Queue),
            "exchange" => Ok(DestinationType::Exchange),
            other => Err(format!(
                "destination type must be 'queue' or 'exchange', got '{}'",
                other
            )),
        }
    }
}

/// One entry of GET /api/bindings/{vhost}
#[derive(Debug, Clone, Deserialize)]
pub struct BindingInfo {
    pub source: String,
    pub vhost: String,
    pub destination: String,
    pub destination_type: DestinationType,
    #[serde(default)]
    pub routing_key: String,
    #[serde(default)]
    pub arguments: Arguments,
    pub properties_key: String,
}

/// Request body for POST /api/bindings/{vhost}/e/{source}/{q|e}/{destination}
#[derive(Debug, Clone, Serialize)]
pub struct BindingSettings {
    pub routing_key: String,
    pub arguments: Arguments,
}

pub struct BindingsApi<'a> {
    client: &'a Client,
}

impl<'a> BindingsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn route_path(
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
    ) -> String {
        format!(
            "/api/bindings/{}/e/{}/{}/{}",
            segment(vhost),
            segment(source),
            destination_type.path_letter(),
            segment(destination)
        )
    }

    /// GET /api/bindings/{vhost}
    pub async fn list(&self, vhost: &str) -> Result<Vec<BindingInfo>, ApiError> {
        self.client
            .get(&format!("/api/bindings/{}", segment(vhost)))
            .await
    }

    /// Linear scan of the vhost's bindings for one matching all four keys
    pub async fn find(
        &self,
        vhost: &str,
        destination_type: DestinationType,
        properties_key: &str,
        source: &str,
        destination: &str,
    ) -> Result<Option<BindingInfo>, ApiError> {
        let bindings = self.list(vhost).await?;
        Ok(bindings.into_iter().find(|b| {
            b.destination_type == destination_type
                && b.properties_key == properties_key
                && b.source == source
                && b.destination == destination
        }))
    }

    /// POST /api/bindings/{vhost}/e/{source}/{q|e}/{destination}
    ///
    /// Returns the properties key the broker assigned, taken from the last
    /// segment of the `Location` header.
    pub async fn declare(
        &self,
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        settings: &BindingSettings,
    ) -> Result<String, ApiError> {
        let path = Self::route_path(vhost, source, destination_type, destination);
        let location = self.client.post(&path, settings).await?.ok_or_else(|| {
            ApiError::ParseError("binding response has no Location header".to_string())
        })?;
        properties_key_from_location(&location)
    }

    /// DELETE /api/bindings/{vhost}/e/{source}/{q|e}/{destination}/{props}
    pub async fn delete(
        &self,
        vhost: &str,
        source: &str,
        destination_type: DestinationType,
        destination: &str,
        properties_key: &str,
    ) -> Result<(), ApiError> {
        let path = format!(
            "{}/{}",
            Self::route_path(vhost, source, destination_type, destination),
            segment(properties_key)
        );
        self.client.delete(&path).await
    }
}

fn properties_key_from_location(location: &str) -> Result<String, ApiError> {
    let last = location.rsplit('/').next().unwrap_or(location);
    urlencoding::decode(last)
        .map(|key| key.into_owned())
        .map_err(|e| ApiError::ParseError(format!("invalid properties key '{}': {}", last, e)))
}
