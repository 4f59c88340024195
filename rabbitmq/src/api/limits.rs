//! Vhost and user limits API

use super::client::segment;
use super::{ApiError, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whether a limit applies to a virtual host or to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Vhost,
    User,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::Vhost => "vhost",
            LimitScope::User => "user",
        }
    }

    fn base_path(&self) -> &'static str {
        match self {
            LimitScope::Vhost => "/api/vhost-limits",
            LimitScope::User => "/api/user-limits",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vhost" => Ok(LimitScope::Vhost),
            "user" => Ok(LimitScope::User),
            other => Err(format!("scope must be 'vhost' or 'user', got '{}'", other)),
        }
    }
}

/// One entry of GET /api/{vhost|user}-limits/{name}
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsInfo {
    #[serde(default)]
    pub value: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
struct LimitValue {
    value: i64,
}

pub struct LimitsApi<'a> {
    client: &'a Client,
}

impl<'a> LimitsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/{vhost|user}-limits/{name}
    ///
    /// Returns the first entry's limits, or None when nothing is set.
    pub async fn get(
        &self,
        scope: LimitScope,
        name: &str,
    ) -> Result<Option<BTreeMap<String, i64>>, ApiError> {
        let path = format!("{}/{}", scope.base_path(), segment(name));
        let entries: Vec<LimitsInfo> = self.client.get(&path).await?;
        Ok(entries.into_iter().next().map(|entry| entry.value))
    }

    /// PUT /api/{vhost|user}-limits/{name}/{limit}
    pub async fn put(
        &self,
        scope: LimitScope,
        name: &str,
        limit: &str,
        value: i64,
    ) -> Result<(), ApiError> {
        let path = format!(
            "{}/{}/{}",
            scope.base_path(),
            segment(name),
            segment(limit)
        );
        self.client.put(&path, &LimitValue { value }).await
    }

    /// DELETE /api/{vhost|user}-limits/{name}/{limit}
    pub async fn delete(&self, scope: LimitScope, name: &str, limit: &str) -> Result<(), ApiError> {
        let path = format!(
            "{}/{}/{}",
            scope.base_path(),
            segment(name),
            segment(limit)
        );
        self.client.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn scope_parsing() {
        assert_eq!("vhost".parse::<LimitScope>().unwrap(), LimitScope::Vhost);
        assert_eq!("user".parse::<LimitScope>().unwrap(), LimitScope::User);
        assert!("queue".parse::<LimitScope>().is_err());
    }

    #[tokio::test]
    async fn get_takes_first_entry() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/vhost-limits/%2F")
            .with_body(r#"[{"vhost":"/","value":{"max-connections":10,"max-queues":5}}]"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "guest").unwrap();
        let limits = client
            .limits()
            .get(LimitScope::Vhost, "/")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(limits.get("max-connections"), Some(&10));
        assert_eq!(limits.get("max-queues"), Some(&5));
    }

    #[tokio::test]
    async fn get_empty_list_is_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/user-limits/alice")
            .with_body("[]")
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "guest").unwrap();
        let limits = client.limits().get(LimitScope::User, "alice").await.unwrap();

        assert!(limits.is_none());
    }

    #[tokio::test]
    async fn put_sends_value_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/user-limits/alice/max-channels")
            .match_body(Matcher::Json(serde_json::json!({"value": 20})))
            .with_status(204)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "guest").unwrap();
        client
            .limits()
            .put(LimitScope::User, "alice", "max-channels", 20)
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
