//! User API

use super::client::segment;
use super::{ApiError, Client};
use serde::{Deserialize, Deserializer, Serialize};

/// Response from GET /api/users/{name}
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

/// Request body for PUT /api/users/{name}
#[derive(Debug, Clone, Serialize)]
pub struct UserSettings {
    pub password: String,
    pub tags: Vec<String>,
}

/// Brokers before 3.9 report tags as one comma-separated string, later ones as a list
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(tags)) => tags,
        Some(Tags::Joined(joined)) => split_tags(&joined),
        None => Vec::new(),
    })
}

/// Splits a comma-separated tag string, trimming entries and dropping empty ones
pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct UsersApi<'a> {
    client: &'a Client,
}

impl<'a> UsersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(name: &str) -> String {
        format!("/api/users/{}", segment(name))
    }

    /// GET /api/users/{name}
    pub async fn get(&self, name: &str) -> Result<UserInfo, ApiError> {
        self.client.get(&Self::path(name)).await
    }

    /// PUT /api/users/{name}
    pub async fn put(&self, name: &str, settings: &UserSettings) -> Result<(), ApiError> {
        self.client.put(&Self::path(name), settings).await
    }

    /// DELETE /api/users/{name}
    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_as_list() {
        let user: UserInfo =
            serde_json::from_str(r#"{"name":"alice","tags":["administrator","monitoring"]}"#)
                .unwrap();
        assert_eq!(user.tags, vec!["administrator", "monitoring"]);
    }

    #[test]
    fn tags_as_joined_string() {
        let user: UserInfo =
            serde_json::from_str(r#"{"name":"alice","tags":"administrator, monitoring"}"#).unwrap();
        assert_eq!(user.tags, vec!["administrator", "monitoring"]);
    }

    #[test]
    fn empty_and_missing_tags() {
        let user: UserInfo = serde_json::from_str(r#"{"name":"bob","tags":""}"#).unwrap();
        assert!(user.tags.is_empty());

        let user: UserInfo = serde_json::from_str(r#"{"name":"bob"}"#).unwrap();
        assert!(user.tags.is_empty());
    }

    #[test]
    fn split_tags_drops_blanks() {
        assert_eq!(split_tags(" management ,, policymaker"), vec!["management", "policymaker"]);
        assert!(split_tags("").is_empty());
    }
}
