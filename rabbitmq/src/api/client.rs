use reqwest::header::LOCATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ApiErrorDetails};

/// RabbitMQ management API client
///
/// Cheap to clone; all clones share one connection pool. Requests are sent
/// once and never retried.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl Client {
    /// Create a client with a default HTTP transport
    #[cfg(test)]
    pub(crate) fn new(endpoint: &str, username: &str, password: &str) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self::with_http_client(
            http_client,
            endpoint,
            username,
            password,
        ))
    }

    /// Create a client on top of a preconfigured transport (TLS, proxy)
    pub fn with_http_client(
        http_client: reqwest::Client,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                username: username.to_string(),
                password: password.to_string(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        self.parse_success_response(response).await
    }

    /// Execute a PUT request; the broker answers 201/204 without a body
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.send(self.request(Method::PUT, path).json(body))
            .await
            .map(|_| ())
    }

    /// Execute a POST request and return the `Location` header, if any
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<String>, ApiError> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(location)
    }

    /// Execute a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path))
            .await
            .map(|_| ())
    }

    pub fn vhosts(&self) -> super::vhosts::VhostsApi<'_> {
        super::vhosts::VhostsApi::new(self)
    }

    pub fn users(&self) -> super::users::UsersApi<'_> {
        super::users::UsersApi::new(self)
    }

    pub fn exchanges(&self) -> super::exchanges::ExchangesApi<'_> {
        super::exchanges::ExchangesApi::new(self)
    }

    pub fn queues(&self) -> super::queues::QueuesApi<'_> {
        super::queues::QueuesApi::new(self)
    }

    pub fn bindings(&self) -> super::bindings::BindingsApi<'_> {
        super::bindings::BindingsApi::new(self)
    }

    pub fn limits(&self) -> super::limits::LimitsApi<'_> {
        super::limits::LimitsApi::new(self)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);

        self.inner
            .http_client
            .request(method, url)
            .basic_auth(&self.inner.username, Some(&self.inner.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthError);
        }
        Err(self.handle_error_response(response).await)
    }

    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::trace!("API response body: {}", text);

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response(&self, response: Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let details = serde_json::from_str::<ApiErrorDetails>(&text)
            .ok()
            .map(Box::new);
        let message = match &details {
            Some(details) => details.to_string(),
            None => text,
        };

        ApiError::ApiError {
            status,
            message,
            details,
        }
    }
}

/// Percent-encodes one path segment, so that `/` becomes `%2F`
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Overview {
        rabbitmq_version: String,
    }

    #[test]
    fn segment_encodes_default_vhost() {
        assert_eq!(segment("/"), "%2F");
        assert_eq!(segment("a b"), "a%20b");
        assert_eq!(segment("orders"), "orders");
    }

    #[tokio::test]
    async fn get_sends_basic_auth_and_parses_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/overview")
            // guest:guest
            .match_header("authorization", "Basic Z3Vlc3Q6Z3Vlc3Q=")
            .with_body(r#"{"rabbitmq_version":"3.13.0"}"#)
            .create_async()
            .await;

        let client = Client::new(&format!("{}/", server.url()), "guest", "guest").unwrap();
        let overview: Overview = client.get("/api/overview").await.unwrap();

        assert_eq!(overview.rabbitmq_version, "3.13.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_body_is_decoded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/vhosts/missing")
            .with_status(404)
            .with_body(r#"{"error":"Object Not Found","reason":"Not Found"}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "guest").unwrap();
        let err = client
            .get::<serde_json::Value>("/api/vhosts/missing")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Object Not Found: Not Found"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/api/users/alice")
            .with_status(401)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "wrong").unwrap();
        let err = client.delete("/api/users/alice").await.unwrap_err();

        assert!(matches!(err, ApiError::AuthError));
    }

    #[tokio::test]
    async fn post_returns_location_header() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/bindings/%2F/e/src/q/dst")
            .with_status(201)
            .with_header("location", "../../../../%2F/e/src/q/dst/orders.%23")
            .create_async()
            .await;

        let client = Client::new(&server.url(), "guest", "guest").unwrap();
        let location = client
            .post("/api/bindings/%2F/e/src/q/dst", &serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(
            location.as_deref(),
            Some("../../../../%2F/e/src/q/dst/orders.%23")
        );
    }
}
