//! Request/response plumbing between the client and the remote authority.
//!
//! Components never talk to `reqwest` directly; they build an [`ApiRequest`]
//! and hand it to a [`Transport`]. `HttpTransport` is the production
//! implementation, `InMemoryAuthority` the in-process one.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use warden_auth::BearerToken;

use crate::error::ClientError;

/// Endpoint paths, relative to the API base URL.
pub mod endpoints {
    use warden_core::UserId;

    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGOUT: &str = "/auth/logout";
    pub const ME: &str = "/auth/me";
    pub const USERS: &str = "/admin/users";
    pub const DELETED_USERS: &str = "/admin/users/deleted/list";

    pub fn user(id: UserId) -> String {
        format!("/admin/users/{id}")
    }

    pub fn exists(id: UserId) -> String {
        format!("/admin/users/{id}/exists")
    }

    pub fn restore(id: UserId) -> String {
        format!("/admin/users/{id}/restore")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<BearerToken>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_bearer(mut self, token: BearerToken) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    text: String,
}

impl ApiResponse {
    /// Build a response from raw body text; non-JSON bodies become `Value::Null`.
    pub fn from_text(status: u16, text: impl Into<String>) -> Self {
        let text = text.into();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, body, text }
    }

    pub fn json(status: u16, body: Value) -> Self {
        let text = body.to_string();
        Self { status, body, text }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable reason carried by an error body.
    pub fn detail(&self) -> String {
        if let Some(detail) = self.body.get("detail").and_then(Value::as_str) {
            return detail.to_string();
        }
        if !self.text.trim().is_empty() {
            return self.text.trim().to_string();
        }
        format!("HTTP {}", self.status)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_value(self.body.clone()).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Decode a success body, or map the failure status onto `ClientError`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        if self.is_success() {
            self.decode()
        } else {
            Err(ClientError::from_response(&self))
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),
}

/// Anything that can carry an [`ApiRequest`] to the remote authority.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Send `request` with an upper bound on how long it may take.
///
/// Elapsed deadlines surface as `TransportError::Timeout`, which callers treat
/// like any other transient failure.
pub async fn send_bounded(
    transport: &dyn Transport,
    request: ApiRequest,
    limit: Duration,
) -> Result<ApiResponse, TransportError> {
    let method = request.method;
    let path = request.path.clone();
    match tokio::time::timeout(limit, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(%method, %path, ?limit, "request timed out");
            Err(TransportError::Timeout(limit))
        }
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        let mut req = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        };

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        tracing::debug!(method = %request.method, path = %request.path, status, "response received");
        Ok(ApiResponse::from_text(status, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::UserId;

    #[test]
    fn detail_prefers_the_detail_field() {
        let resp = ApiResponse::json(400, json!({ "detail": "Cannot delete yourself" }));
        assert_eq!(resp.detail(), "Cannot delete yourself");

        let resp = ApiResponse::from_text(502, "Bad Gateway");
        assert_eq!(resp.detail(), "Bad Gateway");
        assert_eq!(resp.body, Value::Null);

        let resp = ApiResponse::from_text(500, "");
        assert_eq!(resp.detail(), "HTTP 500");
    }

    #[test]
    fn endpoint_paths() {
        let id = UserId::new(42);
        assert_eq!(endpoints::exists(id), "/admin/users/42/exists");
        assert_eq!(endpoints::restore(id), "/admin/users/42/restore");
        assert_eq!(endpoints::user(id), "/admin/users/42");
    }

    #[test]
    fn query_params_are_kept_in_order() {
        let req = ApiRequest::delete(endpoints::user(UserId::new(7))).with_query("permanent", true);
        assert_eq!(req.query_param("permanent"), Some("true"));
        assert_eq!(req.query_param("missing"), None);
    }

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_send_times_out() {
        let err = send_bounded(&Stalled, ApiRequest::get(endpoints::ME), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_secs(2)));
    }
}
