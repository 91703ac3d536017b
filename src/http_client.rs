//! HTTP client abstraction for the REST collaborators.
//!
//! This module provides a trait-based abstraction over HTTP clients, enabling
//! dependency injection and easy mocking in tests.

use crate::config::Secret;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use serde_json::Value;

/// Credential header attached to a request.
#[derive(Debug, Clone)]
pub enum Auth {
    Bearer(Secret),
    Basic { user: String, password: Secret },
}

/// A fully formed request, built by a handler before it is sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub auth: Option<Auth>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            auth: None,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

}

/// Status, headers and body of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Trait for HTTP communication with external APIs.
///
/// This abstraction allows injecting mock HTTP clients for testing without
/// making real network requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends one request and returns whatever the server answered.
    ///
    /// Non-2xx statuses are not errors at this level.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body cannot be read.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// HTTP client implementation using reqwest.
///
/// Redirects are never followed; a 3xx comes back to the caller as-is.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("adminkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header("Accept", "application/json");

        builder = match &request.auth {
            Some(Auth::Bearer(token)) => builder.bearer_auth(token.expose()),
            Some(Auth::Basic { user, password }) => builder.basic_auth(user, Some(password.expose())),
            None => builder,
        };

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder_collects_parts() {
        let request = HttpRequest::new(Method::POST, "https://forge.example/api/v4/groups")
            .json(json!({"name": "Ops"}))
            .auth(Auth::Bearer(Secret::new("tok")));

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"name": "Ops"})));
        assert!(matches!(request.auth, Some(Auth::Bearer(_))));
    }

    #[test]
    fn test_auth_debug_never_shows_secret() {
        let auth = Auth::Basic {
            user: "admin".to_string(),
            password: Secret::new("hunter2"),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::new(Method::GET, "http://127.0.0.1:1/api");
        assert!(client.send(&request).await.is_err());
    }
}
