//! HTTP transport seam. The gateway shapes requests and classifies failures;
//! a transport only moves bytes and enforces the timeout ceiling.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use focusmate_core::CompanionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outbound request. Query parameters are kept apart from `url` so that
/// secrets passed as parameters never show up in logged URLs.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        let query_names: Vec<&str> = self.query.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("query", &query_names)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request. Any status code is a successful exchange; only
/// transport failures and the timeout ceiling produce errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest, timeout: Duration)
        -> Result<HttpResponse, CompanionError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> CompanionError {
    if err.is_timeout() {
        return CompanionError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    let connect = err.is_connect();
    let err = err.without_url();
    if connect {
        CompanionError::Network(format!("Connection failed: {err}"))
    } else {
        CompanionError::Network(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, CompanionError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = ?request.method, url = %request.url, "Sending provider request");

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        // Abort the whole exchange, including the body read, at the ceiling.
        match tokio::time::timeout(timeout, exchange).await {
            Err(_) => Err(CompanionError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Ok(Err(err)) => Err(map_transport_error(err, timeout)),
            Ok(Ok(response)) => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_header_and_query_values() {
        let request = HttpRequest::post_json("https://example.test/v1", serde_json::json!({}))
            .header("Authorization", "Bearer sk-secret-value")
            .query("key", "AIzaSecret");
        let debug = format!("{request:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(!debug.contains("AIzaSecret"));
        assert!(debug.contains("Authorization"));
        assert_eq!(request.header_value("authorization"), Some("Bearer sk-secret-value"));
        assert_eq!(request.query_value("key"), Some("AIzaSecret"));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let transport = ReqwestTransport::new().unwrap();
        // Port 9 on loopback is the discard service and is closed on test hosts.
        let err = transport
            .send(HttpRequest::get("http://127.0.0.1:9/"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            CompanionError::Network(_) | CompanionError::Timeout { .. }
        ));
    }
}
