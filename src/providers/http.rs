use crate::core::quote::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    /// When false, certificate validation is skipped.
    pub verify_tls: bool,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("User-Agent", BROWSER_USER_AGENT.to_string())],
            body: None,
            timeout,
            verify_tls: true,
        }
    }

    pub fn post(url: impl Into<String>, body: String, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url, timeout)
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn insecure(mut self) -> Self {
        self.verify_tls = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure, before any status code or payload is seen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("certificate validation failed: {0}")]
    Certificate(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RequestError::Timeout;
        }
        let chain = error_chain(&err);
        if is_certificate_failure(&chain) {
            RequestError::Certificate(chain)
        } else if err.is_connect() {
            RequestError::Connect(chain)
        } else {
            RequestError::Other(chain)
        }
    }
}

impl From<RequestError> for FetchError {
    fn from(err: RequestError) -> Self {
        FetchError::Transient(err.to_string())
    }
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

fn is_certificate_failure(chain: &str) -> bool {
    let chain = chain.to_lowercase();
    chain.contains("certificate") || chain.contains("self signed") || chain.contains("unknownissuer")
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError>;
}

/// reqwest-backed transport. Holds one validating and one non-validating client.
pub struct ReqwestTransport {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let insecure_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build HTTP client without certificate validation")?;
        Ok(Self {
            client,
            insecure_client,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        let client = if request.verify_tls {
            &self.client
        } else {
            &self.insecure_client
        };
        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        }
        .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(url = %request.url, verify_tls = request.verify_tls, "Sending request");
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_header_replaces_existing_value() {
        let request = HttpRequest::get("http://localhost", Duration::from_secs(1))
            .header("user-agent", "custom")
            .header("Referer", "http://example.com");
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.headers[0], ("user-agent", "custom".to_string()));
    }

    #[test]
    fn test_certificate_failures_are_recognised() {
        assert!(is_certificate_failure(
            "error sending request: invalid peer certificate: UnknownIssuer"
        ));
        assert!(is_certificate_failure(
            "error trying to connect: certificate verify failed"
        ));
        assert!(!is_certificate_failure("connection refused"));
    }

    #[tokio::test]
    async fn test_reqwest_transport_returns_status_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("SOAPAction", "urn:test"))
            .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest::post(
            format!("{}/echo", mock_server.uri()),
            "<x/>".to_string(),
            Duration::from_secs(5),
        )
        .header("SOAPAction", "urn:test");
        let response = transport.send(request).await.unwrap();

        assert_eq!(response.status, 418);
        assert_eq!(response.body, "teapot");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_reqwest_transport_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(HttpRequest::get(mock_server.uri(), Duration::from_millis(50)))
            .await;

        assert_eq!(result.unwrap_err(), RequestError::Timeout);
    }
}
