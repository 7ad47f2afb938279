//! Transport for posting envelopes to the semantic services
//!
//! The session client only needs "post this JSON, eventually give me JSON
//! back". [`Transport`] is that seam; [`HttpTransport`] is the reqwest
//! implementation used outside of tests.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Network collaborator used by the session client
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON payload to `url` and return the parsed JSON body
    async fn post(&self, url: &str, payload: &Value) -> Result<Value, TransportError>;
}

/// HTTP transport backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a request timeout
    pub fn new(timeout_ms: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, payload: &Value) -> Result<Value, TransportError> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if text.trim().len() < 2 {
            return Err(TransportError::EmptyResponse);
        }

        serde_json::from_str(&text).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }
}

/// Errors that can occur while posting
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Status(502).to_string(), "HTTP status 502");
        assert_eq!(TransportError::EmptyResponse.to_string(), "Empty response");
        assert_eq!(
            TransportError::Http("refused".to_string()).to_string(),
            "HTTP error: refused"
        );
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(1_000).is_ok());
    }
}
