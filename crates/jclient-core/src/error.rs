//! Client-wide error types
//!
//! This module defines the centralized error type using `thiserror`, plus
//! the dispatch failure value handed to callers when a request round trip
//! does not end with an `ok` result code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{AnsonResp, MsgCode};
use crate::transport::TransportError;

/// Client-wide error type
///
/// Covers failures that happen on the client side before or around a
/// dispatch: configuration, unknown ports, unregistered handlers, bad
/// primary-key shapes and encryption problems.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ClientError {
    /// Port path is not a value of the port table
    #[error("Unknown port: {0}")]
    UnknownPort(String),

    /// Handler id was never registered
    #[error("Handler not registered: {0}")]
    UnregisteredHandler(String),

    /// Primary key specification has an unsupported shape
    #[error("Can't understand pk: {0}")]
    InvalidPk(String),

    /// Session was logged out or replaced by a newer login
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Pager was used before being bound
    #[error("Pager not bound: {0}")]
    PagerNotBound(String),

    /// Options are incomplete or contradictory
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Join or order spec couldn't be compiled
    #[error("Compile error: {0}")]
    CompileError(String),

    /// Credential encryption failed
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<crate::compiler::CompileError> for ClientError {
    fn from(err: crate::compiler::CompileError) -> Self {
        Self::CompileError(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Failure side of a dispatch completion
///
/// Every non-`ok` outcome of a round trip ends up here: server result codes
/// are carried verbatim with the raw response, and anything that kept a
/// response from arriving is folded into [`MsgCode::ExIo`].
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct ServError {
    pub code: MsgCode,
    pub message: String,
    pub response: Option<AnsonResp>,
}

impl ServError {
    /// Error reported by the server with a result code other than `ok`
    pub fn from_response(resp: AnsonResp) -> Self {
        Self {
            code: resp.code,
            message: resp.error_text(),
            response: Some(resp),
        }
    }

    /// Connectivity failure, no usable response
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            code: MsgCode::ExIo,
            message: message.into(),
            response: None,
        }
    }

    /// Client-side failure surfaced through the dispatch error path
    pub fn client(err: ClientError) -> Self {
        Self {
            code: MsgCode::ExGeneral,
            message: err.to_string(),
            response: None,
        }
    }
}

impl From<TransportError> for ServError {
    fn from(err: TransportError) -> Self {
        Self::io(err.to_string())
    }
}

impl From<ClientError> for ServError {
    fn from(err: ClientError) -> Self {
        Self::client(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_normalized_to_ex_io() {
        let err: ServError = TransportError::Http("connection refused".to_string()).into();
        assert_eq!(err.code, MsgCode::ExIo);
        assert!(err.message.contains("connection refused"));
        assert!(err.response.is_none());
    }

    #[test]
    fn test_from_response_keeps_code_and_text() {
        let resp: AnsonResp = serde_json::from_value(serde_json::json!({
            "code": "exSession",
            "error": "session expired"
        }))
        .unwrap();

        let err = ServError::from_response(resp);
        assert_eq!(err.code, MsgCode::ExSession);
        assert_eq!(err.message, "session expired");
        assert!(err.response.is_some());
    }

    #[test]
    fn test_client_error_serde() {
        let err = ClientError::UnknownPort("x.serv".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("UnknownPort"));
        assert_eq!(err.to_string(), "Unknown port: x.serv");
    }
}
