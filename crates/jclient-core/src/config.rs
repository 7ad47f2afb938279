//! Client configuration
//!
//! Where the services live, which connection they should use and how long
//! a round trip may take.

use serde::{Deserialize, Serialize};

use crate::protocol::Port;

/// Default service root
pub const DEFAULT_SERV_ROOT: &str = "http://localhost:8080/jserv-sample";

/// Default request timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default page size used when a pager doesn't specify one
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Client configuration
///
/// Provides centralized configuration management with:
/// - Serde support for loading from files/env
/// - Builder pattern for customization
/// - Sensible defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service root URL, without trailing slash
    pub serv_root: String,

    /// Connection id configured at the server; `None` lets the server decide
    pub conn_id: Option<String>,

    /// Log request and response bodies
    pub verbose: bool,

    /// Request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            serv_root: DEFAULT_SERV_ROOT.to_string(),
            conn_id: None,
            verbose: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serv_root(mut self, serv_root: impl Into<String>) -> Self {
        let root: String = serv_root.into();
        self.serv_root = root.trim_end_matches('/').to_string();
        self
    }

    pub fn with_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.conn_id = Some(conn_id.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// URL of a port
    pub fn serv_url(&self, port: Port) -> String {
        match self.conn_id {
            Some(ref conn) => format!("{}/{}?conn={}", self.serv_root, port.path(), conn),
            None => format!("{}/{}", self.serv_root, port.path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::new();
        assert_eq!(cfg.serv_root, DEFAULT_SERV_ROOT);
        assert!(cfg.conn_id.is_none());
        assert_eq!(cfg.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_serv_url() {
        let cfg = ClientConfig::new().with_serv_root("http://host/jserv/");
        assert_eq!(cfg.serv_url(Port::Query), "http://host/jserv/r.serv");

        let cfg = cfg.with_conn_id("sys-sqlite");
        assert_eq!(
            cfg.serv_url(Port::Session),
            "http://host/jserv/login.serv?conn=sys-sqlite"
        );
    }
}
