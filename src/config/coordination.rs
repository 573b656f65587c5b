use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SESSION_TIMEOUT};

/// Coordination cluster endpoint and session parameters.
///
/// The host is resolved anew on every session creation so that cluster
/// membership changes are picked up on reconnect; all resolved addresses are
/// offered to the connector.
#[derive(Debug, Deserialize, Clone)]
pub struct CoordinationConfig {
    /// Domain name (or literal address) of the coordination cluster
    /// Default: localhost
    #[serde(default = "default_host")]
    pub host: String,

    /// Client port of the coordination cluster
    /// Default: 2181
    #[serde(default = "default_port")]
    pub port: u16,

    /// Session timeout negotiated with the service. Watches and the session
    /// itself die when connectivity is lost for longer than this.
    /// Default: 30 seconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Maximum time to wait for session establishment
    /// Default: 1 second
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl CoordinationConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    2181
}
fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT.as_millis() as u64
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}
