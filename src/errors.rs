//! Error hierarchy for the watch-driven configuration cache.
//!
//! Split by who recovers: transport and rebuild failures are absorbed at the
//! holder boundary (the previous resource stays authoritative), while write
//! conflicts and initialization exhaustion surface to the caller.

use std::time::Duration;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cannot reach or talk to the coordination service
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session invalidated by the service; all of its watches are gone
    #[error("coordination session expired")]
    SessionExpired,

    /// Optimistic write lost a race against a concurrent writer
    #[error("version conflict on {path}: expected {expected}, actual {actual}")]
    VersionConflict {
        path: String,
        expected: i32,
        actual: i32,
    },

    /// A specialization's build hook failed
    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    /// Requested key not present in the current snapshot
    #[error("configuration key absent: {key}")]
    ConfigurationAbsent { key: String },

    /// Read of a node that does not exist
    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    /// Create of a node that already exists
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// Settings loading/validation failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// Local I/O failures (e.g. reading a value file)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Construction-time load budget spent without a single success
    #[error("initial load failed after {attempts} attempts")]
    InitExhausted { attempts: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Cluster address resolution failures
    #[error("failed to resolve coordination cluster {host}: {reason}")]
    ResolveFailed { host: String, reason: String },

    /// Session establishment timeout
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// Connection dropped mid-operation
    #[error("connection to coordination service lost")]
    ConnectionLost,
}

/// Wraps the failure of a build hook together with the path whose change
/// triggered it.
#[derive(Debug, thiserror::Error)]
#[error("rebuild for {path} failed: {source}")]
pub struct RebuildError {
    pub path: String,
    #[source]
    pub source: Box<Error>,
}

impl RebuildError {
    pub fn new(path: impl Into<String>, source: Error) -> Self {
        Self {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
