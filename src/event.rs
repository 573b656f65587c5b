//! Event vocabulary delivered by a coordination session.
//!
//! Every event for a session is produced by the service and consumed exactly
//! once by the owning holder's event loop. Node events carry only the path:
//! the notification model is one-shot and possibly coalesced, so consumers
//! re-read (and re-arm) rather than trust any payload in the event itself.

/// Liveness of a coordination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport is (re)establishing; watches are still registered
    Connecting,
    /// Session healthy
    Connected,
    /// Session invalidated by the service; watches are gone and every
    /// operation on it fails until it is replaced wholesale
    Expired,
    /// Closed locally by its owner
    Closed,
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Session liveness transition
    Session(SessionState),

    /// The set of children under `path` changed
    NodeChildrenChanged { path: String },

    /// The payload of `path` changed
    NodeDataChanged { path: String },

    /// `path` came into existence. Informational: without an armed watch
    /// firing a data/children event on it, creation is not a signal to act on.
    NodeCreated { path: String },

    /// `path` was removed
    NodeDeleted { path: String },
}

impl WatchEvent {
    /// Path the event refers to, if it is a node event.
    pub fn path(&self) -> Option<&str> {
        match self {
            WatchEvent::Session(_) => None,
            WatchEvent::NodeChildrenChanged { path }
            | WatchEvent::NodeDataChanged { path }
            | WatchEvent::NodeCreated { path }
            | WatchEvent::NodeDeleted { path } => Some(path),
        }
    }
}
