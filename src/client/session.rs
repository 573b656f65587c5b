use std::ops::Deref;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Result, SessionState};

/// Payload of a node together with the version token the service attaches.
///
/// The version is used only for optimistic-concurrency writes; nothing else
/// in this crate tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub payload: Bytes,
    pub version: i32,
}

/// One live session with the coordination service.
///
/// Watches are one-shot: a watch armed by `get_children`/`get_data` fires at
/// most once and must be re-armed by the next read to keep receiving change
/// notifications. Callers must never assume a persistent subscription.
///
/// All events for a session (state transitions and node changes) are
/// delivered to the callback channel registered at connect time, until the
/// session is closed or expires.
#[async_trait]
pub trait CoordinationSession: Send + Sync {
    /// List the names of `path`'s children. `watch` re-arms a one-shot
    /// children watch on `path`.
    async fn get_children(&self, path: &str, watch: bool) -> Result<Vec<String>>;

    /// Read `path`'s payload and version. `watch` re-arms a one-shot data
    /// watch on `path`.
    async fn get_data(&self, path: &str, watch: bool) -> Result<VersionedValue>;

    /// Version-conditioned write: succeeds only if `path`'s current version
    /// equals `expected_version`. Returns the new version.
    async fn set_data(&self, path: &str, payload: Bytes, expected_version: i32) -> Result<i32>;

    /// Create `path` with an initial payload.
    async fn create(&self, path: &str, payload: Bytes) -> Result<()>;

    /// Current liveness of this session.
    fn state(&self) -> SessionState;

    /// Close the session. Idempotent; pending watches never fire afterwards.
    async fn close(&self);

    /// Service-assigned session identity, for logging and diagnostics.
    fn id(&self) -> u64;
}

/// Replace-wholesale wrapper around a live session.
///
/// The holder's event loop swaps the entire handle on session expiry; a
/// handle is never mutated in place, so every reader observes either the old
/// session or the new one, never a mix.
pub struct SessionHandle {
    session: Box<dyn CoordinationSession>,
}

impl SessionHandle {
    pub fn new(session: Box<dyn CoordinationSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionHandle {
    type Target = dyn CoordinationSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id())
            .field("state", &self.session.state())
            .finish()
    }
}
