//! Embedded in-process coordination backend.
//!
//! Implements the full session contract against a process-local namespace:
//! versioned nodes, one-shot watches re-armed per read, per-session event
//! channels and injectable session expiry. It backs the test suite and the
//! bundled CLI; deployments talking to a remote cluster supply their own
//! [`Connector`].

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Connector;
use crate::{
    CoordinationSession, Error, Result, SessionState, TransportError, VersionedValue, WatchEvent,
};

#[derive(Debug, Clone)]
struct Node {
    payload: Bytes,
    version: i32,
}

struct SessionEntry {
    events: mpsc::Sender<WatchEvent>,
    state: SessionState,
}

#[derive(Default)]
struct ClusterState {
    nodes: BTreeMap<String, Node>,
    // one-shot registrations: path -> sessions to notify, drained on fire
    child_watches: HashMap<String, Vec<u64>>,
    data_watches: HashMap<String, Vec<u64>>,
    sessions: HashMap<u64, SessionEntry>,
    fail_connects: usize,
    fail_reads: usize,
}

impl ClusterState {
    fn fire_child_watches(&mut self, path: &str, event: WatchEvent) {
        if let Some(ids) = self.child_watches.remove(path) {
            self.deliver(ids, event);
        }
    }

    fn fire_data_watches(&mut self, path: &str, event: WatchEvent) {
        if let Some(ids) = self.data_watches.remove(path) {
            self.deliver(ids, event);
        }
    }

    fn deliver(&mut self, ids: Vec<u64>, event: WatchEvent) {
        for id in ids {
            let Some(entry) = self.sessions.get(&id) else {
                continue;
            };
            if entry.state != SessionState::Connected {
                continue;
            }
            if let Err(e) = entry.events.try_send(event.clone()) {
                // at-least-once, coalesced: the consumer re-reads on its next event
                warn!(session = id, error = %e, "dropping watch notification");
            }
        }
    }

    fn create_node(&mut self, path: &str, payload: Bytes) {
        let mut missing = Vec::new();
        let mut cur = path.to_string();
        loop {
            let Some(p) = parent_path(&cur).map(str::to_string) else {
                break;
            };
            if self.nodes.contains_key(&p) {
                break;
            }
            missing.push(p.clone());
            cur = p;
        }
        for p in missing.into_iter().rev() {
            self.nodes.insert(
                p.clone(),
                Node {
                    payload: Bytes::new(),
                    version: 0,
                },
            );
            if let Some(parent) = parent_path(&p) {
                let parent = parent.to_string();
                self.fire_child_watches(&parent, WatchEvent::NodeChildrenChanged { path: parent.clone() });
            }
        }
        self.nodes.insert(path.to_string(), Node { payload, version: 0 });
        if let Some(parent) = parent_path(path) {
            let parent = parent.to_string();
            self.fire_child_watches(&parent, WatchEvent::NodeChildrenChanged { path: parent.clone() });
        }
    }
}

fn parent_path(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        None
    } else {
        Some(&path[..idx])
    }
}

fn register(watches: &mut HashMap<String, Vec<u64>>, path: &str, id: u64) {
    let ids = watches.entry(path.to_string()).or_default();
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn check_session(state: &ClusterState, id: u64) -> Result<()> {
    match state.sessions.get(&id).map(|e| e.state) {
        Some(SessionState::Connected) => Ok(()),
        Some(SessionState::Expired) => Err(Error::SessionExpired),
        _ => Err(TransportError::ConnectionLost.into()),
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<ClusterState>,
    next_session: AtomicU64,
}

/// Process-local coordination namespace.
///
/// Cheap to clone; all clones share the same node tree and session registry.
/// Mutators (`put`, `delete`) act as an external writer: they bump versions
/// and fire the same one-shot watches a remote cluster would.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Inner>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector handle to open sessions against this namespace.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            cluster: self.clone(),
        }
    }

    /// Create `path` (and any missing ancestors) if absent.
    pub fn ensure(&self, path: &str) -> Result<()> {
        check_path(path)?;
        let mut state = self.inner.state.lock();
        if !state.nodes.contains_key(path) {
            state.create_node(path, Bytes::new());
        }
        Ok(())
    }

    /// Create or overwrite `path`, firing the watches an external writer
    /// would: data watches on overwrite, parent children watches on create.
    pub fn put(&self, path: &str, value: impl Into<Bytes>) -> Result<()> {
        check_path(path)?;
        let payload = value.into();
        let mut state = self.inner.state.lock();
        if let Some(node) = state.nodes.get_mut(path) {
            node.payload = payload;
            node.version += 1;
        } else {
            state.create_node(path, payload);
            return Ok(());
        }
        state.fire_data_watches(path, WatchEvent::NodeDataChanged { path: path.to_string() });
        Ok(())
    }

    /// Remove `path` and everything below it. Returns whether it existed.
    pub fn delete(&self, path: &str) -> bool {
        let mut state = self.inner.state.lock();
        if !state.nodes.contains_key(path) {
            return false;
        }
        let prefix = format!("{}/", path);
        let removed: Vec<String> = state
            .nodes
            .range(path.to_string()..)
            .take_while(|(k, _)| k.as_str() == path || k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for gone in removed {
            state.nodes.remove(&gone);
            state.fire_data_watches(&gone, WatchEvent::NodeDeleted { path: gone.clone() });
            state.fire_child_watches(&gone, WatchEvent::NodeDeleted { path: gone.clone() });
        }
        if let Some(parent) = parent_path(path) {
            let parent = parent.to_string();
            state.fire_child_watches(&parent, WatchEvent::NodeChildrenChanged { path: parent.clone() });
        }
        true
    }

    /// Current payload of `path`, if present.
    pub fn value(&self, path: &str) -> Option<Bytes> {
        self.inner
            .state
            .lock()
            .nodes
            .get(path)
            .map(|n| n.payload.clone())
    }

    /// Current version token of `path`, if present.
    pub fn version(&self, path: &str) -> Option<i32> {
        self.inner.state.lock().nodes.get(path).map(|n| n.version)
    }

    /// Fail the next `n` connection attempts with a transport error.
    pub fn fail_next_connects(&self, n: usize) {
        self.inner.state.lock().fail_connects = n;
    }

    /// Fail the next `n` reads (children or data) with a transport error.
    pub fn fail_next_reads(&self, n: usize) {
        self.inner.state.lock().fail_reads = n;
    }

    /// Invalidate one session: its operations fail from now on and a single
    /// `Expired` state event is delivered to its callback channel.
    pub fn expire_session(&self, id: u64) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.sessions.get_mut(&id) {
            entry.state = SessionState::Expired;
            if let Err(e) = entry
                .events
                .try_send(WatchEvent::Session(SessionState::Expired))
            {
                warn!(session = id, error = %e, "dropping expiry notification");
            }
        }
    }

    /// Invalidate every live session.
    pub fn expire_all_sessions(&self) {
        let ids: Vec<u64> = {
            let state = self.inner.state.lock();
            state
                .sessions
                .iter()
                .filter(|(_, e)| e.state == SessionState::Connected)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in ids {
            self.expire_session(id);
        }
    }

    /// Number of sessions currently connected.
    pub fn live_sessions(&self) -> usize {
        self.inner
            .state
            .lock()
            .sessions
            .values()
            .filter(|e| e.state == SessionState::Connected)
            .count()
    }
}

fn check_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        return Err(Error::NodeNotFound {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Opens sessions against a [`MemoryCluster`]. Address list and session
/// timeout are accepted for contract parity and ignored.
#[derive(Clone)]
pub struct MemoryConnector {
    cluster: MemoryCluster,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _addrs: Vec<SocketAddr>,
        _session_timeout: Duration,
        events: mpsc::Sender<WatchEvent>,
    ) -> Result<Box<dyn CoordinationSession>> {
        let id = {
            let mut state = self.cluster.inner.state.lock();
            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(TransportError::ConnectionLost.into());
            }
            let id = self.cluster.inner.next_session.fetch_add(1, Ordering::Relaxed) + 1;
            state.sessions.insert(
                id,
                SessionEntry {
                    events: events.clone(),
                    state: SessionState::Connected,
                },
            );
            id
        };
        if let Err(e) = events.try_send(WatchEvent::Session(SessionState::Connected)) {
            warn!(session = id, error = %e, "dropping connected notification");
        }
        debug!(session = id, "memory session established");
        Ok(Box::new(MemorySession {
            id,
            cluster: self.cluster.inner.clone(),
        }))
    }
}

struct MemorySession {
    id: u64,
    cluster: Arc<Inner>,
}

#[async_trait]
impl CoordinationSession for MemorySession {
    async fn get_children(&self, path: &str, watch: bool) -> Result<Vec<String>> {
        let mut state = self.cluster.state.lock();
        check_session(&state, self.id)?;
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(TransportError::ConnectionLost.into());
        }
        if !state.nodes.contains_key(path) {
            return Err(Error::NodeNotFound {
                path: path.to_string(),
            });
        }
        let prefix = format!("{}/", path);
        let children: Vec<String> = state
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(k, _)| k[prefix.len()..].to_string())
            .collect();
        if watch {
            register(&mut state.child_watches, path, self.id);
        }
        Ok(children)
    }

    async fn get_data(&self, path: &str, watch: bool) -> Result<VersionedValue> {
        let mut state = self.cluster.state.lock();
        check_session(&state, self.id)?;
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(TransportError::ConnectionLost.into());
        }
        let Some(node) = state.nodes.get(path) else {
            return Err(Error::NodeNotFound {
                path: path.to_string(),
            });
        };
        let value = VersionedValue {
            payload: node.payload.clone(),
            version: node.version,
        };
        if watch {
            register(&mut state.data_watches, path, self.id);
        }
        Ok(value)
    }

    async fn set_data(&self, path: &str, payload: Bytes, expected_version: i32) -> Result<i32> {
        let mut state = self.cluster.state.lock();
        check_session(&state, self.id)?;
        let Some(node) = state.nodes.get_mut(path) else {
            return Err(Error::NodeNotFound {
                path: path.to_string(),
            });
        };
        if node.version != expected_version {
            return Err(Error::VersionConflict {
                path: path.to_string(),
                expected: expected_version,
                actual: node.version,
            });
        }
        node.payload = payload;
        node.version += 1;
        let new_version = node.version;
        state.fire_data_watches(path, WatchEvent::NodeDataChanged { path: path.to_string() });
        Ok(new_version)
    }

    async fn create(&self, path: &str, payload: Bytes) -> Result<()> {
        check_path(path)?;
        let mut state = self.cluster.state.lock();
        check_session(&state, self.id)?;
        if state.nodes.contains_key(path) {
            return Err(Error::NodeExists {
                path: path.to_string(),
            });
        }
        state.create_node(path, payload);
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.cluster
            .state
            .lock()
            .sessions
            .get(&self.id)
            .map(|e| e.state)
            .unwrap_or(SessionState::Closed)
    }

    async fn close(&self) {
        let mut state = self.cluster.state.lock();
        if let Some(entry) = state.sessions.get_mut(&self.id) {
            entry.state = SessionState::Closed;
        }
        debug!(session = self.id, "memory session closed");
    }

    fn id(&self) -> u64 {
        self.id
    }
}
