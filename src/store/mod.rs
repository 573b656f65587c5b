//! Flat key-value configuration store
//!
//! A [`ConfigStore`] keeps a complete [`ConfigSnapshot`] loaded from every
//! child node under one watched path: each child's name is a key, its payload
//! (UTF-8 text) the value. The snapshot is rebuilt whole on every qualifying
//! change notification; reads never touch the network.

mod snapshot;
pub use snapshot::*;


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use crate::{
    Connector, Error, ResourceHolder, ResourceLifecycle, Result, RetryPolicy, SessionFactory,
    SessionHandle, Settings,
};

/// Observable availability of a store.
///
/// `Degraded` means a reload (typically after session expiry) exhausted its
/// retry budget: the store keeps serving the last good snapshot and recovers
/// on the next successful reload. It never crashes the owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    Initializing,
    Ready,
    Degraded,
}

pub(crate) struct SnapshotLifecycle {
    pub(crate) path: String,
    pub(crate) reload: RetryPolicy,
    pub(crate) drain_delay: Duration,
    pub(crate) health: ArcSwap<StoreHealth>,
}

impl SnapshotLifecycle {
    fn set_health(&self, health: StoreHealth) {
        self.health.store(Arc::new(health));
    }

    /// All-or-nothing load: list the children (re-arming the children watch),
    /// read every child's payload (re-arming a data watch per child) and
    /// assemble one mapping. Any failed child read aborts the whole load.
    async fn load(&self, session: &SessionHandle) -> Result<ConfigSnapshot> {
        let children = session.get_children(&self.path, true).await?;
        let reads = children.iter().map(|child| {
            let full = child_path(&self.path, child);
            async move { session.get_data(&full, true).await }
        });
        let values = futures::future::try_join_all(reads).await?;

        let mut entries = HashMap::with_capacity(children.len());
        for (child, value) in children.into_iter().zip(values) {
            entries.insert(child, String::from_utf8_lossy(&value.payload).into_owned());
        }
        Ok(ConfigSnapshot::new(entries))
    }
}

#[async_trait]
impl ResourceLifecycle for SnapshotLifecycle {
    type Resource = ConfigSnapshot;

    async fn init(&self, session: &SessionHandle) -> Result<ConfigSnapshot> {
        let snapshot = self.load(session).await?;
        self.set_health(StoreHealth::Ready);
        info!(path = %self.path, keys = snapshot.len(), "configuration loaded");
        Ok(snapshot)
    }

    fn need_rebuild(&self, path: &str) -> bool {
        path == self.path
            || path
                .strip_prefix(self.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    async fn rebuild(
        &self,
        session: &SessionHandle,
        path: &str,
    ) -> Result<Option<ConfigSnapshot>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.load(session).await {
                Ok(snapshot) => {
                    self.set_health(StoreHealth::Ready);
                    debug!(%path, keys = snapshot.len(), "configuration reloaded");
                    return Ok(Some(snapshot));
                }
                Err(e) if attempt < self.reload.max_attempts => {
                    warn!(%path, attempt, error = %e, "reload failed, retrying");
                    tokio::time::sleep(self.reload.delay()).await;
                }
                Err(e) => {
                    self.set_health(StoreHealth::Degraded);
                    error!(
                        %path,
                        attempts = attempt,
                        error = %e,
                        "reload budget exhausted, keeping last snapshot"
                    );
                    return Ok(None);
                }
            }
        }
    }

    async fn destroy(&self, old: Arc<ConfigSnapshot>) {
        // Snapshots hold no external handles; dropping the last Arc frees them.
        debug!(keys = old.len(), "superseded snapshot released");
    }

    fn drain_delay(&self) -> Duration {
        self.drain_delay
    }

    fn watched_path(&self) -> &str {
        &self.path
    }
}

/// Complete key-value snapshot of one configuration path, kept current by
/// watch notifications, with a version-conditioned direct write path.
pub struct ConfigStore {
    holder: Arc<ResourceHolder<SnapshotLifecycle>>,
    lifecycle: Arc<SnapshotLifecycle>,
    path: String,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConfigStore {
    /// Open the store: create a session, spawn the event loop and perform the
    /// initial load under the `init` retry budget.
    ///
    /// Exhausting that budget is fatal - a store with no data is unsafe to
    /// serve from - so the error must abort startup of the owning process.
    pub async fn open(connector: Arc<dyn Connector>, settings: &Settings) -> Result<Arc<Self>> {
        let factory = Arc::new(SessionFactory::new(
            connector,
            settings.coordination.clone(),
        ));
        let lifecycle = Arc::new(SnapshotLifecycle {
            path: settings.store.path.clone(),
            reload: settings.retry.reload,
            drain_delay: settings.store.drain_delay(),
            health: ArcSwap::from_pointee(StoreHealth::Initializing),
        });
        let (holder, loop_handle) = ResourceHolder::spawn(lifecycle.clone(), factory).await?;

        let store = Arc::new(Self {
            holder,
            lifecycle,
            path: settings.store.path.clone(),
            loop_handle: Mutex::new(Some(loop_handle)),
        });
        if let Err(e) = store.init_with_retry(settings.retry.init).await {
            store.shutdown().await;
            return Err(e);
        }
        Ok(store)
    }

    async fn init_with_retry(&self, policy: RetryPolicy) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.holder.get().await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < policy.max_attempts => {
                    warn!(attempt, error = %e, "initial configuration load failed");
                    tokio::time::sleep(policy.delay()).await;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "initial configuration load failed");
                    return Err(Error::InitExhausted { attempts: attempt });
                }
            }
        }
    }

    /// Value for `key` in the current snapshot. Never touches the network.
    pub fn get(&self, key: &str) -> Option<String> {
        self.holder
            .peek()
            .and_then(|snapshot| snapshot.get(key).map(str::to_owned))
    }

    /// Like [`get`](Self::get), but absence is an error.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| Error::ConfigurationAbsent {
            key: key.to_string(),
        })
    }

    /// The whole current snapshot.
    pub fn all(&self) -> Arc<ConfigSnapshot> {
        self.holder.peek().unwrap_or_default()
    }

    /// Version-conditioned write of one key.
    ///
    /// Reads the node's current version, then writes conditioned on it; a
    /// concurrent writer makes this fail with
    /// [`Error::VersionConflict`] - no implicit retry, the caller decides.
    /// An absent node is created instead.
    ///
    /// A successful write does not update the local snapshot directly: the
    /// snapshot refreshes only when the resulting change notification
    /// arrives. `set` followed immediately by [`get`](Self::get) may still
    /// observe the previous value - and if the watch is lost during a session
    /// re-creation window, until the next event on the watched path.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let session = self.holder.session();
        let full = child_path(&self.path, key);
        let payload = Bytes::copy_from_slice(value.as_bytes());
        match session.get_data(&full, false).await {
            Ok(current) => {
                session.set_data(&full, payload, current.version).await?;
                Ok(())
            }
            Err(Error::NodeNotFound { .. }) => session.create(&full, payload).await,
            Err(e) => Err(e),
        }
    }

    pub fn health(&self) -> StoreHealth {
        *self.lifecycle.health.load_full()
    }

    pub fn stats(&self) -> &crate::HolderStats {
        self.holder.stats()
    }

    /// Stop the event loop and close the session.
    pub async fn shutdown(&self) {
        self.holder.shutdown().await;
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "event loop task failed");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn holder(&self) -> &Arc<ResourceHolder<SnapshotLifecycle>> {
        &self.holder
    }
}

fn child_path(base: &str, child: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), child)
}
