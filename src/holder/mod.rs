//! Watch-driven cached resource holder
//!
//! A [`ResourceHolder`] owns exactly one instance of an arbitrary resource,
//! lazily built on first access and atomically replaced whenever a relevant
//! change notification arrives from the coordination service. Readers always
//! observe a complete resource; a reader holding an [`Arc`] to a superseded
//! value keeps it alive until done, even though destruction is scheduled
//! shortly after replacement.
//!
//! # Architecture
//!
//! ```text
//! CoordinationSession -> events channel -> event loop (serial)
//!                                              |
//!                            need_rebuild? -> rebuild -> ArcSwap publish
//!                                              |
//!                                   spawned delayed destroy
//! ```
//!
//! Events for a holder are processed one at a time, in delivery order; a
//! rebuild publishes (or no-ops) before the next event is handled. Session
//! expiry replaces the session handle wholesale and re-validates from the
//! watched root, since every watch died with the old session.

mod stats;
pub use stats::*;

#[cfg(test)]
mod holder_test;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::{RebuildError, Result, SessionFactory, SessionHandle, SessionState, WatchEvent};

/// Hooks a specialization supplies to drive one cached resource.
#[async_trait]
pub trait ResourceLifecycle: Send + Sync + 'static {
    type Resource: Send + Sync + 'static;

    /// First build. May itself re-arm watches through the session. Invoked at
    /// most once per holder lifetime unless it fails, in which case a later
    /// access retries.
    async fn init(&self, session: &SessionHandle) -> Result<Self::Resource>;

    /// Filter which change notifications are relevant to this resource.
    fn need_rebuild(&self, path: &str) -> bool;

    /// Build the replacement. `Ok(None)` means no replacement is available
    /// and the currently served resource stays untouched.
    async fn rebuild(&self, session: &SessionHandle, path: &str) -> Result<Option<Self::Resource>>;

    /// Release whatever the superseded value holds (e.g. close underlying
    /// handles). Runs strictly after the replacement is published.
    async fn destroy(&self, old: Arc<Self::Resource>);

    /// Grace period letting in-flight consumers finish with the old resource
    /// before `destroy` runs.
    fn drain_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Root watched path. Its change is synthesized after a session is
    /// re-created, because the replacement session starts with no watches.
    fn watched_path(&self) -> &str;
}

/// Generic lifecycle manager for one watch-backed cached resource.
pub struct ResourceHolder<L: ResourceLifecycle> {
    lifecycle: Arc<L>,
    factory: Arc<SessionFactory>,
    session: ArcSwap<SessionHandle>,
    current: ArcSwapOption<L::Resource>,
    first_build: OnceCell<Arc<L::Resource>>,
    events_tx: mpsc::Sender<WatchEvent>,
    cancel: CancellationToken,
    stats: HolderStats,
}

impl<L: ResourceLifecycle> ResourceHolder<L> {
    /// Open a session and spawn the event loop. The returned handle resolves
    /// when the loop exits (after [`shutdown`](Self::shutdown)).
    pub async fn spawn(
        lifecycle: Arc<L>,
        factory: Arc<SessionFactory>,
    ) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = factory.create_session(events_tx.clone()).await?;

        let holder = Arc::new(Self {
            lifecycle,
            factory,
            session: ArcSwap::from_pointee(session),
            current: ArcSwapOption::empty(),
            first_build: OnceCell::new(),
            events_tx,
            cancel: CancellationToken::new(),
            stats: HolderStats::default(),
        });
        let handle = tokio::spawn(holder.clone().run(events_rx));
        Ok((holder, handle))
    }

    /// Current resource, building it on first call.
    ///
    /// Safe under concurrent first-call races: exactly one build executes
    /// even if many callers arrive before initialization completes. A failed
    /// build leaves the holder unbuilt so the next caller retries.
    pub async fn get(&self) -> Result<Arc<L::Resource>> {
        if let Some(current) = self.current.load_full() {
            return Ok(current);
        }
        let first = self
            .first_build
            .get_or_try_init(|| async {
                let session = self.session.load_full();
                let built = Arc::new(self.lifecycle.init(&session).await?);
                self.current.store(Some(built.clone()));
                Ok::<_, crate::Error>(built)
            })
            .await?;
        // A rebuild may already have superseded the first build.
        Ok(self.current.load_full().unwrap_or_else(|| first.clone()))
    }

    /// Current resource without triggering a build.
    pub fn peek(&self) -> Option<Arc<L::Resource>> {
        self.current.load_full()
    }

    /// The live session handle. Replaced wholesale on expiry.
    pub fn session(&self) -> Arc<SessionHandle> {
        self.session.load_full()
    }

    pub fn stats(&self) -> &HolderStats {
        &self.stats
    }

    /// Stop the event loop and close the session.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let session = self.session.load_full();
        session.close().await;
    }

    #[cfg(test)]
    pub(crate) fn event_sender(&self) -> mpsc::Sender<WatchEvent> {
        self.events_tx.clone()
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<WatchEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("event loop stopped");
                    break;
                }
                maybe = events.recv() => {
                    match maybe {
                        Some(event) => self.process(event).await,
                        None => {
                            debug!("event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, event: WatchEvent) {
        debug!(?event, "watch event");
        match event {
            WatchEvent::Session(state) => match state {
                SessionState::Expired => self.renew_session().await,
                SessionState::Connecting | SessionState::Connected => {}
                SessionState::Closed => debug!("session closed"),
            },
            WatchEvent::NodeChildrenChanged { path } | WatchEvent::NodeDataChanged { path } => {
                self.check_rebuild(&path).await;
            }
            WatchEvent::NodeCreated { path } => {
                debug!(%path, "node created, nothing to do");
            }
            other => {
                self.stats.unexpected_events.fetch_add(1, Ordering::Relaxed);
                warn!(?other, "unhandled watch event");
            }
        }
    }

    /// The expired session is unusable and all of its watches are gone:
    /// replace it wholesale, then re-validate from the watched root. On
    /// failure the holder keeps serving the last-known resource.
    async fn renew_session(&self) {
        warn!("coordination session expired, creating a replacement");
        match self.factory.create_session(self.events_tx.clone()).await {
            Ok(replacement) => {
                let stale = self.session.swap(Arc::new(replacement));
                stale.close().await;
                self.stats.session_renewals.fetch_add(1, Ordering::Relaxed);
                let root = self.lifecycle.watched_path().to_string();
                self.check_rebuild(&root).await;
            }
            Err(e) => {
                error!(error = %e, "failed to re-create coordination session");
            }
        }
    }

    async fn check_rebuild(&self, path: &str) {
        if !self.lifecycle.need_rebuild(path) {
            debug!(%path, "change not relevant to this resource");
            return;
        }
        let session = self.session.load_full();
        match self.lifecycle.rebuild(&session, path).await {
            Ok(Some(replacement)) => {
                let replacement = Arc::new(replacement);
                let old = self.current.swap(Some(replacement));
                self.stats.rebuilds.fetch_add(1, Ordering::Relaxed);
                info!(%path, "resource rebuilt");
                if let Some(old) = old {
                    self.schedule_destroy(old);
                }
            }
            Ok(None) => {
                debug!(%path, "no replacement produced, keeping current resource");
            }
            Err(e) => {
                self.stats.failed_rebuilds.fetch_add(1, Ordering::Relaxed);
                let e = RebuildError::new(path, e);
                error!(error = %e, "rebuild failed, keeping current resource");
            }
        }
    }

    /// Destruction runs off the event loop so a non-zero drain delay never
    /// stalls processing of later events.
    fn schedule_destroy(&self, old: Arc<L::Resource>) {
        let delay = self.lifecycle.drain_delay();
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            lifecycle.destroy(old).await;
        });
    }
}
