//! Shared helpers between the unit tests of this crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;

use crate::{
    CoordinationConfig, MemoryCluster, ResourceLifecycle, Result, SessionFactory, SessionHandle,
    Settings,
};

static LOGGER: OnceCell<()> = OnceCell::new();

/// This will ensure the tracing subscriber is only initialized once.
pub fn enable_logger() {
    LOGGER.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Settings tuned for fast tests.
pub fn test_settings(path: &str) -> Settings {
    let mut settings = Settings::default();
    settings.store.path = path.to_string();
    settings.retry.init.max_attempts = 2;
    settings.retry.init.delay_ms = 10;
    settings.retry.reload.max_attempts = 3;
    settings.retry.reload.delay_ms = 10;
    settings
}

/// Factory over a memory cluster with default coordination settings.
pub fn memory_factory(cluster: &MemoryCluster) -> Arc<SessionFactory> {
    Arc::new(SessionFactory::new(
        Arc::new(cluster.connector()),
        CoordinationConfig::default(),
    ))
}

/// Lifecycle that counts its hook invocations. Resources are sequence
/// numbers: init yields 1, 2, ... and rebuilds yield 101, 102, ...
pub struct CountingLifecycle {
    watched: String,
    pub init_calls: AtomicU64,
    pub rebuild_calls: AtomicU64,
    pub destroy_calls: AtomicU64,
    init_delay: Duration,
    drain: Duration,
    rebuild_produces: bool,
}

impl CountingLifecycle {
    pub fn new(watched: &str) -> Self {
        Self {
            watched: watched.to_string(),
            init_calls: AtomicU64::new(0),
            rebuild_calls: AtomicU64::new(0),
            destroy_calls: AtomicU64::new(0),
            init_delay: Duration::ZERO,
            drain: Duration::ZERO,
            rebuild_produces: true,
        }
    }

    /// Slow down init so first-access races have a window to pile up.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn with_drain(mut self, drain: Duration) -> Self {
        self.drain = drain;
        self
    }

    /// Rebuilds report "no replacement available".
    pub fn without_replacement(mut self) -> Self {
        self.rebuild_produces = false;
        self
    }
}

#[async_trait]
impl ResourceLifecycle for CountingLifecycle {
    type Resource = u64;

    async fn init(&self, _session: &SessionHandle) -> Result<u64> {
        if self.init_delay > Duration::ZERO {
            tokio::time::sleep(self.init_delay).await;
        }
        Ok(self.init_calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn need_rebuild(&self, path: &str) -> bool {
        path.starts_with(&self.watched)
    }

    async fn rebuild(&self, _session: &SessionHandle, _path: &str) -> Result<Option<u64>> {
        let n = self.rebuild_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.rebuild_produces {
            Ok(Some(100 + n))
        } else {
            Ok(None)
        }
    }

    async fn destroy(&self, _old: Arc<u64>) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn drain_delay(&self) -> Duration {
        self.drain
    }

    fn watched_path(&self) -> &str {
        &self.watched
    }
}
