use std::time::Duration;

/// Well-known path under which each child node's name is a configuration key
/// and its payload is the value.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "/confkeeper/config";

/// Construction-time load budget: a store with no data is unsafe to serve
/// from, so startup retries harder before giving up.
pub(crate) const INIT_RETRY_ATTEMPTS: usize = 10;
pub(crate) const INIT_RETRY_DELAY_MS: u64 = 200;

/// Watch-triggered reload budget: kept small so a degraded coordination
/// service does not block event processing indefinitely.
pub(crate) const RELOAD_RETRY_ATTEMPTS: usize = 3;
pub(crate) const RELOAD_RETRY_DELAY_MS: u64 = 1000;

pub(crate) const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the per-holder event channel. The service's delivery model is
/// at-least-once and possibly coalesced, so a full channel drops the oldest
/// pending notification semantics anyway; readers re-sync on the next event.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;
