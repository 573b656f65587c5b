use std::sync::atomic::{AtomicU64, Ordering};

/// Observability counters for one holder.
#[derive(Debug, Default)]
pub struct HolderStats {
    /// Successful rebuild-and-publish cycles
    pub rebuilds: AtomicU64,
    /// Rebuild attempts aborted by an error (previous resource kept)
    pub failed_rebuilds: AtomicU64,
    /// Sessions re-created after expiry
    pub session_renewals: AtomicU64,
    /// Events of a kind the holder has no policy for
    pub unexpected_events: AtomicU64,
}

impl HolderStats {
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn failed_rebuilds(&self) -> u64 {
        self.failed_rebuilds.load(Ordering::Relaxed)
    }

    pub fn session_renewals(&self) -> u64 {
        self.session_renewals.load(Ordering::Relaxed)
    }

    pub fn unexpected_events(&self) -> u64 {
        self.unexpected_events.load(Ordering::Relaxed)
    }
}
