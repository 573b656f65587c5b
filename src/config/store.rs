use std::time::Duration;

use serde::Deserialize;

use crate::constants::DEFAULT_CONFIG_PATH;

/// Watched configuration path and resource lifecycle knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Path whose children form the key space: each child node's name is a
    /// configuration key and its payload (UTF-8 text) is the value.
    /// Default: /confkeeper/config
    #[serde(default = "default_path")]
    pub path: String,

    /// Grace period before a superseded snapshot is destroyed, letting
    /// in-flight readers finish with it. Destruction runs off the event loop,
    /// so a non-zero delay never stalls later notifications.
    /// Default: 0
    #[serde(default)]
    pub drain_delay_ms: u64,
}

impl StoreConfig {
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            drain_delay_ms: 0,
        }
    }
}

fn default_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}
