use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    INIT_RETRY_ATTEMPTS, INIT_RETRY_DELAY_MS, RELOAD_RETRY_ATTEMPTS, RELOAD_RETRY_DELAY_MS,
};

/// Basic bounded-retry template
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Sleep between failed attempts (unit: milliseconds)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Divide budgets by lifecycle stage
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetryPolicies {
    // Construction-time load: a store with no data must not start serving,
    // so the budget is generous
    #[serde(default = "default_init_policy")]
    pub init: RetryPolicy,

    // Watch-triggered reload and session-expiry recovery: kept small so a
    // degraded service does not block event processing indefinitely
    #[serde(default = "default_reload_policy")]
    pub reload: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            init: default_init_policy(),
            reload: default_reload_policy(),
        }
    }
}

fn default_init_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: INIT_RETRY_ATTEMPTS,
        delay_ms: INIT_RETRY_DELAY_MS,
    }
}
fn default_reload_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: RELOAD_RETRY_ATTEMPTS,
        delay_ms: RELOAD_RETRY_DELAY_MS,
    }
}
fn default_max_attempts() -> usize {
    RELOAD_RETRY_ATTEMPTS
}
fn default_delay_ms() -> u64 {
    RELOAD_RETRY_DELAY_MS
}
