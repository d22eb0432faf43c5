//! Store configuration.

use std::time::Duration;

/// Tunables for an open collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Quiet period per path before a filesystem event is processed.
    pub debounce: Duration,
    /// How long an own write is remembered for self-write suppression.
    pub settle_window: Duration,
    /// Capacity of the bounded event channel.
    pub event_capacity: usize,
    /// Restarts of the reconcile worker before the watcher gives up.
    pub max_restarts: u32,
    /// Initial delay before restarting the worker; doubles per attempt.
    pub restart_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            settle_window: Duration::from_secs(2),
            event_capacity: 256,
            max_restarts: 5,
            restart_backoff: Duration::from_millis(200),
        }
    }
}

impl StoreConfig {
    /// Sets the debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the settle window.
    #[must_use]
    pub const fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Sets the event channel capacity. Zero is raised to one.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Sets the restart budget.
    #[must_use]
    pub const fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Sets the initial restart back-off.
    #[must_use]
    pub const fn with_restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    /// Back-off before restart number `attempt` (1-based), capped at 30s.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.restart_backoff
            .saturating_mul(factor)
            .min(Duration::from_secs(30))
    }
}
