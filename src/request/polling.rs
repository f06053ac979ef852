//! Polling configuration and its shared live state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// When the next poll tick is scheduled relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingStrategy {
    /// Schedule the next tick as soon as the outbound send completes.
    Short,
    /// Schedule the next tick after the inbound response is fully
    /// processed.
    Long,
}

// Live state shared by every clone participating in one polling chain, so
// stop_polling() from any pipeline stage stops the whole chain.
#[derive(Debug, Default)]
struct PollingState {
    active: AtomicBool,
    counter: AtomicU32,
}

/// Polling configuration carried by a request.
///
/// `limit == 0` means unbounded. The counter is incremented only by the
/// dispatcher's re-scheduling step; once `counter >= limit > 0` the chain
/// deactivates. Clones share the live state; [`PollingOptions::detach`]
/// starts an independent chain (used when a snapshot is built or copied).
#[derive(Clone)]
pub struct PollingOptions {
    interval: Duration,
    limit: u32,
    strategy: PollingStrategy,
    state: Arc<PollingState>,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self::inactive()
    }
}

impl PollingOptions {
    /// An inactive configuration (no polling).
    pub fn inactive() -> Self {
        Self {
            interval: Duration::ZERO,
            limit: 0,
            strategy: PollingStrategy::Short,
            state: Arc::new(PollingState::default()),
        }
    }

    /// An active configuration. `limit == 0` polls without bound.
    pub fn new(strategy: PollingStrategy, interval: Duration, limit: u32) -> Self {
        let state = PollingState {
            active: AtomicBool::new(true),
            counter: AtomicU32::new(0),
        };
        Self {
            interval,
            limit,
            strategy,
            state: Arc::new(state),
        }
    }

    /// Whether the polling chain is still active.
    pub fn is_polling(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    /// The inter-tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The tick limit; zero means unbounded.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Ticks issued so far.
    pub fn counter(&self) -> u32 {
        self.state.counter.load(Ordering::SeqCst)
    }

    /// The scheduling strategy.
    pub fn strategy(&self) -> PollingStrategy {
        self.strategy
    }

    /// Deactivates the chain. Takes effect for every clone sharing this
    /// state; ticks already in flight settle normally.
    pub fn stop(&self) {
        self.state.active.store(false, Ordering::SeqCst);
    }

    /// Counts a scheduled tick and returns the new count. Deactivates the
    /// chain once the limit is reached.
    pub(crate) fn increment_counter(&self) -> u32 {
        let count = self.state.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.limit > 0 && count >= self.limit {
            self.state.active.store(false, Ordering::SeqCst);
        }
        count
    }

    /// Copies the configuration with fresh, independent state.
    pub(crate) fn detach(&self) -> Self {
        let state = PollingState {
            active: AtomicBool::new(self.is_polling()),
            counter: AtomicU32::new(self.counter()),
        };
        Self {
            interval: self.interval,
            limit: self.limit,
            strategy: self.strategy,
            state: Arc::new(state),
        }
    }
}

impl fmt::Debug for PollingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingOptions")
            .field("active", &self.is_polling())
            .field("interval", &self.interval)
            .field("limit", &self.limit)
            .field("counter", &self.counter())
            .field("strategy", &self.strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_deactivates_at_limit() {
        let polling = PollingOptions::new(PollingStrategy::Short, Duration::from_millis(10), 3);
        assert!(polling.is_polling());
        assert_eq!(polling.increment_counter(), 1);
        assert_eq!(polling.increment_counter(), 2);
        assert!(polling.is_polling());
        assert_eq!(polling.increment_counter(), 3);
        assert!(!polling.is_polling());
        assert_eq!(polling.counter(), 3);
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let polling = PollingOptions::new(PollingStrategy::Long, Duration::ZERO, 0);
        for _ in 0..100 {
            polling.increment_counter();
        }
        assert!(polling.is_polling());
    }

    #[test]
    fn stop_reaches_every_clone() {
        let polling = PollingOptions::new(PollingStrategy::Short, Duration::ZERO, 0);
        let clone = polling.clone();
        clone.stop();
        assert!(!polling.is_polling());
    }

    #[test]
    fn detach_is_independent() {
        let polling = PollingOptions::new(PollingStrategy::Short, Duration::ZERO, 5);
        polling.increment_counter();
        let detached = polling.detach();
        assert_eq!(detached.counter(), 1);
        detached.stop();
        assert!(polling.is_polling());
        assert!(!detached.is_polling());
    }
}
