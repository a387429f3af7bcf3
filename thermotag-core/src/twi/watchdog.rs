//! Bus stall supervision
//!
//! The engine has no timeout of its own. The foreground samples an
//! [`EngineSnapshot`] on every wake-up and feeds it here; a transaction
//! that stays busy without a single bus event for longer than the timeout
//! is reported as stalled.

use super::engine::EngineSnapshot;

/// Default time a busy engine may go without a bus event
pub const DEFAULT_STALL_TIMEOUT_MS: u32 = 2000;

/// Bus health as seen from the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusHealth {
    /// No transaction in flight
    Idle,
    /// Busy, and events are still arriving (or the timeout has not run out)
    Progressing,
    /// Busy with no events for at least the timeout
    Stalled,
}

/// Stall detector driven by periodic snapshots
#[derive(Debug, Clone)]
pub struct StallMonitor {
    /// Time without progress before declaring a stall (ms)
    timeout_ms: u32,
    /// Event counter at the previous update
    last_events: Option<u32>,
    /// Time spent busy without progress (ms)
    stalled_for_ms: u32,
}

impl Default for StallMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_STALL_TIMEOUT_MS)
    }
}

impl StallMonitor {
    /// Create a monitor with the given timeout
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            last_events: None,
            stalled_for_ms: 0,
        }
    }

    /// Feed a fresh snapshot
    ///
    /// # Arguments
    /// - `snapshot`: Engine state sampled just now
    /// - `delta_ms`: Time elapsed since the previous update
    pub fn update(&mut self, snapshot: EngineSnapshot, delta_ms: u32) -> BusHealth {
        let progressed = self.last_events != Some(snapshot.events);
        self.last_events = Some(snapshot.events);

        if !snapshot.busy {
            self.stalled_for_ms = 0;
            return BusHealth::Idle;
        }

        if progressed {
            self.stalled_for_ms = 0;
            return BusHealth::Progressing;
        }

        self.stalled_for_ms = self.stalled_for_ms.saturating_add(delta_ms);
        if self.stalled_for_ms >= self.timeout_ms {
            BusHealth::Stalled
        } else {
            BusHealth::Progressing
        }
    }

    /// Forget accumulated stall time, e.g. after a recovery
    pub fn reset(&mut self) {
        self.last_events = None;
        self.stalled_for_ms = 0;
    }

    /// Time spent busy without progress (ms)
    pub fn stalled_for_ms(&self) -> u32 {
        self.stalled_for_ms
    }

    /// Configured timeout (ms)
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
