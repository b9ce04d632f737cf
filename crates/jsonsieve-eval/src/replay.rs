//! Synthetic replay timestamps.
//!
//! A timestamp rule spreads `max-records` events evenly over `duration`
//! milliseconds starting at `start-ms`. Each touched record advances the
//! rule's clock by one sample. The clock is shared by every worker that
//! processes records for the rule, so the read-modify-write of the cursor
//! happens under one lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use jsonsieve_rules::ReplaySpec;

/// Cursor of a replay clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayState {
    /// Virtual time of the last emitted sample, in epoch milliseconds.
    pub current_ms: f64,
    /// Number of samples emitted so far.
    pub sample_index: i64,
}

/// Per-rule monotonic clock.
#[derive(Debug)]
pub struct ReplayClock {
    step_ms: f64,
    state: Mutex<ReplayState>,
}

impl ReplayClock {
    /// Create a clock for `spec`, starting at `spec.start_ms` or `now_ms` when
    /// the rule does not name a start.
    pub fn new(spec: &ReplaySpec, now_ms: f64) -> Self {
        ReplayClock {
            step_ms: spec.step_ms(),
            state: Mutex::new(ReplayState {
                current_ms: spec.start_ms.unwrap_or(now_ms),
                sample_index: 0,
            }),
        }
    }

    /// Emit the next timestamp.
    pub fn advance(&self) -> i64 {
        let mut state = self.lock();
        state.current_ms += increment(state.sample_index, self.step_ms);
        state.sample_index += 1;
        state.current_ms as i64
    }

    pub fn snapshot(&self) -> ReplayState {
        *self.lock()
    }

    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Width of sample `index` under a uniform rate of one sample per `step_ms`:
/// the difference of the cumulative time at `index` and `index - 1`.
fn increment(index: i64, step_ms: f64) -> f64 {
    let upper = index as f64 * step_ms;
    let lower = (index - 1) as f64 * step_ms;
    upper - lower
}
