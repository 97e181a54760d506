//! Wait-time based priority boosting.
//!
//! The policy converts elapsed queue time into a priority bonus in whole
//! steps of `interval`. Boosts are monotonic: a record's current priority
//! never moves down, and a configured ceiling can bound the climb without
//! ever pushing a record below its original priority.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::heap::PriorityHeap;

/// Tuning knobs for the aging monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingPolicy {
    /// Wait time that earns one increment of priority.
    pub interval: Duration,
    /// Priority added per fully elapsed interval.
    pub increment: i64,
    /// Optional cap on the boosted priority. `None` leaves the climb
    /// unbounded; a cap below a record's original priority has no effect on
    /// that record.
    pub ceiling: Option<i64>,
}

impl Default for AgingPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            increment: 20,
            ceiling: None,
        }
    }
}

impl AgingPolicy {
    /// Policy under which priorities never change; dispatch order is then
    /// fixed at submission time.
    pub fn disabled() -> Self {
        Self {
            interval: Duration::from_secs(1),
            increment: 0,
            ceiling: None,
        }
    }

    /// Priority a record deserves after waiting `waited` since arrival.
    pub fn boosted_priority(&self, original: i64, waited: Duration) -> i64 {
        if self.increment <= 0 || self.interval.is_zero() {
            return original;
        }
        let steps = (waited.as_nanos() / self.interval.as_nanos()).min(i64::MAX as u128) as i64;
        if steps == 0 {
            return original;
        }
        let boosted = original.saturating_add(steps.saturating_mul(self.increment));
        match self.ceiling {
            Some(cap) => boosted.min(cap.max(original)),
            None => boosted,
        }
    }
}

/// One record promoted during an aging pass, reported to the observer.
#[derive(Debug, Clone)]
pub(crate) struct Promotion {
    pub name: Option<String>,
    pub previous: i64,
    pub current: i64,
}

/// Sweep the heap and raise every record whose earned priority now exceeds
/// its current one. The caller holds the scheduler lock and must call
/// [`PriorityHeap::rebuild`] when the returned list is non-empty.
pub(crate) fn promote_waiting(
    heap: &mut PriorityHeap,
    now: Instant,
    policy: &AgingPolicy,
) -> Vec<Promotion> {
    let mut promotions = Vec::new();
    for record in heap.records_mut() {
        let waited = now.saturating_duration_since(record.arrival_time());
        let boosted = policy.boosted_priority(record.original_priority(), waited);
        if boosted > record.current_priority() {
            promotions.push(Promotion {
                name: record.name().map(str::to_string),
                previous: record.current_priority(),
                current: boosted,
            });
            record.promote_to(boosted);
        }
    }
    promotions
}
