//! Injected observability sink.
//!
//! The scheduler never writes to the console itself; everything a host
//! application might want to surface (dispatch, completion, aging
//! promotions, cancellations) flows through this trait. All hooks are
//! invoked outside the scheduler lock, so implementations may block without
//! stalling dispatch.

use std::time::Duration;

/// Lifecycle callbacks emitted by the pool. Every hook has an empty default
/// body, so implementations override only what they care about.
pub trait PoolObserver: Send + Sync {
    /// A worker pulled the record off the heap and is about to run it.
    fn task_started(&self, worker: usize, name: Option<&str>, current_priority: i64) {
        let _ = (worker, name, current_priority);
    }

    /// The payload finished, successfully or not.
    fn task_finished(&self, worker: usize, name: Option<&str>, succeeded: bool, elapsed: Duration) {
        let _ = (worker, name, succeeded, elapsed);
    }

    /// A queued record was discarded during immediate shutdown or teardown.
    fn task_cancelled(&self, name: Option<&str>) {
        let _ = name;
    }

    /// The aging monitor raised a record's current priority.
    fn task_promoted(&self, name: Option<&str>, previous: i64, current: i64) {
        let _ = (name, previous, current);
    }

    /// A submission arrived after shutdown had begun.
    fn submission_rejected(&self, name: Option<&str>) {
        let _ = name;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PoolObserver for NullObserver {}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PoolObserver for TracingObserver {
    fn task_started(&self, worker: usize, name: Option<&str>, current_priority: i64) {
        let task = name.unwrap_or("<unnamed>");
        tracing::debug!(worker, task, priority = current_priority, "task started");
    }

    fn task_finished(&self, worker: usize, name: Option<&str>, succeeded: bool, elapsed: Duration) {
        let task = name.unwrap_or("<unnamed>");
        if succeeded {
            tracing::debug!(worker, task, ?elapsed, "task finished");
        } else {
            tracing::warn!(worker, task, ?elapsed, "task failed");
        }
    }

    fn task_cancelled(&self, name: Option<&str>) {
        tracing::debug!(task = name.unwrap_or("<unnamed>"), "task cancelled at shutdown");
    }

    fn task_promoted(&self, name: Option<&str>, previous: i64, current: i64) {
        tracing::debug!(task = name.unwrap_or("<unnamed>"), previous, current, "priority aged up");
    }

    fn submission_rejected(&self, name: Option<&str>) {
        tracing::warn!(task = name.unwrap_or("<unnamed>"), "submission rejected during shutdown");
    }
}
