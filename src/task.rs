//! Task records shared by the heap, the workers, and the aging monitor.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use thiserror::Error;

use crate::completion::{completion_pair, CompletionHandle};

static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Failure delivered through a [`CompletionHandle`].
///
/// Every variant is local to the task that produced it; none of them ever
/// terminates a worker thread or affects other queued work.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The payload ran and returned an error.
    #[error("task failed: {0}")]
    Failed(Box<dyn std::error::Error + Send + Sync>),
    /// The payload panicked while running. The panic is caught on the worker.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was still queued when the pool shut down.
    #[error("task was cancelled before it ran")]
    Cancelled,
}

/// Outcome reported to the worker loop after a payload has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskCompletion {
    Succeeded,
    Failed,
}

type BoxedRunner = Box<dyn FnOnce() -> TaskCompletion + Send + 'static>;

/// A unit of work queued in the scheduler.
///
/// Carries the submitter-chosen priority, the priority as raised by aging,
/// the arrival stamp used for tie-breaking and aging, and the boxed payload.
/// The payload already embeds its completion wiring, so cancelling a record
/// is simply dropping it: the completion sender drops with it and any
/// waiting reader observes [`TaskError::Cancelled`].
pub struct TaskRecord {
    name: Option<String>,
    original_priority: i64,
    current_priority: i64,
    arrival_time: Instant,
    sequence: u64,
    runner: BoxedRunner,
}

impl TaskRecord {
    /// Create a fire-and-forget record. Panics in the payload are caught and
    /// reported as a failed run.
    pub fn new<F>(priority: i64, name: Option<String>, payload: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let runner: BoxedRunner = Box::new(move || match catch_unwind(AssertUnwindSafe(payload)) {
            Ok(()) => TaskCompletion::Succeeded,
            Err(_) => TaskCompletion::Failed,
        });
        Self::from_runner(priority, name, runner)
    }

    /// Create a record whose result is delivered through a completion handle.
    ///
    /// The typed sender is moved into the runner and consumed by its single
    /// `send`, so a second resolution of the channel cannot be expressed.
    pub(crate) fn with_completion<T, F>(
        priority: i64,
        name: Option<String>,
        payload: F,
    ) -> (Self, CompletionHandle<T>)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let (sender, handle) = completion_pair();
        let runner: BoxedRunner = Box::new(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(payload)) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(TaskError::Failed(error)),
                Err(panic) => Err(TaskError::Panicked(panic_message(panic.as_ref()))),
            };
            let completion = if outcome.is_ok() {
                TaskCompletion::Succeeded
            } else {
                TaskCompletion::Failed
            };
            let _ = sender.send(outcome);
            completion
        });
        (Self::from_runner(priority, name, runner), handle)
    }

    fn from_runner(priority: i64, name: Option<String>, runner: BoxedRunner) -> Self {
        Self {
            name,
            original_priority: priority,
            current_priority: priority,
            arrival_time: Instant::now(),
            sequence: SEQUENCE_COUNTER.fetch_add(1, Ordering::Relaxed),
            runner,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn original_priority(&self) -> i64 {
        self.original_priority
    }

    pub fn current_priority(&self) -> i64 {
        self.current_priority
    }

    pub fn arrival_time(&self) -> Instant {
        self.arrival_time
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raise the current priority. Aging never lowers it; the heap that holds
    /// this record must be rebuilt before the next extraction.
    pub(crate) fn promote_to(&mut self, priority: i64) {
        debug_assert!(priority >= self.current_priority);
        self.current_priority = priority;
    }

    /// Run the payload, consuming the record. Called outside any lock.
    pub(crate) fn run(self) -> TaskCompletion {
        (self.runner)()
    }

    #[cfg(test)]
    pub(crate) fn set_arrival(&mut self, arrival: Instant) {
        self.arrival_time = arrival;
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("name", &self.name)
            .field("original_priority", &self.original_priority)
            .field("current_priority", &self.current_priority)
            .field("arrival_time", &self.arrival_time)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task payload panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_starts_with_original_priority() {
        let record = TaskRecord::new(30, Some("probe".to_string()), || {});
        assert_eq!(record.original_priority(), 30);
        assert_eq!(record.current_priority(), 30);
        assert_eq!(record.name(), Some("probe"));
    }

    #[test]
    fn sequence_numbers_are_strictly_increasing() {
        let first = TaskRecord::new(1, None, || {});
        let second = TaskRecord::new(1, None, || {});
        assert!(first.sequence() < second.sequence());
    }

    #[test]
    fn run_reports_panic_as_failed() {
        let record = TaskRecord::new(1, None, || panic!("kaboom"));
        assert_eq!(record.run(), TaskCompletion::Failed);
    }

    #[test]
    fn completion_runner_delivers_value_and_reports_success() {
        let (record, handle) = TaskRecord::with_completion(5, None, || Ok::<_, _>(41 + 1));
        assert_eq!(record.run(), TaskCompletion::Succeeded);
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn completion_runner_captures_panic_message() {
        let (record, handle) =
            TaskRecord::with_completion::<u8, _>(5, None, || panic!("bad input"));
        assert_eq!(record.run(), TaskCompletion::Failed);
        match handle.wait() {
            Err(TaskError::Panicked(message)) => assert!(message.contains("bad input")),
            other => panic!("expected panic outcome, got {other:?}"),
        }
    }
}
