//! Single-use result channel connecting a submitter to the worker that runs
//! its task.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::task::TaskError;

pub(crate) type CompletionSender<T> = Sender<Result<T, TaskError>>;

/// Build the sender/handle pair for one task.
///
/// Capacity one: the single producer write never blocks, and the sender is
/// consumed by the task runner so a second write cannot happen.
pub(crate) fn completion_pair<T>() -> (CompletionSender<T>, CompletionHandle<T>) {
    let (sender, receiver) = bounded(1);
    (sender, CompletionHandle { receiver })
}

/// Caller-side view of a task's eventual outcome.
///
/// If the task is dropped without running (pool teardown, immediate
/// shutdown), its sender drops with it and every read here yields
/// [`TaskError::Cancelled`] instead of blocking forever.
pub struct CompletionHandle<T> {
    receiver: Receiver<Result<T, TaskError>>,
}

impl<T> CompletionHandle<T> {
    /// Block until the task resolves and return its outcome.
    pub fn wait(self) -> Result<T, TaskError> {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Cancelled),
        }
    }

    /// Block for at most `timeout`. Returns `None` if the task has not
    /// resolved yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TaskError::Cancelled)),
        }
    }

    /// Non-blocking poll. Returns `None` while the task is still pending.
    pub fn try_wait(&self) -> Option<Result<T, TaskError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Cancelled)),
        }
    }
}
