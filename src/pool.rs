//! Scheduler facade: worker pool, aging monitor, submission and shutdown.
//!
//! All worker threads share a single priority queue (max-heap on current
//! priority) guarded by one `parking_lot` mutex and one condition variable.
//!
//! Algorithm:
//! 1. Submitters: build a task record, insert it into the shared heap under
//!    the lock, wake one worker
//! 2. Workers: pop the highest-current-priority record, run its payload
//!    outside the lock, resolve the completion channel
//! 3. Monitor: every tick, sweep the heap for records whose wait time has
//!    earned a boost, rebuild once if anything changed, wake all workers
//!
//! The aging monitor sleeps on its own gate so a submission wake-up is never
//! swallowed by the monitor, and shutdown can still interrupt its tick
//! immediately. Payloads always run outside the lock.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aging::{self, AgingPolicy};
use crate::completion::CompletionHandle;
use crate::heap::PriorityHeap;
use crate::metrics::{PoolCounters, PoolStats};
use crate::observer::{PoolObserver, TracingObserver};
use crate::task::{TaskCompletion, TaskRecord};

/// Construction-time failure.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("aging interval must be non-zero when the increment is non-zero")]
    ZeroAgingInterval,
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Returned by `submit`/`submit_detached` once shutdown has begun. The
/// payload is dropped, never silently queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scheduler is shutting down; submission rejected")]
pub struct RejectedSubmission;

/// How `shutdown` treats work that is queued but not yet started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownMode {
    /// Stop accepting submissions; run everything already queued.
    Drain,
    /// Stop accepting submissions; cancel queued records, finish only the
    /// tasks already executing.
    Immediate,
}

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads. Must be at least 1; the caller decides how
    /// this relates to the hardware.
    pub workers: usize,
    /// Aging behavior applied to queued work.
    pub aging: AgingPolicy,
    /// Cadence of the aging monitor's sweep. A coarse tick only delays
    /// promotions, it never skips them.
    pub monitor_tick: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            aging: AgingPolicy::default(),
            monitor_tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Draining,
    Halting,
}

struct DispatchState {
    heap: PriorityHeap,
    phase: Phase,
}

struct PoolShared {
    state: Mutex<DispatchState>,
    work_ready: Condvar,
    running: AtomicBool,
    tick_gate: Mutex<bool>,
    tick_alarm: Condvar,
}

/// Fixed pool of worker threads dispatching from a shared aging-priority
/// heap.
///
/// Dropping the pool performs an immediate shutdown, so queued-but-unstarted
/// work resolves as cancelled rather than leaving a submitter blocked.
pub struct AgingPool {
    shared: Arc<PoolShared>,
    counters: Arc<PoolCounters>,
    observer: Arc<dyn PoolObserver>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl AgingPool {
    /// Build a pool that reports lifecycle events through `tracing`.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Build a pool with a caller-supplied observability sink.
    pub fn with_observer(
        config: PoolConfig,
        observer: Arc<dyn PoolObserver>,
    ) -> Result<Self, PoolError> {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        if config.aging.increment > 0 && config.aging.interval.is_zero() {
            return Err(PoolError::ZeroAgingInterval);
        }

        let shared = Arc::new(PoolShared {
            state: Mutex::new(DispatchState {
                heap: PriorityHeap::new(),
                phase: Phase::Running,
            }),
            work_ready: Condvar::new(),
            running: AtomicBool::new(true),
            tick_gate: Mutex::new(false),
            tick_alarm: Condvar::new(),
        });
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let worker_shared = shared.clone();
            let worker_counters = counters.clone();
            let worker_observer = observer.clone();
            let spawned = thread::Builder::new()
                .name(format!("Pool-Worker-{worker_id}"))
                .spawn(move || {
                    worker_loop(worker_id, worker_shared, worker_counters, worker_observer)
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(error) => {
                    abort_spawned(&shared, workers);
                    return Err(PoolError::Spawn(error));
                }
            }
        }

        let monitor_shared = shared.clone();
        let monitor_counters = counters.clone();
        let monitor_observer = observer.clone();
        let policy = config.aging.clone();
        let tick = config.monitor_tick;
        let monitor = match thread::Builder::new()
            .name("Aging-Monitor".to_string())
            .spawn(move || {
                monitor_loop(monitor_shared, policy, tick, monitor_counters, monitor_observer)
            }) {
            Ok(handle) => handle,
            Err(error) => {
                abort_spawned(&shared, workers);
                return Err(PoolError::Spawn(error));
            }
        };

        Ok(Self {
            shared,
            counters,
            observer,
            workers: Mutex::new(workers),
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// Queue a payload and return a handle to its eventual result.
    ///
    /// Rejects once shutdown has begun; the phase check and the heap insert
    /// happen under one lock acquisition, so a submission racing `shutdown`
    /// either lands before the flag flips or is rejected.
    pub fn submit<T, F>(
        &self,
        priority: i64,
        name: Option<&str>,
        payload: F,
    ) -> Result<CompletionHandle<T>, RejectedSubmission>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let (record, handle) =
            TaskRecord::with_completion(priority, name.map(str::to_string), payload);
        self.submit_record(record)?;
        Ok(handle)
    }

    /// Queue a fire-and-forget payload.
    pub fn submit_detached<F>(
        &self,
        priority: i64,
        name: Option<&str>,
        payload: F,
    ) -> Result<(), RejectedSubmission>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_record(TaskRecord::new(priority, name.map(str::to_string), payload))
    }

    fn submit_record(&self, record: TaskRecord) -> Result<(), RejectedSubmission> {
        {
            let mut state = self.shared.state.lock();
            if state.phase != Phase::Running {
                drop(state);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                self.observer.submission_rejected(record.name());
                return Err(RejectedSubmission);
            }
            state.heap.insert(record);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Stop the pool and join every thread before returning.
    ///
    /// `Drain` lets workers empty the queue first; `Immediate` cancels
    /// queued records (their completion handles resolve as cancelled) and
    /// waits only for tasks already executing. Calling this again is a
    /// no-op; an `Immediate` call after a `Drain` that is still in progress
    /// escalates it and cancels whatever is left. Must not be called from
    /// inside a task payload, since it joins the worker threads.
    pub fn shutdown(&self, mode: ShutdownMode) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            match mode {
                ShutdownMode::Drain => {
                    if state.phase == Phase::Running {
                        state.phase = Phase::Draining;
                    }
                    Vec::new()
                }
                ShutdownMode::Immediate => {
                    state.phase = Phase::Halting;
                    state.heap.take_all()
                }
            }
        };
        self.shared.running.store(false, Ordering::Relaxed);

        if !cancelled.is_empty() {
            self.counters
                .cancelled
                .fetch_add(cancelled.len() as u64, Ordering::Relaxed);
            for record in &cancelled {
                self.observer.task_cancelled(record.name());
            }
            // Dropping the records resolves their completion channels as
            // cancelled.
            drop(cancelled);
        }

        self.shared.work_ready.notify_all();
        {
            let mut stopped = self.shared.tick_gate.lock();
            *stopped = true;
            self.shared.tick_alarm.notify_all();
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
        if let Some(handle) = self.monitor.lock().take() {
            let _ = handle.join();
        }
    }

    /// Number of records currently waiting in the heap.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    /// Snapshot of the lifetime counters.
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.queued())
    }

    /// False once shutdown has begun.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }
}

impl Drop for AgingPool {
    fn drop(&mut self) {
        self.shutdown(ShutdownMode::Immediate);
    }
}

/// Tear down threads spawned before a construction failure so none of them
/// waits forever on the condition variable.
fn abort_spawned(shared: &Arc<PoolShared>, workers: Vec<JoinHandle<()>>) {
    shared.state.lock().phase = Phase::Halting;
    shared.running.store(false, Ordering::Relaxed);
    shared.work_ready.notify_all();
    for handle in workers {
        let _ = handle.join();
    }
}

fn worker_loop(
    worker_id: usize,
    shared: Arc<PoolShared>,
    counters: Arc<PoolCounters>,
    observer: Arc<dyn PoolObserver>,
) {
    loop {
        let record = {
            let mut state = shared.state.lock();
            loop {
                if let Some(record) = state.heap.extract_max() {
                    break record;
                }
                if state.phase != Phase::Running {
                    return;
                }
                shared.work_ready.wait(&mut state);
            }
        };

        let name = record.name().map(str::to_string);
        observer.task_started(worker_id, name.as_deref(), record.current_priority());

        let started = Instant::now();
        let completion = record.run();
        let elapsed = started.elapsed();

        match completion {
            TaskCompletion::Succeeded => {
                counters.executed.fetch_add(1, Ordering::Relaxed);
                observer.task_finished(worker_id, name.as_deref(), true, elapsed);
            }
            TaskCompletion::Failed => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                observer.task_finished(worker_id, name.as_deref(), false, elapsed);
            }
        }
    }
}

fn monitor_loop(
    shared: Arc<PoolShared>,
    policy: AgingPolicy,
    tick: Duration,
    counters: Arc<PoolCounters>,
    observer: Arc<dyn PoolObserver>,
) {
    loop {
        {
            let mut stopped = shared.tick_gate.lock();
            if !*stopped {
                let _ = shared.tick_alarm.wait_for(&mut stopped, tick);
            }
            if *stopped {
                return;
            }
        }
        if !shared.running.load(Ordering::Relaxed) {
            return;
        }

        let now = Instant::now();
        let promotions = {
            let mut state = shared.state.lock();
            let promotions = aging::promote_waiting(&mut state.heap, now, &policy);
            if !promotions.is_empty() {
                state.heap.rebuild();
            }
            promotions
        };
        if promotions.is_empty() {
            continue;
        }

        counters
            .promotions
            .fetch_add(promotions.len() as u64, Ordering::Relaxed);
        // A rebuild may have changed the root, so every blocked worker must
        // re-check, not just one.
        shared.work_ready.notify_all();
        for promotion in &promotions {
            observer.task_promoted(promotion.name.as_deref(), promotion.previous, promotion.current);
        }
    }
}
