//! Priority thread pool with time-based priority aging.
//!
//! Work units are dispatched from a shared max-heap ordered by *current*
//! priority. A background monitor periodically raises the current priority of
//! work that has been waiting, so low-priority submissions cannot be starved
//! forever by a stream of higher-priority arrivals. Workers always run
//! payloads outside the scheduler lock; results travel back to the submitter
//! through a single-use completion channel.

pub mod aging;
pub mod completion;
pub mod heap;
pub mod metrics;
pub mod observer;
pub mod pool;
pub mod task;

pub use aging::AgingPolicy;
pub use completion::CompletionHandle;
pub use heap::PriorityHeap;
pub use metrics::PoolStats;
pub use observer::{NullObserver, PoolObserver, TracingObserver};
pub use pool::{AgingPool, PoolConfig, PoolError, RejectedSubmission, ShutdownMode};
pub use task::{TaskError, TaskRecord};
