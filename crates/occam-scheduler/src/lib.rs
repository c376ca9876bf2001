//! # occam-scheduler
//!
//! Optimistic concurrent transaction scheduler for Occam.
//!
//! Executes an ordered batch of transactions on a pool of concurrent
//! workers and returns exactly the results of sequential execution:
//! - Execution phase: bounded worker pool with a shared cancellation scope
//! - Validation phase: full-batch conflict check after every round
//! - Retry: conflicted transactions re-run at the next incarnation
//! - Multi-version state and read/write sets for conflict detection

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod context;
mod error;
mod executor;
mod metrics;
mod mv_memory;
mod pool;
mod rw_set;
mod scheduler;
mod state_key;
mod task;
mod validator;

pub use config::{SchedulerConfig, DEFAULT_MAX_INCARNATIONS};
pub use context::Context;
pub use error::{SchedulerError, SchedulerResult};
pub use executor::{executor_fn, AbortReason, AbortSignal, ExecuteError, FnExecutor, TxExecutor};
pub use metrics::{Histogram, HistogramSummary, MetricsSnapshot, SchedulerMetrics};
pub use mv_memory::{MvMemory, MvRead, VersionedValue};
pub use pool::{ExecutionSummary, WorkerPool};
pub use rw_set::{AccessTracked, ConflictSet, RWSet};
pub use scheduler::{BatchReport, Scheduler};
pub use state_key::{Incarnation, StateKey, TxIndex, Version};
pub use task::{to_tasks, Task, TaskStatus};
pub use validator::{MinimalValidator, ReadWriteSetValidator, Validator};

pub use tokio_util::sync::CancellationToken;
