//! Error types for the scheduler

use crate::state_key::{Incarnation, TxIndex};
use thiserror::Error;

/// Scheduler errors
///
/// Conflicts are not errors: they are handled by re-execution and never
/// reach the caller. Every variant here fails the whole batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The batch was cancelled through its context
    #[error("batch execution cancelled")]
    Cancelled,

    /// The execution function failed for a transaction
    #[error("transaction {index} (incarnation {incarnation}) failed: {reason}")]
    ExecutionFailed {
        /// Transaction index
        index: TxIndex,
        /// Incarnation that failed
        incarnation: Incarnation,
        /// Failure reason reported by the execution function
        reason: String,
    },

    /// A transaction kept conflicting past the configured ceiling
    #[error("transaction {index} reached incarnation {incarnation}, limit is {limit}")]
    IncarnationLimitExceeded {
        /// Transaction index
        index: TxIndex,
        /// Incarnation it would have been re-executed at
        incarnation: Incarnation,
        /// Configured maximum
        limit: Incarnation,
    },

    /// A worker task panicked or was aborted by the runtime
    #[error("worker failed: {0}")]
    WorkerPanicked(String),

    /// A validator reported an index outside the batch
    #[error("invalid transaction index: {0}")]
    InvalidIndex(TxIndex),

    /// A task finished the batch without a response
    #[error("transaction {0} has no response")]
    MissingResponse(TxIndex),

    /// Invalid scheduler configuration
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
