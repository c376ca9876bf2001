//! Execution function interface
//!
//! The scheduler treats transaction execution as an opaque, possibly
//! side-effecting call. Implementations receive the shared batch context, the
//! request and the version being executed, so a versioned store can isolate
//! the writes of each incarnation.

use crate::state_key::{TxIndex, Version};
use std::fmt;
use std::marker::PhantomData;

/// Why an execution was aborted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// A lower-index transaction wrote state this execution depends on
    DependencyWritten {
        /// Index of the writer
        by: TxIndex,
    },
    /// The execution function asked for a retry without a specific cause
    Requested,
}

/// Out-of-band signal that the current result must be discarded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbortSignal {
    /// Cause of the abort
    pub reason: AbortReason,
}

impl AbortSignal {
    /// Create a signal with the given reason
    pub fn new(reason: AbortReason) -> Self {
        Self { reason }
    }

    /// Abort without a specific cause
    pub fn requested() -> Self {
        Self::new(AbortReason::Requested)
    }

    /// Abort because `by` wrote a dependency
    pub fn dependency(by: TxIndex) -> Self {
        Self::new(AbortReason::DependencyWritten { by })
    }
}

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            AbortReason::DependencyWritten { by } => write!(f, "dependency written by {}", by),
            AbortReason::Requested => f.write_str("retry requested"),
        }
    }
}

/// Failure of a single execution call
#[derive(Debug)]
pub enum ExecuteError<E> {
    /// Conflict detected: retry the task, the batch continues
    Abort(AbortSignal),
    /// Fatal failure: the whole batch fails
    Failed(E),
}

impl<E> From<AbortSignal> for ExecuteError<E> {
    fn from(signal: AbortSignal) -> Self {
        ExecuteError::Abort(signal)
    }
}

/// Transaction execution function driven by the scheduler
pub trait TxExecutor: Send + Sync + 'static {
    /// Ambient state shared by every execution of a batch
    type Context: Send + Sync + 'static;
    /// Transaction payload
    type Request: Send + Sync + 'static;
    /// Execution result
    type Response: Send + 'static;
    /// Fatal error
    type Error: fmt::Display + Send + 'static;

    /// Execute one transaction at the given version
    fn execute(
        &self,
        ctx: &Self::Context,
        request: &Self::Request,
        version: Version,
    ) -> Result<Self::Response, ExecuteError<Self::Error>>;
}

/// Closure-backed [`TxExecutor`]
pub struct FnExecutor<F, C, Req, Resp, E> {
    f: F,
    _marker: PhantomData<fn(&C, &Req) -> Result<Resp, E>>,
}

/// Wrap a closure as an execution function
pub fn executor_fn<F, C, Req, Resp, E>(f: F) -> FnExecutor<F, C, Req, Resp, E>
where
    F: Fn(&C, &Req, Version) -> Result<Resp, ExecuteError<E>> + Send + Sync + 'static,
{
    FnExecutor {
        f,
        _marker: PhantomData,
    }
}

impl<F, C, Req, Resp, E> TxExecutor for FnExecutor<F, C, Req, Resp, E>
where
    F: Fn(&C, &Req, Version) -> Result<Resp, ExecuteError<E>> + Send + Sync + 'static,
    C: Send + Sync + 'static,
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Context = C;
    type Request = Req;
    type Response = Resp;
    type Error = E;

    fn execute(&self, ctx: &C, request: &Req, version: Version) -> Result<Resp, ExecuteError<E>> {
        (self.f)(ctx, request, version)
    }
}
