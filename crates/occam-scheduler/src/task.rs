//! Scheduling record for one transaction of a batch

use crate::executor::AbortSignal;
use crate::state_key::{Incarnation, TxIndex, Version};
use std::fmt;
use std::sync::Arc;

/// Scheduling status of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting to be executed at its current incarnation
    Pending,
    /// Executed, result not yet validated
    Executed,
    /// Last result must be discarded and the task retried
    Aborted,
    /// Result validated against the rest of the batch
    Validated,
}

impl TaskStatus {
    /// Whether a task in this status holds a response
    pub fn has_response(&self) -> bool {
        matches!(self, TaskStatus::Executed | TaskStatus::Validated)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Executed => "executed",
            TaskStatus::Aborted => "aborted",
            TaskStatus::Validated => "validated",
        };
        f.write_str(s)
    }
}

/// A transaction request plus its scheduling metadata
///
/// Tasks live in an arena owned by the scheduler for one batch. Every
/// transition checks its source state, so a result reported for a superseded
/// incarnation can never overwrite the current one.
#[derive(Debug)]
pub struct Task<Req, Resp> {
    index: TxIndex,
    incarnation: Incarnation,
    status: TaskStatus,
    request: Arc<Req>,
    response: Option<Resp>,
    executed_round: Option<u32>,
    last_abort: Option<AbortSignal>,
}

impl<Req, Resp> Task<Req, Resp> {
    /// Create a pending task at incarnation 0
    pub fn new(index: TxIndex, request: Req) -> Self {
        Self {
            index,
            incarnation: 0,
            status: TaskStatus::Pending,
            request: Arc::new(request),
            response: None,
            executed_round: None,
            last_abort: None,
        }
    }

    /// Position in the batch
    pub fn index(&self) -> TxIndex {
        self.index
    }

    /// Current incarnation
    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    /// Current execution attempt
    pub fn version(&self) -> Version {
        Version::new(self.index, self.incarnation)
    }

    /// Current status
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Transaction payload
    pub fn request(&self) -> &Arc<Req> {
        &self.request
    }

    /// Response of the current incarnation, if executed
    pub fn response(&self) -> Option<&Resp> {
        self.response.as_ref()
    }

    /// Round that produced the current response
    pub fn executed_round(&self) -> Option<u32> {
        self.executed_round
    }

    /// Reason of the most recent abort
    pub fn last_abort(&self) -> Option<&AbortSignal> {
        self.last_abort.as_ref()
    }

    /// Record a successful execution.
    ///
    /// Returns false and leaves the task untouched if the result belongs to
    /// another incarnation or the task is not pending.
    pub fn record_execution(
        &mut self,
        incarnation: Incarnation,
        round: u32,
        response: Resp,
    ) -> bool {
        if incarnation != self.incarnation || self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Executed;
        self.response = Some(response);
        self.executed_round = Some(round);
        true
    }

    /// Record an abort signalled during execution
    pub fn record_abort(&mut self, incarnation: Incarnation, signal: AbortSignal) -> bool {
        if incarnation != self.incarnation || self.status != TaskStatus::Pending {
            return false;
        }
        self.abort_with(signal);
        true
    }

    /// Accept the current result. Aborted and pending tasks are left alone.
    pub fn mark_validated(&mut self) -> bool {
        match self.status {
            TaskStatus::Executed | TaskStatus::Validated => {
                self.status = TaskStatus::Validated;
                true
            }
            TaskStatus::Pending | TaskStatus::Aborted => false,
        }
    }

    /// Reject the current result after validation found a conflict
    pub fn mark_aborted(&mut self, signal: AbortSignal) -> bool {
        if !self.status.has_response() {
            return false;
        }
        self.abort_with(signal);
        true
    }

    /// Move an aborted task back to pending at the next incarnation
    pub fn reset_for_retry(&mut self) -> bool {
        if self.status != TaskStatus::Aborted {
            return false;
        }
        self.incarnation += 1;
        self.status = TaskStatus::Pending;
        self.response = None;
        self.executed_round = None;
        true
    }

    /// Consume the task, yielding its response
    pub fn into_response(self) -> Option<Resp> {
        self.response
    }

    fn abort_with(&mut self, signal: AbortSignal) {
        self.status = TaskStatus::Aborted;
        self.response = None;
        self.executed_round = None;
        self.last_abort = Some(signal);
    }
}

/// Build one pending task per request, preserving order
pub fn to_tasks<Req, Resp>(requests: Vec<Req>) -> Vec<Task<Req, Resp>> {
    requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| Task::new(index, request))
        .collect()
}
