//! Validation phase
//!
//! After every execution round the validator inspects the whole batch, not
//! only the tasks that just ran: re-executing an earlier transaction can
//! invalidate a later result that was accepted in a previous round.

use crate::executor::AbortSignal;
use crate::rw_set::AccessTracked;
use crate::state_key::TxIndex;
use crate::task::{Task, TaskStatus};

/// Decides which tasks must be re-executed after a round
pub trait Validator<Req, Resp>: Send + Sync {
    /// Validate every task of the batch and return the indices of tasks that
    /// need re-execution. Tasks that pass are moved to `Validated`; tasks
    /// that fail are left (or put) in `Aborted`.
    fn validate_all(&self, tasks: &mut [Task<Req, Resp>], round: u32) -> Vec<TxIndex>;
}

/// Accepts every executed task and reports the aborted ones
///
/// Performs no conflict detection of its own. The only conflict source is
/// the abort signal of the execution function.
#[derive(Clone, Copy, Debug, Default)]
pub struct MinimalValidator;

impl<Req, Resp> Validator<Req, Resp> for MinimalValidator {
    fn validate_all(&self, tasks: &mut [Task<Req, Resp>], _round: u32) -> Vec<TxIndex> {
        let mut invalid = Vec::new();
        for task in tasks.iter_mut() {
            if task.status() == TaskStatus::Aborted {
                invalid.push(task.index());
            } else {
                task.mark_validated();
            }
        }
        invalid
    }
}

/// Optimistic-concurrency validator comparing read/write sets
///
/// A task conflicts when a lower-index task produced its current result in
/// the same round or later, and wrote a key the task read or wrote: the task
/// either ran concurrently with that write or before it. Conflicts found on
/// already validated tasks send them back for re-execution.
///
/// The lowest-index task executed in a round has no concurrent lower writer,
/// so every round validates at least one more task and the batch terminates.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadWriteSetValidator;

impl<Req, Resp> Validator<Req, Resp> for ReadWriteSetValidator
where
    Resp: AccessTracked,
{
    fn validate_all(&self, tasks: &mut [Task<Req, Resp>], _round: u32) -> Vec<TxIndex> {
        let mut invalid = Vec::new();

        for pos in 0..tasks.len() {
            let (lower, rest) = tasks.split_at_mut(pos);
            let task = &mut rest[0];

            match task.status() {
                TaskStatus::Aborted => {
                    invalid.push(task.index());
                    continue;
                }
                TaskStatus::Pending => continue,
                TaskStatus::Executed | TaskStatus::Validated => {}
            }

            let (Some(round), Some(response)) = (task.executed_round(), task.response()) else {
                continue;
            };
            let accesses = response.rw_set();

            let conflict = lower.iter().find(|earlier| {
                earlier.status().has_response()
                    && earlier.executed_round().is_some_and(|r| r >= round)
                    && earlier
                        .response()
                        .is_some_and(|resp| accesses.depends_on(resp.rw_set()))
            });

            match conflict {
                Some(earlier) => {
                    let by = earlier.index();
                    let keys = earlier
                        .response()
                        .map(|resp| accesses.get_conflicts(resp.rw_set()))
                        .unwrap_or_default();
                    tracing::debug!(
                        index = task.index(),
                        incarnation = task.incarnation(),
                        by,
                        raw = keys.raw.len(),
                        waw = keys.waw.len(),
                        total = keys.total_conflicts(),
                        "validation conflict"
                    );
                    task.mark_aborted(AbortSignal::dependency(by));
                    invalid.push(task.index());
                }
                None => {
                    task.mark_validated();
                }
            }
        }

        invalid
    }
}
