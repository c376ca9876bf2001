//! Execution phase: a bounded worker pool over a shared job queue
//!
//! A producer feeds pending tasks into a bounded queue, a fixed set of workers
//! pulls from it and runs the execution function on the blocking pool, and
//! outcomes fan back in over a channel. Producer and workers share one
//! cancellation scope derived from the batch context: the first failure, or
//! cancellation of the context, stops every sibling.

use crate::context::Context;
use crate::error::{SchedulerError, SchedulerResult};
use crate::executor::{AbortSignal, ExecuteError, TxExecutor};
use crate::state_key::Version;
use crate::task::{Task, TaskStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What one execution phase did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Tasks that finished with a response
    pub executed: usize,
    /// Tasks aborted by the execution function
    pub aborted: usize,
    /// Outcomes dropped because the task moved to another incarnation
    pub stale: usize,
}

impl ExecutionSummary {
    /// Total outcomes received
    pub fn total(&self) -> usize {
        self.executed + self.aborted + self.stale
    }
}

/// Queue entry: arena slot, version being executed, payload
struct Job<Req> {
    slot: usize,
    version: Version,
    request: Arc<Req>,
}

enum Outcome<Resp> {
    Executed(Resp),
    Aborted(AbortSignal),
}

/// Concurrent executor of pending tasks
pub struct WorkerPool<E: TxExecutor> {
    executor: Arc<E>,
    workers: i64,
}

impl<E: TxExecutor> WorkerPool<E> {
    /// Create a pool. A worker count of zero or less spawns one worker per pending task.
    pub fn new(executor: Arc<E>, workers: i64) -> Self {
        Self { executor, workers }
    }

    /// Workers to spawn for a phase with `pending` tasks
    pub fn effective_workers(&self, pending: usize) -> usize {
        if self.workers < 1 {
            pending
        } else {
            (self.workers as usize).min(pending)
        }
    }

    /// Execute every `Pending` task in `tasks` concurrently.
    ///
    /// Successful executions become `Executed` with their response, aborts
    /// become `Aborted`. On error the phase stops all workers and returns the
    /// first failure once every call already in flight has returned;
    /// outcomes received by then are still applied and no rollback is
    /// attempted.
    pub async fn execute_all(
        &self,
        ctx: &Context<E::Context>,
        tasks: &mut [Task<E::Request, E::Response>],
        round: u32,
    ) -> SchedulerResult<ExecutionSummary> {
        let jobs: Vec<Job<E::Request>> = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.status() == TaskStatus::Pending)
            .map(|(slot, task)| Job {
                slot,
                version: task.version(),
                request: Arc::clone(task.request()),
            })
            .collect();

        if jobs.is_empty() {
            return Ok(ExecutionSummary::default());
        }
        if ctx.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }

        let pending = jobs.len();
        let workers = self.effective_workers(pending);
        tracing::debug!(round, pending, workers, "starting execution phase");

        let scope = ctx.cancellation().child_token();
        let (job_tx, job_rx) = mpsc::channel::<Job<E::Request>>(workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        // Sized so a worker never blocks on reporting.
        let (out_tx, mut out_rx) = mpsc::channel::<(usize, Version, Outcome<E::Response>)>(pending);

        let mut set: JoinSet<SchedulerResult<()>> = JoinSet::new();
        set.spawn(produce(jobs, job_tx, scope.clone()));
        for worker_id in 0..workers {
            set.spawn(work(
                worker_id,
                Arc::clone(&self.executor),
                Arc::clone(ctx.state()),
                Arc::clone(&job_rx),
                out_tx.clone(),
                scope.clone(),
            ));
        }
        drop(out_tx);

        let mut first_err: Option<SchedulerError> = None;
        while let Some(joined) = set.join_next().await {
            let result =
                joined.unwrap_or_else(|e| Err(SchedulerError::WorkerPanicked(e.to_string())));
            if let Err(err) = result {
                if first_err.is_none() {
                    scope.cancel();
                    first_err = Some(err);
                }
            }
        }

        let mut summary = ExecutionSummary::default();
        while let Some((slot, version, outcome)) = out_rx.recv().await {
            let task = &mut tasks[slot];
            let applied = match outcome {
                Outcome::Executed(response) => {
                    let ok = task.record_execution(version.incarnation, round, response);
                    if ok {
                        summary.executed += 1;
                    }
                    ok
                }
                Outcome::Aborted(signal) => {
                    tracing::debug!(version = %version, reason = %signal, "execution aborted");
                    let ok = task.record_abort(version.incarnation, signal);
                    if ok {
                        summary.aborted += 1;
                    }
                    ok
                }
            };
            if !applied {
                summary.stale += 1;
                tracing::warn!(
                    version = %version,
                    current = task.incarnation(),
                    "discarding result of superseded incarnation"
                );
            }
        }

        match first_err {
            // A worker that saw the external token first reports a plain
            // cancellation; prefer that over whatever a sibling reported.
            Some(_) if ctx.is_cancelled() => Err(SchedulerError::Cancelled),
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

async fn produce<Req>(
    jobs: Vec<Job<Req>>,
    job_tx: mpsc::Sender<Job<Req>>,
    scope: CancellationToken,
) -> SchedulerResult<()> {
    for job in jobs {
        tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(SchedulerError::Cancelled),
            sent = job_tx.send(job) => {
                if sent.is_err() {
                    // every worker is gone
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn work<E: TxExecutor>(
    worker_id: usize,
    executor: Arc<E>,
    state: Arc<E::Context>,
    job_rx: Arc<Mutex<mpsc::Receiver<Job<E::Request>>>>,
    out_tx: mpsc::Sender<(usize, Version, Outcome<E::Response>)>,
    scope: CancellationToken,
) -> SchedulerResult<()> {
    loop {
        let job = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(SchedulerError::Cancelled),
            job = async { job_rx.lock().await.recv().await } => job,
        };
        let Some(Job { slot, version, request }) = job else {
            return Ok(());
        };

        tracing::trace!(worker = worker_id, version = %version, "executing transaction");
        let call = {
            let executor = Arc::clone(&executor);
            let state = Arc::clone(&state);
            tokio::task::spawn_blocking(move || executor.execute(&state, &request, version))
        };
        // the scope is only checked between jobs, so no call outlives the phase
        let result = call
            .await
            .map_err(|e| SchedulerError::WorkerPanicked(e.to_string()))?;

        let outcome = match result {
            Ok(response) => Outcome::Executed(response),
            Err(ExecuteError::Abort(signal)) => Outcome::Aborted(signal),
            Err(ExecuteError::Failed(err)) => {
                tracing::error!(version = %version, error = %err, "transaction execution failed");
                return Err(SchedulerError::ExecutionFailed {
                    index: version.index,
                    incarnation: version.incarnation,
                    reason: err.to_string(),
                });
            }
        };
        if out_tx.send((slot, version, outcome)).await.is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{executor_fn, FnExecutor};
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Exec<F> = FnExecutor<F, (), u64, u64, String>;

    fn pool<F>(f: F, workers: i64) -> WorkerPool<Exec<F>>
    where
        F: Fn(&(), &u64, Version) -> Result<u64, ExecuteError<String>> + Send + Sync + 'static,
    {
        WorkerPool::new(Arc::new(executor_fn(f)), workers)
    }

    fn tasks(n: u64) -> Vec<Task<u64, u64>> {
        (0..n).map(|i| Task::new(i as usize, i)).collect()
    }

    #[tokio::test]
    async fn test_execute_all_pending() {
        let pool = pool(|_, req, _| Ok(req * 10), 2);
        let mut tasks = tasks(5);

        let summary = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap();

        assert_eq!(summary.executed, 5);
        assert_eq!(summary.aborted, 0);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.status(), TaskStatus::Executed);
            assert_eq!(task.response(), Some(&(i as u64 * 10)));
            assert_eq!(task.executed_round(), Some(1));
        }
    }

    #[tokio::test]
    async fn test_only_pending_tasks_run() {
        let calls = Arc::new(SyncMutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let pool = pool(
            move |_, req, v| {
                log.lock().push(v.index);
                Ok(*req)
            },
            0,
        );
        let mut tasks = tasks(3);
        tasks[0].record_execution(0, 1, 0);
        tasks[0].mark_validated();

        pool.execute_all(&Context::new(()), &mut tasks, 2).await.unwrap();

        let mut ran = calls.lock().clone();
        ran.sort();
        assert_eq!(ran, vec![1, 2]);
        assert_eq!(tasks[0].executed_round(), Some(1));
    }

    #[tokio::test]
    async fn test_abort_signal_marks_task() {
        let pool = pool(
            |_, req, _| {
                if *req == 1 {
                    return Err(AbortSignal::dependency(0).into());
                }
                Ok(*req)
            },
            4,
        );
        let mut tasks = tasks(3);

        let summary = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap();

        assert_eq!(summary.executed, 2);
        assert_eq!(summary.aborted, 1);
        assert_eq!(tasks[1].status(), TaskStatus::Aborted);
        assert!(tasks[1].response().is_none());
        assert_eq!(tasks[2].status(), TaskStatus::Executed);
    }

    #[tokio::test]
    async fn test_execution_error_fails_phase() {
        let pool = pool(
            |_, req, _| {
                if *req == 2 {
                    return Err(ExecuteError::Failed("boom".to_string()));
                }
                Ok(*req)
            },
            1,
        );
        let mut tasks = tasks(4);

        let err = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap_err();
        match err {
            SchedulerError::ExecutionFailed { index, incarnation, reason } => {
                assert_eq!(index, 2);
                assert_eq!(incarnation, 0);
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        // single worker processes in order, so nothing after the failure ran
        assert_eq!(tasks[3].status(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_pre_cancelled_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pool = pool(
            move |_, req, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(*req)
            },
            2,
        );
        let ctx = Context::new(());
        ctx.cancel();
        let mut tasks = tasks(3);

        let err = pool.execute_all(&ctx, &mut tasks, 1).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_waits_for_in_flight_calls() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (start_count, finish_count) = (Arc::clone(&started), Arc::clone(&finished));
        let pool = pool(
            move |_, req, _| {
                start_count.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(150));
                finish_count.fetch_add(1, Ordering::SeqCst);
                Ok(*req)
            },
            4,
        );
        let ctx = Context::new(());
        let token = ctx.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            token.cancel();
        });
        let mut tasks = tasks(8);

        let err = pool.execute_all(&ctx, &mut tasks, 1).await.unwrap_err();
        let at_return = finished.load(Ordering::SeqCst);

        assert!(matches!(err, SchedulerError::Cancelled));
        assert!(at_return >= 1);
        assert_eq!(at_return, started.load(Ordering::SeqCst));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), at_return);
    }

    #[tokio::test]
    async fn test_worker_panic_reported() {
        let pool = pool(
            |_, req, _| {
                if *req == 0 {
                    panic!("executor bug");
                }
                Ok(*req)
            },
            1,
        );
        let mut tasks = tasks(2);

        let err = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap_err();
        assert!(matches!(err, SchedulerError::WorkerPanicked(_)));
    }

    #[tokio::test]
    async fn test_each_task_executed_once_per_round() {
        let seen = Arc::new(SyncMutex::new(HashSet::new()));
        let log = Arc::clone(&seen);
        let pool = pool(
            move |_, req, v| {
                assert!(log.lock().insert(v), "double execution of {v}");
                Ok(*req)
            },
            3,
        );
        let mut tasks = tasks(50);

        let summary = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap();
        assert_eq!(summary.total(), 50);
        assert_eq!(seen.lock().len(), 50);
    }

    #[tokio::test]
    async fn test_empty_round_is_noop() {
        let pool = pool(|_, req, _| Ok(*req), 2);
        let mut tasks: Vec<Task<u64, u64>> = Vec::new();
        let summary = pool.execute_all(&Context::new(()), &mut tasks, 1).await.unwrap();
        assert_eq!(summary, ExecutionSummary::default());
    }

    #[test]
    fn test_effective_workers() {
        let p = pool(|_, req, _| Ok(*req), 0);
        assert_eq!(p.effective_workers(9), 9);
        let p = pool(|_, req, _| Ok(*req), -1);
        assert_eq!(p.effective_workers(9), 9);
        let p = pool(|_, req, _| Ok(*req), 4);
        assert_eq!(p.effective_workers(9), 4);
        assert_eq!(p.effective_workers(2), 2);
    }
}
