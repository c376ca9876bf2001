//! Main scheduler implementation
//!
//! Runs the execute → validate → retry loop over a batch until no task needs
//! re-execution, then returns the responses in batch order.

use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::error::{SchedulerError, SchedulerResult};
use crate::executor::{AbortSignal, ExecuteError, TxExecutor};
use crate::metrics::SchedulerMetrics;
use crate::pool::WorkerPool;
use crate::state_key::{TxIndex, Version};
use crate::task::{to_tasks, Task, TaskStatus};
use crate::validator::{MinimalValidator, Validator};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of one processed batch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of transactions in the batch
    pub transactions: usize,
    /// Execute/validate rounds run
    pub rounds: u32,
    /// Execution calls whose result was recorded
    pub executions: usize,
    /// Aborts signalled during execution
    pub aborts: usize,
    /// Tasks sent back for re-execution
    pub retries: usize,
    /// Wall-clock time spent on the batch
    pub duration: Duration,
}

/// Optimistic concurrent scheduler
///
/// Produces the same responses as executing the batch sequentially, provided
/// the execution function isolates each task's view of state by version and
/// the validator detects every stale read.
pub struct Scheduler<E: TxExecutor, V = MinimalValidator> {
    executor: Arc<E>,
    pool: WorkerPool<E>,
    validator: V,
    config: SchedulerConfig,
    metrics: Arc<SchedulerMetrics>,
}

impl<E: TxExecutor> Scheduler<E> {
    /// Create a scheduler using the minimal validation policy
    pub fn new(executor: E, config: SchedulerConfig) -> Self {
        let executor = Arc::new(executor);
        Self {
            pool: WorkerPool::new(Arc::clone(&executor), config.workers),
            executor,
            validator: MinimalValidator,
            config,
            metrics: Arc::new(SchedulerMetrics::new()),
        }
    }
}

impl<E, V> Scheduler<E, V>
where
    E: TxExecutor,
    V: Validator<E::Request, E::Response>,
{
    /// Replace the validation policy
    pub fn with_validator<V2>(self, validator: V2) -> Scheduler<E, V2>
    where
        V2: Validator<E::Request, E::Response>,
    {
        Scheduler {
            executor: self.executor,
            pool: self.pool,
            validator,
            config: self.config,
            metrics: self.metrics,
        }
    }

    /// Scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Metrics updated by this scheduler
    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Execute a batch and return one response per request, in request order.
    ///
    /// Fails as a whole if any execution fails, a worker panics, the context
    /// is cancelled, or a transaction exceeds the incarnation ceiling.
    pub async fn process_all(
        &self,
        ctx: &Context<E::Context>,
        requests: Vec<E::Request>,
    ) -> SchedulerResult<Vec<E::Response>> {
        self.process_all_with_report(ctx, requests)
            .await
            .map(|(responses, _)| responses)
    }

    /// Like [`process_all`](Self::process_all), also returning a [`BatchReport`]
    pub async fn process_all_with_report(
        &self,
        ctx: &Context<E::Context>,
        requests: Vec<E::Request>,
    ) -> SchedulerResult<(Vec<E::Response>, BatchReport)> {
        let start = Instant::now();
        let result = self.run(ctx, requests).await;
        let elapsed = start.elapsed();
        self.metrics.record_batch(elapsed, result.is_ok());

        match result {
            Ok((responses, mut report)) => {
                report.duration = elapsed;
                tracing::info!(
                    transactions = report.transactions,
                    rounds = report.rounds,
                    executions = report.executions,
                    retries = report.retries,
                    elapsed_us = elapsed.as_micros() as u64,
                    "batch processed"
                );
                Ok((responses, report))
            }
            Err(err) => {
                tracing::warn!(error = %err, "batch failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        ctx: &Context<E::Context>,
        requests: Vec<E::Request>,
    ) -> SchedulerResult<(Vec<E::Response>, BatchReport)> {
        self.config.validate()?;

        let mut tasks: Vec<Task<E::Request, E::Response>> = to_tasks(requests);
        let mut report = BatchReport {
            transactions: tasks.len(),
            ..BatchReport::default()
        };
        if tasks.is_empty() {
            return Ok((Vec::new(), report));
        }

        loop {
            report.rounds += 1;
            let round = report.rounds;
            let round_start = Instant::now();

            let summary = self.pool.execute_all(ctx, &mut tasks, round).await?;
            let to_retry = self.validator.validate_all(&mut tasks, round);

            self.metrics.record_round(
                summary.executed as u64,
                summary.aborted as u64,
                summary.stale as u64,
                round_start.elapsed(),
            );
            report.executions += summary.executed;
            report.aborts += summary.aborted;
            tracing::debug!(
                round,
                executed = summary.executed,
                aborted = summary.aborted,
                retries = to_retry.len(),
                "round complete"
            );

            if to_retry.is_empty() {
                break;
            }
            report.retries += to_retry.len();
            self.metrics.record_retries(to_retry.len() as u64);
            self.reset_for_retry(&mut tasks, &to_retry)?;
        }

        let responses = collect_responses(tasks)?;
        Ok((responses, report))
    }

    fn reset_for_retry(
        &self,
        tasks: &mut [Task<E::Request, E::Response>],
        to_retry: &[TxIndex],
    ) -> SchedulerResult<()> {
        for &index in to_retry {
            let task = tasks.get_mut(index).ok_or(SchedulerError::InvalidIndex(index))?;
            let next = task.incarnation() + 1;
            if let Some(limit) = self.config.max_incarnations {
                if next > limit {
                    tracing::warn!(index, incarnation = next, limit, "incarnation limit exceeded");
                    return Err(SchedulerError::IncarnationLimitExceeded {
                        index,
                        incarnation: next,
                        limit,
                    });
                }
            }
            // validators may report a task without aborting it
            if task.status() != TaskStatus::Aborted {
                task.mark_aborted(AbortSignal::requested());
            }
            task.reset_for_retry();
        }
        Ok(())
    }

    /// Execute the batch strictly in order on the calling thread.
    ///
    /// Aborted executions are retried in place at the next incarnation,
    /// under the same ceiling as the concurrent path. Used as the reference
    /// the concurrent path must match.
    pub fn execute_sequential(
        &self,
        ctx: &Context<E::Context>,
        requests: Vec<E::Request>,
    ) -> SchedulerResult<Vec<E::Response>> {
        self.config.validate()?;
        let mut responses = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            let mut incarnation = 0;
            loop {
                if ctx.is_cancelled() {
                    return Err(SchedulerError::Cancelled);
                }
                let version = Version::new(index, incarnation);
                match self.executor.execute(ctx.state(), request, version) {
                    Ok(response) => {
                        responses.push(response);
                        break;
                    }
                    Err(ExecuteError::Abort(signal)) => {
                        tracing::debug!(
                            version = %version,
                            reason = %signal,
                            "sequential execution aborted"
                        );
                        incarnation += 1;
                        if let Some(limit) = self.config.max_incarnations {
                            if incarnation > limit {
                                return Err(SchedulerError::IncarnationLimitExceeded {
                                    index,
                                    incarnation,
                                    limit,
                                });
                            }
                        }
                    }
                    Err(ExecuteError::Failed(err)) => {
                        return Err(SchedulerError::ExecutionFailed {
                            index,
                            incarnation,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(responses)
    }
}

fn collect_responses<Req, Resp>(tasks: Vec<Task<Req, Resp>>) -> SchedulerResult<Vec<Resp>> {
    tasks
        .into_iter()
        .map(|task| {
            let index = task.index();
            task.into_response().ok_or(SchedulerError::MissingResponse(index))
        })
        .collect()
}
