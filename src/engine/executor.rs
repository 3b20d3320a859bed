// src/engine/executor.rs

//! Concurrent job scheduler.
//!
//! Jobs are visited in declaration order. A foreground job blocks the walk
//! until it is terminal (retries included); a background job is spawned as
//! its own Tokio task and the walk continues. Every spawned task is drained
//! before the report is built.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{Job, JobGraph, JobId};
use crate::engine::context::{DependencyOutcome, RunContext};
use crate::engine::report::{Reporter, RunReport};
use crate::engine::{FailureCause, JobState};
use crate::exec::{CommandExecutor, CommandRequest};

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOptions {
    /// Stop starting new jobs after a foreground job fails.
    pub fail_fast: bool,
}

/// Runs a [`JobGraph`] against a [`CommandExecutor`].
pub struct Scheduler<E: CommandExecutor + 'static> {
    executor: Arc<E>,
    reporter: Reporter,
    options: SchedulerOptions,
}

impl<E: CommandExecutor + 'static> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            reporter: self.reporter.clone(),
            options: self.options,
        }
    }
}

impl<E: CommandExecutor + 'static> std::fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("reporter", &self.reporter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: CommandExecutor + 'static> Scheduler<E> {
    pub fn new(executor: Arc<E>, reporter: Reporter) -> Self {
        Self {
            executor,
            reporter,
            options: SchedulerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every job of `graph` and report their final states.
    ///
    /// Returns once all jobs are terminal, or once the run is interrupted
    /// and every spawned task has wound down.
    pub async fn run(&self, graph: &JobGraph, ctx: Arc<RunContext>) -> RunReport {
        info!(jobs = graph.len(), "starting run");

        let mut background: Vec<(JobId, JoinHandle<()>)> = Vec::new();
        let mut stopped_at: Option<usize> = None;

        for (index, job) in graph.jobs().iter().enumerate() {
            if ctx.is_interrupted() {
                info!(job = %job.label, "run interrupted; not starting remaining jobs");
                break;
            }

            if job.background {
                debug!(job = %job.label, "spawning background job");
                let this = self.clone();
                let job = Arc::clone(job);
                let task_ctx = Arc::clone(&ctx);
                let id = job.id;
                background.push((
                    id,
                    tokio::spawn(async move { this.run_job(job, task_ctx).await }),
                ));
                continue;
            }

            self.run_job(Arc::clone(job), Arc::clone(&ctx)).await;

            if self.options.fail_fast && ctx.state_of(job.id).is_some_and(|s| s.is_failed()) {
                warn!(job = %job.label, "foreground job failed; fail-fast stops the run");
                stopped_at = Some(index + 1);
                break;
            }
        }

        if let Some(start) = stopped_at {
            let remaining: Vec<JobId> = graph.jobs()[start..].iter().map(|j| j.id).collect();
            ctx.abort_pending(
                &remaining,
                FailureCause::Aborted("an earlier job failed".to_string()),
            );
        }

        for (id, handle) in background {
            if let Err(e) = handle.await {
                warn!(%id, error = %e, "background job task did not complete");
                ctx.finish(id, JobState::Failed(FailureCause::Aborted(e.to_string())));
            }
        }

        let report = RunReport::from_context(&ctx);
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            interrupted = report.interrupted,
            "run finished"
        );
        report
    }

    /// Drive one job from `Pending` to a terminal state.
    ///
    /// Leaves the job `Pending` if the run is interrupted before it starts.
    pub async fn run_job(&self, job: Arc<Job>, ctx: Arc<RunContext>) {
        if self.skip_if_predicated(&job, &ctx) {
            return;
        }

        match ctx.wait_for_dependencies(&job).await {
            DependencyOutcome::Satisfied => {}
            DependencyOutcome::Failed(labels) => {
                self.reporter.not_started(&job, &labels);
                ctx.finish(
                    job.id,
                    JobState::Failed(FailureCause::DependencyFailed(labels)),
                );
                return;
            }
            DependencyOutcome::Interrupted => {
                debug!(job = %job.label, "interrupted while waiting on dependencies");
                return;
            }
        }

        // A dependency may have set a predicate this job checks.
        if self.skip_if_predicated(&job, &ctx) {
            return;
        }

        let started = Instant::now();
        let cause = self.attempt_loop(&job, &ctx).await;

        match cause {
            None => {
                ctx.finish(job.id, JobState::Succeeded);
                self.reporter.done(&job, started.elapsed());
            }
            Some(cause) => {
                self.reporter.failed(&job, &cause, started.elapsed());
                ctx.finish(job.id, JobState::Failed(cause));
            }
        }
    }

    fn skip_if_predicated(&self, job: &Job, ctx: &RunContext) -> bool {
        let Some(reason) = ctx.skip_reason(job) else {
            return false;
        };
        debug!(job = %job.label, %reason, "skipping job");
        self.reporter.skipped(job, &reason);
        ctx.finish(job.id, JobState::Skipped);
        true
    }

    /// Run attempts until one succeeds or retries are exhausted.
    ///
    /// A command that cannot be started counts as a failed attempt. Returns
    /// the failure cause of the last attempt, or `None` on success.
    async fn attempt_loop(&self, job: &Job, ctx: &RunContext) -> Option<FailureCause> {
        self.reporter.running(job);
        let mut attempt = 0;

        loop {
            ctx.start_attempt(job.id, attempt);
            let request = CommandRequest {
                command: job.command.clone(),
                label: job.label.clone(),
                attempt,
            };

            // Dropping the executor future kills the child.
            let result = tokio::select! {
                result = self.executor.execute(request) => result,
                _ = ctx.interrupted() => return Some(FailureCause::Interrupted),
            };

            let cause = match result {
                Ok(output) => {
                    ctx.append_output(job.id, &output.output);
                    if output.success() {
                        return None;
                    }
                    match output.exit_code {
                        Some(code) => FailureCause::ExitCode(code),
                        None => FailureCause::Terminated,
                    }
                }
                Err(e) => {
                    warn!(job = %job.label, attempt, error = %e, "failed to start job");
                    FailureCause::SpawnError(format!("{e:#}"))
                }
            };

            attempt += 1;
            if attempt >= job.max_attempts() {
                debug!(job = %job.label, attempts = attempt, "retries exhausted");
                return Some(cause);
            }

            ctx.set_state(job.id, JobState::Retrying { attempt });
            self.reporter.retrying(job, attempt, job.interval);
            if !wait_or_interrupt(job.interval, ctx).await {
                return Some(FailureCause::Interrupted);
            }
        }
    }
}

/// Sleep for `interval`; `false` if the run was interrupted first.
async fn wait_or_interrupt(interval: Duration, ctx: &RunContext) -> bool {
    if interval.is_zero() {
        return !ctx.is_interrupted();
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        _ = ctx.interrupted() => false,
    }
}
