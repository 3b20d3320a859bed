// src/engine/context.rs

//! Shared per-run state.
//!
//! The job state table and the predicate store live behind a single
//! [`tokio::sync::watch`] channel. Writers use `send_modify`, so a job's
//! transition to `Succeeded` and the predicates it sets become visible in
//! the same step. Waiters subscribe and use `wait_for`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::dag::{Job, JobGraph, JobId};
use crate::engine::{ExecutionRecord, FailureCause, JobState};

/// Snapshot of a run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub records: Vec<ExecutionRecord>,
    /// Predicate store. Missing names are false.
    pub predicates: HashMap<String, bool>,
    pub interrupted: bool,
}

impl RunState {
    pub fn predicate(&self, name: &str) -> bool {
        self.predicates.get(name).copied().unwrap_or(false)
    }

    fn record_mut(&mut self, id: JobId) -> Option<&mut ExecutionRecord> {
        self.records.get_mut(id.0)
    }
}

/// How waiting on a job's dependencies ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    /// Every dependency succeeded or was skipped.
    Satisfied,
    /// Labels of the dependencies that failed.
    Failed(Vec<String>),
    /// The run was interrupted first.
    Interrupted,
}

/// Shared state of one section run (`main` or `post`).
#[derive(Debug)]
pub struct RunContext {
    state: watch::Sender<RunState>,
}

impl RunContext {
    pub fn new(graph: &JobGraph) -> Arc<Self> {
        Self::with_predicates(graph, HashMap::new())
    }

    /// Start a run whose predicate store is seeded, e.g. by a previous section.
    pub fn with_predicates(graph: &JobGraph, predicates: HashMap<String, bool>) -> Arc<Self> {
        let records = graph
            .jobs()
            .iter()
            .cloned()
            .map(ExecutionRecord::new)
            .collect();

        Arc::new(Self {
            state: watch::Sender::new(RunState {
                records,
                predicates,
                interrupted: false,
            }),
        })
    }

    pub fn state_of(&self, id: JobId) -> Option<JobState> {
        self.state.borrow().records.get(id.0).map(|r| r.state.clone())
    }

    pub fn predicate(&self, name: &str) -> bool {
        self.state.borrow().predicate(name)
    }

    pub fn predicates(&self) -> HashMap<String, bool> {
        self.state.borrow().predicates.clone()
    }

    /// Why `job` should be skipped right now, if it should.
    ///
    /// `unless`: skip when any listed predicate holds.
    /// `if`: skip unless some listed predicate holds.
    pub fn skip_reason(&self, job: &Job) -> Option<String> {
        let state = self.state.borrow();

        if let Some(p) = job.unless.iter().find(|p| state.predicate(p)) {
            return Some(format!("'{p}' is set"));
        }
        if !job.if_set.is_empty() && !job.if_set.iter().any(|p| state.predicate(p)) {
            return Some(format!(
                "none of {} is set",
                crate::engine::quoted_list(&job.if_set)
            ));
        }
        None
    }

    pub fn set_state(&self, id: JobId, new_state: JobState) {
        self.state.send_modify(|s| match s.record_mut(id) {
            Some(record) => record.state = new_state,
            None => warn!(%id, "state change for unknown job"),
        });
    }

    /// Mark the start of attempt `attempt` (zero-based).
    pub fn start_attempt(&self, id: JobId, attempt: u32) {
        self.state.send_modify(|s| {
            if let Some(record) = s.record_mut(id) {
                record.state = JobState::Running;
                record.attempts = attempt + 1;
            }
        });
    }

    pub fn append_output(&self, id: JobId, output: &str) {
        if output.is_empty() {
            return;
        }
        self.state.send_modify(|s| {
            if let Some(record) = s.record_mut(id) {
                record.output.push_str(output);
            }
        });
    }

    /// Move a job to a terminal state.
    ///
    /// On success every predicate in the job's `set` list becomes true in
    /// the same update.
    pub fn finish(&self, id: JobId, terminal: JobState) {
        debug_assert!(terminal.is_terminal());
        self.state.send_modify(|s| {
            let Some(record) = s.record_mut(id) else {
                warn!(%id, "finish for unknown job");
                return;
            };
            let to_set = if terminal == JobState::Succeeded {
                record.job.set.clone()
            } else {
                Vec::new()
            };
            debug!(job = %record.job.label, state = ?terminal, "job finished");
            record.state = terminal;

            for name in to_set {
                debug!(predicate = %name, "predicate set");
                s.predicates.insert(name, true);
            }
        });
    }

    /// Wait until every dependency of `job` is terminal, any of them has
    /// failed, or the run is interrupted.
    pub async fn wait_for_dependencies(&self, job: &Job) -> DependencyOutcome {
        if job.depends_on.is_empty() {
            return if self.is_interrupted() {
                DependencyOutcome::Interrupted
            } else {
                DependencyOutcome::Satisfied
            };
        }

        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|s| {
                s.interrupted
                    || job.depends_on.iter().all(|d| dep_state(s, *d).is_terminal())
                    || job.depends_on.iter().any(|d| dep_state(s, *d).is_failed())
            })
            .await;

        let Ok(state) = settled else {
            return DependencyOutcome::Interrupted;
        };
        if state.interrupted {
            return DependencyOutcome::Interrupted;
        }

        let failed: Vec<String> = job
            .depends_on
            .iter()
            .filter_map(|d| state.records.get(d.0))
            .filter(|r| r.state.is_failed())
            .map(|r| r.job.label.clone())
            .collect();

        if failed.is_empty() {
            DependencyOutcome::Satisfied
        } else {
            DependencyOutcome::Failed(failed)
        }
    }

    /// Raise the cancellation flag. Idempotent.
    pub fn interrupt(&self) {
        self.state.send_if_modified(|s| {
            let changed = !s.interrupted;
            s.interrupted = true;
            changed
        });
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.borrow().interrupted
    }

    /// Resolves once the run is interrupted.
    pub async fn interrupted(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on interrupt.
        let _ = rx.wait_for(|s| s.interrupted).await;
    }

    /// Mark every job that is still pending as failed with `cause`.
    pub fn abort_pending(&self, ids: &[JobId], cause: FailureCause) {
        self.state.send_modify(|s| {
            for id in ids {
                if let Some(record) = s.record_mut(*id) {
                    if record.state == JobState::Pending {
                        record.state = JobState::Failed(cause.clone());
                    }
                }
            }
        });
    }

    /// Snapshot of all execution records.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.state.borrow().records.clone()
    }
}

fn dep_state(state: &RunState, id: JobId) -> &JobState {
    state
        .records
        .get(id.0)
        .map(|r| &r.state)
        .unwrap_or(&JobState::Pending)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::model::{JobAttributes, NameList};
    use crate::expand::ExpandedJob;

    fn graph() -> JobGraph {
        let mut a = JobAttributes::default();
        a.name = Some("a".into());
        a.set = Some(NameList::Words("built".into()));
        let mut b = JobAttributes::default();
        b.depends_on = Some(NameList::Words("a".into()));
        b.unless = Some(NameList::Words("built".into()));

        JobGraph::build(vec![
            ExpandedJob {
                command: "make".into(),
                attributes: a,
            },
            ExpandedJob {
                command: "echo b".into(),
                attributes: b,
            },
        ])
        .expect("valid graph")
    }

    #[test]
    fn success_sets_predicates_in_the_same_update() {
        let graph = graph();
        let ctx = RunContext::new(&graph);
        let mut rx = ctx.state.subscribe();

        assert!(ctx.skip_reason(&graph.jobs()[1]).is_none());
        ctx.finish(JobId(0), JobState::Succeeded);

        let snapshot = rx.borrow_and_update();
        assert_eq!(snapshot.records[0].state, JobState::Succeeded);
        assert!(snapshot.predicate("built"));
        drop(snapshot);

        assert!(ctx.skip_reason(&graph.jobs()[1]).is_some());
    }

    #[test]
    fn failure_does_not_set_predicates() {
        let graph = graph();
        let ctx = RunContext::new(&graph);
        ctx.finish(JobId(0), JobState::Failed(FailureCause::ExitCode(1)));
        assert!(!ctx.predicate("built"));
    }

    #[tokio::test]
    async fn waiting_resolves_when_dependency_settles() {
        let graph = graph();
        let ctx = RunContext::new(&graph);
        let job = graph.jobs()[1].clone();

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.wait_for_dependencies(&job).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.finish(JobId(0), JobState::Failed(FailureCause::ExitCode(2)));

        let outcome = waiter.await.expect("join");
        assert_eq!(outcome, DependencyOutcome::Failed(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn interrupt_wakes_waiters() {
        let graph = graph();
        let ctx = RunContext::new(&graph);
        let job = graph.jobs()[1].clone();

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.wait_for_dependencies(&job).await })
        };

        ctx.interrupt();
        ctx.interrupt();
        assert_eq!(waiter.await.expect("join"), DependencyOutcome::Interrupted);
        assert!(ctx.is_interrupted());
        ctx.interrupted().await;
    }

    #[test]
    fn seeded_predicates_are_visible() {
        let graph = graph();
        let mut seed = HashMap::new();
        seed.insert("built".to_string(), true);
        let ctx = RunContext::with_predicates(&graph, seed);
        assert!(ctx.skip_reason(&graph.jobs()[1]).is_some());
    }
}
