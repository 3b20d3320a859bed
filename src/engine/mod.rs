// src/engine/mod.rs

//! Execution engine for one workflow section.
//!
//! This module ties together:
//! - the per-run shared state ([`context::RunContext`]): job states and the
//!   predicate store behind one watch channel
//! - the [`executor::Scheduler`], which walks the job graph in declaration
//!   order, blocking on foreground jobs and spawning background ones
//! - user-visible markers and the final [`report::RunReport`]
//!
//! Job failures are data ([`JobState::Failed`]), never errors.

use std::fmt;
use std::sync::Arc;

use crate::dag::Job;

pub mod context;
pub mod executor;
pub mod report;

pub use context::{DependencyOutcome, RunContext};
pub use executor::{Scheduler, SchedulerOptions};
pub use report::{JobReport, Reporter, RunReport};

/// Lifecycle of a job within one run.
///
/// `Pending -> Skipped | Running -> Succeeded | Failed`, with
/// `Running <-> Retrying` while retries remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    /// Waiting out the retry interval before attempt `attempt` (1-based retry count).
    Retrying { attempt: u32 },
    Skipped,
    Succeeded,
    Failed(FailureCause),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Skipped | JobState::Succeeded | JobState::Failed(_)
        )
    }

    /// Terminal and usable by dependents.
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Skipped | JobState::Succeeded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobState::Failed(_))
    }

    /// Short marker used in reports.
    pub fn marker(&self) -> &'static str {
        match self {
            JobState::Pending => "NOT RUN",
            JobState::Running => "Running",
            JobState::Retrying { .. } => "Retrying",
            JobState::Skipped => "Skipped",
            JobState::Succeeded => "Done",
            JobState::Failed(_) => "FAILED",
        }
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Last attempt exited non-zero.
    ExitCode(i32),
    /// Last attempt ended without an exit code (killed by a signal).
    Terminated,
    /// The command could not be started.
    SpawnError(String),
    /// Never started because these dependencies failed.
    DependencyFailed(Vec<String>),
    /// Stopped by an interrupt signal while running.
    Interrupted,
    /// Not started or lost for a reason outside the job itself.
    Aborted(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ExitCode(code) => write!(f, "exit code {code}"),
            FailureCause::Terminated => write!(f, "terminated by signal"),
            FailureCause::SpawnError(msg) => write!(f, "could not start: {msg}"),
            FailureCause::DependencyFailed(labels) => {
                write!(f, "dependencies failed: {}", quoted_list(labels))
            }
            FailureCause::Interrupted => write!(f, "interrupted"),
            FailureCause::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// `'a', 'b'`
pub(crate) fn quoted_list(labels: &[String]) -> String {
    labels
        .iter()
        .map(|l| format!("'{l}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything known about one job's execution so far.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub job: Arc<Job>,
    pub state: JobState,
    /// Attempts started, including the first.
    pub attempts: u32,
    /// Captured output of all attempts.
    pub output: String,
}

impl ExecutionRecord {
    pub fn new(job: Arc<Job>) -> Self {
        Self {
            job,
            state: JobState::Pending,
            attempts: 0,
            output: String::new(),
        }
    }
}
