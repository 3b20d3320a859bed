// src/dag/job.rs

//! Concrete, immutable jobs.

use std::fmt;
use std::time::Duration;

/// Position of a job in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A job after expansion and dependency resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub command: String,
    /// Unique name, if declared.
    pub name: Option<String>,
    /// Prefix used in output: the name, or a label derived from the command.
    pub label: String,
    /// Explicitly backgrounded, or named.
    pub background: bool,
    /// Resolved dependencies, in declaration order.
    pub depends_on: Vec<JobId>,
    pub set: Vec<String>,
    pub unless: Vec<String>,
    pub if_set: Vec<String>,
    pub retries: u32,
    pub interval: Duration,
}

impl Job {
    /// Total number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}
