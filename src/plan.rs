// src/plan.rs

//! From workflow entries to validated job graphs.
//!
//! Runs the three build stages in order: foreach flattening, series
//! expansion, dependency graph building. Any error here aborts the run
//! before a single command is started.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::model::{Entry, WorkflowFile};
use crate::dag::JobGraph;
use crate::errors::Result;
use crate::expand::{expand_all, flatten};

/// Everything needed to execute a workflow file.
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    pub environment: BTreeMap<String, String>,
    pub main: JobGraph,
    pub post: JobGraph,
}

impl WorkflowPlan {
    /// Build and validate both sections.
    ///
    /// `main` and `post` are separate graphs: names are unique within a
    /// section and dependencies cannot cross sections.
    pub fn from_workflow(workflow: &WorkflowFile) -> Result<Self> {
        let main = plan_entries(&workflow.main)?;
        let post = plan_entries(&workflow.post)?;
        debug!(main = main.len(), post = post.len(), "workflow planned");

        Ok(Self {
            environment: workflow.environment.clone(),
            main,
            post,
        })
    }
}

/// Flatten, expand and resolve one section's entries.
pub fn plan_entries(entries: &[Entry]) -> Result<JobGraph> {
    let templates = flatten(entries)?;
    let expanded = expand_all(&templates)?;
    JobGraph::build(expanded)
}
