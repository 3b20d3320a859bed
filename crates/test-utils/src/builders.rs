#![allow(dead_code)]

use seqrun::config::{CommandEntry, Entry, ForeachBlock, JobAttributes, NameList, WorkflowFile};
use seqrun::dag::JobGraph;
use seqrun::plan::{WorkflowPlan, plan_entries};

/// Builder for `WorkflowFile` to simplify test setup.
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    workflow: WorkflowFile,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain command in `main`.
    pub fn command(self, command: &str) -> Self {
        self.job(JobBuilder::new(command))
    }

    pub fn job(mut self, job: JobBuilder) -> Self {
        self.workflow.main.push(job.build());
        self
    }

    pub fn foreach(mut self, directive: &str, body: Vec<Entry>) -> Self {
        self.workflow.main.push(foreach(directive, body));
        self
    }

    pub fn post(mut self, job: JobBuilder) -> Self {
        self.workflow.post.push(job.build());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.workflow
            .environment
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> WorkflowFile {
        self.workflow
    }

    /// Build and plan, panicking on invalid workflows.
    pub fn plan(self) -> WorkflowPlan {
        WorkflowPlan::from_workflow(&self.workflow).expect("Failed to plan workflow from builder")
    }

    /// Graph of the `main` section, panicking on invalid workflows.
    pub fn graph(self) -> JobGraph {
        plan_entries(&self.workflow.main).expect("Failed to build job graph from builder")
    }
}

/// A `{foreach: directive}` block.
pub fn foreach(directive: &str, body: Vec<Entry>) -> Entry {
    Entry::Foreach(ForeachBlock {
        directive: directive.to_string(),
        body,
    })
}

/// Builder for a command entry and its attributes.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    command: String,
    attributes: JobAttributes,
}

impl JobBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            attributes: JobAttributes::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.attributes.name = Some(name.to_string());
        self
    }

    pub fn background(mut self) -> Self {
        self.attributes.background = true;
        self
    }

    /// Whitespace-separated names.
    pub fn depends_on(mut self, names: &str) -> Self {
        self.attributes.depends_on = Some(NameList::Words(names.to_string()));
        self
    }

    pub fn set(mut self, names: &str) -> Self {
        self.attributes.set = Some(NameList::Words(names.to_string()));
        self
    }

    pub fn unless(mut self, names: &str) -> Self {
        self.attributes.unless = Some(NameList::Words(names.to_string()));
        self
    }

    pub fn if_set(mut self, names: &str) -> Self {
        self.attributes.if_set = Some(NameList::Words(names.to_string()));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.attributes.retries = retries;
        self
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.attributes.interval = seconds;
        self
    }

    pub fn build(self) -> Entry {
        Entry::Command(CommandEntry {
            command: self.command,
            attributes: self.attributes,
        })
    }
}
