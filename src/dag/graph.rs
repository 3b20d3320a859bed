// src/dag/graph.rs

//! Dependency graph builder.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use regex::Regex;
use tracing::debug;

use crate::config::model::names_of;
use crate::dag::job::{Job, JobId};
use crate::errors::{Result, SeqrunError};
use crate::expand::ExpandedJob;

static FIRST_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("static regex is valid"));

/// The ordered job list of one run, with dependencies resolved to ids.
///
/// Built once, before anything executes; every check that can reject the
/// workflow happens here.
#[derive(Debug, Clone)]
pub struct JobGraph {
    jobs: Vec<Arc<Job>>,
}

impl JobGraph {
    /// Build the graph from expanded jobs in declaration order.
    ///
    /// Rejects duplicate names, unknown dependencies, cycles, foreground
    /// jobs waiting on later jobs, and jobs mixing `if` with `unless`.
    pub fn build(expanded: Vec<ExpandedJob>) -> Result<Self> {
        let names = index_names(&expanded)?;
        let mut label_counts: HashMap<String, usize> = HashMap::new();
        let mut jobs = Vec::with_capacity(expanded.len());

        for (index, job) in expanded.into_iter().enumerate() {
            let id = JobId(index);
            let attrs = job.attributes;
            let label = match &attrs.name {
                Some(name) => name.clone(),
                None => derive_label(&job.command, &mut label_counts),
            };

            let mut depends_on = Vec::new();
            for dep in names_of(&attrs.depends_on) {
                let dep_id = *names.get(&dep).ok_or_else(|| {
                    SeqrunError::UnknownDependency(format!(
                        "job '{label}' depends on unknown job '{dep}'"
                    ))
                })?;
                if dep_id == id {
                    return Err(SeqrunError::DependencyCycle(format!(
                        "job '{label}' cannot depend on itself"
                    )));
                }
                if !depends_on.contains(&dep_id) {
                    depends_on.push(dep_id);
                }
            }

            let background = attrs.background || attrs.name.is_some();

            let unless = names_of(&attrs.unless);
            let if_set = names_of(&attrs.if_set);
            if !unless.is_empty() && !if_set.is_empty() {
                return Err(SeqrunError::ConfigError(format!(
                    "job '{label}' cannot mix `if` and `unless` predicates"
                )));
            }

            let interval = Duration::try_from_secs_f64(attrs.interval).map_err(|_| {
                SeqrunError::ConfigError(format!(
                    "job '{label}': invalid retry interval {}",
                    attrs.interval
                ))
            })?;

            debug!(job = %label, %id, background, deps = depends_on.len(), "job resolved");

            jobs.push(Arc::new(Job {
                id,
                command: job.command,
                name: attrs.name,
                label,
                background,
                depends_on,
                set: names_of(&attrs.set),
                unless,
                if_set,
                retries: attrs.retries,
                interval,
            }));
        }

        let graph = dependency_graph(&jobs);
        validate_acyclic(&graph, &jobs)?;
        validate_foreground_waits(&graph, &jobs)?;

        Ok(Self { jobs })
    }

    /// All jobs in declaration order.
    pub fn jobs(&self) -> &[Arc<Job>] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&Arc<Job>> {
        self.jobs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn index_names(expanded: &[ExpandedJob]) -> Result<HashMap<String, JobId>> {
    let mut names = HashMap::new();
    for (index, job) in expanded.iter().enumerate() {
        if let Some(name) = &job.attributes.name {
            if names.insert(name.clone(), JobId(index)).is_some() {
                return Err(SeqrunError::DuplicateName(format!(
                    "name '{name}' is already in use"
                )));
            }
        }
    }
    Ok(names)
}

/// First word of the command, suffixed on repeats: `echo`, `echo_1`, ...
fn derive_label(command: &str, counts: &mut HashMap<String, usize>) -> String {
    let base = FIRST_WORD
        .find(command)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "job".to_string());

    let count = counts.entry(base.clone()).or_insert(0);
    let label = if *count == 0 {
        base
    } else {
        format!("{base}_{count}")
    };
    *count += 1;
    label
}

/// Edge direction: dependent -> dependency.
fn dependency_graph(jobs: &[Arc<Job>]) -> DiGraphMap<usize, ()> {
    let mut graph = DiGraphMap::new();
    for job in jobs {
        graph.add_node(job.id.0);
    }
    for job in jobs {
        for dep in &job.depends_on {
            graph.add_edge(job.id.0, dep.0, ());
        }
    }
    graph
}

fn validate_acyclic(graph: &DiGraphMap<usize, ()>, jobs: &[Arc<Job>]) -> Result<()> {
    match toposort(graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let label = jobs
                .get(cycle.node_id())
                .map(|j| j.label.as_str())
                .unwrap_or_default();
            Err(SeqrunError::DependencyCycle(format!(
                "cycle detected in job dependencies involving job '{label}'"
            )))
        }
    }
}

/// A foreground job holds the walk, so nothing it waits on, directly or
/// through other jobs, may be declared after it.
fn validate_foreground_waits(graph: &DiGraphMap<usize, ()>, jobs: &[Arc<Job>]) -> Result<()> {
    for job in jobs.iter().filter(|j| !j.background) {
        let mut dfs = Dfs::new(graph, job.id.0);
        while let Some(reached) = dfs.next(graph) {
            if reached <= job.id.0 {
                continue;
            }
            let later = jobs
                .get(reached)
                .map(|j| j.label.as_str())
                .unwrap_or_default();
            return Err(SeqrunError::ConfigError(format!(
                "foreground job '{}' waits on '{later}', which is declared after it",
                job.label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{JobAttributes, NameList};

    fn job(command: &str) -> ExpandedJob {
        ExpandedJob {
            command: command.to_string(),
            attributes: JobAttributes::default(),
        }
    }

    fn named(command: &str, name: &str, deps: &str) -> ExpandedJob {
        let mut j = job(command);
        j.attributes.name = Some(name.to_string());
        if !deps.is_empty() {
            j.attributes.depends_on = Some(NameList::Words(deps.to_string()));
        }
        j
    }

    #[test]
    fn named_jobs_are_background_and_labels_are_derived() {
        let graph = JobGraph::build(vec![
            job("echo a"),
            job("echo b"),
            named("make", "build", ""),
            job("./run.sh"),
        ])
        .expect("valid graph");

        let labels: Vec<&str> = graph.jobs().iter().map(|j| j.label.as_str()).collect();
        assert_eq!(labels, vec!["echo", "echo_1", "build", "run"]);
        assert!(!graph.jobs()[0].background);
        assert!(graph.jobs()[2].background);
    }

    #[test]
    fn dependencies_resolve_to_ids() {
        let mut last = job("echo done");
        last.attributes.depends_on =
            Some(NameList::List(vec!["a".to_string(), "b".to_string(), "a".to_string()]));
        let graph = JobGraph::build(vec![
            named("echo a", "a", ""),
            named("echo b", "b", "a"),
            last,
        ])
        .expect("valid graph");

        assert_eq!(graph.jobs()[2].depends_on, vec![JobId(0), JobId(1)]);
        assert_eq!(graph.jobs()[1].depends_on, vec![JobId(0)]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = JobGraph::build(vec![named("echo 1", "x", ""), named("echo 2", "x", "")])
            .unwrap_err();
        assert!(matches!(err, SeqrunError::DuplicateName(_)));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = JobGraph::build(vec![named("echo", "a", "missing")]).unwrap_err();
        assert!(matches!(err, SeqrunError::UnknownDependency(ref m) if m.contains("missing")));
    }

    #[test]
    fn cycles_among_named_jobs_are_rejected() {
        let err = JobGraph::build(vec![named("echo a", "a", "b"), named("echo b", "b", "a")])
            .unwrap_err();
        assert!(matches!(err, SeqrunError::DependencyCycle(_)));

        let err = JobGraph::build(vec![named("echo a", "a", "a")]).unwrap_err();
        assert!(matches!(err, SeqrunError::DependencyCycle(_)));
    }

    #[test]
    fn foreground_job_cannot_wait_on_a_later_job() {
        let mut waiting = job("echo wait");
        waiting.attributes.depends_on = Some(NameList::Words("later".to_string()));
        let err = JobGraph::build(vec![waiting, named("echo later", "later", "")]).unwrap_err();
        assert!(matches!(err, SeqrunError::ConfigError(ref m) if m.contains("declared after")));

        let mut waiting = job("echo wait");
        waiting.attributes.background = true;
        waiting.attributes.depends_on = Some(NameList::Words("later".to_string()));
        assert!(JobGraph::build(vec![waiting, named("echo later", "later", "")]).is_ok());
    }

    #[test]
    fn foreground_job_cannot_wait_on_a_later_job_through_another() {
        let mut check = job("check");
        check.attributes.depends_on = Some(NameList::Words("a".to_string()));
        let err = JobGraph::build(vec![
            named("echo a", "a", "d"),
            check,
            named("echo d", "d", ""),
        ])
        .unwrap_err();
        assert!(
            matches!(err, SeqrunError::ConfigError(ref m) if m.contains("'check' waits on 'd'")),
            "got {err}"
        );

        let mut check = job("check");
        check.attributes.depends_on = Some(NameList::Words("a".to_string()));
        let graph = JobGraph::build(vec![
            named("echo d", "d", ""),
            named("echo a", "a", "d"),
            check,
        ]);
        assert!(graph.is_ok());
    }

    #[test]
    fn mixing_if_and_unless_is_rejected() {
        let mut j = job("echo");
        j.attributes.unless = Some(NameList::Words("a".to_string()));
        j.attributes.if_set = Some(NameList::Words("b".to_string()));
        assert!(JobGraph::build(vec![j]).is_err());
    }
}
