#![allow(dead_code)]

use std::sync::Arc;

use seqrun::dag::JobGraph;
use seqrun::engine::{Reporter, RunContext, RunReport, Scheduler, SchedulerOptions};
use seqrun::plan::WorkflowPlan;
use seqrun_test_utils::{ScriptedExecutor, init_tracing, with_timeout};

pub use seqrun_test_utils::{JobBuilder, WorkflowBuilder, foreach};

/// Run one graph on a scripted executor, quietly, with a timeout.
pub async fn run_graph(graph: &JobGraph, executor: &ScriptedExecutor) -> RunReport {
    run_graph_with(graph, executor, SchedulerOptions::default()).await
}

pub async fn run_graph_with(
    graph: &JobGraph,
    executor: &ScriptedExecutor,
    options: SchedulerOptions,
) -> RunReport {
    init_tracing();
    let scheduler =
        Scheduler::new(Arc::new(executor.clone()), Reporter::quiet()).with_options(options);
    let ctx = RunContext::new(graph);
    with_timeout(scheduler.run(graph, ctx)).await
}

/// Run both sections of a plan on a scripted executor.
pub async fn run_plan(plan: &WorkflowPlan, executor: &ScriptedExecutor) -> RunReport {
    init_tracing();
    let scheduler = Scheduler::new(Arc::new(executor.clone()), Reporter::quiet());
    with_timeout(seqrun::run_plan(plan, &scheduler, Reporter::quiet())).await
}

/// Commands of the expanded `main` section, in order.
pub fn commands(graph: &JobGraph) -> Vec<String> {
    graph.jobs().iter().map(|j| j.command.clone()).collect()
}
