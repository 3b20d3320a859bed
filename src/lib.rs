// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod expand;
pub mod logging;
pub mod plan;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_workflow;
use crate::config::model::WorkflowFile;
use crate::dag::JobGraph;
use crate::engine::{Reporter, RunContext, RunReport, Scheduler, SchedulerOptions};
use crate::errors::Result;
use crate::exec::{CommandExecutor, ShellExecutor};
use crate::plan::WorkflowPlan;

/// Options for [`run_workflow`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Shell every command runs under.
    pub shell: String,
    pub fail_fast: bool,
    /// Working directory for commands; the current one if `None`.
    pub current_dir: Option<PathBuf>,
    /// Suppress markers and live output.
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            fail_fast: false,
            current_dir: None,
            quiet: false,
        }
    }
}

/// Run a loaded workflow with the shell executor.
///
/// `main` runs first; `post` runs afterwards whatever the outcome of `main`,
/// including after an interrupt. Predicates set in `main` are visible in
/// `post`.
pub async fn run_workflow(workflow: &WorkflowFile, options: &RunOptions) -> Result<RunReport> {
    let reporter = if options.quiet {
        Reporter::quiet()
    } else {
        Reporter::new()
    };
    run_workflow_with_reporter(workflow, options, reporter).await
}

/// [`run_workflow`] with markers and the summary sent to `reporter`.
pub async fn run_workflow_with_reporter(
    workflow: &WorkflowFile,
    options: &RunOptions,
    reporter: Reporter,
) -> Result<RunReport> {
    let plan = WorkflowPlan::from_workflow(workflow)?;

    let mut executor = ShellExecutor::new(&options.shell).with_env(plan.environment.clone());
    if let Some(dir) = &options.current_dir {
        executor = executor.with_current_dir(dir.clone());
    }
    if options.quiet {
        executor = executor.quiet();
    }

    let scheduler =
        Scheduler::new(Arc::new(executor), reporter.clone()).with_options(SchedulerOptions {
            fail_fast: options.fail_fast,
        });

    Ok(run_plan(&plan, &scheduler, reporter).await)
}

/// Run both sections of `plan` on `scheduler`, with Ctrl-C and SIGTERM
/// handling.
pub async fn run_plan<E: CommandExecutor + 'static>(
    plan: &WorkflowPlan,
    scheduler: &Scheduler<E>,
    reporter: Reporter,
) -> RunReport {
    let main_ctx = RunContext::new(&plan.main);
    let mut report = run_section(&plan.main, scheduler, Arc::clone(&main_ctx)).await;

    if !plan.post.is_empty() {
        reporter.section("post");
        let post_ctx = RunContext::with_predicates(&plan.post, main_ctx.predicates());
        report.merge(run_section(&plan.post, scheduler, post_ctx).await);
    }

    reporter.summary(&report);
    report
}

async fn run_section<E: CommandExecutor + 'static>(
    graph: &JobGraph,
    scheduler: &Scheduler<E>,
    ctx: Arc<RunContext>,
) -> RunReport {
    // A signal raises the context's cancellation flag; the scheduler then
    // stops starting jobs, kills running ones and drains.
    let signal_ctx = Arc::clone(&ctx);
    let signal_task = tokio::spawn(async move {
        match interrupt_signal().await {
            Ok(signal) => {
                info!(signal, "interrupting run");
                signal_ctx.interrupt();
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt signals"),
        }
    });

    let report = scheduler.run(graph, ctx).await;
    signal_task.abort();
    report
}

/// Resolves with the name of the first interrupt signal received.
#[cfg(unix)]
async fn interrupt_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn interrupt_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let workflow = load_workflow(&args.file)?;
    info!(file = %args.file.display(), "workflow loaded");

    if args.dry_run {
        let plan = WorkflowPlan::from_workflow(&workflow)?;
        print_dry_run(&plan);
        return Ok(0);
    }

    let options = RunOptions {
        shell: args.shell,
        fail_fast: args.fail_fast,
        ..RunOptions::default()
    };
    let report = run_workflow(&workflow, &options).await?;
    Ok(report.exit_code())
}

/// Print the expanded jobs of both sections without running anything.
fn print_dry_run(plan: &WorkflowPlan) {
    println!("seqrun dry-run");
    if !plan.environment.is_empty() {
        println!("environment:");
        for (key, value) in &plan.environment {
            println!("  {key}={value}");
        }
    }

    for (section, graph) in [("main", &plan.main), ("post", &plan.post)] {
        if graph.is_empty() {
            continue;
        }
        println!("{section} ({} jobs):", graph.len());
        for job in graph.jobs() {
            let mode = if job.background { "background" } else { "foreground" };
            println!("  - {} [{mode}]", job.label);
            println!("      command: {}", job.command);
            if !job.depends_on.is_empty() {
                let deps: Vec<&str> = job
                    .depends_on
                    .iter()
                    .filter_map(|d| graph.get(*d))
                    .map(|d| d.label.as_str())
                    .collect();
                println!("      depends_on: {}", deps.join(" "));
            }
            if !job.set.is_empty() {
                println!("      set: {}", job.set.join(" "));
            }
            if !job.unless.is_empty() {
                println!("      unless: {}", job.unless.join(" "));
            }
            if !job.if_set.is_empty() {
                println!("      if: {}", job.if_set.join(" "));
            }
            if job.retries > 0 {
                println!(
                    "      retries: {} (interval {}s)",
                    job.retries,
                    job.interval.as_secs_f64()
                );
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
