// src/engine/report.rs

//! User-visible markers and the per-run report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::{strip_ansi_codes, style};

use crate::dag::Job;
use crate::engine::{ExecutionRecord, FailureCause, JobState, RunContext, quoted_list};

#[derive(Debug, Clone, Default)]
enum Sink {
    #[default]
    Terminal,
    Quiet,
    /// Plain-text lines kept in memory; shared by every clone.
    Capture(Arc<Mutex<Vec<String>>>),
}

/// Prints job lifecycle markers to stdout.
///
/// Every line is prefixed with the job's label: `label| Running: cmd`.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    sink: Sink,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter that prints nothing.
    pub fn quiet() -> Self {
        Self { sink: Sink::Quiet }
    }

    /// A reporter that records its lines instead of printing them.
    /// Read them back with [`Reporter::lines`].
    pub fn capturing() -> Self {
        Self {
            sink: Sink::Capture(Arc::default()),
        }
    }

    /// Lines recorded so far, without styling. Empty unless capturing.
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Capture(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn emit(&self, line: String) {
        self.write(line, false);
    }

    fn write(&self, line: String, to_stderr: bool) {
        match &self.sink {
            Sink::Terminal if to_stderr => eprintln!("{line}"),
            Sink::Terminal => println!("{line}"),
            Sink::Quiet => {}
            Sink::Capture(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(strip_ansi_codes(&line).into_owned());
                }
            }
        }
    }

    fn command_lines(&self, job: &Job, message: &str) {
        let prefix = format!("{}| ", job.label);
        let lines: Vec<&str> = job.command.lines().collect();
        if lines.len() > 1 {
            self.emit(format!("{prefix}{message}:"));
            for line in lines {
                self.emit(format!("{prefix}{line}"));
            }
            self.emit(format!("{prefix}---"));
        } else {
            self.emit(format!("{prefix}{message}: {}", job.command));
        }
    }

    pub fn running(&self, job: &Job) {
        self.command_lines(job, "Running");
    }

    /// `attempt` is the 1-based retry about to happen.
    pub fn retrying(&self, job: &Job, attempt: u32, interval: Duration) {
        self.emit(format!(
            "{}| {} after {}s",
            job.label,
            style(format!("Retrying ({attempt})")).yellow(),
            interval.as_secs_f64()
        ));
    }

    pub fn done(&self, job: &Job, elapsed: Duration) {
        self.emit(format!(
            "{}| {} ({:.1}s)",
            job.label,
            style("Done").green(),
            elapsed.as_secs_f64()
        ));
    }

    pub fn failed(&self, job: &Job, cause: &FailureCause, elapsed: Duration) {
        self.emit(format!(
            "{}| {} ({cause}) ({:.1}s)",
            job.label,
            style("FAILED").red().bold(),
            elapsed.as_secs_f64()
        ));
    }

    pub fn skipped(&self, job: &Job, reason: &str) {
        let first_line = job.command.lines().next().unwrap_or_default();
        self.emit(format!(
            "{}| {}: {first_line} ({reason})",
            job.label,
            style("Skipped").dim()
        ));
    }

    pub fn not_started(&self, job: &Job, failed_dependencies: &[String]) {
        self.emit(format!(
            "{}| {} The following dependencies failed: {}",
            job.label,
            style("NOT STARTED:").red().bold(),
            quoted_list(failed_dependencies)
        ));
    }

    pub fn section(&self, name: &str) {
        self.emit(format!("Running '{name}' commands"));
    }

    pub fn summary(&self, report: &RunReport) {
        if report.interrupted {
            self.write(style("KEYBOARD INTERRUPT").red().to_string(), true);
        }
        match report.first_failure() {
            Some(job) => self.emit(
                style(format!("FAILED: Failed while running '{}'", job.command))
                    .red()
                    .to_string(),
            ),
            None if report.success() => self.emit(
                style(format!("PASSED: {} jobs", report.jobs.len()))
                    .green()
                    .to_string(),
            ),
            None => self.emit(style("FAILED: run did not complete").red().to_string()),
        }
    }
}

/// Final state of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub label: String,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    pub output: String,
}

impl From<ExecutionRecord> for JobReport {
    fn from(record: ExecutionRecord) -> Self {
        Self {
            label: record.job.label.clone(),
            command: record.job.command.clone(),
            state: record.state,
            attempts: record.attempts,
            output: record.output,
        }
    }
}

/// Outcome of one or more sections, jobs in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub jobs: Vec<JobReport>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            jobs: ctx.records().into_iter().map(JobReport::from).collect(),
            interrupted: ctx.is_interrupted(),
        }
    }

    /// Every job succeeded or was skipped, and nothing was interrupted.
    pub fn success(&self) -> bool {
        !self.interrupted && self.jobs.iter().all(|j| j.state.is_success())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.state == JobState::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.state.is_failed())
    }

    /// First failed job in declaration order.
    pub fn first_failure(&self) -> Option<&JobReport> {
        self.failed().next()
    }

    /// First job with this label.
    pub fn job(&self, label: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.label == label)
    }

    /// Append a later section's results.
    pub fn merge(&mut self, other: RunReport) {
        self.jobs.extend(other.jobs);
        self.interrupted |= other.interrupted;
    }

    /// Process exit code: 0 success, 130 interrupted, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.success() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(label: &str, state: JobState) -> JobReport {
        JobReport {
            label: label.to_string(),
            command: format!("run {label}"),
            state,
            attempts: 1,
            output: String::new(),
        }
    }

    #[test]
    fn exit_codes_follow_outcome() {
        let mut report = RunReport {
            jobs: vec![job("a", JobState::Succeeded), job("b", JobState::Skipped)],
            interrupted: false,
        };
        assert_eq!(report.exit_code(), 0);

        report.merge(RunReport {
            jobs: vec![job("c", JobState::Failed(FailureCause::ExitCode(1)))],
            interrupted: false,
        });
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.first_failure().map(|j| j.label.as_str()), Some("c"));
        assert_eq!(report.succeeded().count(), 1);

        report.interrupted = true;
        assert_eq!(report.exit_code(), 130);
    }

    fn sample_job(command: &str) -> Job {
        Job {
            id: crate::dag::JobId(0),
            command: command.to_string(),
            name: None,
            label: "make".to_string(),
            background: false,
            depends_on: Vec::new(),
            set: Vec::new(),
            unless: Vec::new(),
            if_set: Vec::new(),
            retries: 0,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn markers_carry_the_label_prefix() {
        let reporter = Reporter::capturing();
        let job = sample_job("make all");

        reporter.running(&job);
        reporter.retrying(&job, 1, Duration::from_millis(500));
        reporter.failed(&job, &FailureCause::ExitCode(2), Duration::ZERO);
        reporter.skipped(&job, "unless 'built'");
        reporter.not_started(&job, &["setup".to_string(), "fetch".to_string()]);

        assert_eq!(
            reporter.lines(),
            vec![
                "make| Running: make all",
                "make| Retrying (1) after 0.5s",
                "make| FAILED (exit code 2) (0.0s)",
                "make| Skipped: make all (unless 'built')",
                "make| NOT STARTED: The following dependencies failed: 'setup', 'fetch'",
            ]
        );
    }

    #[test]
    fn multi_line_commands_are_framed() {
        let reporter = Reporter::capturing();
        reporter.running(&sample_job("cd src\nmake"));

        assert_eq!(
            reporter.lines(),
            vec!["make| Running:", "make| cd src", "make| make", "make| ---"]
        );
    }

    #[test]
    fn summary_names_the_first_failure() {
        let reporter = Reporter::capturing();
        reporter.summary(&RunReport {
            jobs: vec![
                job("a", JobState::Succeeded),
                job("b", JobState::Failed(FailureCause::ExitCode(1))),
            ],
            interrupted: false,
        });
        reporter.summary(&RunReport {
            jobs: vec![job("a", JobState::Succeeded), job("b", JobState::Skipped)],
            interrupted: true,
        });
        reporter.summary(&RunReport {
            jobs: vec![job("a", JobState::Succeeded), job("b", JobState::Skipped)],
            interrupted: false,
        });

        assert_eq!(
            reporter.lines(),
            vec![
                "FAILED: Failed while running 'run b'",
                "KEYBOARD INTERRUPT",
                "FAILED: run did not complete",
                "PASSED: 2 jobs",
            ]
        );
    }

    #[test]
    fn quiet_reporter_records_nothing() {
        let reporter = Reporter::quiet();
        reporter.running(&sample_job("make"));
        assert!(reporter.lines().is_empty());
    }

    #[test]
    fn pending_jobs_are_not_success() {
        let report = RunReport {
            jobs: vec![job("a", JobState::Pending)],
            interrupted: false,
        };
        assert!(!report.success());
        assert!(report.first_failure().is_none());
        assert_eq!(report.exit_code(), 1);
    }
}
