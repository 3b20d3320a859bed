use seqrun::config::workflow_from_str;
use seqrun::engine::{FailureCause, JobState, Reporter, RunReport};
use seqrun::{RunOptions, run_workflow_with_reporter};
use seqrun_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

async fn run_in(dir: &TempDir, yaml: &str) -> RunReport {
    run_reported(dir, yaml).await.0
}

/// Run with a capturing reporter; returns the report and the marker lines.
async fn run_reported(dir: &TempDir, yaml: &str) -> (RunReport, Vec<String>) {
    init_tracing();
    let workflow = workflow_from_str(yaml).expect("valid workflow");
    let options = RunOptions {
        current_dir: Some(dir.path().to_path_buf()),
        quiet: true,
        ..RunOptions::default()
    };
    let reporter = Reporter::capturing();
    let report = with_timeout(run_workflow_with_reporter(&workflow, &options, reporter.clone()))
        .await
        .expect("workflow runs");
    (report, reporter.lines())
}

fn has_line_starting(lines: &[String], prefix: &str) -> bool {
    lines.iter().any(|l| l.starts_with(prefix))
}

#[tokio::test]
async fn test_echo_output_is_captured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (report, lines) = run_reported(&dir, "- echo Hello").await;

    assert_eq!(report.exit_code(), 0);
    assert!(report.jobs[0].output.contains("Hello"));
    assert_eq!(lines[0], "echo| Running: echo Hello");
    assert!(has_line_starting(&lines, "echo| Done ("), "{lines:?}");
    assert_eq!(lines.last().map(String::as_str), Some("PASSED: 1 jobs"));
}

#[tokio::test]
async fn test_exit_1_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (report, lines) = run_reported(&dir, "- exit 1").await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.jobs[0].state,
        JobState::Failed(FailureCause::ExitCode(1))
    );
    assert!(has_line_starting(&lines, "exit| FAILED (exit code 1)"), "{lines:?}");
    assert_eq!(
        lines.last().map(String::as_str),
        Some("FAILED: Failed while running 'exit 1'")
    );
}

#[tokio::test]
async fn test_run_awaits_background_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = r#"
- "while [ ! -f ready ]; do sleep 0.05; done; echo background finished":
    background: true
- touch ready
"#;
    let (report, lines) = run_reported(&dir, yaml).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.jobs[0].state, JobState::Succeeded);
    assert!(report.jobs[0].output.contains("background finished"));
    assert!(has_line_starting(&lines, "while| Done ("), "{lines:?}");
    assert!(has_line_starting(&lines, "touch| Done ("), "{lines:?}");
    assert_eq!(lines.last().map(String::as_str), Some("PASSED: 2 jobs"));
}

#[tokio::test]
async fn test_skipped_and_not_started_markers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = r#"
- "true":
    set: ready
- "echo again":
    unless: ready
- "exit 2":
    name: setup
- "echo never":
    depends_on: setup
"#;
    let (report, lines) = run_reported(&dir, yaml).await;

    assert_eq!(report.exit_code(), 1);
    assert!(
        lines.contains(&"echo| Skipped: echo again ('ready' is set)".to_string()),
        "{lines:?}"
    );
    assert!(
        lines.contains(
            &"echo_1| NOT STARTED: The following dependencies failed: 'setup'".to_string()
        ),
        "{lines:?}"
    );
}

#[tokio::test]
async fn test_series_jobs_touch_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = run_in(&dir, "- touch file_{{A,B}}").await;

    assert_eq!(report.exit_code(), 0);
    assert!(dir.path().join("file_A").exists());
    assert!(dir.path().join("file_B").exists());
}

#[tokio::test]
async fn test_retries_with_a_counter_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = r#"
- "echo x >> attempts; [ $(wc -l < attempts) -ge 3 ]":
    retries: 3
"#;
    let report = run_in(&dir, yaml).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.jobs[0].attempts, 3);
}

#[tokio::test]
async fn test_environment_and_post_section() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = r#"
environment:
  GREETING: hi there
main:
  - echo $GREETING > greeting.txt
  - exit 3
post:
  - cat greeting.txt
"#;
    let report = run_in(&dir, yaml).await;

    assert_eq!(report.exit_code(), 1);
    let post = report.job("cat").expect("post job reported");
    assert_eq!(post.state, JobState::Succeeded);
    assert!(post.output.contains("hi there"));
}

#[tokio::test]
async fn test_failed_named_job_blocks_dependents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = r#"
- "exit 4":
    name: setup
- "touch should_not_exist":
    depends_on: setup
"#;
    let report = run_in(&dir, yaml).await;

    assert_eq!(report.exit_code(), 1);
    assert!(!dir.path().join("should_not_exist").exists());
    assert!(matches!(
        report.jobs[1].state,
        JobState::Failed(FailureCause::DependencyFailed(_))
    ));
}
