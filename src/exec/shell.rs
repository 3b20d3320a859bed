// src/exec/shell.rs

//! Shell-backed command executor.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::backend::{CommandExecutor, CommandOutput, CommandRequest};

/// Runs each command as `<shell> -c <command>`.
///
/// Output lines are echoed live to stdout as `label| line` (stdout) and
/// `label: line` (stderr) unless the executor is quiet, and are captured
/// into [`CommandOutput::output`] either way.
///
/// Children are spawned with `kill_on_drop(true)`: dropping the future
/// returned by [`CommandExecutor::execute`] kills the process.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    echo: bool,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(default_shell())
    }
}

fn default_shell() -> &'static str {
    if cfg!(windows) { "cmd" } else { "sh" }
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            env: BTreeMap::new(),
            current_dir: None,
            echo: true,
        }
    }

    /// Extra environment variables for every command.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Working directory for every command.
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Capture output without echoing it.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        if self.shell == "cmd" {
            cmd.arg("/C").arg(command);
        } else {
            cmd.arg("-c").arg(command);
        }

        cmd.envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn run(&self, request: CommandRequest) -> Result<CommandOutput> {
        info!(
            job = %request.label,
            attempt = request.attempt,
            cmd = %request.command,
            "starting job process"
        );

        let mut child = self
            .build_command(&request.command)
            .spawn()
            .with_context(|| format!("spawning `{}` for job '{}'", self.shell, request.label))?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

        let readers = [
            child.stdout.take().map(|out| {
                spawn_line_reader(out, format!("{}| ", request.label), self.echo, line_tx.clone())
            }),
            child.stderr.take().map(|err| {
                spawn_line_reader(err, format!("{}: ", request.label), self.echo, line_tx.clone())
            }),
        ];
        drop(line_tx);

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of job '{}'", request.label))?;

        for reader in readers.into_iter().flatten() {
            if let Err(e) = reader.await {
                debug!(job = %request.label, error = %e, "output reader task failed");
            }
        }

        let mut output = String::new();
        while let Some(line) = line_rx.recv().await {
            output.push_str(&line);
            output.push('\n');
        }

        let exit_code = status.code();
        info!(
            job = %request.label,
            attempt = request.attempt,
            exit_code,
            success = status.success(),
            "job process exited"
        );

        Ok(CommandOutput { exit_code, output })
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(self.run(request))
    }
}

/// Read `stream` line by line, echoing with `prefix` and forwarding each
/// line for capture.
fn spawn_line_reader<R>(
    stream: R,
    prefix: String,
    echo: bool,
    tx: mpsc::UnboundedSender<String>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if echo {
                println!("{prefix}{line}");
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str) -> CommandRequest {
        CommandRequest {
            command: command.to_string(),
            label: "test".to_string(),
            attempt: 0,
        }
    }

    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let exec = ShellExecutor::new("sh").quiet();

        let out = exec.execute(request("echo Hello; echo oops >&2")).await.expect("runs");
        assert!(out.success());
        assert!(out.output.contains("Hello"));
        assert!(out.output.contains("oops"));

        let out = exec.execute(request("exit 3")).await.expect("runs");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn passes_environment_and_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut env = BTreeMap::new();
        env.insert("SEQRUN_TEST_VALUE".to_string(), "duck".to_string());

        let exec = ShellExecutor::new("sh")
            .with_env(env)
            .with_current_dir(dir.path())
            .quiet();

        let out = exec
            .execute(request("echo $SEQRUN_TEST_VALUE > out.txt && cat out.txt"))
            .await
            .expect("runs");
        assert!(out.output.contains("duck"));
        assert!(dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn missing_shell_is_an_error() {
        let exec = ShellExecutor::new("/definitely/not/a/shell").quiet();
        assert!(exec.execute(request("true")).await.is_err());
    }
}
