use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seqrun::errors::{Result, SeqrunError};
use tracing::debug;
use seqrun::exec::{CommandExecutor, CommandOutput, CommandRequest};

#[derive(Debug, Clone)]
enum Script {
    /// Exit codes for successive attempts; the last one repeats.
    Exits(Vec<i32>),
    /// The command cannot be started.
    SpawnError,
    /// Runs until dropped.
    Hang,
}

/// A fake executor that:
/// - records which commands were "run", in start order
/// - answers with scripted exit codes (default 0) after an optional delay
///
/// No process is ever spawned.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    executed: Arc<Mutex<Vec<CommandRequest>>>,
    finished: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt of `command` exits with `code`.
    pub fn exit_with(self, command: &str, code: i32) -> Self {
        self.exits(command, &[code])
    }

    /// Successive attempts of `command` exit with `codes`; the last repeats.
    pub fn exits(self, command: &str, codes: &[i32]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), Script::Exits(codes.to_vec()));
        self
    }

    pub fn spawn_error(self, command: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), Script::SpawnError);
        self
    }

    /// `command` never finishes on its own.
    pub fn hang(self, command: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), Script::Hang);
        self
    }

    pub fn delay(self, command: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(command.to_string(), delay);
        self
    }

    /// Commands in the order they were started, one entry per attempt.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.executed.lock().unwrap().clone()
    }

    /// Commands in the order they completed.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn attempts_of(&self, command: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.command == command)
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(request.clone());

            let script = self.scripts.lock().unwrap().get(&request.command).cloned();
            let delay = self.delays.lock().unwrap().get(&request.command).copied();
            debug!(
                command = %request.command,
                attempt = request.attempt,
                ?script,
                "scripted execution"
            );

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let exit_code = match script {
                None => 0,
                Some(Script::Exits(codes)) => {
                    let idx = (request.attempt as usize).min(codes.len().saturating_sub(1));
                    codes.get(idx).copied().unwrap_or(0)
                }
                Some(Script::SpawnError) => {
                    return Err(SeqrunError::Other(anyhow::anyhow!(
                        "no such command: {}",
                        request.command
                    )));
                }
                Some(Script::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
            };

            self.finished.lock().unwrap().push(request.command.clone());
            Ok(CommandOutput {
                exit_code: Some(exit_code),
                output: format!("ran {}\n", request.command),
            })
        })
    }
}
