// src/exec/backend.rs

//! Pluggable command execution.
//!
//! The scheduler talks to a [`CommandExecutor`] instead of spawning processes
//! itself. Production code uses [`ShellExecutor`](super::ShellExecutor);
//! tests provide implementations that don't spawn real processes.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

/// One attempt at running a job's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    /// Output prefix for the job.
    pub label: String,
    /// Zero-based attempt number.
    pub attempt: u32,
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process ended without an exit code (killed by a signal).
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr lines, in arrival order.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait abstracting how a command is run.
///
/// The returned future must be cancel-safe in the sense that dropping it
/// stops the underlying work (the shell executor kills the child process).
/// An `Err` means the command could not be run at all; a non-zero exit is
/// reported through [`CommandOutput::exit_code`].
pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        request: CommandRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + '_>>;
}
