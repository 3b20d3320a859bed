// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the [`CommandExecutor`] trait the scheduler runs
//!   commands through, which tests replace with a fake implementation.
//! - [`shell`] is the production implementation, spawning each command with
//!   `tokio::process::Command` under a configurable shell.

pub mod backend;
pub mod shell;

pub use backend::{CommandExecutor, CommandOutput, CommandRequest};
pub use shell::ShellExecutor;
