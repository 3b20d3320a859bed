// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `seqrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "seqrun",
    version,
    about = "Run the shell commands described in a YAML workflow file.",
    long_about = None
)]
pub struct CliArgs {
    /// Workflow file (YAML).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Shell used to interpret each command (invoked as `<shell> -c <cmd>`).
    #[arg(long, value_name = "PATH", default_value = "sh")]
    pub shell: String,

    /// Stop starting new jobs once a foreground job has failed.
    ///
    /// Jobs that are already running are still awaited.
    #[arg(long)]
    pub fail_fast: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SEQRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, expand and validate, print the jobs, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_and_flags() {
        let args = CliArgs::try_parse_from(["seqrun", "--fail-fast", "--shell", "bash", "ci.yml"])
            .expect("valid args");
        assert_eq!(args.file, PathBuf::from("ci.yml"));
        assert_eq!(args.shell, "bash");
        assert!(args.fail_fast);
        assert!(!args.dry_run);
    }

    #[test]
    fn requires_a_workflow_file() {
        assert!(CliArgs::try_parse_from(["seqrun"]).is_err());
    }
}
