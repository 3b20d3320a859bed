// src/logging.rs

//! Diagnostics go to stderr through `tracing`; stdout belongs to job output,
//! markers and the summary.
//!
//! The filter comes from `--log-level` if given, otherwise from the
//! `SEQRUN_LOG` directives (`debug`, `seqrun::engine=trace,warn`, ...),
//! otherwise `warn`.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "SEQRUN_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    fmt()
        .with_env_filter(env_filter(cli_level, env_value.as_deref()))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("cannot install log subscriber: {e}"))
}

/// Build the filter. Unparsable `env_value` directives fall back to the
/// default rather than failing the run.
pub fn env_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive(level));
    }
    env_value
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn cli_level_wins_over_environment() {
        let filter = env_filter(Some(LogLevel::Debug), Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn environment_directives_are_used() {
        let filter = env_filter(None, Some("seqrun::engine=trace,info"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn default_is_warn() {
        assert_eq!(env_filter(None, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(env_filter(None, Some("  ")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(
            env_filter(None, Some("seqrun=loud")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
    }
}
