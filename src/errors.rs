// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Series error: {0}")]
    SeriesError(String),

    #[error("Duplicate job name: {0}")]
    DuplicateName(String),

    #[error("Unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("Cycle detected in job dependencies: {0}")]
    DependencyCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SeqrunError {
    /// Whether this error belongs to the configuration class, i.e. it was
    /// raised while loading, expanding or validating the workflow and before
    /// any command ran.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SeqrunError::ConfigError(_)
                | SeqrunError::SeriesError(_)
                | SeqrunError::DuplicateName(_)
                | SeqrunError::UnknownDependency(_)
                | SeqrunError::DependencyCycle(_)
                | SeqrunError::YamlError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SeqrunError>;
