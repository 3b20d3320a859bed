// src/config/mod.rs

//! Workflow file loading for seqrun.
//!
//! Responsibilities:
//! - Define the typed workflow model (`model.rs`).
//! - Load a YAML file from disk (`loader.rs`).
//! - Check entry shapes and attributes while converting (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_workflow, workflow_from_str};
pub use model::{CommandEntry, Entry, ForeachBlock, JobAttributes, NameList, WorkflowFile};
