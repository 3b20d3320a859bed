// src/config/loader.rs

use std::fs;
use std::path::Path;

use serde_yaml_ng::Value;

use crate::config::model::WorkflowFile;
use crate::errors::Result;

/// Load a workflow file from a given path and return the generic YAML tree.
///
/// This only performs YAML deserialization; it does **not** check the
/// workflow shape. Use [`load_workflow`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_document(&contents)
}

/// Parse workflow YAML from a string.
pub fn parse_document(contents: &str) -> Result<Value> {
    let doc: Value = serde_yaml_ng::from_str(contents)?;
    Ok(doc)
}

/// Load a workflow file from path and convert it into a [`WorkflowFile`].
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads YAML.
/// - Checks the entry shapes (commands, attribute mappings, foreach blocks).
/// - Rejects unknown attribute keys and sections.
///
/// Series expansion and dependency validation happen later, in
/// [`crate::plan`].
pub fn load_workflow(path: impl AsRef<Path>) -> Result<WorkflowFile> {
    let doc = load_from_path(&path)?;
    WorkflowFile::try_from(doc)
}

/// Same as [`load_workflow`] but from an in-memory string.
pub fn workflow_from_str(contents: &str) -> Result<WorkflowFile> {
    WorkflowFile::try_from(parse_document(contents)?)
}
