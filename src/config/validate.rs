// src/config/validate.rs

//! Conversion of the generic YAML document into a typed [`WorkflowFile`].
//!
//! The document shapes are heterogeneous (strings, single-key mappings,
//! nested sequences), so this walks `serde_yaml_ng::Value` by hand and only
//! hands the attribute mappings to `serde`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml_ng::{Mapping, Value};

use crate::config::model::{CommandEntry, Entry, ForeachBlock, JobAttributes, WorkflowFile};
use crate::errors::{Result, SeqrunError};

const FOREACH_KEY: &str = "foreach";

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("static regex is valid")
});

impl TryFrom<Value> for WorkflowFile {
    type Error = SeqrunError;

    fn try_from(doc: Value) -> std::result::Result<Self, Self::Error> {
        let workflow = match doc {
            Value::Sequence(items) => WorkflowFile {
                environment: BTreeMap::new(),
                main: parse_entries(&items, "main")?,
                post: Vec::new(),
            },
            Value::Mapping(map) => parse_sectioned(&map)?,
            Value::Null => {
                return Err(SeqrunError::ConfigError(
                    "workflow file is empty".to_string(),
                ));
            }
            other => {
                return Err(SeqrunError::ConfigError(format!(
                    "workflow must be a sequence of commands or a mapping with `main`, got {}",
                    describe(&other)
                )));
            }
        };

        ensure_has_commands(&workflow)?;
        Ok(workflow)
    }
}

fn ensure_has_commands(workflow: &WorkflowFile) -> Result<()> {
    if workflow.main.is_empty() {
        return Err(SeqrunError::ConfigError(
            "workflow must contain at least one command".to_string(),
        ));
    }
    Ok(())
}

fn parse_sectioned(map: &Mapping) -> Result<WorkflowFile> {
    let mut workflow = WorkflowFile::default();
    let mut saw_main = false;

    for (key, value) in map.iter() {
        let key = scalar_text(key).ok_or_else(|| {
            SeqrunError::ConfigError("workflow section keys must be strings".to_string())
        })?;

        match key.as_str() {
            "main" => {
                workflow.main = parse_section(value, "main")?;
                saw_main = true;
            }
            "post" => workflow.post = parse_section(value, "post")?,
            "environment" => workflow.environment = parse_environment(value)?,
            other => {
                return Err(SeqrunError::ConfigError(format!(
                    "unknown workflow section '{other}' (expected main, post or environment)"
                )));
            }
        }
    }

    if !saw_main {
        return Err(SeqrunError::ConfigError(
            "workflow mapping must contain a `main` sequence".to_string(),
        ));
    }

    Ok(workflow)
}

fn parse_section(value: &Value, section: &str) -> Result<Vec<Entry>> {
    match value {
        Value::Sequence(items) => parse_entries(items, section),
        Value::Null => Ok(Vec::new()),
        other => Err(SeqrunError::ConfigError(format!(
            "`{section}` must be a sequence, got {}",
            describe(other)
        ))),
    }
}

fn parse_environment(value: &Value) -> Result<BTreeMap<String, String>> {
    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => return Ok(BTreeMap::new()),
        other => {
            return Err(SeqrunError::ConfigError(format!(
                "`environment` must be a mapping, got {}",
                describe(other)
            )));
        }
    };

    let mut env = BTreeMap::new();
    for (key, value) in map.iter() {
        let key = scalar_text(key).ok_or_else(|| {
            SeqrunError::ConfigError("environment variable names must be strings".to_string())
        })?;
        let value = scalar_text(value).ok_or_else(|| {
            SeqrunError::ConfigError(format!("environment variable '{key}' must be a scalar"))
        })?;
        env.insert(key, expand_env_refs(&value, |name| std::env::var(name).ok()));
    }
    Ok(env)
}

/// Expand `$VAR` and `${VAR}` using `lookup`; unknown variables are left as
/// written.
pub fn expand_env_refs(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_REF
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn parse_entries(items: &[Value], section: &str) -> Result<Vec<Entry>> {
    items
        .iter()
        .map(|item| parse_entry(item, section))
        .collect()
}

fn parse_entry(item: &Value, section: &str) -> Result<Entry> {
    match item {
        Value::Sequence(nested) => parse_foreach(nested, section).map(Entry::Foreach),
        Value::Mapping(map) => parse_command_mapping(map, section).map(Entry::Command),
        other => match scalar_text(other) {
            Some(command) => Ok(Entry::Command(CommandEntry::new(command))),
            None => Err(SeqrunError::ConfigError(format!(
                "unsupported entry in `{section}`: {}",
                describe(other)
            ))),
        },
    }
}

fn parse_command_mapping(map: &Mapping, section: &str) -> Result<CommandEntry> {
    if map.len() != 1 {
        return Err(SeqrunError::ConfigError(format!(
            "command entries in `{section}` must be single-key mappings (got {} keys)",
            map.len()
        )));
    }

    let (key, value) = map
        .iter()
        .next()
        .ok_or_else(|| SeqrunError::ConfigError("empty command mapping".to_string()))?;

    let command = scalar_text(key).ok_or_else(|| {
        SeqrunError::ConfigError(format!("command in `{section}` must be a string"))
    })?;

    if command == FOREACH_KEY {
        return Err(SeqrunError::ConfigError(
            "`foreach` is only allowed as the first element of a nested sequence".to_string(),
        ));
    }

    let attributes = match value {
        Value::Null => JobAttributes::default(),
        Value::Mapping(_) => serde_yaml_ng::from_value::<JobAttributes>(value.clone())
            .map_err(|e| {
                SeqrunError::ConfigError(format!("invalid attributes for '{command}': {e}"))
            })?,
        other => {
            return Err(SeqrunError::ConfigError(format!(
                "attributes for '{command}' must be a mapping, got {}",
                describe(other)
            )));
        }
    };

    validate_attributes(&command, &attributes)?;

    Ok(CommandEntry {
        command,
        attributes,
    })
}

fn validate_attributes(command: &str, attrs: &JobAttributes) -> Result<()> {
    if !attrs.interval.is_finite() || attrs.interval < 0.0 {
        return Err(SeqrunError::ConfigError(format!(
            "'{command}': interval must be a non-negative number of seconds (got {})",
            attrs.interval
        )));
    }
    if let Some(name) = &attrs.name {
        if name.trim().is_empty() {
            return Err(SeqrunError::ConfigError(format!(
                "'{command}': name must not be empty"
            )));
        }
    }
    Ok(())
}

fn parse_foreach(nested: &[Value], section: &str) -> Result<ForeachBlock> {
    let (head, body) = nested.split_first().ok_or_else(|| {
        SeqrunError::ConfigError(format!("empty nested sequence in `{section}`"))
    })?;

    let directive = match head {
        Value::Mapping(map) if map.len() == 1 => {
            let (key, value) = map
                .iter()
                .next()
                .ok_or_else(|| SeqrunError::ConfigError("empty foreach mapping".to_string()))?;
            if scalar_text(key).as_deref() != Some(FOREACH_KEY) {
                None
            } else {
                Some(scalar_text(value).ok_or_else(|| {
                    SeqrunError::ConfigError("foreach directive must be a string".to_string())
                })?)
            }
        }
        _ => None,
    };

    let directive = directive.ok_or_else(|| {
        SeqrunError::ConfigError(format!(
            "nested sequence in `{section}` must start with a `foreach` directive"
        ))
    })?;

    Ok(ForeachBlock {
        directive,
        body: parse_entries(body, section)?,
    })
}

/// Text of a scalar node; YAML may type `true` or `3` as non-strings, but a
/// command or value written that way is still meant literally.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
