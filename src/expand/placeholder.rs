// src/expand/placeholder.rs

//! Placeholder grammar for series.
//!
//! ```text
//! {{A,B}}        anonymous series
//! {{s:A,B}}      labeled series `s` (also `{{s=A,B}}`)
//! {{s}}          reference to `s`, or the constant "s" when no such label exists
//! ```
//!
//! Foreach directives (`s:1,2`, `s=1,2`, `1,2`) share the list grammar.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, SeqrunError};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("static regex is valid"));

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z0-9_]*)\s*[:=](.*)$").expect("static regex is valid")
});

static BARE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("static regex is valid")
});

/// Identity of a series group.
///
/// Labeled occurrences group by label; anonymous ones only when their value
/// lists are textually identical (the key is the normalised list).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    Labeled(String),
    Anonymous(String),
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Labeled(label) => write!(f, "series '{label}'"),
            SeriesKey::Anonymous(values) => write!(f, "series '{{{{{values}}}}}'"),
        }
    }
}

/// An optionally labeled, non-empty list of substitution values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSpec {
    pub label: Option<String>,
    pub values: Vec<String>,
}

impl SeriesSpec {
    /// Parse a foreach directive: `label:v1,v2`, `label=v1,v2` or `v1,v2`.
    pub fn parse_directive(directive: &str) -> Result<Self> {
        if let Some(caps) = LABELED.captures(directive) {
            let label = caps[1].to_string();
            let values = split_values(&caps[2]).map_err(|e| {
                SeqrunError::ConfigError(format!("foreach '{directive}': {e}"))
            })?;
            return Ok(Self {
                label: Some(label),
                values,
            });
        }

        let values = split_values(directive)
            .map_err(|e| SeqrunError::ConfigError(format!("foreach '{directive}': {e}")))?;
        Ok(Self {
            label: None,
            values,
        })
    }

    pub fn key(&self) -> SeriesKey {
        match &self.label {
            Some(label) => SeriesKey::Labeled(label.clone()),
            None => SeriesKey::Anonymous(self.values.join(",")),
        }
    }
}

/// One `{{ ... }}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Anonymous(Vec<String>),
    Labeled { label: String, values: Vec<String> },
    Reference(String),
}

/// Literal text or a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A text split into literal runs and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateText {
    pub segments: Vec<Segment>,
}

impl TemplateText {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(text[last..whole.start()].to_string()));
            }
            let placeholder = parse_placeholder(&caps[1]).map_err(|e| {
                SeqrunError::SeriesError(format!("'{text}': placeholder '{}': {e}", whole.as_str()))
            })?;
            segments.push(Segment::Placeholder(placeholder));
            last = whole.end();
        }

        if last < text.len() {
            segments.push(Segment::Literal(text[last..].to_string()));
        }

        Ok(Self { segments })
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }
}

fn parse_placeholder(body: &str) -> std::result::Result<Placeholder, String> {
    if let Some(caps) = BARE_LABEL.captures(body) {
        return Ok(Placeholder::Reference(caps[1].to_string()));
    }
    if let Some(caps) = LABELED.captures(body) {
        return Ok(Placeholder::Labeled {
            label: caps[1].to_string(),
            values: split_values(&caps[2])?,
        });
    }
    split_values(body).map(Placeholder::Anonymous)
}

fn split_values(list: &str) -> std::result::Result<Vec<String>, String> {
    if list.trim().is_empty() {
        return Err("value list is empty".to_string());
    }
    let values: Vec<String> = list.split(',').map(|v| v.trim().to_string()).collect();
    if values.iter().any(String::is_empty) {
        return Err(format!("value list '{}' contains an empty value", list.trim()));
    }
    Ok(values)
}
