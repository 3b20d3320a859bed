// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// A parsed workflow file.
///
/// The file is either a bare sequence of entries:
///
/// ```yaml
/// - echo Hello
/// - "make test":
///     retries: 2
///     interval: 1
/// ```
///
/// or a mapping with `main`, optional `post` and optional `environment`:
///
/// ```yaml
/// environment:
///   TARGET: $HOME/build
/// main:
///   - make
/// post:
///   - rm -rf tmp
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowFile {
    /// Extra environment for every command, already `$VAR`-expanded.
    pub environment: BTreeMap<String, String>,

    /// Entries run first.
    pub main: Vec<Entry>,

    /// Entries run after `main`, whatever its outcome.
    pub post: Vec<Entry>,
}

/// One element of a workflow sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Command(CommandEntry),
    Foreach(ForeachBlock),
}

/// A command with its attributes.
///
/// Written either as a plain string (`- echo hi`) or as a single-key mapping
/// from the command text to its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub command: String,
    pub attributes: JobAttributes,
}

/// A nested sequence whose first element is `{foreach: "<directive>"}`.
///
/// The directive is kept verbatim; it is parsed (and rejected when
/// malformed) by the sequence flattener.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeachBlock {
    pub directive: String,
    pub body: Vec<Entry>,
}

/// Attributes accepted on a command mapping.
///
/// Unknown keys are rejected so that typos such as `backgroud: true` fail at
/// load time instead of silently running in the foreground.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobAttributes {
    /// Run without blocking the main sequence.
    #[serde(default)]
    pub background: bool,

    /// Unique id (placeholders allowed); implies `background`.
    #[serde(default)]
    pub name: Option<String>,

    /// Names this job waits on.
    #[serde(default)]
    pub depends_on: Option<NameList>,

    /// Predicates set to true when this job succeeds.
    #[serde(default)]
    pub set: Option<NameList>,

    /// Skip the job if any of these predicates holds.
    #[serde(default)]
    pub unless: Option<NameList>,

    /// Skip the job unless one of these predicates holds.
    #[serde(default, rename = "if")]
    pub if_set: Option<NameList>,

    /// Extra attempts after a failure.
    #[serde(default)]
    pub retries: u32,

    /// Seconds to wait before each retry.
    #[serde(default)]
    pub interval: f64,
}

/// A field that accepts either a whitespace-separated string or a list.
///
/// ```yaml
/// depends_on: build lint
/// depends_on: [build, lint]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    Words(String),
    List(Vec<String>),
}

impl NameList {
    /// Canonical list of names.
    pub fn names(&self) -> Vec<String> {
        match self {
            NameList::Words(words) => words.split_whitespace().map(str::to_string).collect(),
            NameList::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Raw strings, before whitespace splitting.
    pub fn raw(&self) -> Vec<&str> {
        match self {
            NameList::Words(words) => vec![words.as_str()],
            NameList::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// Normalise an optional [`NameList`] into a list of names.
pub fn names_of(list: &Option<NameList>) -> Vec<String> {
    list.as_ref().map(NameList::names).unwrap_or_default()
}

impl CommandEntry {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            attributes: JobAttributes::default(),
        }
    }
}
