// src/expand/flatten.rs

//! Sequence flattener: resolves nested `foreach` blocks into an ordered list
//! of job templates.

use tracing::debug;

use crate::config::model::{Entry, JobAttributes};
use crate::errors::Result;
use crate::expand::placeholder::{SeriesKey, SeriesSpec};

/// A series value fixed by an enclosing foreach block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub key: SeriesKey,
    /// Position of `value` in the foreach list.
    pub index: usize,
    pub value: String,
    /// Length of the foreach list.
    pub len: usize,
}

/// A command entry plus the bindings of every enclosing foreach block
/// (outermost first).
#[derive(Debug, Clone, PartialEq)]
pub struct JobTemplate {
    pub command: String,
    pub attributes: JobAttributes,
    pub bindings: Vec<Binding>,
}

impl JobTemplate {
    /// The innermost binding for `key`, if any.
    pub fn binding_for(&self, key: &SeriesKey) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| &b.key == key)
    }
}

/// Flatten `entries` in row-major order.
///
/// For each value of a foreach block the whole body is emitted before the
/// next value. The walk uses an explicit stack, so nesting depth is bounded
/// only by memory.
pub fn flatten(entries: &[Entry]) -> Result<Vec<JobTemplate>> {
    let mut templates = Vec::new();
    let mut stack: Vec<(&[Entry], Vec<Binding>)> = vec![(entries, Vec::new())];

    while let Some((remaining, bindings)) = stack.pop() {
        let Some((first, rest)) = remaining.split_first() else {
            continue;
        };

        match first {
            Entry::Command(cmd) => {
                templates.push(JobTemplate {
                    command: cmd.command.clone(),
                    attributes: cmd.attributes.clone(),
                    bindings: bindings.clone(),
                });
                stack.push((rest, bindings));
            }
            Entry::Foreach(block) => {
                let spec = SeriesSpec::parse_directive(&block.directive)?;
                let key = spec.key();
                let len = spec.values.len();
                debug!(series = %key, len, "expanding foreach block");

                stack.push((rest, bindings.clone()));

                // Pushed in reverse so the first value is popped first.
                for (index, value) in spec.values.iter().enumerate().rev() {
                    let mut inner = bindings.clone();
                    inner.push(Binding {
                        key: key.clone(),
                        index,
                        value: value.clone(),
                        len,
                    });
                    stack.push((block.body.as_slice(), inner));
                }
            }
        }
    }

    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{CommandEntry, ForeachBlock};

    fn cmd(text: &str) -> Entry {
        Entry::Command(CommandEntry::new(text))
    }

    fn foreach(directive: &str, body: Vec<Entry>) -> Entry {
        Entry::Foreach(ForeachBlock {
            directive: directive.to_string(),
            body,
        })
    }

    fn commands_with_values(templates: &[JobTemplate]) -> Vec<(String, Vec<String>)> {
        templates
            .iter()
            .map(|t| {
                (
                    t.command.clone(),
                    t.bindings.iter().map(|b| b.value.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn leaves_without_foreach_pass_through() {
        let templates = flatten(&[cmd("echo a"), cmd("echo b")]).expect("flattens");
        assert_eq!(
            commands_with_values(&templates),
            vec![
                ("echo a".to_string(), vec![]),
                ("echo b".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn nested_foreach_is_row_major() {
        let entries = vec![
            cmd("first"),
            foreach(
                "outer:1,2",
                vec![
                    cmd("o{{outer}}"),
                    foreach("inner:a,b", vec![cmd("i{{outer}}{{inner}}")]),
                ],
            ),
            cmd("last"),
        ];

        let templates = flatten(&entries).expect("flattens");
        let got: Vec<(String, Vec<String>)> = commands_with_values(&templates);
        let expected: Vec<(String, Vec<String>)> = vec![
            ("first", vec![]),
            ("o{{outer}}", vec!["1"]),
            ("i{{outer}}{{inner}}", vec!["1", "a"]),
            ("i{{outer}}{{inner}}", vec!["1", "b"]),
            ("o{{outer}}", vec!["2"]),
            ("i{{outer}}{{inner}}", vec!["2", "a"]),
            ("i{{outer}}{{inner}}", vec!["2", "b"]),
            ("last", vec![]),
        ]
        .into_iter()
        .map(|(c, v)| (c.to_string(), v.into_iter().map(str::to_string).collect()))
        .collect();
        assert_eq!(got, expected);

        let inner = &templates[2];
        assert_eq!(
            inner.binding_for(&SeriesKey::Labeled("inner".to_string())),
            Some(&Binding {
                key: SeriesKey::Labeled("inner".to_string()),
                index: 0,
                value: "a".to_string(),
                len: 2,
            })
        );
    }

    #[test]
    fn malformed_directive_is_a_config_error() {
        let err = flatten(&[foreach("s:", vec![cmd("echo")])]).unwrap_err();
        assert!(err.is_config_error());

        let err = flatten(&[foreach("  ", vec![cmd("echo")])]).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut entry = cmd("leaf");
        for _ in 0..500 {
            entry = foreach("x", vec![entry]);
        }
        let templates = flatten(&[entry]).expect("flattens");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].bindings.len(), 500);
    }
}
