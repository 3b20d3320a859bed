// src/expand/series.rs

//! Series expander: turns one [`JobTemplate`] into its concrete replicas.
//!
//! Placeholder occurrences are grouped by identity (label, or identical
//! anonymous list). Distinct groups combine by cartesian product; every
//! occurrence of one group selects the same index in a given replica, which
//! is what makes `{{s:A,B}} ... {{s:1,2}}` zip instead of cross.
//!
//! Product order: groups are ranked by first occurrence, scanning the command,
//! then the name, then the `depends_on`, `set`, `unless` and `if` entries; the
//! first group varies slowest.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::config::model::{JobAttributes, NameList};
use crate::errors::{Result, SeqrunError};
use crate::expand::flatten::JobTemplate;
use crate::expand::placeholder::{Placeholder, Segment, SeriesKey, TemplateText};

/// A concrete job produced by expansion, before graph building.
///
/// `name` and every name-list attribute carry substituted text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedJob {
    pub command: String,
    pub attributes: JobAttributes,
}

#[derive(Debug)]
struct Group {
    key: SeriesKey,
    /// Values used by occurrences that carry no list of their own.
    values: Option<Vec<String>>,
    /// Index and value fixed by an enclosing foreach.
    fixed: Option<(usize, String, usize)>,
}

impl Group {
    fn len(&self) -> usize {
        match (&self.fixed, &self.values) {
            (Some(_), _) => 1,
            (None, Some(values)) => values.len(),
            (None, None) => 0,
        }
    }
}

#[derive(Debug)]
struct Occurrence {
    group: usize,
    own: Option<Vec<String>>,
}

/// Expand every template in order.
pub fn expand_all(templates: &[JobTemplate]) -> Result<Vec<ExpandedJob>> {
    let mut jobs = Vec::new();
    for template in templates {
        jobs.extend(expand_template(template)?);
    }
    Ok(jobs)
}

/// Expand one template into its replicas.
///
/// This is a pure function of the template and its bindings.
pub fn expand_template(template: &JobTemplate) -> Result<Vec<ExpandedJob>> {
    let attrs = &template.attributes;
    let command = TemplateText::parse(&template.command)?;
    let name = attrs.name.as_deref().map(TemplateText::parse).transpose()?;
    let lists = [
        parse_list(&attrs.depends_on)?,
        parse_list(&attrs.set)?,
        parse_list(&attrs.unless)?,
        parse_list(&attrs.if_set)?,
    ];

    let mut texts: Vec<&TemplateText> = vec![&command];
    texts.extend(name.iter());
    texts.extend(lists.iter().flatten().flatten());

    let (groups, occurrences) = collect_groups(template, &texts)?;

    let radices: Vec<usize> = groups.iter().map(Group::len).collect();
    let total: usize = radices.iter().product();
    trace!(command = %template.command, groups = groups.len(), total, "expanding series");

    let mut jobs = Vec::with_capacity(total);
    let mut choice = vec![0usize; groups.len()];

    for _ in 0..total {
        let mut cursor = 0;
        let mut render =
            |text: &TemplateText| render_text(text, &groups, &occurrences, &choice, &mut cursor);

        let rendered_command = render(&command);
        let rendered_name = name.as_ref().map(&mut render);
        let [depends_on, set, unless, if_set] = lists.each_ref().map(|list| {
            list.as_ref()
                .map(|texts| texts.iter().map(&mut render).collect::<Vec<String>>())
        });

        let mut attributes = attrs.clone();
        attributes.name = rendered_name;
        attributes.depends_on = rebuild_list(&attrs.depends_on, depends_on);
        attributes.set = rebuild_list(&attrs.set, set);
        attributes.unless = rebuild_list(&attrs.unless, unless);
        attributes.if_set = rebuild_list(&attrs.if_set, if_set);

        jobs.push(ExpandedJob {
            command: rendered_command,
            attributes,
        });

        advance(&mut choice, &radices);
    }

    Ok(jobs)
}

fn parse_list(list: &Option<NameList>) -> Result<Option<Vec<TemplateText>>> {
    list.as_ref()
        .map(|list| list.raw().into_iter().map(TemplateText::parse).collect())
        .transpose()
}

/// Put rendered entries back in the shape they were written in.
fn rebuild_list(original: &Option<NameList>, rendered: Option<Vec<String>>) -> Option<NameList> {
    match (original, rendered) {
        (Some(NameList::Words(_)), Some(words)) => Some(NameList::Words(words.concat())),
        (Some(NameList::List(_)), Some(items)) => Some(NameList::List(items)),
        _ => None,
    }
}

fn collect_groups(
    template: &JobTemplate,
    texts: &[&TemplateText],
) -> Result<(Vec<Group>, Vec<Occurrence>)> {
    let defined: HashSet<&str> = texts
        .iter()
        .flat_map(|t| t.placeholders())
        .filter_map(|p| match p {
            Placeholder::Labeled { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .collect();

    let mut groups: Vec<Group> = Vec::new();
    let mut by_key: HashMap<SeriesKey, usize> = HashMap::new();
    let mut occurrences = Vec::new();

    for placeholder in texts.iter().flat_map(|t| t.placeholders()) {
        let (key, own) = match placeholder {
            Placeholder::Anonymous(values) => {
                (SeriesKey::Anonymous(values.join(",")), Some(values.clone()))
            }
            Placeholder::Labeled { label, values } => {
                (SeriesKey::Labeled(label.clone()), Some(values.clone()))
            }
            Placeholder::Reference(label) => {
                let key = SeriesKey::Labeled(label.clone());
                if defined.contains(label.as_str()) || template.binding_for(&key).is_some() {
                    (key, None)
                } else {
                    // Not a known label: a single-value constant.
                    (SeriesKey::Anonymous(label.clone()), Some(vec![label.clone()]))
                }
            }
        };

        let group = *by_key.entry(key.clone()).or_insert_with(|| {
            groups.push(Group {
                fixed: template
                    .binding_for(&key)
                    .map(|b| (b.index, b.value.clone(), b.len)),
                key,
                values: None,
            });
            groups.len() - 1
        });

        if let Some(values) = &own {
            check_length(template, &groups[group], values)?;
            if groups[group].values.is_none() {
                groups[group].values = Some(values.clone());
            }
        }

        occurrences.push(Occurrence { group, own });
    }

    if let Some(undefined) = groups.iter().find(|g| g.fixed.is_none() && g.values.is_none()) {
        return Err(SeqrunError::SeriesError(format!(
            "'{}': {} is referenced but never defined",
            template.command, undefined.key
        )));
    }

    Ok((groups, occurrences))
}

fn check_length(template: &JobTemplate, group: &Group, values: &[String]) -> Result<()> {
    let expected = match (&group.fixed, &group.values) {
        (Some((_, _, len)), _) => Some(*len),
        (None, Some(existing)) => Some(existing.len()),
        (None, None) => None,
    };

    match expected {
        Some(len) if len != values.len() => Err(SeqrunError::SeriesError(format!(
            "'{}': {} maps lists of different lengths ({} and {})",
            template.command,
            group.key,
            len,
            values.len()
        ))),
        _ => Ok(()),
    }
}

fn render_text(
    text: &TemplateText,
    groups: &[Group],
    occurrences: &[Occurrence],
    choice: &[usize],
    cursor: &mut usize,
) -> String {
    let mut out = String::new();
    for segment in &text.segments {
        match segment {
            Segment::Literal(literal) => out.push_str(literal),
            Segment::Placeholder(_) => {
                let occurrence = &occurrences[*cursor];
                *cursor += 1;
                out.push_str(&occurrence_value(occurrence, groups, choice));
            }
        }
    }
    out
}

fn occurrence_value(occurrence: &Occurrence, groups: &[Group], choice: &[usize]) -> String {
    let group = &groups[occurrence.group];
    let index = match &group.fixed {
        Some((index, _, _)) => *index,
        None => choice[occurrence.group],
    };

    match (&occurrence.own, &group.fixed, &group.values) {
        (Some(own), _, _) => own[index].clone(),
        (None, Some((_, value, _)), _) => value.clone(),
        (None, None, Some(values)) => values[index].clone(),
        (None, None, None) => String::new(),
    }
}

/// Row-major odometer: the last group varies fastest.
fn advance(choice: &mut [usize], radices: &[usize]) {
    for position in (0..choice.len()).rev() {
        choice[position] += 1;
        if choice[position] < radices[position] {
            return;
        }
        choice[position] = 0;
    }
}
