// src/expand/mod.rs

//! Declaration expansion.
//!
//! - [`flatten`] resolves nested `foreach` blocks into job templates.
//! - [`placeholder`] holds the `{{ ... }}` series grammar.
//! - [`series`] replicates each template into concrete jobs.

pub mod flatten;
pub mod placeholder;
pub mod series;

pub use flatten::{flatten, Binding, JobTemplate};
pub use placeholder::{SeriesKey, SeriesSpec};
pub use series::{expand_all, expand_template, ExpandedJob};
