// src/dag/mod.rs

//! Job graph representation.
//!
//! - [`job`] holds the immutable, fully resolved [`Job`].
//! - [`graph`] builds and validates the [`JobGraph`] from expanded jobs.

pub mod graph;
pub mod job;

pub use graph::JobGraph;
pub use job::{Job, JobId};
