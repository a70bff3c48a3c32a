//! filmbias-ai library
//!
//! Detects and scores gender stereotypes in film synopses and posters,
//! aggregates the scores per film and per release decade, and writes reports
//! with remediation suggestions.
//!
//! Layout:
//! - [`extractors`]: provider traits, Gemini client, offline synopsis parser
//! - [`input`]: film manifests and poster directory scanning
//! - [`scoring`] / [`aggregation`]: taxonomy matching and rollups
//! - [`remediation`]: suggestions for flagged characters
//! - [`workflow`]: the per-film analysis pipeline
//! - [`report`]: Markdown, JSON and SVG output

pub mod aggregation;
pub mod error;
pub mod extractors;
pub mod input;
pub mod remediation;
pub mod report;
pub mod scoring;
pub mod workflow;

pub use error::{AnalysisError, Result};
