//! Film analysis workflow
//!
//! Per film: extraction (synopsis parser, poster analyzer) → scoring →
//! aggregation → remediation. Films are independent and run concurrently;
//! decade rollups are computed once all films are done.
//!
//! # Error Handling
//! - Per-source error isolation: one failed poster does not fail its film
//! - A film fails only when every provider call it needed was unavailable
//! - Failed films are collected in [`RunOutcome::failures`], never abort the run

pub mod pipeline;

pub use pipeline::{AnalysisPipeline, PipelineConfig, Providers};

use crate::aggregation::AggregateScore;
use crate::remediation::RemediationSuggestion;
use crate::scoring::ScoredCharacter;
use filmbias_common::{Film, MentionSource};
use serde::Serialize;

/// Everything produced for one successfully analyzed film
#[derive(Debug, Clone, Serialize)]
pub struct FilmAnalysis {
    pub film: Film,
    pub characters: Vec<ScoredCharacter>,
    pub aggregate: AggregateScore,
    pub remediation: Vec<RemediationSuggestion>,
    /// Sources that were skipped and why
    pub warnings: Vec<String>,
}

/// A film that could not be analyzed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmFailure {
    pub film_id: String,
    pub title: String,
    pub reason: String,
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Analyzed films, sorted by film id
    pub films: Vec<FilmAnalysis>,
    /// Decade rollups, sorted by decade
    pub decades: Vec<AggregateScore>,
    /// Failed films, sorted by film id
    pub failures: Vec<FilmFailure>,
}

/// Progress events emitted while a run is in flight
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Film analysis started
    FilmStarted {
        film_id: String,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// A synopsis or poster was processed
    SourceCompleted {
        film_id: String,
        source: MentionSource,
        provider: String,
        characters: usize,
    },

    /// A synopsis or poster was skipped
    SourceFailed {
        film_id: String,
        source: MentionSource,
        provider: String,
        message: String,
    },

    /// Film analysis finished
    FilmCompleted {
        film_id: String,
        characters: usize,
        total_severity: f64,
        timestamp: i64,
    },

    /// Film skipped: providers unavailable
    FilmFailed { film_id: String, reason: String },

    /// All films processed
    RunCompleted {
        films_analyzed: usize,
        films_failed: usize,
    },
}
