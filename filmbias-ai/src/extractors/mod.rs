//! Extraction providers
//!
//! Turns a poster image or a synopsis into structured [`CharacterMention`]s,
//! and an excerpt flagged for bias into rewrite suggestions. Every provider
//! sits behind a trait so the pipeline can run with any combination of them
//! (or none) and tests can substitute in-process fakes.
//!
//! # Providers
//! 1. **gemini_client** - Gemini vision/text model (posters, synopses, remediation)
//! 2. **heuristic_parser** - offline rule-based synopsis parser
//! 3. **response_parser** - lenient parsing of loosely structured model output
//!
//! # Error Isolation
//! A provider error only affects the poster or synopsis being processed.
//! The pipeline decides what a failure means for the film as a whole using
//! [`ExtractionError::is_provider_unavailable`].

pub mod gemini_client;
pub mod heuristic_parser;
pub mod response_parser;

pub use gemini_client::GeminiClient;
pub use heuristic_parser::HeuristicSynopsisParser;

use crate::remediation::RemediationRequest;
use filmbias_common::CharacterMention;
use std::path::Path;
use thiserror::Error;

/// Provider error
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O error (poster file unreadable)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Provider answered, but the answer could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider not configured or refused service
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// True when the provider could not be reached or refused to answer
    ///
    /// Parse and I/O errors are local to one input and do not count.
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(
            self,
            ExtractionError::Network(_)
                | ExtractionError::Api { .. }
                | ExtractionError::NotAvailable(_)
        )
    }
}

/// `AnalyzeImage`: poster image to per-character attributes
#[async_trait::async_trait]
pub trait PosterAnalyzer: Send + Sync {
    /// Provider name for logs and reports
    fn name(&self) -> &'static str;

    /// Extract one mention per person visible on the poster
    ///
    /// An empty vector means no people were detected.
    async fn analyze_poster(
        &self,
        film_id: &str,
        poster: &Path,
    ) -> Result<Vec<CharacterMention>, ExtractionError>;
}

/// `ParseText`: synopsis text to per-character attributes
#[async_trait::async_trait]
pub trait SynopsisParser: Send + Sync {
    /// Provider name for logs and reports
    fn name(&self) -> &'static str;

    async fn parse_synopsis(
        &self,
        film_id: &str,
        synopsis: &str,
    ) -> Result<Vec<CharacterMention>, ExtractionError>;
}

/// `GenerateRemediation`: biased excerpt to free-text suggestions
#[async_trait::async_trait]
pub trait RemediationGenerator: Send + Sync {
    /// Provider name for logs and reports
    fn name(&self) -> &'static str;

    async fn suggest(&self, request: &RemediationRequest) -> Result<String, ExtractionError>;
}
