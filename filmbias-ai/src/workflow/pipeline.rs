//! Pipeline Orchestrator
//!
//! Runs the per-film workflow for every selected film and collects the
//! results into a [`RunOutcome`].
//!
//! # Architecture
//! - **Phase 1**: Extraction (synopsis parser + poster analyzer, posters concurrently)
//! - **Phase 2**: Scoring (taxonomy lookup per character attribute)
//! - **Phase 3**: Aggregation (per film, then per decade once all films finish)
//! - **Phase 4**: Remediation (per flagged character)
//!
//! # Concurrency
//! Up to `max_concurrent_films` films are in flight at once. The taxonomy is
//! shared read-only behind an `Arc`; providers are shared trait objects and
//! do their own rate limiting. Results are sorted by film id before
//! aggregation, and aggregation itself is order-independent, so completion
//! order never affects the outcome.

use super::{AnalysisEvent, FilmAnalysis, FilmFailure, RunOutcome};
use crate::aggregation::{aggregate_decades, aggregate_film, FilmAggregateInput};
use crate::extractors::{ExtractionError, PosterAnalyzer, RemediationGenerator, SynopsisParser};
use crate::remediation::Remediator;
use crate::scoring::CharacterScorer;
use filmbias_common::{CharacterMention, Film, MentionSource, Taxonomy};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of films analyzed concurrently (at least 1)
    pub max_concurrent_films: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_films: 4,
        }
    }
}

/// Extraction and remediation providers; any of them may be absent
#[derive(Clone, Default)]
pub struct Providers {
    pub poster: Option<Arc<dyn PosterAnalyzer>>,
    pub synopsis: Option<Arc<dyn SynopsisParser>>,
    pub remediation: Option<Arc<dyn RemediationGenerator>>,
}

/// Outcome of one extraction input (a synopsis or a poster)
enum SourceResult {
    Extracted(Vec<CharacterMention>),
    /// Input could not be used; `unavailable` when the provider was to blame
    Skipped { unavailable: bool, message: String },
}

/// Film analysis pipeline
pub struct AnalysisPipeline {
    config: PipelineConfig,
    providers: Providers,
    scorer: CharacterScorer,
    event_tx: Option<mpsc::Sender<AnalysisEvent>>,
}

impl AnalysisPipeline {
    /// Create new pipeline
    pub fn new(config: PipelineConfig, providers: Providers, taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            config,
            providers,
            scorer: CharacterScorer::new(taxonomy),
            event_tx: None,
        }
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, event_tx: mpsc::Sender<AnalysisEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Analyze all films
    ///
    /// Never fails as a whole: films whose providers were unavailable end up
    /// in [`RunOutcome::failures`].
    pub async fn run(&self, films: Vec<Film>) -> RunOutcome {
        let total = films.len();
        let limit = self.config.max_concurrent_films.max(1);
        info!(films = total, concurrency = limit, "Starting analysis run");

        let results: Vec<Result<FilmAnalysis, FilmFailure>> = stream::iter(films)
            .map(|film| async move { self.analyze_film(&film).await })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut analyzed = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(analysis) => analyzed.push(analysis),
                Err(failure) => failures.push(failure),
            }
        }
        analyzed.sort_by(|a, b| a.film.film_id.cmp(&b.film.film_id));
        failures.sort_by(|a, b| a.film_id.cmp(&b.film_id));

        let decade_inputs: Vec<FilmAggregateInput<'_>> = analyzed
            .iter()
            .map(|a| FilmAggregateInput {
                film_id: &a.film.film_id,
                release_year: a.film.release_year,
                characters: &a.characters,
            })
            .collect();
        let decades = aggregate_decades(&decade_inputs);

        if failures.is_empty() {
            info!(films = analyzed.len(), decades = decades.len(), "Analysis run complete");
        } else {
            warn!(
                analyzed = analyzed.len(),
                failed = failures.len(),
                "Analysis run complete with failed films"
            );
        }

        self.emit_event(AnalysisEvent::RunCompleted {
            films_analyzed: analyzed.len(),
            films_failed: failures.len(),
        })
        .await;

        RunOutcome {
            films: analyzed,
            decades,
            failures,
        }
    }

    /// Analyze one film
    ///
    /// # Errors
    /// Returns a [`FilmFailure`] when the film had inputs but every provider
    /// call for them reported unavailability (or no provider was configured
    /// for them).
    pub async fn analyze_film(&self, film: &Film) -> Result<FilmAnalysis, FilmFailure> {
        let film_id = film.film_id.as_str();
        debug!(film_id = %film_id, title = %film.title, "Analyzing film");
        self.emit_event(AnalysisEvent::FilmStarted {
            film_id: film_id.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

        // Phase 1: extraction
        let mut sources: Vec<(MentionSource, SourceResult)> = Vec::new();
        if let Some(synopsis) = film.synopsis.as_deref() {
            sources.push((MentionSource::Synopsis, self.extract_synopsis(film_id, synopsis).await));
        }
        let poster_results = join_all(
            film.posters
                .iter()
                .map(|poster| self.extract_poster(film_id, poster)),
        )
        .await;
        sources.extend(poster_results.into_iter().map(|r| (MentionSource::Poster, r)));

        let attempted = sources.len();
        let mut unavailable = 0;
        let mut last_error = None;
        let mut mentions = Vec::new();
        let mut warnings = Vec::new();

        for (source, result) in sources {
            match result {
                SourceResult::Extracted(found) => mentions.extend(found),
                SourceResult::Skipped {
                    unavailable: is_unavailable,
                    message,
                } => {
                    if is_unavailable {
                        unavailable += 1;
                    }
                    warnings.push(format!("{} skipped: {}", source, message));
                    last_error = Some(message);
                }
            }
        }

        if attempted == 0 {
            warn!(film_id = %film_id, "Film has neither synopsis nor posters");
            warnings.push("film has neither synopsis nor posters".to_string());
        } else if unavailable == attempted {
            let reason = format!(
                "providers unavailable for all {} input(s): {}",
                attempted,
                last_error.unwrap_or_default()
            );
            error!(film_id = %film_id, reason = %reason, "Film skipped");
            self.emit_event(AnalysisEvent::FilmFailed {
                film_id: film_id.to_string(),
                reason: reason.clone(),
            })
            .await;
            return Err(FilmFailure {
                film_id: film_id.to_string(),
                title: film.title.clone(),
                reason,
            });
        }

        // Phase 2 + 3: scoring and aggregation
        let characters = self.scorer.score_all(&mentions);
        let aggregate = aggregate_film(film_id, &characters);

        // Phase 4: remediation
        let remediator = Remediator::new(self.providers.remediation.clone());
        let remediation = remediator
            .suggest_all(&characters, film.synopsis.as_deref())
            .await;

        info!(
            film_id = %film_id,
            characters = characters.len(),
            matches = aggregate.match_count,
            total = aggregate.total.sum,
            "Film analyzed"
        );
        self.emit_event(AnalysisEvent::FilmCompleted {
            film_id: film_id.to_string(),
            characters: characters.len(),
            total_severity: aggregate.total.sum,
            timestamp: chrono::Utc::now().timestamp(),
        })
        .await;

        Ok(FilmAnalysis {
            film: film.clone(),
            characters,
            aggregate,
            remediation,
            warnings,
        })
    }

    async fn extract_synopsis(&self, film_id: &str, synopsis: &str) -> SourceResult {
        let Some(parser) = &self.providers.synopsis else {
            return self
                .source_unavailable(film_id, MentionSource::Synopsis, "no synopsis parser configured")
                .await;
        };
        let result = parser.parse_synopsis(film_id, synopsis).await;
        self.record_source(film_id, MentionSource::Synopsis, parser.name(), result)
            .await
    }

    async fn extract_poster(&self, film_id: &str, poster: &Path) -> SourceResult {
        let Some(analyzer) = &self.providers.poster else {
            return self
                .source_unavailable(film_id, MentionSource::Poster, "no poster analyzer configured")
                .await;
        };
        let result = analyzer.analyze_poster(film_id, poster).await;
        if let Err(e) = &result {
            debug!(film_id = %film_id, poster = %poster.display(), error = %e, "Poster analysis failed");
        }
        self.record_source(film_id, MentionSource::Poster, analyzer.name(), result)
            .await
    }

    async fn source_unavailable(
        &self,
        film_id: &str,
        source: MentionSource,
        message: &str,
    ) -> SourceResult {
        self.record_source(
            film_id,
            source,
            "none",
            Err(ExtractionError::NotAvailable(message.to_string())),
        )
        .await
    }

    async fn record_source(
        &self,
        film_id: &str,
        source: MentionSource,
        provider: &str,
        result: Result<Vec<CharacterMention>, ExtractionError>,
    ) -> SourceResult {
        match result {
            Ok(mentions) => {
                self.emit_event(AnalysisEvent::SourceCompleted {
                    film_id: film_id.to_string(),
                    source,
                    provider: provider.to_string(),
                    characters: mentions.len(),
                })
                .await;
                SourceResult::Extracted(mentions)
            }
            Err(e) => {
                warn!(
                    film_id = %film_id,
                    source = %source,
                    provider,
                    error = %e,
                    "Extraction failed (per-source error isolation)"
                );
                self.emit_event(AnalysisEvent::SourceFailed {
                    film_id: film_id.to_string(),
                    source,
                    provider: provider.to_string(),
                    message: e.to_string(),
                })
                .await;
                SourceResult::Skipped {
                    unavailable: e.is_provider_unavailable(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Emit event to the progress channel, if any
    async fn emit_event(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
