//! Report output
//!
//! Per film: `<film>.md`, `<film>.json`, `<film>_chart.svg`.
//! Per decade: `decade_<year>_chart.svg`.
//! Per run: `summary.json` (run id, timestamp, aggregates, failed films).
//!
//! Film ids are sanitized before being used as file names.

pub mod chart;
pub mod markdown;

use crate::aggregation::{AggregateKey, AggregateScore};
use crate::error::{AnalysisError, Result};
use crate::workflow::{FilmAnalysis, FilmFailure, RunOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Contents of `summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub films: Vec<AggregateScore>,
    pub decades: Vec<AggregateScore>,
    pub failures: Vec<FilmFailure>,
}

impl RunSummary {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            films: outcome.films.iter().map(|f| f.aggregate.clone()).collect(),
            decades: outcome.decades.clone(),
            failures: outcome.failures.clone(),
        }
    }
}

/// Writes report files into one output directory
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every report of a run; returns the summary that was written
    pub fn write_run(&self, outcome: &RunOutcome) -> Result<RunSummary> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            AnalysisError::Report(format!(
                "cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let mut stems: HashMap<String, &str> = HashMap::new();
        for film in &outcome.films {
            let id = film.film.film_id.as_str();
            if let Some(other) = stems.insert(file_stem(id), id) {
                return Err(AnalysisError::Report(format!(
                    "film ids '{}' and '{}' map to the same report file name",
                    other, id
                )));
            }
        }

        for film in &outcome.films {
            self.write_film(film)?;
        }
        for decade in &outcome.decades {
            self.write_decade_chart(decade)?;
        }

        let summary = RunSummary::from_outcome(outcome);
        self.write_file("summary.json", &serde_json::to_string_pretty(&summary)?)?;

        info!(
            run_id = %summary.run_id,
            output_dir = %self.output_dir.display(),
            films = summary.films.len(),
            decades = summary.decades.len(),
            failures = summary.failures.len(),
            "Reports written"
        );
        Ok(summary)
    }

    /// Markdown report, JSON dump and bar chart for one film
    pub fn write_film(&self, analysis: &FilmAnalysis) -> Result<Vec<PathBuf>> {
        let stem = file_stem(&analysis.film.film_id);
        let chart_title = format!("{}: bias score by category", analysis.film.title);

        let written = vec![
            self.write_file(
                &format!("{}.md", stem),
                &markdown::render_film_report(analysis),
            )?,
            self.write_file(
                &format!("{}.json", stem),
                &serde_json::to_string_pretty(analysis)?,
            )?,
            self.write_file(
                &format!("{}_chart.svg", stem),
                &chart::aggregate_chart(&chart_title, &analysis.aggregate),
            )?,
        ];
        debug!(film_id = %analysis.film.film_id, files = written.len(), "Film reports written");
        Ok(written)
    }

    fn write_decade_chart(&self, decade: &AggregateScore) -> Result<PathBuf> {
        let year = match &decade.key {
            AggregateKey::Decade(year) => *year,
            AggregateKey::Film(id) => {
                return Err(AnalysisError::Report(format!(
                    "expected a decade aggregate, got film {}",
                    id
                )))
            }
        };
        let title = format!("{}s: bias score by category", year);
        self.write_file(
            &format!("decade_{}_chart.svg", year),
            &chart::aggregate_chart(&title, decade),
        )
    }

    fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        std::fs::write(&path, content).map_err(|e| {
            AnalysisError::Report(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }
}

/// File-name-safe version of a film id
pub fn file_stem(film_id: &str) -> String {
    let stem: String = film_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "film".to_string()
    } else {
        stem
    }
}
