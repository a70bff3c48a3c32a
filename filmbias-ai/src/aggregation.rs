//! Aggregation of stereotype scores by film and by decade
//!
//! An [`AggregateScore`] is derived data: it is recomputed from scored
//! characters on every run and never updated in place.
//!
//! # Order independence
//! Floating-point addition is not associative, so summing the same severities
//! in a different order can change the last bits of a result. Every bucket
//! therefore collects its contributions first and sums them in a canonical
//! order (ascending, `f64::total_cmp`). Permuting characters or films yields
//! bit-identical aggregates.
//!
//! # Means
//! Every mean divides a bucket's sum by the number of characters in the
//! group (film or decade), including characters without any match. An empty
//! group has all sums and means equal to zero.

use crate::scoring::ScoredCharacter;
use filmbias_common::model::{decade_of, Category};
use filmbias_common::{Gender, MentionSource, StereotypeMatch};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// What an aggregate is keyed by
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AggregateKey {
    Film(String),
    Decade(i32),
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateKey::Film(id) => write!(f, "film {}", id),
            AggregateKey::Decade(year) => write!(f, "{}s", year),
        }
    }
}

/// Sum and per-character mean of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreCell {
    pub sum: f64,
    pub mean: f64,
}

impl ScoreCell {
    /// Canonical sum of `values`, mean over `character_count`
    fn from_contributions(mut values: Vec<f64>, character_count: usize) -> Self {
        values.sort_by(f64::total_cmp);
        let sum: f64 = values.into_iter().sum();
        let mean = if character_count == 0 {
            0.0
        } else {
            sum / character_count as f64
        };
        Self { sum, mean }
    }
}

/// Rollup of scored characters for one film or one decade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateScore {
    pub key: AggregateKey,
    pub character_count: usize,
    pub match_count: usize,
    pub total: ScoreCell,
    pub by_category: BTreeMap<Category, ScoreCell>,
    pub by_gender: BTreeMap<Gender, ScoreCell>,
    #[serde(serialize_with = "serialize_category_gender")]
    pub by_category_gender: BTreeMap<(Category, Gender), ScoreCell>,
    pub by_source: BTreeMap<MentionSource, ScoreCell>,
}

impl AggregateScore {
    /// Aggregate with no characters: all zeros
    pub fn empty(key: AggregateKey) -> Self {
        Self {
            key,
            character_count: 0,
            match_count: 0,
            total: ScoreCell::default(),
            by_category: BTreeMap::new(),
            by_gender: BTreeMap::new(),
            by_category_gender: BTreeMap::new(),
            by_source: BTreeMap::new(),
        }
    }

    /// Bucket for `category`, zero when absent
    pub fn category(&self, category: &Category) -> ScoreCell {
        self.by_category.get(category).copied().unwrap_or_default()
    }

    /// Bucket for (`category`, `gender`), zero when absent
    pub fn category_gender(&self, category: &Category, gender: Gender) -> ScoreCell {
        self.by_category_gender
            .get(&(category.clone(), gender))
            .copied()
            .unwrap_or_default()
    }

    fn from_characters<'a>(
        key: AggregateKey,
        characters: impl IntoIterator<Item = &'a ScoredCharacter>,
    ) -> Self {
        let mut character_count = 0;
        let mut matches: Vec<&StereotypeMatch> = Vec::new();
        for character in characters {
            character_count += 1;
            matches.extend(character.matches.iter());
        }

        let mut total: Vec<f64> = Vec::with_capacity(matches.len());
        let mut by_category: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
        let mut by_gender: BTreeMap<Gender, Vec<f64>> = BTreeMap::new();
        let mut by_category_gender: BTreeMap<(Category, Gender), Vec<f64>> = BTreeMap::new();
        let mut by_source: BTreeMap<MentionSource, Vec<f64>> = BTreeMap::new();

        for m in &matches {
            total.push(m.severity);
            by_category
                .entry(m.category.clone())
                .or_default()
                .push(m.severity);
            by_gender.entry(m.gender).or_default().push(m.severity);
            by_category_gender
                .entry((m.category.clone(), m.gender))
                .or_default()
                .push(m.severity);
            by_source.entry(m.source).or_default().push(m.severity);
        }

        Self {
            key,
            character_count,
            match_count: matches.len(),
            total: ScoreCell::from_contributions(total, character_count),
            by_category: cells(by_category, character_count),
            by_gender: cells(by_gender, character_count),
            by_category_gender: cells(by_category_gender, character_count),
            by_source: cells(by_source, character_count),
        }
    }
}

fn cells<K: Ord>(buckets: BTreeMap<K, Vec<f64>>, character_count: usize) -> BTreeMap<K, ScoreCell> {
    buckets
        .into_iter()
        .map(|(k, values)| (k, ScoreCell::from_contributions(values, character_count)))
        .collect()
}

/// JSON maps need string keys: emit a list of `{category, gender, sum, mean}`
fn serialize_category_gender<S: Serializer>(
    map: &BTreeMap<(Category, Gender), ScoreCell>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Row<'a> {
        category: &'a Category,
        gender: Gender,
        sum: f64,
        mean: f64,
    }

    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for ((category, gender), cell) in map {
        seq.serialize_element(&Row {
            category,
            gender: *gender,
            sum: cell.sum,
            mean: cell.mean,
        })?;
    }
    seq.end()
}

// ============================================================================
// Entry points
// ============================================================================

/// Aggregate the scored characters of one film
pub fn aggregate_film(film_id: &str, characters: &[ScoredCharacter]) -> AggregateScore {
    let aggregate = AggregateScore::from_characters(AggregateKey::Film(film_id.to_string()), characters);
    debug!(
        film_id = %film_id,
        characters = aggregate.character_count,
        matches = aggregate.match_count,
        total = aggregate.total.sum,
        "Film aggregated"
    );
    aggregate
}

/// One film's contribution to a decade rollup
#[derive(Debug, Clone, Copy)]
pub struct FilmAggregateInput<'a> {
    pub film_id: &'a str,
    pub release_year: Option<i32>,
    pub characters: &'a [ScoredCharacter],
}

/// Aggregate films by release decade, ordered by decade
///
/// Films without a release year cannot be placed and are left out with a
/// warning.
pub fn aggregate_decades(films: &[FilmAggregateInput<'_>]) -> Vec<AggregateScore> {
    let mut by_decade: BTreeMap<i32, Vec<&ScoredCharacter>> = BTreeMap::new();

    for film in films {
        match film.release_year {
            Some(year) => by_decade
                .entry(decade_of(year))
                .or_default()
                .extend(film.characters.iter()),
            None => {
                warn!(film_id = %film.film_id, "Film has no release year; excluded from decade rollup");
            }
        }
    }

    by_decade
        .into_iter()
        .map(|(decade, characters)| {
            AggregateScore::from_characters(AggregateKey::Decade(decade), characters)
        })
        .collect()
}
