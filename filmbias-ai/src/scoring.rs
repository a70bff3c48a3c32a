//! Character scoring
//!
//! Runs every populated attribute of a [`CharacterMention`] through the
//! taxonomy and collects the resulting [`StereotypeMatch`]es. Scoring never
//! fails: missing fields are skipped and a taxonomy miss yields no matches.

use filmbias_common::model::Category;
use filmbias_common::{CharacterMention, StereotypeMatch, Taxonomy};
use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

/// A mention with its stereotype matches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCharacter {
    pub mention: CharacterMention,
    pub matches: Vec<StereotypeMatch>,
}

impl ScoredCharacter {
    /// Sum of match severities
    pub fn total_severity(&self) -> f64 {
        let mut severities: Vec<f64> = self.matches.iter().map(|m| m.severity).collect();
        severities.sort_by(f64::total_cmp);
        severities.into_iter().sum()
    }

    /// Distinct categories in first-match order
    pub fn categories(&self) -> Vec<&Category> {
        let mut seen: Vec<&Category> = Vec::new();
        for m in &self.matches {
            if !seen.contains(&&m.category) {
                seen.push(&m.category);
            }
        }
        seen
    }

    /// Severity per category, in first-match order
    pub fn category_scores(&self) -> Vec<(&Category, f64)> {
        self.categories()
            .into_iter()
            .map(|category| {
                let sum = self
                    .matches
                    .iter()
                    .filter(|m| &m.category == category)
                    .map(|m| m.severity)
                    .sum();
                (category, sum)
            })
            .collect()
    }

    pub fn is_flagged(&self) -> bool {
        self.total_severity() > 0.0
    }
}

/// Scores mentions against a shared, read-only taxonomy
#[derive(Debug, Clone)]
pub struct CharacterScorer {
    taxonomy: Arc<Taxonomy>,
}

impl CharacterScorer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Score one mention
    ///
    /// Each (category, slot, value) triple contributes at most once, so a
    /// keyword repeated inside one value is not double counted.
    pub fn score(&self, mention: &CharacterMention) -> ScoredCharacter {
        let gender = mention.gender();
        let mut matches: Vec<StereotypeMatch> = Vec::new();

        for (slot, value) in mention.attributes() {
            for hit in self.taxonomy.lookup_for(slot, value, gender) {
                let duplicate = matches.iter().any(|m| {
                    m.slot == slot && &m.category == hit.category && m.matched_value == value
                });
                if duplicate {
                    continue;
                }
                matches.push(StereotypeMatch {
                    character_id: mention.character_id().to_string(),
                    film_id: mention.film_id().to_string(),
                    gender,
                    source: mention.source(),
                    slot,
                    matched_value: value.to_string(),
                    category: hit.category.clone(),
                    severity: hit.severity,
                });
            }
        }

        trace!(
            film_id = %mention.film_id(),
            character_id = %mention.character_id(),
            matches = matches.len(),
            "Scored character"
        );

        ScoredCharacter {
            mention: mention.clone(),
            matches,
        }
    }

    pub fn score_all(&self, mentions: &[CharacterMention]) -> Vec<ScoredCharacter> {
        mentions.iter().map(|m| self.score(m)).collect()
    }
}
