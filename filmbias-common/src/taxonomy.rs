//! Stereotype taxonomy
//!
//! Static table mapping attribute keywords to a stereotype category and a
//! base severity. The table is configuration data: a built-in default is
//! compiled in, and a replacement can be loaded from a TOML file at startup.
//! Once constructed a [`Taxonomy`] is never mutated, so it can be shared
//! across concurrent extraction tasks behind an `Arc` without locking.
//!
//! # Matching
//! - Values are trimmed and lower-cased before matching
//! - An entry matches when any of its keywords occurs as a substring
//! - Every matching entry contributes (no first-match-wins); each entry at
//!   most once per value
//! - Output follows table order
//!
//! # File format
//! ```toml
//! [[entry]]
//! category = "passive-agency"
//! slot = "verb"
//! keywords = ["wait", "obey"]
//! severity = 3.0
//! applies_to = "female"   # optional
//! ```

use crate::model::{AttributeSlot, Category, Gender};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// One row of the taxonomy table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    /// Category label contributed on match
    pub category: Category,
    /// Attribute slot this entry applies to
    pub slot: AttributeSlot,
    /// Lower-case keywords matched as substrings
    pub keywords: Vec<String>,
    /// Base severity (finite, non-negative)
    pub severity: f64,
    /// Restrict the entry to characters of one gender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<Gender>,
}

impl TaxonomyEntry {
    fn matches(&self, normalized_value: &str) -> bool {
        self.keywords.iter().any(|k| normalized_value.contains(k.as_str()))
    }
}

/// A single lookup result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxonomyHit<'a> {
    pub category: &'a Category,
    pub severity: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct TaxonomyFile {
    #[serde(rename = "entry", default)]
    entries: Vec<TaxonomyEntry>,
}

/// Immutable stereotype taxonomy
#[derive(Debug, Clone)]
pub struct Taxonomy {
    entries: Vec<TaxonomyEntry>,
    /// Entry indices per slot, in table order
    by_slot: HashMap<AttributeSlot, Vec<usize>>,
}

impl Taxonomy {
    /// Build a taxonomy from entries, validating and normalizing them
    ///
    /// # Errors
    /// `Error::Config` for empty category labels, empty keyword lists or
    /// severities that are negative or not finite.
    pub fn new(entries: Vec<TaxonomyEntry>) -> Result<Self> {
        let mut normalized = Vec::with_capacity(entries.len());

        for (i, mut entry) in entries.into_iter().enumerate() {
            if entry.category.as_str().is_empty() {
                return Err(Error::Config(format!("taxonomy entry {} has an empty category", i)));
            }
            if !entry.severity.is_finite() || entry.severity < 0.0 {
                return Err(Error::Config(format!(
                    "taxonomy entry {} ({}) has invalid severity {}",
                    i, entry.category, entry.severity
                )));
            }

            entry.keywords = entry
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if entry.keywords.is_empty() {
                return Err(Error::Config(format!(
                    "taxonomy entry {} ({}) has no keywords",
                    i, entry.category
                )));
            }

            normalized.push(entry);
        }

        let mut by_slot: HashMap<AttributeSlot, Vec<usize>> = HashMap::new();
        for (i, entry) in normalized.iter().enumerate() {
            by_slot.entry(entry.slot).or_default().push(i);
        }

        Ok(Self {
            entries: normalized,
            by_slot,
        })
    }

    /// Built-in default taxonomy
    pub fn builtin() -> Self {
        BUILTIN_TAXONOMY.clone()
    }

    /// Parse a taxonomy from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TaxonomyFile = toml::from_str(content)?;
        Self::new(file.entries)
    }

    /// Load a taxonomy file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read taxonomy {}: {}", path.display(), e))
        })?;
        let taxonomy = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            entries = taxonomy.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Serialize to the TOML file format
    pub fn to_toml_string(&self) -> Result<String> {
        let file = TaxonomyFile {
            entries: self.entries.clone(),
        };
        toml::to_string_pretty(&file).map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct category labels in first-appearance order
    pub fn categories(&self) -> Vec<&Category> {
        let mut seen: Vec<&Category> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&&entry.category) {
                seen.push(&entry.category);
            }
        }
        seen
    }

    /// All entries of `slot` matching `value`, regardless of gender
    ///
    /// Empty or unrecognized values yield an empty vector.
    pub fn lookup(&self, slot: AttributeSlot, value: &str) -> Vec<TaxonomyHit<'_>> {
        self.matching_entries(slot, value)
            .map(|entry| TaxonomyHit {
                category: &entry.category,
                severity: entry.severity,
            })
            .collect()
    }

    /// Like [`lookup`](Self::lookup) but drops entries restricted to another gender
    ///
    /// Gender-restricted entries never apply to characters of unknown gender.
    pub fn lookup_for(
        &self,
        slot: AttributeSlot,
        value: &str,
        gender: Gender,
    ) -> Vec<TaxonomyHit<'_>> {
        self.matching_entries(slot, value)
            .filter(|entry| entry.applies_to.map_or(true, |g| g == gender))
            .map(|entry| TaxonomyHit {
                category: &entry.category,
                severity: entry.severity,
            })
            .collect()
    }

    fn matching_entries<'a>(
        &'a self,
        slot: AttributeSlot,
        value: &str,
    ) -> impl Iterator<Item = &'a TaxonomyEntry> + 'a {
        let normalized = value.trim().to_lowercase();
        let indices: &[usize] = if normalized.is_empty() {
            &[]
        } else {
            self.by_slot.get(&slot).map(Vec::as_slice).unwrap_or(&[])
        };

        if indices.is_empty() {
            debug!(slot = %slot, value = %value, "No taxonomy entries considered");
        }

        indices
            .iter()
            .map(move |&i| &self.entries[i])
            .filter(move |entry| entry.matches(&normalized))
    }
}

// ============================================================================
// Built-in table
// ============================================================================

struct BuiltinRow {
    category: &'static str,
    slot: AttributeSlot,
    keywords: &'static [&'static str],
    severity: f64,
    applies_to: Option<Gender>,
}

use AttributeSlot::*;
use Gender::{Female, Male};

const BUILTIN_ROWS: &[BuiltinRow] = &[
    // Professions
    BuiltinRow {
        category: "profession-stereotype",
        slot: Profession,
        keywords: &["nurse", "secretary", "teacher", "housewife", "homemaker", "maid", "receptionist"],
        severity: 2.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "profession-stereotype",
        slot: Profession,
        keywords: &[
            "engineer", "police", "businessman", "manager", "detective", "criminal", "soldier",
            "driver", "boss", "gangster",
        ],
        severity: 1.0,
        applies_to: Some(Male),
    },
    // Agency verbs
    BuiltinRow {
        category: "passive-agency",
        slot: Verb,
        keywords: &[
            "wait", "receive", "listen", "support", "obey", "cry", "cries", "cried", "suffer",
            "wish",
        ],
        severity: 3.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "emotional-stereotype",
        slot: Verb,
        keywords: &["cry", "cries", "cried", "weep", "sob", "faint", "plead", "beg"],
        severity: 1.5,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "active-heroic-agency",
        slot: Verb,
        keywords: &[
            "fight", "lead", "save", "kill", "plan", "decide", "investigate", "pursue", "build",
            "destroy", "rescue", "avenge",
        ],
        severity: 1.0,
        applies_to: Some(Male),
    },
    // Relationships
    BuiltinRow {
        category: "caregiver-role",
        slot: Relationship,
        keywords: &["mother", "wife", "sister", "daughter", "nurse"],
        severity: 2.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "authority-provider-role",
        slot: Relationship,
        keywords: &["father", "husband", "boss", "leader", "inspector", "manager"],
        severity: 1.0,
        applies_to: Some(Male),
    },
    // Appearance
    BuiltinRow {
        category: "appearance-stereotype",
        slot: Appearance,
        keywords: &["beautiful", "pretty", "attractive"],
        severity: 1.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "appearance-stereotype",
        slot: Appearance,
        keywords: &["handsome"],
        severity: 0.5,
        applies_to: Some(Male),
    },
    BuiltinRow {
        category: "strength-stereotype",
        slot: Appearance,
        keywords: &["strong", "muscular", "tough"],
        severity: 0.5,
        applies_to: Some(Male),
    },
    BuiltinRow {
        category: "weakness-stereotype",
        slot: Appearance,
        keywords: &["weak", "fragile", "helpless"],
        severity: 1.0,
        applies_to: Some(Female),
    },
    // Poster pose
    BuiltinRow {
        category: "passive-pose",
        slot: Pose,
        keywords: &[
            "passive", "demure", "submissive", "downcast", "looking away", "shy", "held by",
            "leaning on", "behind",
        ],
        severity: 2.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "dominant-pose",
        slot: Pose,
        keywords: &["dominant", "aggressive", "assertive", "controlling", "possessive", "protective"],
        severity: 2.0,
        applies_to: Some(Male),
    },
    // Poster clothing
    BuiltinRow {
        category: "traditional-femininity",
        slot: Clothing,
        keywords: &["saree", "sari", "lehenga", "bangles", "bindi", "jewel", "headscarf", "veil"],
        severity: 1.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "objectification",
        slot: Clothing,
        keywords: &["revealing", "skimpy", "bikini", "low-cut"],
        severity: 3.0,
        applies_to: Some(Female),
    },
    BuiltinRow {
        category: "authority-attire",
        slot: Clothing,
        keywords: &["suit", "uniform", "formal"],
        severity: 1.0,
        applies_to: Some(Male),
    },
    // Poster objects
    BuiltinRow {
        category: "aggressive-masculinity",
        slot: Object,
        keywords: &["gun", "weapon", "knife", "sword", "pistol", "rifle"],
        severity: 2.0,
        applies_to: Some(Male),
    },
    BuiltinRow {
        category: "adornment",
        slot: Object,
        keywords: &["flower", "roses", "jewel", "bangles", "mirror"],
        severity: 1.0,
        applies_to: Some(Female),
    },
    // Cues reported by the vision model
    BuiltinRow {
        category: "passive-agency",
        slot: ModelCue,
        keywords: &["passive", "submissive", "dependen", "damsel", "victim"],
        severity: 2.0,
        applies_to: None,
    },
    BuiltinRow {
        category: "objectification",
        slot: ModelCue,
        keywords: &["objectif", "emphasis on appearance", "adornment"],
        severity: 3.0,
        applies_to: None,
    },
    BuiltinRow {
        category: "dominance",
        slot: ModelCue,
        keywords: &["dominant", "controlling", "possessive", "assertive"],
        severity: 2.5,
        applies_to: None,
    },
    BuiltinRow {
        category: "aggressive-masculinity",
        slot: ModelCue,
        keywords: &["aggressive", "violence", "weapon", "action hero"],
        severity: 2.0,
        applies_to: None,
    },
    BuiltinRow {
        category: "emotional-stereotype",
        slot: ModelCue,
        keywords: &["melanchol", "worried", "emotional restraint", "demure"],
        severity: 1.5,
        applies_to: None,
    },
    BuiltinRow {
        category: "traditional-role",
        slot: ModelCue,
        keywords: &["traditional", "modesty", "domestic", "subservient"],
        severity: 1.0,
        applies_to: None,
    },
];

static BUILTIN_TAXONOMY: Lazy<Taxonomy> = Lazy::new(|| {
    let entries = BUILTIN_ROWS
        .iter()
        .map(|row| TaxonomyEntry {
            category: Category::new(row.category),
            slot: row.slot,
            keywords: row.keywords.iter().map(|k| k.to_string()).collect(),
            severity: row.severity,
            applies_to: row.applies_to,
        })
        .collect();
    match Taxonomy::new(entries) {
        Ok(taxonomy) => taxonomy,
        Err(e) => unreachable!("built-in taxonomy is invalid: {}", e),
    }
});

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(hits: &[TaxonomyHit<'_>]) -> Vec<String> {
        hits.iter().map(|h| h.category.to_string()).collect()
    }

    #[test]
    fn test_builtin_is_valid_and_non_empty() {
        let taxonomy = Taxonomy::builtin();
        assert!(!taxonomy.is_empty());
        assert!(taxonomy.entries().iter().all(|e| e.severity >= 0.0));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let taxonomy = Taxonomy::builtin();
        let hits = taxonomy.lookup(AttributeSlot::Profession, "  Head NURSE ");
        assert_eq!(labels(&hits), vec!["profession-stereotype"]);
    }

    #[test]
    fn test_all_matching_entries_contribute() {
        let taxonomy = Taxonomy::builtin();
        let hits = taxonomy.lookup(AttributeSlot::Verb, "cries");
        assert_eq!(labels(&hits), vec!["passive-agency", "emotional-stereotype"]);
    }

    #[test]
    fn test_lookup_empty_and_unknown_values() {
        let taxonomy = Taxonomy::builtin();
        assert!(taxonomy.lookup(AttributeSlot::Profession, "").is_empty());
        assert!(taxonomy.lookup(AttributeSlot::Profession, "astronaut").is_empty());
        assert!(taxonomy.lookup(AttributeSlot::Profession, "अध्यापिका").is_empty());
    }

    #[test]
    fn test_lookup_for_respects_gender_restriction() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(
            taxonomy.lookup_for(AttributeSlot::Profession, "nurse", Gender::Female).len(),
            1
        );
        assert!(taxonomy
            .lookup_for(AttributeSlot::Profession, "nurse", Gender::Male)
            .is_empty());
        assert!(taxonomy
            .lookup_for(AttributeSlot::Profession, "nurse", Gender::Unknown)
            .is_empty());
        // unrestricted entries apply to everyone
        assert_eq!(
            taxonomy
                .lookup_for(AttributeSlot::ModelCue, "Submissive pose", Gender::Unknown)
                .len(),
            1
        );
    }

    #[test]
    fn test_rejects_negative_severity() {
        let result = Taxonomy::new(vec![TaxonomyEntry {
            category: Category::new("x"),
            slot: AttributeSlot::Verb,
            keywords: vec!["a".into()],
            severity: -1.0,
            applies_to: None,
        }]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_blank_keywords() {
        let result = Taxonomy::new(vec![TaxonomyEntry {
            category: Category::new("x"),
            slot: AttributeSlot::Verb,
            keywords: vec!["  ".into()],
            severity: 1.0,
            applies_to: None,
        }]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip_preserves_lookup() {
        let taxonomy = Taxonomy::builtin();
        let text = taxonomy.to_toml_string().unwrap();
        let reloaded = Taxonomy::from_toml_str(&text).unwrap();
        assert_eq!(reloaded.entries(), taxonomy.entries());
    }

    #[test]
    fn test_categories_are_distinct() {
        let taxonomy = Taxonomy::builtin();
        let categories = taxonomy.categories();
        let mut sorted: Vec<_> = categories.iter().map(|c| c.as_str()).collect();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), categories.len());
    }
}
