//! Character and film data model
//!
//! Extraction produces [`CharacterMention`]s (one per character per source),
//! scoring turns them into [`StereotypeMatch`]es. Mentions are immutable once
//! built: all fields are private and only exposed through getters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Enumerations
// ============================================================================

/// Apparent gender of a character as reported by an extraction provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Lenient parse of provider text ("man", "Female", "F", ...)
    ///
    /// Anything not clearly male or female (including "ambiguous") maps to
    /// `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "male" | "man" | "men" | "m" | "boy" | "masculine" => Gender::Male,
            "female" | "woman" | "women" | "f" | "girl" | "feminine" => Gender::Female,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic slot of an attribute value, used to select taxonomy entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSlot {
    Profession,
    Verb,
    /// Poster only
    Pose,
    /// Poster only
    Clothing,
    Appearance,
    Relationship,
    /// Objects or symbols shown with a character on a poster
    Object,
    /// Stereotype phrases reported by the vision model itself
    ModelCue,
}

impl AttributeSlot {
    pub const ALL: [AttributeSlot; 8] = [
        AttributeSlot::Profession,
        AttributeSlot::Verb,
        AttributeSlot::Pose,
        AttributeSlot::Clothing,
        AttributeSlot::Appearance,
        AttributeSlot::Relationship,
        AttributeSlot::Object,
        AttributeSlot::ModelCue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeSlot::Profession => "profession",
            AttributeSlot::Verb => "verb",
            AttributeSlot::Pose => "pose",
            AttributeSlot::Clothing => "clothing",
            AttributeSlot::Appearance => "appearance",
            AttributeSlot::Relationship => "relationship",
            AttributeSlot::Object => "object",
            AttributeSlot::ModelCue => "model_cue",
        }
    }
}

impl fmt::Display for AttributeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a character mention was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionSource {
    Synopsis,
    Poster,
}

impl MentionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionSource::Synopsis => "synopsis",
            MentionSource::Poster => "poster",
        }
    }
}

impl fmt::Display for MentionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stereotype category label (e.g. `passive-agency`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Character mention
// ============================================================================

/// One character's extracted attributes for one film and one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMention {
    character_id: String,
    film_id: String,
    source: MentionSource,
    gender: Gender,
    profession: Option<String>,
    agency_verbs: Vec<String>,
    pose: Option<String>,
    clothing: Option<String>,
    appearance_descriptors: Vec<String>,
    relationships: Vec<String>,
    associated_objects: Vec<String>,
    model_cues: Vec<String>,
}

impl CharacterMention {
    /// Start building a mention; every attribute starts empty/unknown
    pub fn builder(
        film_id: impl Into<String>,
        character_id: impl Into<String>,
        source: MentionSource,
    ) -> CharacterMentionBuilder {
        CharacterMentionBuilder {
            inner: CharacterMention {
                character_id: character_id.into(),
                film_id: film_id.into(),
                source,
                gender: Gender::Unknown,
                profession: None,
                agency_verbs: Vec::new(),
                pose: None,
                clothing: None,
                appearance_descriptors: Vec::new(),
                relationships: Vec::new(),
                associated_objects: Vec::new(),
                model_cues: Vec::new(),
            },
        }
    }

    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    pub fn film_id(&self) -> &str {
        &self.film_id
    }

    pub fn source(&self) -> MentionSource {
        self.source
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn profession(&self) -> Option<&str> {
        self.profession.as_deref()
    }

    pub fn agency_verbs(&self) -> &[String] {
        &self.agency_verbs
    }

    pub fn pose(&self) -> Option<&str> {
        self.pose.as_deref()
    }

    pub fn clothing(&self) -> Option<&str> {
        self.clothing.as_deref()
    }

    pub fn appearance_descriptors(&self) -> &[String] {
        &self.appearance_descriptors
    }

    pub fn relationships(&self) -> &[String] {
        &self.relationships
    }

    pub fn associated_objects(&self) -> &[String] {
        &self.associated_objects
    }

    pub fn model_cues(&self) -> &[String] {
        &self.model_cues
    }

    /// Every populated attribute value paired with its slot
    ///
    /// Order is stable: slots in declaration order, list values in insertion order.
    pub fn attributes(&self) -> Vec<(AttributeSlot, &str)> {
        let mut out = Vec::new();
        if let Some(p) = &self.profession {
            out.push((AttributeSlot::Profession, p.as_str()));
        }
        out.extend(self.agency_verbs.iter().map(|v| (AttributeSlot::Verb, v.as_str())));
        if let Some(p) = &self.pose {
            out.push((AttributeSlot::Pose, p.as_str()));
        }
        if let Some(c) = &self.clothing {
            out.push((AttributeSlot::Clothing, c.as_str()));
        }
        out.extend(
            self.appearance_descriptors
                .iter()
                .map(|a| (AttributeSlot::Appearance, a.as_str())),
        );
        out.extend(
            self.relationships
                .iter()
                .map(|r| (AttributeSlot::Relationship, r.as_str())),
        );
        out.extend(
            self.associated_objects
                .iter()
                .map(|o| (AttributeSlot::Object, o.as_str())),
        );
        out.extend(self.model_cues.iter().map(|c| (AttributeSlot::ModelCue, c.as_str())));
        out
    }

    /// True if at least one attribute field is populated
    pub fn has_attributes(&self) -> bool {
        !self.attributes().is_empty()
    }
}

/// Builder for [`CharacterMention`]
///
/// Values are trimmed; empty strings are dropped so that "populated" always
/// means non-empty. Duplicate list values are ignored.
#[derive(Debug, Clone)]
pub struct CharacterMentionBuilder {
    inner: CharacterMention,
}

fn normalized(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    if let Some(v) = normalized(value) {
        if !list.iter().any(|existing| existing.eq_ignore_ascii_case(&v)) {
            list.push(v);
        }
    }
}

impl CharacterMentionBuilder {
    pub fn gender(mut self, gender: Gender) -> Self {
        self.inner.gender = gender;
        self
    }

    pub fn profession(mut self, profession: impl Into<String>) -> Self {
        self.inner.profession = normalized(profession);
        self
    }

    pub fn pose(mut self, pose: impl Into<String>) -> Self {
        self.inner.pose = normalized(pose);
        self
    }

    pub fn clothing(mut self, clothing: impl Into<String>) -> Self {
        self.inner.clothing = normalized(clothing);
        self
    }

    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        push_unique(&mut self.inner.agency_verbs, verb);
        self
    }

    pub fn verbs<I, S>(mut self, verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for v in verbs {
            push_unique(&mut self.inner.agency_verbs, v);
        }
        self
    }

    pub fn appearance<I, S>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for d in descriptors {
            push_unique(&mut self.inner.appearance_descriptors, d);
        }
        self
    }

    pub fn relationships<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for r in roles {
            push_unique(&mut self.inner.relationships, r);
        }
        self
    }

    pub fn associated_objects<I, S>(mut self, objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for o in objects {
            push_unique(&mut self.inner.associated_objects, o);
        }
        self
    }

    pub fn model_cues<I, S>(mut self, cues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for c in cues {
            push_unique(&mut self.inner.model_cues, c);
        }
        self
    }

    pub fn build(self) -> CharacterMention {
        self.inner
    }
}

// ============================================================================
// Stereotype match
// ============================================================================

/// One taxonomy hit for one character attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereotypeMatch {
    /// Character the matched attribute belongs to
    pub character_id: String,
    /// Film the character belongs to
    pub film_id: String,
    /// Gender of the character at scoring time
    pub gender: Gender,
    /// Source the character was extracted from
    pub source: MentionSource,
    /// Slot of the matched attribute
    pub slot: AttributeSlot,
    /// Raw attribute value that matched
    pub matched_value: String,
    /// Taxonomy category
    pub category: Category,
    /// Severity (non-negative)
    pub severity: f64,
}

// ============================================================================
// Film
// ============================================================================

/// A film selected for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub film_id: String,
    pub title: String,
    pub release_year: Option<i32>,
    pub synopsis: Option<String>,
    pub posters: Vec<PathBuf>,
}

impl Film {
    /// Decade the film was released in, if the year is known
    pub fn decade(&self) -> Option<i32> {
        self.release_year.map(decade_of)
    }
}

/// `(year / 10) * 10`, flooring for negative years
pub fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}

// ============================================================================
// Tests
// ============================================================================
