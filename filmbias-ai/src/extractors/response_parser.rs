//! Defensive parsing of model responses
//!
//! Vision and text models are asked for a JSON object with a `characters`
//! list, but what comes back is loosely structured text: often wrapped in a
//! markdown code fence, sometimes preceded by prose, with fields that are
//! strings in one answer and lists in the next. This module turns that text
//! into [`CharacterMention`]s or a single [`ExtractionError::Parse`].
//!
//! # Recovery rules
//! - Code fences (```` ```json ... ``` ````) are stripped
//! - If the whole text is not JSON, the outermost `{...}` span is tried
//! - Missing fields default to unknown/empty
//! - String-or-list fields accept either shape
//! - Character entries that are not objects are skipped with a warning
//! - Missing character ids default to `<source>-<n>` (1-based)

use super::ExtractionError;
use filmbias_common::{CharacterMention, Gender, MentionSource};
use serde_json::{Map, Value};
use tracing::{debug, warn};

type JsonObject = Map<String, Value>;

/// Parse a poster analysis response
///
/// `poster_label` (usually the poster file stem) qualifies character ids so
/// that "person 1" on two posters of one film stay distinct.
pub fn parse_poster_response(
    film_id: &str,
    poster_label: &str,
    raw: &str,
) -> Result<Vec<CharacterMention>, ExtractionError> {
    let characters = character_objects(raw)?;

    let mentions = characters
        .iter()
        .enumerate()
        .filter_map(|(i, value)| as_character(value, film_id, MentionSource::Poster, i))
        .map(|(index, obj)| {
            let id = string_field(obj, "id")
                .unwrap_or_else(|| default_id(MentionSource::Poster, index));
            let character_id = if poster_label.is_empty() {
                id
            } else {
                format!("{}/{}", poster_label, id)
            };

            let mut builder =
                CharacterMention::builder(film_id, character_id, MentionSource::Poster)
                    .gender(gender_field(obj))
                    .associated_objects(list_field(obj, "associated_objects"))
                    .model_cues(list_field(obj, "stereotypes_detected"));
            if let Some(clothing) = string_field(obj, "clothing") {
                builder = builder.clothing(clothing);
            }
            if let Some(pose) = string_field(obj, "pose") {
                builder = builder.pose(pose);
            }
            builder.build()
        })
        .collect::<Vec<_>>();

    debug!(
        film_id = %film_id,
        poster = %poster_label,
        characters = mentions.len(),
        "Parsed poster response"
    );
    Ok(mentions)
}

/// Parse a synopsis analysis response
pub fn parse_synopsis_response(
    film_id: &str,
    raw: &str,
) -> Result<Vec<CharacterMention>, ExtractionError> {
    let characters = character_objects(raw)?;

    let mentions = characters
        .iter()
        .enumerate()
        .filter_map(|(i, value)| as_character(value, film_id, MentionSource::Synopsis, i))
        .map(|(index, obj)| {
            let character_id = string_field(obj, "name")
                .or_else(|| string_field(obj, "id"))
                .unwrap_or_else(|| default_id(MentionSource::Synopsis, index));

            let mut builder =
                CharacterMention::builder(film_id, character_id, MentionSource::Synopsis)
                    .gender(gender_field(obj))
                    .verbs(list_field(obj, "verbs"))
                    .relationships(list_field(obj, "relationships"))
                    .appearance(list_field(obj, "appearance"));
            if let Some(profession) = string_field(obj, "profession") {
                builder = builder.profession(profession);
            }
            builder.build()
        })
        .collect::<Vec<_>>();

    debug!(
        film_id = %film_id,
        characters = mentions.len(),
        "Parsed synopsis response"
    );
    Ok(mentions)
}

// ============================================================================
// JSON recovery
// ============================================================================

/// Locate the JSON object in a model response
///
/// Returns `None` when no parseable object can be found.
pub fn extract_json_object(raw: &str) -> Option<JsonObject> {
    let unfenced = strip_code_fence(raw);

    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(unfenced) {
        return Some(obj);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string (`json`, `JSON`, ...) up to the first newline
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn character_objects(raw: &str) -> Result<Vec<Value>, ExtractionError> {
    let obj = extract_json_object(raw).ok_or_else(|| {
        warn!(raw = %truncate(raw, 200), "Model response contains no JSON object");
        ExtractionError::Parse("no JSON object in response".to_string())
    })?;

    match obj.get("characters") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => {
            warn!(raw = %truncate(raw, 200), "'characters' key missing in model response");
            Err(ExtractionError::Parse("'characters' key missing".to_string()))
        }
        Some(_) => {
            warn!(raw = %truncate(raw, 200), "'characters' is not a list in model response");
            Err(ExtractionError::Parse("'characters' is not a list".to_string()))
        }
    }
}

fn as_character<'a>(
    value: &'a Value,
    film_id: &str,
    source: MentionSource,
    index: usize,
) -> Option<(usize, &'a JsonObject)> {
    match value {
        Value::Object(obj) => Some((index, obj)),
        other => {
            warn!(
                film_id = %film_id,
                source = %source,
                index,
                entry = %other,
                "Skipping malformed character entry"
            );
            None
        }
    }
}

fn default_id(source: MentionSource, index: usize) -> String {
    format!("{}-{}", source, index + 1)
}

// ============================================================================
// Field helpers
// ============================================================================

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Single-valued field; a list is joined with ", "
fn string_field(obj: &JsonObject, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(scalar_text)
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined).filter(|s| !s.is_empty())
        }
        other => scalar_text(other),
    }
}

/// Multi-valued field; a lone string becomes a one-element list
fn list_field(obj: &JsonObject, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn gender_field(obj: &JsonObject) -> Gender {
    string_field(obj, "gender")
        .map(|g| Gender::parse_lenient(&g))
        .unwrap_or_default()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((pos, _)) => format!("{}...", &text[..pos]),
        None => text.to_string(),
    }
}
