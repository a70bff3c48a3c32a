//! Remediation suggestions for flagged characters
//!
//! Every character with a positive score gets one request to the
//! [`RemediationGenerator`]. The excerpt sent along depends on the source:
//! synopsis characters send the sentences that mention them, poster
//! characters send a description of the detected visual biases.
//!
//! A generator error or an empty answer degrades to
//! [`NO_SUGGESTION`]; remediation never fails a film.

use crate::extractors::heuristic_parser::split_sentences;
use crate::extractors::RemediationGenerator;
use crate::scoring::ScoredCharacter;
use filmbias_common::model::Category;
use filmbias_common::MentionSource;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Placeholder used whenever no suggestion could be produced
pub const NO_SUGGESTION: &str = "No suggestion available";

/// Longest synopsis prefix used when no sentence names the character
const FALLBACK_EXCERPT_CHARS: usize = 600;

/// One excerpt flagged for bias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationRequest {
    pub film_id: String,
    pub character_id: String,
    pub source: MentionSource,
    pub excerpt: String,
    pub categories: Vec<Category>,
}

impl RemediationRequest {
    /// Request for a scored character, `None` when nothing was flagged
    pub fn for_character(character: &ScoredCharacter, synopsis: Option<&str>) -> Option<Self> {
        if !character.is_flagged() {
            return None;
        }

        let mention = &character.mention;
        let excerpt = match mention.source() {
            MentionSource::Synopsis => {
                synopsis_excerpt(synopsis.unwrap_or_default(), mention.character_id())
            }
            MentionSource::Poster => poster_excerpt(character),
        };

        Some(Self {
            film_id: mention.film_id().to_string(),
            character_id: mention.character_id().to_string(),
            source: mention.source(),
            excerpt,
            categories: character.categories().into_iter().cloned().collect(),
        })
    }
}

/// Suggestions for one flagged character
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationSuggestion {
    pub request: RemediationRequest,
    pub suggestions: Vec<String>,
    /// False when the placeholder was used
    pub generated: bool,
}

impl RemediationSuggestion {
    fn placeholder(request: RemediationRequest) -> Self {
        Self {
            request,
            suggestions: vec![NO_SUGGESTION.to_string()],
            generated: false,
        }
    }
}

/// Sentences of `synopsis` naming `character_id` (case-insensitive, whole word)
///
/// Falls back to the first 600 characters when no sentence names the character.
pub fn synopsis_excerpt(synopsis: &str, character_id: &str) -> String {
    let needle = character_id.trim().to_lowercase();
    let mentioning: Vec<&str> = if needle.is_empty() {
        Vec::new()
    } else {
        split_sentences(synopsis)
            .into_iter()
            .filter(|sentence| contains_word(&sentence.to_lowercase(), &needle))
            .collect()
    };

    if mentioning.is_empty() {
        synopsis.trim().chars().take(FALLBACK_EXCERPT_CHARS).collect()
    } else {
        mentioning.join(" ")
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

/// Description of a poster character's visual biases
pub fn poster_excerpt(character: &ScoredCharacter) -> String {
    let mut out = String::from("Identified visual biases in the poster:\n");
    out.push_str(&format!(
        "- For {} (Bias Score: {}):\n",
        character.mention.character_id(),
        character.total_severity()
    ));
    for (category, score) in character.category_scores() {
        out.push_str(&format!("  - Stereotype: '{}' (Score: {})\n", category, score));
    }
    out
}

/// Split generator output into non-empty, trimmed lines
pub fn split_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Requests suggestions for every flagged character of a film
pub struct Remediator {
    generator: Option<Arc<dyn RemediationGenerator>>,
}

impl Remediator {
    pub fn new(generator: Option<Arc<dyn RemediationGenerator>>) -> Self {
        Self { generator }
    }

    /// One suggestion entry per flagged character, in input order
    pub async fn suggest_all(
        &self,
        characters: &[ScoredCharacter],
        synopsis: Option<&str>,
    ) -> Vec<RemediationSuggestion> {
        let mut out = Vec::new();

        for request in characters
            .iter()
            .filter_map(|c| RemediationRequest::for_character(c, synopsis))
        {
            let Some(generator) = &self.generator else {
                out.push(RemediationSuggestion::placeholder(request));
                continue;
            };

            match generator.suggest(&request).await {
                Ok(text) => {
                    let suggestions = split_suggestions(&text);
                    if suggestions.is_empty() {
                        warn!(
                            film_id = %request.film_id,
                            character_id = %request.character_id,
                            generator = generator.name(),
                            "Empty remediation response"
                        );
                        out.push(RemediationSuggestion::placeholder(request));
                    } else {
                        debug!(
                            film_id = %request.film_id,
                            character_id = %request.character_id,
                            suggestions = suggestions.len(),
                            "Remediation generated"
                        );
                        out.push(RemediationSuggestion {
                            request,
                            suggestions,
                            generated: true,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        film_id = %request.film_id,
                        character_id = %request.character_id,
                        generator = generator.name(),
                        error = %e,
                        "Remediation failed; using placeholder"
                    );
                    out.push(RemediationSuggestion::placeholder(request));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionError;
    use crate::scoring::CharacterScorer;
    use async_trait::async_trait;
    use filmbias_common::{CharacterMention, Gender, Taxonomy};

    struct CannedGenerator(Result<String, ()>);

    #[async_trait]
    impl RemediationGenerator for CannedGenerator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn suggest(&self, _request: &RemediationRequest) -> Result<String, ExtractionError> {
            self.0
                .clone()
                .map_err(|_| ExtractionError::Network("connection refused".into()))
        }
    }

    fn scorer() -> CharacterScorer {
        CharacterScorer::new(Arc::new(Taxonomy::builtin()))
    }

    fn simran() -> ScoredCharacter {
        scorer().score(
            &CharacterMention::builder("ddlj", "Simran", MentionSource::Synopsis)
                .gender(Gender::Female)
                .verbs(["waits"])
                .build(),
        )
    }

    const SYNOPSIS: &str = "Raj travels across Europe. Simran waits at home. Raj returns.";

    #[test]
    fn test_synopsis_excerpt() {
        assert_eq!(synopsis_excerpt(SYNOPSIS, "Simran"), "Simran waits at home.");
        assert_eq!(
            synopsis_excerpt(SYNOPSIS, "raj"),
            "Raj travels across Europe. Raj returns."
        );
        // "Ra" is not a whole word anywhere
        assert_eq!(synopsis_excerpt(SYNOPSIS, "Ra"), SYNOPSIS);
    }

    #[test]
    fn test_synopsis_excerpt_fallback_is_bounded() {
        let long = "x".repeat(1000);
        assert_eq!(synopsis_excerpt(&long, "nobody").chars().count(), 600);
    }

    #[test]
    fn test_poster_excerpt() {
        let character = scorer().score(
            &CharacterMention::builder("f", "person 1", MentionSource::Poster)
                .gender(Gender::Male)
                .associated_objects(["gun"])
                .build(),
        );
        let excerpt = poster_excerpt(&character);
        assert!(excerpt.contains("- For person 1 (Bias Score: 2):"));
        assert!(excerpt.contains("  - Stereotype: 'aggressive-masculinity' (Score: 2)"));
    }

    #[test]
    fn test_unflagged_characters_get_no_request() {
        let character = scorer().score(
            &CharacterMention::builder("f", "c", MentionSource::Synopsis)
                .profession("astronaut")
                .build(),
        );
        assert!(RemediationRequest::for_character(&character, Some(SYNOPSIS)).is_none());
    }

    #[tokio::test]
    async fn test_suggestions_split_into_lines() {
        let remediator = Remediator::new(Some(Arc::new(CannedGenerator(Ok(
            "1. Simran plans her own journey.\n\n2. Simran confronts her father.\n".into(),
        )))));
        let out = remediator.suggest_all(&[simran()], Some(SYNOPSIS)).await;

        assert_eq!(out.len(), 1);
        assert!(out[0].generated);
        assert_eq!(out[0].suggestions.len(), 2);
        assert_eq!(out[0].request.excerpt, "Simran waits at home.");
        assert_eq!(out[0].request.categories, vec![Category::new("passive-agency")]);
    }

    #[tokio::test]
    async fn test_failures_degrade_to_placeholder() {
        let failing = Remediator::new(Some(Arc::new(CannedGenerator(Err(())))));
        let out = failing.suggest_all(&[simran()], Some(SYNOPSIS)).await;
        assert_eq!(out[0].suggestions, vec![NO_SUGGESTION.to_string()]);
        assert!(!out[0].generated);

        let empty = Remediator::new(Some(Arc::new(CannedGenerator(Ok("  \n ".into())))));
        let out = empty.suggest_all(&[simran()], Some(SYNOPSIS)).await;
        assert_eq!(out[0].suggestions, vec![NO_SUGGESTION.to_string()]);

        let offline = Remediator::new(None);
        let out = offline.suggest_all(&[simran()], None).await;
        assert_eq!(out[0].suggestions, vec![NO_SUGGESTION.to_string()]);
    }
}
