//! Gemini client
//!
//! Calls the Gemini `generateContent` REST endpoint for all three provider
//! roles: poster analysis (image + prompt), synopsis parsing (text prompt)
//! and remediation (text prompt).
//!
//! # API Reference
//! - Endpoint: `POST {base_url}/models/{model}:generateContent`
//! - Auth: `x-goog-api-key` header (never in the URL, which ends up in error text)
//! - Request: `{"contents":[{"parts":[{"text":...},{"inline_data":{"mime_type":...,"data":<base64>}}]}]}`
//! - Response text: `candidates[0].content.parts[*].text`
//!
//! Requests are spaced by a configurable minimum interval. There is no retry:
//! a failed call is reported to the caller, which isolates it to one poster,
//! synopsis or excerpt.

use super::response_parser::{parse_poster_response, parse_synopsis_response};
use super::{ExtractionError, PosterAnalyzer, RemediationGenerator, SynopsisParser};
use crate::remediation::RemediationRequest;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use filmbias_common::config::GeminiConfig;
use filmbias_common::{CharacterMention, MentionSource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

/// User-Agent header
const USER_AGENT: &str = concat!("filmbias-ai/", env!("CARGO_PKG_VERSION"));

const POSTER_PROMPT: &str = r#"Analyze this movie poster for potential gender stereotypes.
Identify all people in the poster. For each person, provide:
- Apparent gender (male, female, ambiguous, unknown)
- Brief description of clothing
- Brief description of pose or action
- List of prominent objects or symbols associated with the person
- Any visual elements that suggest traditional gender roles or stereotypes for that person

Format the output as a JSON object with a list of "characters", where each character is an object with the keys "id", "gender", "clothing", "pose", "associated_objects" and "stereotypes_detected". If no people are detected, the "characters" list must be empty. Respond with JSON only."#;

const SYNOPSIS_PROMPT: &str = r#"Read the following movie plot synopsis and list its characters.
For each character, provide:
- "name": the name or title used for the character
- "gender": male, female or unknown
- "profession": the character's occupation, if stated
- "verbs": verbs describing what the character does (the character is the subject)
- "relationships": family or social roles of the character (mother, husband, boss, ...)
- "appearance": words describing the character's looks or physical traits

Format the output as a JSON object {"characters": [...]}. Respond with JSON only.

Synopsis:
"#;

/// Gemini REST client
///
/// Implements [`PosterAnalyzer`], [`SynopsisParser`] and [`RemediationGenerator`].
pub struct GeminiClient {
    /// HTTP client for API requests
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
    /// Minimum spacing between two requests
    min_interval: Duration,
    /// Rate limiter (last request time)
    rate_limiter: Arc<Mutex<Option<Instant>>>,
}

impl GeminiClient {
    /// Create a client from the `[gemini]` config section and a resolved key
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self, ExtractionError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractionError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            rate_limiter: Arc::new(Mutex::new(None)),
        })
    }

    /// Model name requests are sent to
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Sleep if the previous request was less than `min_interval` ago
    async fn enforce_rate_limit(&self) {
        let mut last_request = self.rate_limiter.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let sleep_duration = self.min_interval - elapsed;
                debug!(
                    sleep_ms = sleep_duration.as_millis(),
                    "Rate limiting: sleeping before Gemini request"
                );
                sleep(sleep_duration).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Send one `generateContent` request and return the concatenated text
    async fn generate(&self, parts: Vec<RequestPart>) -> Result<String, ExtractionError> {
        self.enforce_rate_limit().await;

        let request = GenerateContentRequest {
            contents: vec![RequestContent { parts }],
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ExtractionError::Network(format!("Gemini request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            ExtractionError::Parse(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = parsed.text().ok_or_else(|| {
            ExtractionError::Parse("Gemini response contained no candidate text".to_string())
        })?;

        debug!(model = %self.model, chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

/// MIME type of an image file, sniffed from its magic bytes
fn image_mime_type(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

#[async_trait]
impl PosterAnalyzer for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn analyze_poster(
        &self,
        film_id: &str,
        poster: &Path,
    ) -> Result<Vec<CharacterMention>, ExtractionError> {
        let bytes = tokio::fs::read(poster).await?;
        let mime_type = image_mime_type(&bytes).ok_or_else(|| {
            ExtractionError::Parse(format!("{} is not a recognized image", poster.display()))
        })?;

        debug!(
            film_id = %film_id,
            poster = %poster.display(),
            mime_type,
            bytes = bytes.len(),
            "Sending poster to Gemini"
        );

        let text = self
            .generate(vec![
                RequestPart::Text {
                    text: POSTER_PROMPT.to_string(),
                },
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: STANDARD.encode(&bytes),
                    },
                },
            ])
            .await?;

        let label = poster
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_poster_response(film_id, &label, &text)
    }
}

#[async_trait]
impl SynopsisParser for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn parse_synopsis(
        &self,
        film_id: &str,
        synopsis: &str,
    ) -> Result<Vec<CharacterMention>, ExtractionError> {
        let text = self
            .generate(vec![RequestPart::Text {
                text: format!("{}{}", SYNOPSIS_PROMPT, synopsis),
            }])
            .await?;
        parse_synopsis_response(film_id, &text)
    }
}

#[async_trait]
impl RemediationGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn suggest(&self, request: &RemediationRequest) -> Result<String, ExtractionError> {
        let text = self
            .generate(vec![RequestPart::Text {
                text: remediation_prompt(request),
            }])
            .await?;
        Ok(text.trim().to_string())
    }
}

fn remediation_prompt(request: &RemediationRequest) -> String {
    let categories = request
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    match request.source {
        MentionSource::Poster => format!(
            "Based on the following identified visual biases in a movie poster for \"{}\":\n\n\
             {}\n\n\
             Please suggest ways to alter the poster's visual elements (character poses, \
             clothing, composition, associated objects) to reduce or eliminate these gender \
             stereotypes, while keeping the overall theme and genre of a Bollywood movie poster.\n\n\
             Provide concise and actionable suggestions, one per line.",
            request.film_id, request.excerpt
        ),
        MentionSource::Synopsis => format!(
            "The following text excerpt from a movie plot synopsis has been identified with \
             potential gender stereotypes.\n\
             Original text: \"{}\"\n\
             Identified stereotypes: {}\n\n\
             Please provide a few alternative phrasings or suggestions to rewrite this text to \
             reduce or eliminate these stereotypes, while preserving the original narrative \
             intent as much as possible. Give one suggestion per line.",
            request.excerpt, categories
        ),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filmbias_common::model::Category;

    #[test]
    fn test_endpoint_format() {
        let config = GeminiConfig {
            base_url: "https://example.test/v1beta/".to_string(),
            model: "gemini-test".to_string(),
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new("key", &config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(client.model(), "gemini-test");
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: "describe".to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
    }

    #[test]
    fn test_response_text_extraction() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"characters\":"},{"text":"[]}"}],"role":"model"}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"characters\":[]}"));

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(blocked.text().is_none());
    }

    #[test]
    fn test_image_mime_type() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(image_mime_type(&png), Some("image/png"));
        assert_eq!(image_mime_type(b"plain text, not an image"), None);
    }

    #[test]
    fn test_remediation_prompts() {
        let synopsis = RemediationRequest {
            film_id: "ddlj".to_string(),
            character_id: "Simran".to_string(),
            source: MentionSource::Synopsis,
            excerpt: "Simran waits for Raj.".to_string(),
            categories: vec![Category::new("passive-agency")],
        };
        let prompt = remediation_prompt(&synopsis);
        assert!(prompt.contains("Original text: \"Simran waits for Raj.\""));
        assert!(prompt.contains("Identified stereotypes: passive-agency"));

        let poster = RemediationRequest {
            source: MentionSource::Poster,
            excerpt: "- For person 1 (Bias Score: 2)".to_string(),
            ..synopsis
        };
        let prompt = remediation_prompt(&poster);
        assert!(prompt.contains("\"ddlj\""));
        assert!(prompt.contains("- For person 1 (Bias Score: 2)"));
    }

    #[tokio::test]
    async fn test_network_error_does_not_leak_api_key() {
        // Nothing listens on the discard port
        let config = GeminiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 5,
            min_request_interval_ms: 0,
            ..GeminiConfig::default()
        };
        let client = GeminiClient::new("SECRET-KEY-123", &config).unwrap();

        let err = client
            .parse_synopsis("ddlj", "Simran waits.")
            .await
            .unwrap_err();
        assert!(err.is_provider_unavailable());
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    }
}
