//! Gemini `generateContent` client used as the entity extractor.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slotwise_core::ExtractedEntities;
use tracing::{debug, info};

use crate::collaborator::EntityExtractor;
use crate::error::CollaboratorError;
use crate::prompt::build_prompt;
use crate::response::parse_llm_response;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-lite";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`GeminiExtractor`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Without a key every extraction fails with [`CollaboratorError::MissingApiKey`].
    pub api_key: Option<String>,
    pub model: String,
    /// Like `https://generativelanguage.googleapis.com` (no trailing slash needed).
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Near-deterministic sampling with a short reply budget.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

const GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.1,
    top_p: 0.95,
    max_output_tokens: 500,
};

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

impl GeminiExtractor {
    pub fn new(config: GeminiConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            model: config.model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, CollaboratorError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GENERATION,
        };

        let url = self.endpoint();
        debug!(url = %url, model = %self.model, "calling Gemini");
        let resp = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| self.request_error(e))?;
        parsed
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::MalformedResponse("empty response from model".into()))
    }

    fn request_error(&self, e: reqwest::Error) -> CollaboratorError {
        if e.is_timeout() {
            CollaboratorError::Timeout(self.timeout_secs)
        } else {
            CollaboratorError::Http(e)
        }
    }
}

#[async_trait]
impl EntityExtractor for GeminiExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractedEntities, CollaboratorError> {
        let api_key = self.api_key.as_deref().ok_or(CollaboratorError::MissingApiKey)?;
        if text.trim().is_empty() {
            return Err(CollaboratorError::EmptyInput);
        }

        let reply = self.generate(api_key, &build_prompt(text)).await?;
        let entities = parse_llm_response(&reply)?;
        info!(
            found = entities.found_count(),
            confidence = entities.confidence,
            "extracted entities"
        );
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: "hello" }],
            }],
            generation_config: GENERATION,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
        assert!((json["generationConfig"]["topP"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn reads_first_candidate_text() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"date_phrase\": \"tomorrow\"}"}], "role": "model"}}
            ]
        }"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_text(), Some("{\"date_phrase\": \"tomorrow\"}"));
    }

    #[test]
    fn blocked_reply_has_no_text() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(resp.first_text().is_none());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let extractor = GeminiExtractor::new(GeminiConfig {
            base_url: "http://localhost:8080/".into(),
            model: "test-model".into(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(
            extractor.endpoint(),
            "http://localhost:8080/v1beta/models/test-model:generateContent"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let extractor = GeminiExtractor::new(GeminiConfig {
            api_key: Some("  ".into()),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert!(matches!(
            extractor.extract("dentist tomorrow").await,
            Err(CollaboratorError::MissingApiKey)
        ));
    }
}
