//! Google Gemini via the native `generateContent` endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProviderError;
use super::trait_def::ProviderBackend;
use super::transport::HttpRequest;
use super::types::{GenerationRequest, ProviderKind};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiBackend {
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderBackend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn authenticate(&self) -> Vec<(String, String)> {
        vec![("x-goog-api-key".to_string(), self.api_key.clone())]
    }

    fn build_request(&self, request: &GenerationRequest) -> HttpRequest {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.wants_json().then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        HttpRequest {
            url: format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ),
            headers: self.authenticate(),
            body: serde_json::to_value(&body).unwrap_or(Value::Null),
        }
    }

    fn parse_response(&self, body: &Value) -> Result<String, ProviderError> {
        let parsed: GenerateContentResponse = serde_json::from_value(body.clone())
            .map_err(|e| {
                ProviderError::MalformedResponse(format!("unexpected Gemini payload: {e}"))
            })?;
        let parts = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("Gemini response has no candidates".into())
            })?;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(
                "Gemini returned empty content".into(),
            ));
        }
        Ok(text)
    }
}
