//! OpenRouter: OpenAI-compatible chat completions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProviderError;
use super::trait_def::ProviderBackend;
use super::transport::HttpRequest;
use super::types::{GenerationRequest, ProviderKind};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Attribution headers OpenRouter uses for app rankings.
const REFERER: &str = "https://github.com/penman-dev/penman";
const APP_TITLE: &str = "penman";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenRouterBackend {
    api_key: String,
    base_url: String,
}

impl OpenRouterBackend {
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

impl fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderBackend for OpenRouterBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    fn authenticate(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )]
    }

    fn build_request(&self, request: &GenerationRequest) -> HttpRequest {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format: request.wants_json().then_some(ResponseFormatBody {
                kind: "json_object",
            }),
        };

        let mut headers = self.authenticate();
        headers.push(("HTTP-Referer".to_string(), REFERER.to_string()));
        headers.push(("X-Title".to_string(), APP_TITLE.to_string()));

        HttpRequest {
            url: format!("{}/chat/completions", self.base_url),
            headers,
            body: serde_json::to_value(&body).unwrap_or(Value::Null),
        }
    }

    fn parse_response(&self, body: &Value) -> Result<String, ProviderError> {
        let parsed: ChatResponse = serde_json::from_value(body.clone()).map_err(|e| {
            ProviderError::MalformedResponse(format!("unexpected OpenRouter payload: {e}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("OpenRouter response has no choices".into())
            })?;
        if content.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(
                "OpenRouter returned empty content".into(),
            ));
        }
        Ok(content)
    }
}
