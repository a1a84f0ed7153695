//! Provider identifiers and the per-call request value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ConfigurationError;

/// The closed set of supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    Gemini,
}

impl ProviderKind {
    /// Every supported provider, in display order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenRouter, ProviderKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable that carries this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigurationError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Which pipeline stage a model list serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Planner,
    Writer,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planner => f.write_str("planner"),
            Self::Writer => f.write_str("writer"),
        }
    }
}

/// Expected shape of the completion text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free text (HTML fragments for section bodies).
    Text,
    /// A single JSON object.
    JsonObject,
}

/// One completion call. Built once per attempt by the planner or writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Provider that must serve the request.
    pub provider: ProviderKind,
    /// Provider-specific model identifier.
    pub model: String,
    /// Full user prompt.
    pub prompt: String,
    /// Optional response-format hint forwarded to the provider.
    pub response_format: Option<ResponseFormat>,
}

impl GenerationRequest {
    pub fn new(provider: ProviderKind, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompt: prompt.into(),
            response_format: None,
        }
    }

    /// Ask the provider for a JSON object response.
    pub fn expect_json(mut self) -> Self {
        self.response_format = Some(ResponseFormat::JsonObject);
        self
    }

    pub fn wants_json(&self) -> bool {
        self.response_format == Some(ResponseFormat::JsonObject)
    }
}
