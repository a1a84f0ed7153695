//! Error taxonomy for provider configuration and completion calls.

use std::time::Duration;

use thiserror::Error;

use super::types::{ModelRole, ProviderKind};

/// Invalid or incomplete configuration. Always fatal, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{provider} API key not configured; set {env_var} or add it to the config file")]
    MissingApiKey {
        provider: ProviderKind,
        env_var: &'static str,
    },

    #[error("unsupported provider {0:?} (expected openrouter or gemini)")]
    UnsupportedProvider(String),

    #[error("no {role} models configured for {provider}")]
    NoModels {
        provider: ProviderKind,
        role: ModelRole,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single completion call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{provider} rejected the credential (HTTP {status}): {message}")]
    Authentication {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by {provider}")]
    RateLimited {
        provider: ProviderKind,
        retry_after: Option<Duration>,
    },

    #[error("{provider} returned HTTP {status}: {message}")]
    Request {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Transport failures, timeouts and rate limits may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::RateLimited { .. }
        )
    }

    /// Configuration and credential faults abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Authentication { .. })
    }
}

/// Map an HTTP status to an error, or `None` for 2xx.
pub(crate) fn classify_status(
    provider: ProviderKind,
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> Option<ProviderError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(ProviderError::Authentication {
            provider,
            status,
            message: snippet(body),
        }),
        408 => Some(ProviderError::Transport(format!(
            "{provider} returned HTTP 408 request timeout"
        ))),
        429 => Some(ProviderError::RateLimited {
            provider,
            retry_after,
        }),
        500..=599 => Some(ProviderError::Transport(format!(
            "{provider} returned HTTP {status}: {}",
            snippet(body)
        ))),
        _ => Some(ProviderError::Request {
            provider,
            status,
            message: snippet(body),
        }),
    }
}

/// Truncate a response body for inclusion in error messages.
pub(crate) fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
