//! The closed set of provider variants and their per-provider settings.
//!
//! New providers are added as [`Provider`] variants; the match arms below
//! are the only dispatch points.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ConfigurationError, ProviderError};
use super::gemini::GeminiBackend;
use super::openrouter::OpenRouterBackend;
use super::trait_def::ProviderBackend;
use super::transport::HttpRequest;
use super::types::{GenerationRequest, ModelRole, ProviderKind};

// ---------------------------------------------------------------------------
// ModelCatalog
// ---------------------------------------------------------------------------

/// Model identifiers per role. One is picked at random for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub planner: Vec<String>,
    pub writer: Vec<String>,
}

impl ModelCatalog {
    pub fn defaults_for(kind: ProviderKind) -> Self {
        let model = match kind {
            ProviderKind::OpenRouter => "deepseek/deepseek-r1-0528:free",
            ProviderKind::Gemini => "gemini-3-flash-preview",
        };
        Self {
            planner: vec![model.to_string()],
            writer: vec![model.to_string()],
        }
    }

    pub fn models(&self, role: ModelRole) -> &[String] {
        match role {
            ModelRole::Planner => &self.planner,
            ModelRole::Writer => &self.writer,
        }
    }

    /// Pick a model for `role` uniformly at random.
    pub fn choose(&self, provider: ProviderKind, role: ModelRole) -> Result<&str, ConfigurationError> {
        self.models(role)
            .choose(&mut rand::rng())
            .map(String::as_str)
            .ok_or(ConfigurationError::NoModels { provider, role })
    }

    /// Both role lists must be non-empty.
    pub fn check(&self, provider: ProviderKind) -> Result<(), ConfigurationError> {
        for role in [ModelRole::Planner, ModelRole::Writer] {
            if self.models(role).iter().all(|m| m.trim().is_empty()) {
                return Err(ConfigurationError::NoModels { provider, role });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProviderSettings
// ---------------------------------------------------------------------------

/// Everything needed to talk to one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    /// Override of the provider's default endpoint (proxies, tests).
    pub base_url: Option<String>,
    pub models: ModelCatalog,
}

impl ProviderSettings {
    pub fn defaults_for(kind: ProviderKind) -> Self {
        Self {
            api_key: None,
            base_url: None,
            models: ModelCatalog::defaults_for(kind),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The configured key, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Provider {
    OpenRouter(OpenRouterBackend),
    Gemini(GeminiBackend),
}

impl Provider {
    /// Build the backend for `kind`, failing if no credential is configured.
    pub fn from_settings(
        kind: ProviderKind,
        settings: &ProviderSettings,
    ) -> Result<Self, ConfigurationError> {
        let key = settings
            .api_key()
            .ok_or(ConfigurationError::MissingApiKey {
                provider: kind,
                env_var: kind.api_key_env(),
            })?;
        let base_url = settings.base_url.clone();
        Ok(match kind {
            ProviderKind::OpenRouter => Self::OpenRouter(OpenRouterBackend::new(key, base_url)),
            ProviderKind::Gemini => Self::Gemini(GeminiBackend::new(key, base_url)),
        })
    }

    fn backend(&self) -> &dyn ProviderBackend {
        match self {
            Self::OpenRouter(b) => b,
            Self::Gemini(b) => b,
        }
    }
}

impl ProviderBackend for Provider {
    fn kind(&self) -> ProviderKind {
        self.backend().kind()
    }

    fn authenticate(&self) -> Vec<(String, String)> {
        self.backend().authenticate()
    }

    fn build_request(&self, request: &GenerationRequest) -> HttpRequest {
        self.backend().build_request(request)
    }

    fn parse_response(&self, body: &Value) -> Result<String, ProviderError> {
        self.backend().parse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_configuration_error() {
        let settings = ProviderSettings::defaults_for(ProviderKind::Gemini);
        let err = Provider::from_settings(ProviderKind::Gemini, &settings).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingApiKey {
                provider: ProviderKind::Gemini,
                env_var: "GEMINI_API_KEY",
            }
        );
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let settings = ProviderSettings::defaults_for(ProviderKind::OpenRouter).with_api_key("  ");
        assert!(Provider::from_settings(ProviderKind::OpenRouter, &settings).is_err());
    }

    #[test]
    fn builds_matching_variant() {
        let settings = ProviderSettings::defaults_for(ProviderKind::OpenRouter).with_api_key("k");
        let provider = Provider::from_settings(ProviderKind::OpenRouter, &settings).unwrap();
        assert!(matches!(provider, Provider::OpenRouter(_)));
        assert_eq!(provider.kind(), ProviderKind::OpenRouter);
    }

    #[test]
    fn choose_picks_from_role_list() {
        let catalog = ModelCatalog {
            planner: vec!["p1".into(), "p2".into()],
            writer: vec!["w1".into()],
        };
        for _ in 0..20 {
            let m = catalog.choose(ProviderKind::Gemini, ModelRole::Planner).unwrap();
            assert!(m == "p1" || m == "p2");
        }
        assert_eq!(
            catalog.choose(ProviderKind::Gemini, ModelRole::Writer).unwrap(),
            "w1"
        );
    }

    #[test]
    fn empty_role_list_is_rejected() {
        let catalog = ModelCatalog {
            planner: vec!["p".into()],
            writer: vec![],
        };
        assert_eq!(
            catalog.check(ProviderKind::OpenRouter),
            Err(ConfigurationError::NoModels {
                provider: ProviderKind::OpenRouter,
                role: ModelRole::Writer,
            })
        );
        assert!(catalog.choose(ProviderKind::OpenRouter, ModelRole::Writer).is_err());
    }

    #[test]
    fn settings_debug_redacts_key() {
        let settings = ProviderSettings::defaults_for(ProviderKind::Gemini).with_api_key("AIza-secret");
        assert!(!format!("{settings:?}").contains("AIza-secret"));
    }
}
