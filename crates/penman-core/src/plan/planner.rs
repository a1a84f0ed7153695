//! [`ArticlePlanner`]: one or more planner calls until a usable outline
//! comes back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::parser::{PlanParseError, parse_plan_response};
use super::prompt::{build_plan_prompt, build_retry_prompt};
use super::types::ArticlePlan;
use crate::provider::{
    CompletionService, ConfigurationError, GenerationRequest, ModelCatalog, ModelRole,
    ProviderError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Extra attempts after the first when the response does not parse.
    pub plan_retries: u32,
    /// Natural language of the article prose.
    pub prose_language: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            plan_retries: 2,
            prose_language: "French".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanGenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no usable plan after {attempts} attempt(s): {last_error}")]
    Unparseable {
        attempts: u32,
        last_error: PlanParseError,
    },
}

impl From<ConfigurationError> for PlanGenerationError {
    fn from(err: ConfigurationError) -> Self {
        Self::Provider(err.into())
    }
}

pub struct ArticlePlanner {
    service: Arc<dyn CompletionService>,
    models: ModelCatalog,
    config: PlannerConfig,
}

impl std::fmt::Debug for ArticlePlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticlePlanner")
            .field("provider", &self.service.provider())
            .field("models", &self.models.planner)
            .field("config", &self.config)
            .finish()
    }
}

impl ArticlePlanner {
    pub fn new(
        service: Arc<dyn CompletionService>,
        models: ModelCatalog,
        config: PlannerConfig,
    ) -> Self {
        Self {
            service,
            models,
            config,
        }
    }

    /// Ask the model for an outline, re-asking with the parse error quoted
    /// when the answer cannot be used.
    ///
    /// Provider errors are returned immediately; the client has already
    /// retried the transient ones.
    pub async fn generate_plan(
        &self,
        title: &str,
        topic: &str,
        language: &str,
    ) -> Result<ArticlePlan, PlanGenerationError> {
        if title.trim().is_empty() {
            return Err(PlanGenerationError::Unparseable {
                attempts: 0,
                last_error: PlanParseError::EmptyTitle,
            });
        }

        let provider = self.service.provider();
        let max_attempts = self.config.plan_retries.saturating_add(1);
        let prose = &self.config.prose_language;
        let mut last_error: Option<PlanParseError> = None;

        for attempt in 1..=max_attempts {
            let prompt = match &last_error {
                None => build_plan_prompt(title, topic, language, prose),
                Some(err) => build_retry_prompt(title, topic, language, prose, &err.to_string()),
            };
            let model = self.models.choose(provider, ModelRole::Planner)?;
            let request = GenerationRequest::new(provider, model, prompt).expect_json();

            info!(%provider, model, attempt, title, "generating article plan");
            let raw = match self.service.complete(&request).await {
                Ok(raw) => raw,
                // A non-JSON body is a parse problem worth re-asking about.
                Err(ProviderError::MalformedResponse(msg)) => {
                    warn!(attempt, error = %msg, "planner response unusable");
                    last_error = Some(PlanParseError::Malformed(msg));
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match parse_plan_response(&raw, title, topic, language) {
                Ok(plan) => {
                    info!(
                        attempt,
                        sections = plan.sections.len(),
                        slots = plan.slots().len(),
                        "article plan ready"
                    );
                    return Ok(plan);
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "plan response rejected");
                    last_error = Some(err);
                }
            }
        }

        Err(PlanGenerationError::Unparseable {
            attempts: max_attempts,
            last_error: last_error.unwrap_or(PlanParseError::EmptyResponse),
        })
    }
}
