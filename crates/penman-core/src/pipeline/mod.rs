//! End-to-end driver: plan, check, expand, check again, regenerate flagged
//! bodies, assemble.
//!
//! # Flow
//!
//! ```text
//! ArticlePlanner::generate_plan
//!     -> ArticleValidator (structure)   warn, or fail when strict
//!     -> PlanSink::save_plan            optional checkpoint, best effort
//!     -> ArticleWriter::expand
//!     -> ArticleValidator (content)
//!     -> ArticleWriter::regenerate      up to `regeneration_rounds` times
//!     -> ArticleDocument::assemble
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::document::ArticleDocument;
use crate::plan::{ArticlePlan, ArticlePlanner, PlanGenerationError};
use crate::provider::{CompletionService, ConfigurationError, ProviderClient, ProviderKind};
use crate::validate::{ArticleValidator, ValidationPass, ValidationResult};
use crate::writer::{ArticleWriter, ContentGenerationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Turn failing validation passes into errors instead of warnings.
    pub strict_validation: bool,
    /// How many times flagged bodies are rewritten and re-checked.
    pub regeneration_rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            regeneration_rounds: 1,
        }
    }
}

/// Receives the validated outline before expansion starts.
#[async_trait]
pub trait PlanSink: Send + Sync {
    async fn save_plan(&self, plan: &ArticlePlan) -> anyhow::Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanSink) {}
};

/// What to write about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRequest {
    pub title: String,
    pub topic: String,
    /// Programming language the article is about.
    pub language: String,
    /// Falls back to [`GeneratorConfig::default_provider`].
    pub provider: Option<ProviderKind>,
}

impl ArticleRequest {
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            topic: topic.into(),
            language: language.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Planning,
    Writing,
    Validation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => f.write_str("configuration"),
            Self::Planning => f.write_str("planning"),
            Self::Writing => f.write_str("writing"),
            Self::Validation => f.write_str("validation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Planning(#[from] PlanGenerationError),

    #[error(transparent)]
    Writing(ContentGenerationError),

    #[error("{pass} validation failed: {}", .result.summary())]
    Validation {
        pass: ValidationPass,
        result: ValidationResult,
    },

    #[error("generation cancelled")]
    Cancelled,
}

impl From<ContentGenerationError> for GenerateError {
    fn from(err: ContentGenerationError) -> Self {
        match err {
            ContentGenerationError::Cancelled => Self::Cancelled,
            other => Self::Writing(other),
        }
    }
}

impl GenerateError {
    /// The stage that failed, or `None` for a cancelled run.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Configuration(_) => Some(Stage::Configuration),
            Self::Planning(_) => Some(Stage::Planning),
            Self::Writing(_) => Some(Stage::Writing),
            Self::Validation { .. } => Some(Stage::Validation),
            Self::Cancelled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    planner: ArticlePlanner,
    writer: ArticleWriter,
    validator: ArticleValidator,
    config: PipelineConfig,
    plan_sink: Option<Arc<dyn PlanSink>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("planner", &self.planner)
            .field("writer", &self.writer)
            .field("validator", &self.validator)
            .field("config", &self.config)
            .field("plan_sink", &self.plan_sink.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        planner: ArticlePlanner,
        writer: ArticleWriter,
        validator: ArticleValidator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            planner,
            writer,
            validator,
            config,
            plan_sink: None,
        }
    }

    /// Wire every stage to `service` using the models configured for its
    /// provider.
    pub fn from_config(config: &GeneratorConfig, service: Arc<dyn CompletionService>) -> Self {
        let models = config.provider_settings(service.provider()).models.clone();
        Self::new(
            ArticlePlanner::new(service.clone(), models.clone(), config.planner.clone()),
            ArticleWriter::new(service, models, config.writer.clone()),
            ArticleValidator::new(config.validation.clone()),
            config.pipeline.clone(),
        )
    }

    pub fn with_plan_sink(mut self, sink: Arc<dyn PlanSink>) -> Self {
        self.plan_sink = Some(sink);
        self
    }

    /// Plan only, with the structure pass applied the same way `run` does.
    pub async fn plan(
        &self,
        title: &str,
        topic: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<(ArticlePlan, ValidationResult), GenerateError> {
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
            plan = self.planner.generate_plan(title, topic, language) => plan?,
        };

        let structure = self.validator.validate_structure(&plan);
        if !structure.passed {
            if self.config.strict_validation {
                return Err(GenerateError::Validation {
                    pass: ValidationPass::Structure,
                    result: structure,
                });
            }
            warn!(issues = structure.issues.len(), "plan structure check failed:\n{}", structure.summary());
        }
        Ok((plan, structure))
    }

    pub async fn run(
        &self,
        title: &str,
        topic: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<ArticleDocument, GenerateError> {
        info!(title, topic, language, "starting article generation");
        let (plan, structure) = self.plan(title, topic, language, cancel).await?;

        if let Some(sink) = &self.plan_sink {
            if let Err(e) = sink.save_plan(&plan).await {
                warn!(error = %e, "failed to save plan checkpoint");
            }
        }

        let expansion = self.writer.expand(plan, cancel).await?;
        let mut plan = expansion.plan;
        let mut failures = expansion.failures;
        let mut content = self.validator.validate_content(&plan);

        for round in 1..=self.config.regeneration_rounds {
            let slots = content.regeneration_slots();
            if slots.is_empty() {
                break;
            }
            info!(round, slots = slots.len(), "content check flagged bodies");
            let regenerated = self.writer.regenerate(plan, &slots, cancel).await?;
            plan = regenerated.plan;
            failures.retain(|f| plan.body(f.slot).is_none());
            content = self.validator.validate_content(&plan);
        }

        if !content.passed {
            if self.config.strict_validation {
                return Err(GenerateError::Validation {
                    pass: ValidationPass::Content,
                    result: content,
                });
            }
            warn!(issues = content.issues.len(), "content check failed:\n{}", content.summary());
        }

        let document = ArticleDocument::assemble(plan, structure.merged(content), failures);
        info!(
            id = %document.id,
            slug = %document.metadata.slug,
            failures = document.failures.len(),
            passed = document.validation.passed,
            "article generated"
        );
        Ok(document)
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

/// Build a [`ProviderClient`] for the request's provider and run the
/// pipeline with a fresh cancellation token.
///
/// A missing credential fails with [`GenerateError::Configuration`] before
/// any network call.
pub async fn generate(
    config: &GeneratorConfig,
    request: ArticleRequest,
) -> Result<ArticleDocument, GenerateError> {
    generate_with_cancel(config, request, &CancellationToken::new()).await
}

/// [`generate`] with a caller-owned cancellation token.
pub async fn generate_with_cancel(
    config: &GeneratorConfig,
    request: ArticleRequest,
    cancel: &CancellationToken,
) -> Result<ArticleDocument, GenerateError> {
    let pipeline = build_pipeline(config, request.provider)?;
    pipeline
        .run(&request.title, &request.topic, &request.language, cancel)
        .await
}

/// Validate configuration for `provider` and wire a pipeline over the real
/// HTTPS client.
pub fn build_pipeline(
    config: &GeneratorConfig,
    provider: Option<ProviderKind>,
) -> Result<Pipeline, ConfigurationError> {
    let kind = provider.unwrap_or(config.default_provider);
    let settings = config.provider_settings(kind);
    settings.models.check(kind)?;
    let client = ProviderClient::new(kind, settings, config.client.clone())?;
    Ok(Pipeline::from_config(config, Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::BodySlot;

    #[test]
    fn stage_names() {
        let err = GenerateError::from(ConfigurationError::Invalid("x".into()));
        assert_eq!(err.stage(), Some(Stage::Configuration));
        assert_eq!(Stage::Planning.to_string(), "planning");
        assert_eq!(GenerateError::Cancelled.stage(), None);
    }

    #[test]
    fn cancelled_writer_maps_to_cancelled() {
        let err = GenerateError::from(ContentGenerationError::Cancelled);
        assert!(matches!(err, GenerateError::Cancelled));

        let err = GenerateError::from(ContentGenerationError::Fatal {
            slot: BodySlot::section(0),
            source: ConfigurationError::Invalid("x".into()).into(),
        });
        assert_eq!(err.stage(), Some(Stage::Writing));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let config = GeneratorConfig::default();
        let err = generate(&config, ArticleRequest::new("T", "t", "Python"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Configuration(ConfigurationError::MissingApiKey {
                provider: ProviderKind::OpenRouter,
                ..
            })
        ));
        assert_eq!(err.stage(), Some(Stage::Configuration));
    }

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert!(!c.strict_validation);
        assert_eq!(c.regeneration_rounds, 1);
    }
}
