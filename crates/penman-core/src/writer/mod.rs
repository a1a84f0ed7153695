//! Content expansion: one completion per section and subsection body.
//!
//! With `concurrency == 1` bodies are written strictly in document order
//! and each prompt lists the examples earlier bodies already used. With
//! `concurrency > 1` requests go through an order-preserving buffered
//! stream, so results are applied in the same order either way.

pub mod examples;
pub mod prompt;

use std::fmt;
use std::pin::pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::plan::{ArticlePlan, BodySlot};
use crate::provider::{
    CompletionService, ConfigurationError, GenerationRequest, ModelCatalog, ModelRole,
    ProviderError,
};

pub use examples::ExampleTracker;
pub use prompt::{SECTION_MARKER, build_section_prompt};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when one body cannot be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionFailurePolicy {
    /// Leave the body empty, record a [`SectionFailure`], keep going.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

impl fmt::Display for SectionFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("continue"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for SectionFailurePolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(ConfigurationError::Invalid(format!(
                "unknown section failure policy {other:?} (expected continue or abort)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub failure_policy: SectionFailurePolicy,
    /// Maximum bodies requested at once. 0 and 1 both mean sequential.
    pub concurrency: usize,
    /// Extra attempts when a body comes back empty or undecodable.
    pub content_retries: u32,
    /// Pause between consecutive requests in sequential mode.
    pub request_delay: Duration,
    pub prose_language: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            failure_policy: SectionFailurePolicy::default(),
            concurrency: 1,
            content_retries: 1,
            request_delay: Duration::ZERO,
            prose_language: "French".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ContentGenerationError {
    #[error("failed to write {slot} \"{heading}\": {source}")]
    Section {
        slot: BodySlot,
        heading: String,
        #[source]
        source: ProviderError,
    },

    #[error("cannot continue writing ({slot}): {source}")]
    Fatal {
        slot: BodySlot,
        #[source]
        source: ProviderError,
    },

    #[error("content generation cancelled")]
    Cancelled,
}

/// A body the writer gave up on under [`SectionFailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFailure {
    pub slot: BodySlot,
    pub heading: String,
    pub error: String,
}

/// Output of [`ArticleWriter::expand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub plan: ArticlePlan,
    pub failures: Vec<SectionFailure>,
}

enum SlotOutcome {
    Written(String),
    Failed(ProviderError),
    Cancelled,
}

// ---------------------------------------------------------------------------
// ArticleWriter
// ---------------------------------------------------------------------------

pub struct ArticleWriter {
    service: Arc<dyn CompletionService>,
    models: ModelCatalog,
    config: WriterConfig,
}

impl fmt::Debug for ArticleWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleWriter")
            .field("provider", &self.service.provider())
            .field("models", &self.models.writer)
            .field("config", &self.config)
            .finish()
    }
}

impl ArticleWriter {
    pub fn new(service: Arc<dyn CompletionService>, models: ModelCatalog, config: WriterConfig) -> Self {
        Self {
            service,
            models,
            config,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write every body of `plan`. Headings are never changed.
    pub async fn expand(
        &self,
        plan: ArticlePlan,
        cancel: &CancellationToken,
    ) -> Result<Expansion, ContentGenerationError> {
        let slots = plan.slots();
        info!(
            slots = slots.len(),
            concurrency = self.config.concurrency.max(1),
            policy = %self.config.failure_policy,
            "expanding article plan"
        );
        self.fill(plan, &slots, ExampleTracker::new(), cancel, self.config.failure_policy)
            .await
    }

    /// Rewrite only `slots`. A slot that fails again keeps its previous body.
    ///
    /// Prompts list the examples used by every body that is kept.
    pub async fn regenerate(
        &self,
        plan: ArticlePlan,
        slots: &[BodySlot],
        cancel: &CancellationToken,
    ) -> Result<Expansion, ContentGenerationError> {
        let mut tracker = ExampleTracker::new();
        for kept in plan.slots().into_iter().filter(|s| !slots.contains(s)) {
            if let Some(body) = plan.body(kept) {
                tracker.record(body);
            }
        }
        info!(
            slots = slots.len(),
            known_examples = tracker.len(),
            "regenerating flagged bodies"
        );
        self.fill(plan, slots, tracker, cancel, SectionFailurePolicy::Continue)
            .await
    }

    async fn fill(
        &self,
        mut plan: ArticlePlan,
        slots: &[BodySlot],
        mut tracker: ExampleTracker,
        cancel: &CancellationToken,
        policy: SectionFailurePolicy,
    ) -> Result<Expansion, ContentGenerationError> {
        let mut failures = Vec::new();

        if self.config.concurrency <= 1 {
            for (i, &slot) in slots.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(ContentGenerationError::Cancelled);
                }
                if i > 0 && !self.config.request_delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ContentGenerationError::Cancelled),
                        _ = tokio::time::sleep(self.config.request_delay) => {}
                    }
                }
                let prompt = build_section_prompt(
                    &plan,
                    slot,
                    &self.config.prose_language,
                    &tracker.entries(),
                );
                match self.write_slot(&plan, slot, prompt, cancel).await {
                    SlotOutcome::Written(body) => {
                        tracker.record(&body);
                        plan.set_body(slot, body);
                    }
                    SlotOutcome::Failed(err) => {
                        self.handle_failure(&plan, slot, err, policy, &mut failures)?
                    }
                    SlotOutcome::Cancelled => return Err(ContentGenerationError::Cancelled),
                }
            }
        } else {
            let used = tracker.entries();
            let work: Vec<(BodySlot, String)> = slots
                .iter()
                .map(|&slot| {
                    (
                        slot,
                        build_section_prompt(&plan, slot, &self.config.prose_language, &used),
                    )
                })
                .collect();
            let snapshot = &plan.clone();
            let mut results = pin!(
                stream::iter(work)
                    .map(|(slot, prompt)| async move {
                        (slot, self.write_slot(snapshot, slot, prompt, cancel).await)
                    })
                    .buffered(self.config.concurrency)
            );
            while let Some((slot, outcome)) = results.next().await {
                match outcome {
                    SlotOutcome::Written(body) => {
                        plan.set_body(slot, body);
                    }
                    SlotOutcome::Failed(err) => {
                        self.handle_failure(&plan, slot, err, policy, &mut failures)?
                    }
                    SlotOutcome::Cancelled => return Err(ContentGenerationError::Cancelled),
                }
            }
        }

        info!(
            written = slots.len() - failures.len(),
            failed = failures.len(),
            "expansion finished"
        );
        Ok(Expansion { plan, failures })
    }

    /// Request one body, retrying empty or undecodable answers.
    async fn write_slot(
        &self,
        plan: &ArticlePlan,
        slot: BodySlot,
        prompt: String,
        cancel: &CancellationToken,
    ) -> SlotOutcome {
        let provider = self.service.provider();
        let heading = plan.heading_path(slot).unwrap_or_default();
        let max_attempts = self.config.content_retries.saturating_add(1);
        let mut last_error = ProviderError::MalformedResponse("no attempt made".into());

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return SlotOutcome::Cancelled;
            }
            let model = match self.models.choose(provider, ModelRole::Writer) {
                Ok(model) => model,
                Err(err) => return SlotOutcome::Failed(err.into()),
            };
            let request = GenerationRequest::new(provider, model, prompt.clone());
            info!(%slot, heading = %heading, model, attempt, "writing section");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SlotOutcome::Cancelled,
                result = self.service.complete(&request) => result,
            };

            match result {
                Ok(body) if !body.trim().is_empty() => {
                    debug!(%slot, chars = body.len(), "section written");
                    return SlotOutcome::Written(body);
                }
                Ok(_) => {
                    warn!(%slot, attempt, "model returned an empty body");
                    last_error = ProviderError::MalformedResponse("empty section body".into());
                }
                Err(ProviderError::MalformedResponse(msg)) => {
                    warn!(%slot, attempt, error = %msg, "section response unusable");
                    last_error = ProviderError::MalformedResponse(msg);
                }
                Err(err) => return SlotOutcome::Failed(err),
            }
        }
        SlotOutcome::Failed(last_error)
    }

    fn handle_failure(
        &self,
        plan: &ArticlePlan,
        slot: BodySlot,
        err: ProviderError,
        policy: SectionFailurePolicy,
        failures: &mut Vec<SectionFailure>,
    ) -> Result<(), ContentGenerationError> {
        let heading = plan.heading_path(slot).unwrap_or_default();
        if err.is_fatal() {
            return Err(ContentGenerationError::Fatal { slot, source: err });
        }
        match policy {
            SectionFailurePolicy::Abort => Err(ContentGenerationError::Section {
                slot,
                heading,
                source: err,
            }),
            SectionFailurePolicy::Continue => {
                warn!(%slot, heading = %heading, error = %err, "section failed, continuing without it");
                failures.push(SectionFailure {
                    slot,
                    heading,
                    error: err.to_string(),
                });
                Ok(())
            }
        }
    }
}
