//! Resolved generator configuration.
//!
//! Built once by the caller (the CLI resolves CLI flags, environment and
//! config file into it) and passed by reference into [`crate::generate`].

use crate::pipeline::PipelineConfig;
use crate::plan::PlannerConfig;
use crate::provider::{ClientOptions, ProviderKind, ProviderSettings};
use crate::validate::ValidationConfig;
use crate::writer::WriterConfig;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Provider used when the request does not name one.
    pub default_provider: ProviderKind,
    pub openrouter: ProviderSettings,
    pub gemini: ProviderSettings,
    pub client: ClientOptions,
    pub planner: PlannerConfig,
    pub writer: WriterConfig,
    pub validation: ValidationConfig,
    pub pipeline: PipelineConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::OpenRouter,
            openrouter: ProviderSettings::defaults_for(ProviderKind::OpenRouter),
            gemini: ProviderSettings::defaults_for(ProviderKind::Gemini),
            client: ClientOptions::default(),
            planner: PlannerConfig::default(),
            writer: WriterConfig::default(),
            validation: ValidationConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn provider_settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenRouter => &self.openrouter,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    pub fn provider_settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenRouter => &mut self.openrouter,
            ProviderKind::Gemini => &mut self.gemini,
        }
    }
}
