//! Configuration file management for penman.
//!
//! Provides a TOML-based config file at `~/.config/penman/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use penman_core::provider::{ModelCatalog, ProviderKind, ProviderSettings};
use penman_core::{GeneratorConfig, SectionFailurePolicy};

/// Output directory used when nothing else is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const PROVIDER_ENV: &str = "API_PROVIDER";
pub const OUTPUT_DIR_ENV: &str = "PENMAN_OUTPUT_DIR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// `openrouter` or `gemini`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub openrouter: ProviderSection,
    #[serde(default)]
    pub gemini: ProviderSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner_models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_models: Option<Vec<String>>,
}

impl std::fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSection")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("planner_models", &self.planner_models)
            .field("writer_models", &self.writer_models)
            .finish()
    }
}

/// Pipeline knobs. Every field is optional; unset fields keep the library
/// defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Natural language of the article prose, e.g. `French`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prose_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// `continue` or `abort`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_section_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regeneration_rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_body_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

impl ConfigFile {
    /// The file `penman init` writes: provider and default model lists,
    /// keys left to the environment.
    pub fn starter(provider: ProviderKind) -> Self {
        let section = |kind| {
            let models = ModelCatalog::defaults_for(kind);
            ProviderSection {
                api_key: None,
                base_url: None,
                planner_models: Some(models.planner),
                writer_models: Some(models.writer),
            }
        };
        Self {
            provider: Some(provider.to_string()),
            output_dir: Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
            openrouter: section(ProviderKind::OpenRouter),
            gemini: section(ProviderKind::Gemini),
            generation: GenerationSection::default(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the penman config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/penman` or `~/.config/penman`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("penman");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("penman")
}

/// Return the path to the penman config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file at `path`. A missing file is `Ok(None)`; an
/// unreadable or invalid one is an error.
pub fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` defers to the next layer.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub provider: Option<ProviderKind>,
    pub output_dir: Option<PathBuf>,
    pub strict: bool,
    pub on_section_failure: Option<SectionFailurePolicy>,
    pub concurrency: Option<usize>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PenmanConfig {
    pub generator: GeneratorConfig,
    pub output_dir: PathBuf,
}

impl PenmanConfig {
    /// Resolve from the real environment and the config file at
    /// [`config_path`].
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let file = load_config_from(&config_path())?;
        Self::resolve_from(overrides, file.as_ref(), |name| std::env::var(name).ok())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - provider: `--provider` > `API_PROVIDER` > `provider` > openrouter
    /// - API keys: `OPENROUTER_API_KEY` / `GEMINI_API_KEY` > `[<provider>].api_key`
    /// - output dir: `--output-dir` > `PENMAN_OUTPUT_DIR` > `output_dir` > `output`
    /// - writer knobs: CLI flag > `[generation]` > library default
    pub fn resolve_from(
        overrides: &CliOverrides,
        file: Option<&ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut generator = GeneratorConfig::default();

        generator.default_provider = if let Some(kind) = overrides.provider {
            kind
        } else if let Some(value) = env(PROVIDER_ENV) {
            value
                .parse()
                .with_context(|| format!("invalid {PROVIDER_ENV} environment variable"))?
        } else if let Some(value) = file.and_then(|f| f.provider.as_deref()) {
            value.parse().context("invalid provider in config file")?
        } else {
            ProviderKind::OpenRouter
        };

        for kind in ProviderKind::ALL {
            let section = file.map(|f| match kind {
                ProviderKind::OpenRouter => &f.openrouter,
                ProviderKind::Gemini => &f.gemini,
            });
            *generator.provider_settings_mut(kind) =
                resolve_provider(kind, section, env(kind.api_key_env()));
        }

        if let Some(section) = file.map(|f| &f.generation) {
            apply_generation_section(&mut generator, section)?;
        }

        if let Some(policy) = overrides.on_section_failure {
            generator.writer.failure_policy = policy;
        }
        if let Some(n) = overrides.concurrency {
            generator.writer.concurrency = n;
        }
        if overrides.strict {
            generator.pipeline.strict_validation = true;
        }

        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| env(OUTPUT_DIR_ENV).map(PathBuf::from))
            .or_else(|| file.and_then(|f| f.output_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            generator,
            output_dir,
        })
    }
}

fn resolve_provider(
    kind: ProviderKind,
    section: Option<&ProviderSection>,
    env_key: Option<String>,
) -> ProviderSettings {
    let mut settings = ProviderSettings::defaults_for(kind);
    settings.api_key = env_key.or_else(|| section.and_then(|s| s.api_key.clone()));
    if let Some(section) = section {
        settings.base_url = section.base_url.clone();
        if let Some(models) = non_empty(section.planner_models.as_ref()) {
            settings.models.planner = models;
        }
        if let Some(models) = non_empty(section.writer_models.as_ref()) {
            settings.models.writer = models;
        }
    }
    settings
}

fn non_empty(models: Option<&Vec<String>>) -> Option<Vec<String>> {
    let models: Vec<String> = models?
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    (!models.is_empty()).then_some(models)
}

fn apply_generation_section(config: &mut GeneratorConfig, section: &GenerationSection) -> Result<()> {
    if let Some(lang) = &section.prose_language {
        config.planner.prose_language = lang.clone();
        config.writer.prose_language = lang.clone();
    }
    if let Some(n) = section.concurrency {
        config.writer.concurrency = n;
    }
    if let Some(policy) = &section.on_section_failure {
        config.writer.failure_policy = policy
            .parse()
            .context("invalid on_section_failure in config file")?;
    }
    if let Some(ms) = section.request_delay_ms {
        config.writer.request_delay = Duration::from_millis(ms);
    }
    if let Some(strict) = section.strict_validation {
        config.pipeline.strict_validation = strict;
    }
    if let Some(rounds) = section.regeneration_rounds {
        config.pipeline.regeneration_rounds = rounds;
    }
    if let Some(retries) = section.plan_retries {
        config.planner.plan_retries = retries;
    }
    if let Some(n) = section.min_sections {
        config.validation.min_sections = n;
    }
    if let Some(n) = section.max_sections {
        config.validation.max_sections = n;
    }
    if config.validation.min_sections > config.validation.max_sections {
        anyhow::bail!(
            "invalid section bounds in config file: min_sections ({}) exceeds max_sections ({})",
            config.validation.min_sections,
            config.validation.max_sections
        );
    }
    if let Some(chars) = section.min_body_chars {
        config.validation.min_body_chars = chars;
    }
    if let Some(secs) = section.timeout_secs {
        config.client.timeout = Duration::from_secs(secs);
    }
    if let Some(n) = section.max_in_flight {
        config.client.max_in_flight = n;
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
