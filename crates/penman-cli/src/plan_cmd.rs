//! `penman plan`: generate and print the outline only.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use penman_core::ArticleRequest;
use penman_core::pipeline::build_pipeline;

use crate::config::PenmanConfig;
use crate::generate_cmd::stage_error;

/// Print the validated outline as pretty JSON on stdout. Structure issues go
/// to stderr so the JSON stays pipeable.
pub async fn run_plan(
    config: &PenmanConfig,
    request: ArticleRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let pipeline = build_pipeline(&config.generator, request.provider)
        .map_err(|e| stage_error(e.into()))?;
    let (plan, structure) = pipeline
        .plan(&request.title, &request.topic, &request.language, cancel)
        .await
        .map_err(stage_error)?;

    let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
    println!("{json}");

    if !structure.passed {
        eprintln!("Structure check: {}", structure.summary());
    }
    Ok(())
}
