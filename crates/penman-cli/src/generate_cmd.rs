//! `penman generate`: run the full pipeline and write the HTML article.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use penman_core::pipeline::build_pipeline;
use penman_core::{ArticleDocument, ArticleRequest, GenerateError, Pipeline};

use crate::checkpoint::JsonPlanSink;
use crate::config::PenmanConfig;
use crate::html::HtmlAssembler;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_generate(
    config: &PenmanConfig,
    request: ArticleRequest,
    save_plan: bool,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let mut pipeline = build_pipeline(&config.generator, request.provider)
        .map_err(|e| stage_error(e.into()))?;
    if save_plan {
        pipeline = pipeline.with_plan_sink(Arc::new(JsonPlanSink::new(&config.output_dir)));
    }
    let assembler = HtmlAssembler::new(&config.generator.writer.prose_language);
    write_article(&pipeline, &assembler, &request, &config.output_dir, cancel).await
}

/// Run `pipeline` for `request` and write the result under `output_dir`.
/// Nothing is written when the run fails.
pub async fn write_article(
    pipeline: &Pipeline,
    assembler: &HtmlAssembler,
    request: &ArticleRequest,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let doc = pipeline
        .run(&request.title, &request.topic, &request.language, cancel)
        .await
        .map_err(stage_error)?;
    let path = assembler.write(&doc, output_dir)?;
    print_summary(&doc, &path);
    Ok(path)
}

/// `<stage> stage failed: <reason>`, or `generation cancelled`.
pub fn stage_error(err: GenerateError) -> anyhow::Error {
    match err.stage() {
        Some(stage) => anyhow::anyhow!("{stage} stage failed: {err}"),
        None => anyhow::anyhow!("generation cancelled"),
    }
}

fn print_summary(doc: &ArticleDocument, path: &Path) {
    let slots = doc.plan.slots().len();
    println!("Article written to {}", path.display());
    println!("  Title:     {}", doc.plan.title);
    println!("  Sections:  {}", doc.plan.sections.len());
    println!("  Bodies:    {}/{}", slots - doc.failures.len(), slots);
    if !doc.failures.is_empty() {
        println!();
        println!("Sections not generated:");
        for failure in &doc.failures {
            println!("  - {} \"{}\": {}", failure.slot, failure.heading, failure.error);
        }
    }
    if !doc.validation.passed {
        println!();
        println!("Validation: {}", doc.validation.summary());
    }
}
