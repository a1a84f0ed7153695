//! `--save-plan`: write the validated outline next to the article before
//! expansion starts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use penman_core::PlanSink;
use penman_core::plan::ArticlePlan;
use penman_core::seo::slugify;

/// Writes `<slug>_plan.json` into a directory.
#[derive(Debug, Clone)]
pub struct JsonPlanSink {
    dir: PathBuf,
}

impl JsonPlanSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, plan: &ArticlePlan) -> PathBuf {
        plan_path(&self.dir, plan)
    }
}

pub fn plan_path(dir: &Path, plan: &ArticlePlan) -> PathBuf {
    dir.join(format!("{}_plan.json", slugify(&plan.title)))
}

#[async_trait]
impl PlanSink for JsonPlanSink {
    async fn save_plan(&self, plan: &ArticlePlan) -> Result<()> {
        let path = self.path_for(plan);
        let json = serde_json::to_string_pretty(plan).context("failed to serialize plan")?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write plan checkpoint {}", path.display()))?;
        info!(path = %path.display(), "plan checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penman_core::plan::{Section, Subsection};

    #[tokio::test]
    async fn writes_pretty_json_named_after_the_slug() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sink = JsonPlanSink::new(tmp.path().join("out"));
        let plan = ArticlePlan::new(
            "Les Fonctions en Python",
            "functions",
            "Python",
            vec![Section::new("Bases").with_subsection(Subsection::new("def"))],
        );

        sink.save_plan(&plan).await.unwrap();

        let path = tmp.path().join("out").join("les-fonctions-en-python_plan.json");
        let saved: ArticlePlan =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, plan);
    }
}
