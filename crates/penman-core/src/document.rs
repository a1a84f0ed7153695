//! The finished article as handed to renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::ArticlePlan;
use crate::seo::SeoMetadata;
use crate::validate::ValidationResult;
use crate::writer::SectionFailure;

/// Output of one pipeline run. Not modified after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub id: Uuid,
    pub plan: ArticlePlan,
    pub metadata: SeoMetadata,
    pub generated_at: DateTime<Utc>,
    /// Structure and final content issues, in that order.
    pub validation: ValidationResult,
    pub failures: Vec<SectionFailure>,
}

impl ArticleDocument {
    pub fn assemble(
        plan: ArticlePlan,
        validation: ValidationResult,
        failures: Vec<SectionFailure>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            metadata: SeoMetadata::derive(&plan),
            plan,
            generated_at: Utc::now(),
            validation,
            failures,
        }
    }

    /// True when every body was written and validation found nothing.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.validation.passed
    }
}
