//! Structural and heuristic checks over an [`ArticlePlan`].
//!
//! Two passes:
//! - **structure** runs on the outline: section count and headings
//! - **content** runs on the expanded plan: every body present, long
//!   enough, not just its heading repeated, and free of markdown fences
//!
//! The validator never mutates the plan. Issues carry the [`BodySlot`] they
//! refer to so the pipeline can regenerate exactly the flagged bodies.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::plan::{ArticlePlan, BodySlot};

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_sections: usize,
    pub max_sections: usize,
    /// Minimum visible characters (tags stripped) in each body.
    pub min_body_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_sections: 3,
            max_sections: 10,
            min_body_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPass {
    Structure,
    Content,
}

impl fmt::Display for ValidationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure => f.write_str("structure"),
            Self::Content => f.write_str("content"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SectionCount,
    EmptyHeading,
    DuplicateHeading,
    MissingBody,
    ShortBody,
    EchoedHeading,
    MarkdownSyntax,
}

impl IssueKind {
    /// Whether rewriting the body could fix the issue.
    pub fn warrants_regeneration(&self) -> bool {
        matches!(
            self,
            Self::MissingBody | Self::ShortBody | Self::EchoedHeading
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SectionCount => "section_count",
            Self::EmptyHeading => "empty_heading",
            Self::DuplicateHeading => "duplicate_heading",
            Self::MissingBody => "missing_body",
            Self::ShortBody => "short_body",
            Self::EchoedHeading => "echoed_heading",
            Self::MarkdownSyntax => "markdown_syntax",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<BodySlot>,
    /// Heading path, or `"article"` for plan-wide issues.
    pub location: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            Some(slot) => write!(
                f,
                "[{}] {} \"{}\": {}",
                self.kind, slot, self.location, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.kind, self.location, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            passed: issues.is_empty(),
            issues,
        }
    }

    pub fn ok() -> Self {
        Self::from_issues(Vec::new())
    }

    /// Slots whose issues a rewrite could fix, in document order.
    pub fn regeneration_slots(&self) -> Vec<BodySlot> {
        self.issues
            .iter()
            .filter(|i| i.kind.warrants_regeneration())
            .filter_map(|i| i.slot)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Issues of both results, `self` first.
    pub fn merged(mut self, other: ValidationResult) -> Self {
        self.issues.extend(other.issues);
        Self::from_issues(self.issues)
    }

    /// One line per issue, prefixed with a count.
    pub fn summary(&self) -> String {
        if self.passed {
            return "no issues".to_string();
        }
        let mut out = format!("{} issue(s)", self.issues.len());
        for issue in &self.issues {
            out.push_str("\n  ");
            out.push_str(&issue.to_string());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ArticleValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ArticleValidator {
    config: ValidationConfig,
}

impl ArticleValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(&self, plan: &ArticlePlan, pass: ValidationPass) -> ValidationResult {
        let issues = match pass {
            ValidationPass::Structure => self.structure_issues(plan),
            ValidationPass::Content => self.content_issues(plan),
        };
        ValidationResult::from_issues(issues)
    }

    pub fn validate_structure(&self, plan: &ArticlePlan) -> ValidationResult {
        self.validate(plan, ValidationPass::Structure)
    }

    pub fn validate_content(&self, plan: &ArticlePlan) -> ValidationResult {
        self.validate(plan, ValidationPass::Content)
    }

    fn structure_issues(&self, plan: &ArticlePlan) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let count = plan.sections.len();
        let (min, max) = (self.config.min_sections, self.config.max_sections);

        if count < min || count > max {
            issues.push(ValidationIssue {
                kind: IssueKind::SectionCount,
                slot: None,
                location: "article".to_string(),
                message: format!("{count} section(s), expected between {min} and {max}"),
            });
        }

        let mut seen = HashSet::new();
        for (i, section) in plan.sections.iter().enumerate() {
            let heading = section.heading.trim();
            if heading.is_empty() {
                issues.push(ValidationIssue {
                    kind: IssueKind::EmptyHeading,
                    slot: Some(BodySlot::section(i)),
                    location: format!("section {}", i + 1),
                    message: "section heading is empty".to_string(),
                });
            } else if !seen.insert(heading.to_lowercase()) {
                issues.push(ValidationIssue {
                    kind: IssueKind::DuplicateHeading,
                    slot: Some(BodySlot::section(i)),
                    location: heading.to_string(),
                    message: "another section has the same heading".to_string(),
                });
            }

            for (j, sub) in section.subsections.iter().enumerate() {
                if sub.heading.trim().is_empty() {
                    issues.push(ValidationIssue {
                        kind: IssueKind::EmptyHeading,
                        slot: Some(BodySlot::subsection(i, j)),
                        location: format!("{} - subsection {}", section.heading, j + 1),
                        message: "subsection heading is empty".to_string(),
                    });
                }
            }
        }
        issues
    }

    fn content_issues(&self, plan: &ArticlePlan) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for slot in plan.slots() {
            let location = plan.heading_path(slot).unwrap_or_default();
            let issue = |kind, message: String| ValidationIssue {
                kind,
                slot: Some(slot),
                location: location.clone(),
                message,
            };

            let body = match plan.body(slot) {
                Some(body) if !body.trim().is_empty() => body,
                _ => {
                    issues.push(issue(IssueKind::MissingBody, "body is missing".to_string()));
                    continue;
                }
            };

            let text = visible_text(body).to_lowercase();
            let heading = plan.heading(slot).unwrap_or_default().trim().to_lowercase();
            if text == heading || text == location.to_lowercase() {
                issues.push(issue(
                    IssueKind::EchoedHeading,
                    "body only repeats its heading".to_string(),
                ));
            } else {
                let chars = text.chars().count();
                if chars < self.config.min_body_chars {
                    issues.push(issue(
                        IssueKind::ShortBody,
                        format!(
                            "{chars} visible character(s), expected at least {}",
                            self.config.min_body_chars
                        ),
                    ));
                }
            }

            if body.contains("```") {
                issues.push(issue(
                    IssueKind::MarkdownSyntax,
                    "body contains a markdown code fence".to_string(),
                ));
            }
        }
        issues
    }
}

/// Body text with tags removed and whitespace collapsed.
pub fn visible_text(html: &str) -> String {
    let stripped = HTML_TAG.replace_all(html, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Section, Subsection};

    fn body(n: usize) -> String {
        format!("<p>{}</p>", "Les fonctions structurent le code. ".repeat(n))
    }

    fn outline(headings: &[&str]) -> ArticlePlan {
        ArticlePlan::new(
            "T",
            "t",
            "Python",
            headings.iter().map(|h| Section::new(*h)).collect(),
        )
    }

    #[test]
    fn structure_passes_for_reasonable_outline() {
        let v = ArticleValidator::default();
        let r = v.validate_structure(&outline(&["Intro", "Corps", "Conclusion"]));
        assert!(r.passed, "{}", r.summary());
    }

    #[test]
    fn structure_flags_section_count() {
        let v = ArticleValidator::default();
        let r = v.validate_structure(&outline(&["Seule"]));
        assert!(!r.passed);
        assert_eq!(r.issues[0].kind, IssueKind::SectionCount);
        assert_eq!(r.issues[0].slot, None);

        let many: Vec<String> = (0..11).map(|i| format!("S{i}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        assert!(!v.validate_structure(&outline(&refs)).passed);
    }

    #[test]
    fn structure_flags_empty_and_duplicate_headings() {
        let mut plan = outline(&["Intro", "Intro ", ""]);
        plan.sections[0]
            .subsections
            .push(Subsection::new("  "));
        let r = ArticleValidator::default().validate_structure(&plan);
        let kinds: Vec<_> = r.issues.iter().map(|i| (i.kind, i.slot)).collect();
        assert!(kinds.contains(&(IssueKind::DuplicateHeading, Some(BodySlot::section(1)))));
        assert!(kinds.contains(&(IssueKind::EmptyHeading, Some(BodySlot::section(2)))));
        assert!(kinds.contains(&(IssueKind::EmptyHeading, Some(BodySlot::subsection(0, 0)))));
    }

    #[test]
    fn content_flags_missing_short_and_echoed_bodies() {
        let mut plan = outline(&["Intro", "Corps", "Conclusion"]);
        plan.sections[0].body = Some(body(10));
        plan.sections[1].body = Some("<p>trop court</p>".into());
        plan.sections[2].body = Some("<h2> conclusion </h2>".into());
        plan.sections[1].subsections.push(Subsection::new("Détail"));

        let r = ArticleValidator::default().validate_content(&plan);
        let kinds: Vec<_> = r.issues.iter().map(|i| (i.kind, i.slot)).collect();
        assert_eq!(
            kinds,
            vec![
                (IssueKind::ShortBody, Some(BodySlot::section(1))),
                (IssueKind::MissingBody, Some(BodySlot::subsection(1, 0))),
                (IssueKind::EchoedHeading, Some(BodySlot::section(2))),
            ]
        );
        assert_eq!(
            r.regeneration_slots(),
            vec![
                BodySlot::section(1),
                BodySlot::subsection(1, 0),
                BodySlot::section(2)
            ]
        );
    }

    #[test]
    fn markdown_fence_is_flagged_but_not_regenerated() {
        let mut plan = outline(&["Intro", "Corps", "Conclusion"]);
        for s in &mut plan.sections {
            s.body = Some(body(10));
        }
        plan.sections[1].body = Some(format!("{}\n```python\nprint(1)\n```", body(10)));
        let r = ArticleValidator::default().validate_content(&plan);
        assert_eq!(r.issues.len(), 1);
        assert_eq!(r.issues[0].kind, IssueKind::MarkdownSyntax);
        assert!(r.regeneration_slots().is_empty());
    }

    #[test]
    fn validation_does_not_mutate() {
        let plan = outline(&["A", "B", "C"]);
        let before = plan.clone();
        let _ = ArticleValidator::default().validate(&plan, ValidationPass::Content);
        assert_eq!(plan, before);
    }

    #[test]
    fn visible_text_strips_tags_and_collapses_whitespace() {
        assert_eq!(
            visible_text("<p>Une <strong>fonction</strong>\n\n  utile</p>"),
            "Une fonction utile"
        );
    }

    #[test]
    fn merged_recomputes_passed() {
        let a = ValidationResult::ok();
        let b = ValidationResult::from_issues(vec![ValidationIssue {
            kind: IssueKind::MissingBody,
            slot: Some(BodySlot::section(0)),
            location: "Intro".into(),
            message: "body is missing".into(),
        }]);
        let m = a.merged(b);
        assert!(!m.passed);
        assert!(m.summary().starts_with("1 issue(s)"));
        assert!(m.summary().contains("[missing_body] §1 \"Intro\""));
    }
}
