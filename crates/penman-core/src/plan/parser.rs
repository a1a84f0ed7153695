//! Plan response parser with validation.
//!
//! Turns the planner model's JSON outline into an [`ArticlePlan`]:
//! - repairs common LLM JSON damage (see [`super::repair`])
//! - accepts `title` as an alias of `heading` at every level
//! - folds `introduction`, `exercises` and `conclusion` into sections
//! - rejects outlines with no sections or empty headings

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::repair::repair_json;
use super::types::{ArticlePlan, Section, Subsection};

pub const INTRODUCTION_HEADING: &str = "Introduction";
pub const EXERCISES_HEADING: &str = "Exercises";
pub const CONCLUSION_HEADING: &str = "Conclusion";

/// Errors that can occur while parsing a plan response.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("the model returned an empty response")]
    EmptyResponse,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan must contain at least one section")]
    NoSections,

    #[error("section {} has an empty heading", .index + 1)]
    EmptyHeading { index: usize },

    #[error(
        "subsection {} of section {} has an empty heading",
        .subsection + 1,
        .section + 1
    )]
    EmptySubsectionHeading { section: usize, subsection: usize },

    #[error("article title must not be empty")]
    EmptyTitle,

    #[error("malformed plan: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    introduction: Option<Value>,
    #[serde(default)]
    sections: Vec<RawSection>,
    #[serde(default, alias = "exercices")]
    exercises: Vec<RawExercise>,
    #[serde(default)]
    conclusion: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default, alias = "title")]
    heading: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    subsections: Vec<RawSubsection>,
}

#[derive(Debug, Deserialize)]
struct RawSubsection {
    #[serde(default, alias = "title")]
    heading: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExercise {
    #[serde(default, alias = "title")]
    heading: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    solution: Option<String>,
}

/// Parse and validate a planner response for the given article.
pub fn parse_plan_response(
    raw: &str,
    title: &str,
    topic: &str,
    language: &str,
) -> Result<ArticlePlan, PlanParseError> {
    if title.trim().is_empty() {
        return Err(PlanParseError::EmptyTitle);
    }
    if raw.trim().is_empty() {
        return Err(PlanParseError::EmptyResponse);
    }

    let repaired = repair_json(raw);
    let value: Value = serde_json::from_str(&repaired)?;
    if !value.is_object() {
        return Err(PlanParseError::Malformed(
            "expected a JSON object at the top level".into(),
        ));
    }
    let plan: RawPlan = serde_json::from_value(value)?;

    if plan.sections.is_empty() {
        return Err(PlanParseError::NoSections);
    }

    let mut sections = Vec::with_capacity(plan.sections.len() + 3);

    if let Some(intro) = plan.introduction.as_ref().and_then(framing_section_from) {
        sections.push(intro.with_default_heading(INTRODUCTION_HEADING));
    }

    for (index, raw_section) in plan.sections.into_iter().enumerate() {
        let heading = raw_section.heading.trim();
        if heading.is_empty() {
            return Err(PlanParseError::EmptyHeading { index });
        }
        let mut section = Section::new(heading);
        section.description = non_blank(raw_section.description);
        for (sub_index, raw_sub) in raw_section.subsections.into_iter().enumerate() {
            let sub_heading = raw_sub.heading.trim();
            if sub_heading.is_empty() {
                return Err(PlanParseError::EmptySubsectionHeading {
                    section: index,
                    subsection: sub_index,
                });
            }
            let mut sub = Subsection::new(sub_heading);
            sub.description = non_blank(raw_sub.description);
            section.subsections.push(sub);
        }
        sections.push(section);
    }

    if !plan.exercises.is_empty() {
        let mut exercises = Section::new(EXERCISES_HEADING);
        for (i, ex) in plan.exercises.into_iter().enumerate() {
            let heading = match ex.heading.trim() {
                "" => format!("Exercise {}", i + 1),
                h => h.to_string(),
            };
            let description = match (non_blank(ex.description), non_blank(ex.solution)) {
                (Some(d), Some(s)) => Some(format!("{d}\nSolution: {s}")),
                (Some(d), None) => Some(d),
                (None, Some(s)) => Some(format!("Solution: {s}")),
                (None, None) => None,
            };
            let mut sub = Subsection::new(heading);
            sub.description = description;
            exercises.subsections.push(sub);
        }
        sections.push(exercises);
    }

    if let Some(conclusion) = plan.conclusion.as_ref().and_then(framing_section_from) {
        sections.push(conclusion.with_default_heading(CONCLUSION_HEADING));
    }

    Ok(ArticlePlan::new(title.trim(), topic, language, sections))
}

/// Introduction or conclusion before its default heading is known.
struct FramingSection {
    heading: Option<String>,
    description: Option<String>,
}

impl FramingSection {
    fn with_default_heading(self, default: &str) -> Section {
        let mut section = Section::new(self.heading.unwrap_or_else(|| default.to_string()));
        section.description = self.description;
        section
    }
}

/// Accepts a plain string or an object with `heading`/`title` and
/// `description`/`content`. Null and blank values produce nothing.
fn framing_section_from(value: &Value) -> Option<FramingSection> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(FramingSection {
            heading: None,
            description: Some(s.trim().to_string()),
        }),
        Value::Object(map) => {
            let text = |keys: &[&str]| {
                keys.iter()
                    .filter_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::trim)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let heading = text(&["heading", "title"]);
            let description = text(&["description", "content"]);
            (heading.is_some() || description.is_some()).then_some(FramingSection {
                heading,
                description,
            })
        }
        _ => None,
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "introduction": "Présentation des fonctions.",
        "sections": [
            {
                "title": "Définir une fonction",
                "description": "Le mot-clé def",
                "subsections": [
                    {"title": "Syntaxe", "description": "def nom():"},
                    {"heading": "Valeur de retour", "description": "return"}
                ]
            },
            {"heading": "Portée des variables", "subsections": []}
        ],
        "exercises": [
            {"title": "Somme", "description": "Écrire add(a, b)", "solution": "def add(a, b): return a + b"}
        ],
        "conclusion": {"title": "Pour aller plus loin", "description": "Récapitulatif"}
    }"#;

    #[test]
    fn folds_framing_sections_around_main_sections() {
        let plan = parse_plan_response(FULL, "Les Fonctions", "functions", "Python").unwrap();
        let headings: Vec<_> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec![
                "Introduction",
                "Définir une fonction",
                "Portée des variables",
                "Exercises",
                "Pour aller plus loin",
            ]
        );
        assert_eq!(
            plan.sections[0].description.as_deref(),
            Some("Présentation des fonctions.")
        );
        assert_eq!(plan.sections[1].subsections.len(), 2);
        assert_eq!(plan.sections[1].subsections[1].heading, "Valeur de retour");
        let exercise = &plan.sections[3].subsections[0];
        assert_eq!(exercise.heading, "Somme");
        assert!(exercise.description.as_deref().unwrap().contains("Solution: def add"));
        assert_eq!(plan.title, "Les Fonctions");
        assert_eq!(plan.language, "Python");
    }

    #[test]
    fn fenced_and_truncated_response_is_repaired() {
        let raw = "```json\n{\"sections\": [{\"heading\": \"Bases\", \"subsections\": [{\"heading\": \"Def";
        let plan = parse_plan_response(raw, "T", "t", "Rust").unwrap();
        assert_eq!(plan.sections[0].heading, "Bases");
        assert_eq!(plan.sections[0].subsections[0].heading, "Def");
    }

    #[test]
    fn reasoning_prefix_with_braces_is_skipped() {
        let raw = "<think>The user wants {sections} as JSON.</think>\n{\"sections\": [{\"heading\": \"A\"}]}";
        let plan = parse_plan_response(raw, "T", "t", "Go").unwrap();
        assert_eq!(plan.sections.len(), 1);
        assert_eq!(plan.sections[0].heading, "A");
    }

    #[test]
    fn brace_in_plain_preamble_is_skipped() {
        let raw = "Here is the {outline}:\n{\"sections\": [{\"heading\": \"B\"}]}";
        let plan = parse_plan_response(raw, "T", "t", "Go").unwrap();
        assert_eq!(plan.sections[0].heading, "B");
    }

    #[test]
    fn zero_sections_is_rejected() {
        let raw = r#"{"introduction": "x", "sections": [], "conclusion": "y"}"#;
        assert!(matches!(
            parse_plan_response(raw, "T", "t", "Go"),
            Err(PlanParseError::NoSections)
        ));
    }

    #[test]
    fn empty_headings_are_rejected() {
        let raw = r#"{"sections": [{"heading": "A"}, {"heading": "  "}]}"#;
        assert!(matches!(
            parse_plan_response(raw, "T", "t", "Go"),
            Err(PlanParseError::EmptyHeading { index: 1 })
        ));

        let raw = r#"{"sections": [{"heading": "A", "subsections": [{"description": "d"}]}]}"#;
        assert!(matches!(
            parse_plan_response(raw, "T", "t", "Go"),
            Err(PlanParseError::EmptySubsectionHeading {
                section: 0,
                subsection: 0
            })
        ));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            parse_plan_response("  ", "T", "t", "Go"),
            Err(PlanParseError::EmptyResponse)
        ));
        assert!(matches!(
            parse_plan_response(FULL, " ", "t", "Go"),
            Err(PlanParseError::EmptyTitle)
        ));
    }

    #[test]
    fn prose_is_a_json_error() {
        assert!(matches!(
            parse_plan_response("I cannot produce JSON today.", "T", "t", "Go"),
            Err(PlanParseError::Json(_))
        ));
    }

    #[test]
    fn top_level_array_is_malformed() {
        assert!(matches!(
            parse_plan_response("[1, 2, 3]", "T", "t", "Go"),
            Err(PlanParseError::Malformed(_))
        ));
    }

    #[test]
    fn null_framing_values_are_skipped() {
        let raw = r#"{"introduction": null, "sections": [{"heading": "A"}], "conclusion": ""}"#;
        let plan = parse_plan_response(raw, "T", "t", "Go").unwrap();
        assert_eq!(plan.sections.len(), 1);
    }
}
