//! Prompt for a single section or subsection body.

use crate::plan::{ArticlePlan, BodySlot};

/// Line that introduces the heading being written. Test fakes match on
/// `"{SECTION_MARKER} \"{heading path}\""`.
pub const SECTION_MARKER: &str = "Section to write:";

pub fn build_section_prompt(
    plan: &ArticlePlan,
    slot: BodySlot,
    prose_language: &str,
    used_examples: &[&str],
) -> String {
    let heading = plan.heading_path(slot).unwrap_or_default();
    let description = plan
        .description(slot)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Main content for: {heading}"));
    let lang = &plan.language;
    let lang_class = plan.language.to_lowercase().replace(' ', "-");

    let preceding = plan.preceding_headings(slot);
    let preceding = if preceding.is_empty() {
        "(this is the first part of the article)".to_string()
    } else {
        preceding
            .iter()
            .map(|h| format!("- {h}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let avoid = if used_examples.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nEXAMPLES ALREADY USED, DO NOT REUSE:\n{}",
            used_examples
                .iter()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"[CONTEXT]
You are an expert {lang} technical writer producing content for a professional blog article.
Article: "{title}" about {topic}.
{SECTION_MARKER} "{heading}"
Section description: {description}

Already covered by earlier parts:
{preceding}

[GOAL]
Write ONLY the final content of this section, with no reasoning and no metadata.

[ABSOLUTE CONSTRAINTS]
- Write in {prose_language}, EXCEPT code and code comments, which are in English.
- Use ONLY these HTML tags: <p>, <ul>, <ol>, <li>, <strong>, <em>, <pre>, <code>.
- Code blocks are <pre><code class="language-{lang_class}">...</code></pre>.
- Inline code is <code class="language-{lang_class}">...</code>.
- NEVER use Markdown syntax (no ``` fences, no **, no leading dashes).
- NEVER include the section heading.
- NEVER start with "In this section", "Here is" or similar.
- NEVER describe your reasoning or repeat these instructions.{avoid}

[REQUIRED STRUCTURE]
1. Progressive and pedagogical, from simple to advanced.
2. Precise and specific to {lang}.
3. Illustrated with original code examples, different from the ones already used.
4. Coherent paragraphs with an implicit conclusion.

[START OF YOUR ANSWER]"#,
        title = plan.title,
        topic = plan.topic,
    )
}
