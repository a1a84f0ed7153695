//! Prompts for the planner model.

/// Opening line of every planner prompt. Test fakes match on it.
pub const PLAN_MARKER: &str = "Create a detailed outline for an article";

/// Build the first-attempt prompt.
pub fn build_plan_prompt(title: &str, topic: &str, language: &str, prose_language: &str) -> String {
    format!(
        r#"{PLAN_MARKER} about "{topic}" titled "{title}".
The outline must follow a clear teaching progression.

REQUIREMENTS:
- The article is EXCLUSIVELY about the {language} programming language, its features and its applications.
- The outline MUST contain:
  1. An introduction presenting the subject and why it matters in {language}.
  2. Four main sections with clear headings, all related to {language}.
  3. For each main section, 2 to 3 subsections, each with example titles.
  4. A section of practical use cases.
  5. Three exercises with their solutions; exercise code is in English.
  6. A conclusion summarising the key points.
- Examples must not repeat each other; neither may exercises.
- All {language} identifiers and all code are in English. All prose is in {prose_language}.

OUTPUT FORMAT: a single JSON object with these keys:
- "introduction": introduction text
- "sections": list of objects with
    - "heading": section heading
    - "description": what the section covers
    - "subsections": list of objects with
        - "heading": subsection heading
        - "description": detailed description of the subsection content (REQUIRED)
- "exercises": list of objects with "heading", "description" and "solution"
- "conclusion": conclusion text

Every subsection MUST have a heading AND a detailed description.
Return only the JSON object, no markdown fences and no commentary."#
    )
}

/// Build a retry prompt that quotes why the previous answer was rejected.
pub fn build_retry_prompt(
    title: &str,
    topic: &str,
    language: &str,
    prose_language: &str,
    previous_error: &str,
) -> String {
    format!(
        "{}\n\nYOUR PREVIOUS ANSWER WAS REJECTED: {previous_error}\n\
         Reply again with one complete, valid JSON object that follows the format above exactly. \
         The \"sections\" list must not be empty and every heading must be non-empty.",
        build_plan_prompt(title, topic, language, prose_language)
    )
}
