//! SEO metadata derived from the request and the final outline.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::plan::ArticlePlan;

/// Longest meta description search engines display in full.
pub const MAX_DESCRIPTION_CHARS: usize = 160;
pub const MAX_KEYWORDS: usize = 12;
pub const MAX_SLUG_LENGTH: usize = 80;

/// Words that never make useful keywords (French and English).
const STOP_WORDS: &[&str] = &[
    "les", "des", "une", "pour", "avec", "dans", "sur", "par", "aux", "est", "que", "qui", "son",
    "ses", "leur", "vos", "nos", "the", "and", "for", "with", "from", "into", "your", "how",
    "what", "introduction", "conclusion", "exercises",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub slug: String,
}

impl SeoMetadata {
    pub fn derive(plan: &ArticlePlan) -> Self {
        Self {
            title: plan.title.clone(),
            description: describe(plan),
            keywords: keywords(plan),
            slug: slugify(&plan.title),
        }
    }

    pub fn keywords_csv(&self) -> String {
        self.keywords.join(", ")
    }
}

fn describe(plan: &ArticlePlan) -> String {
    let text = format!(
        "{} : {} en {}.",
        plan.title.trim(),
        plan.topic.trim(),
        plan.language.trim()
    );
    truncate_chars(&text, MAX_DESCRIPTION_CHARS)
}

/// Cut at a word boundary with an ellipsis if `text` is over `max` chars.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    let cut = match cut.rfind(' ') {
        Some(i) if i > max / 2 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}

fn keywords(plan: &ArticlePlan) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |word: &str, out: &mut Vec<String>| {
        let w = word.trim().to_lowercase();
        if !w.is_empty() && out.len() < MAX_KEYWORDS && seen.insert(w.clone()) {
            out.push(w);
        }
    };

    push(&plan.language, &mut out);
    for word in significant_words(&plan.topic) {
        push(word, &mut out);
    }
    for section in &plan.sections {
        for word in significant_words(&section.heading) {
            push(word, &mut out);
        }
    }
    out
}

fn significant_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '+' && c != '#')
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
}

/// Lowercase ASCII slug: accents folded, everything else collapsed into
/// single hyphens, no leading or trailing hyphen.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if let Some(folded) = fold_accent(c) {
            slug.push_str(folded);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.len() > MAX_SLUG_LENGTH {
        slug.truncate(MAX_SLUG_LENGTH);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("article");
    }
    slug
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'Á' | 'À' | 'Ä' | 'Â' | 'Ã' | 'Å' => "a",
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => "e",
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => "i",
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'ø' | 'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' | 'Ø' => "o",
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        _ => return None,
    };
    Some(folded)
}
