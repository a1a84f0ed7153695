//! Best-effort cleanup of LLM JSON output before deserialization.
//!
//! Models wrap JSON in markdown fences, prefix it with prose, append
//! commentary after it, or get cut off mid-object. [`repair_json`] handles
//! those cases; anything else is left for serde to reject.

use std::sync::LazyLock;

use regex::Regex;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static DANGLING_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(,|\{)\s*"(?:[^"\\]|\\.)*"\s*$"#).expect("valid regex"));

/// Remove a surrounding markdown code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Turn a model response into the most plausible single JSON object.
///
/// - drops `<think>` reasoning blocks, fences and prose before the object
/// - cuts everything after the brace that closes the top-level object
/// - closes an unterminated string, drops a dangling key or comma, fills a
///   dangling `:` with `null`, then closes open brackets and braces
/// - removes trailing commas before `}` / `]`
///
/// Prose may itself contain braces, so each top-level `{` is tried in turn
/// and the first balanced candidate that deserializes wins. When none does,
/// the first balanced candidate is returned so serde reports a useful error.
pub fn repair_json(text: &str) -> String {
    let without_reasoning = THINK_BLOCK.replace_all(text, "");
    let unfenced = strip_code_fence(&without_reasoning);

    let mut fallback: Option<String> = None;
    let mut offset = 0;
    while let Some(found) = unfenced[offset..].find('{') {
        let candidate = &unfenced[offset + found..];
        let scan = scan_object(candidate);
        match scan.end {
            Some(end) => {
                let balanced = TRAILING_COMMA
                    .replace_all(&candidate[..end], "$1")
                    .into_owned();
                if serde_json::from_str::<serde_json::Value>(&balanced).is_ok() {
                    return balanced;
                }
                fallback.get_or_insert(balanced);
                offset += found + end;
            }
            None => {
                let closed = close_truncated(candidate, &scan.stack, scan.in_string);
                return TRAILING_COMMA.replace_all(&closed, "$1").into_owned();
            }
        }
    }

    fallback.unwrap_or_else(|| unfenced.to_string())
}

struct Scan {
    /// Byte offset just past the brace closing the object, if it closes.
    end: Option<usize>,
    stack: Vec<char>,
    in_string: bool,
}

/// Walk `candidate` (which starts at a `{`) tracking strings and nesting.
fn scan_object(candidate: &str) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in candidate.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                if stack.is_empty() {
                    return Scan {
                        end: Some(i + c.len_utf8()),
                        stack,
                        in_string,
                    };
                }
            }
            _ => {}
        }
    }

    Scan {
        end: None,
        stack,
        in_string,
    }
}

fn close_truncated(candidate: &str, stack: &[char], in_string: bool) -> String {
    let mut out = candidate.trim_end().to_string();
    if in_string {
        // A trailing lone backslash would escape our closing quote.
        if out.ends_with('\\') && !out.ends_with("\\\\") {
            out.pop();
        }
        out.push('"');
    }

    if stack.last() == Some(&'}') {
        if let Some(m) = DANGLING_KEY.find(&out) {
            let keep_brace = out[m.start()..].starts_with('{');
            out.truncate(m.start());
            if keep_brace {
                out.push('{');
            }
        }
    }

    let trimmed = out.trim_end();
    if trimmed.ends_with(',') {
        out = trimmed[..trimmed.len() - 1].to_string();
    } else if trimmed.ends_with(':') {
        out = format!("{trimmed} null");
    }

    for closer in stack.iter().rev() {
        out.push(*closer);
    }
    out
}
