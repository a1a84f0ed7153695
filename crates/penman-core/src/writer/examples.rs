//! Tracks code examples already used in earlier bodies so later prompts can
//! ask the model not to repeat them.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static CLASS_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"class\s+([A-Za-z0-9_]+)").expect("valid regex"));

static CONSTRUCTOR_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9_]+)\s*=\s*[A-Za-z0-9_]+\(").expect("valid regex"));

/// Names shorter than this are loop counters and the like.
const MIN_EXAMPLE_NAME_LEN: usize = 4;

#[derive(Debug, Default, Clone)]
pub struct ExampleTracker {
    seen: BTreeSet<String>,
}

impl ExampleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract class names and `name = Call(...)` bindings from `body`.
    pub fn record(&mut self, body: &str) {
        for cap in CLASS_DEF.captures_iter(body) {
            self.seen.insert(format!("class {}", &cap[1]));
        }
        for cap in CONSTRUCTOR_ASSIGN.captures_iter(body) {
            let name = &cap[1];
            if name.len() >= MIN_EXAMPLE_NAME_LEN {
                self.seen.insert(format!("example using {name}"));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Sorted, deduplicated entries.
    pub fn entries(&self) -> Vec<&str> {
        self.seen.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_classes_and_constructor_bindings() {
        let mut t = ExampleTracker::new();
        t.record(
            r#"<pre><code class="language-python">
class BankAccount:
    pass

account = BankAccount()
df = pd.DataFrame()
i = int("3")
</code></pre>"#,
        );
        assert_eq!(
            t.entries(),
            vec!["class BankAccount", "example using account"]
        );
    }

    #[test]
    fn html_class_attribute_is_not_a_class_definition() {
        let mut t = ExampleTracker::new();
        t.record(r#"<code class="language-python">len()</code>"#);
        // `class="` has no whitespace before the name, so nothing matches.
        assert!(t.is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let mut t = ExampleTracker::new();
        t.record("class Stack:\n    pass");
        t.record("class Stack(list):\n    pass");
        assert_eq!(t.len(), 1);
    }
}
