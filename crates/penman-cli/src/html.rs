//! HTML assembly: render an [`ArticleDocument`] into the embedded page
//! template and write it to the output directory.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::info;

use penman_core::ArticleDocument;
use penman_core::plan::BodySlot;

const TEMPLATE: &str = include_str!("../templates/article.html");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-z_]+)\}\}").expect("valid regex"));

static MARKDOWN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*[ \t]*\n?").expect("valid regex"));

static BARE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<code\s*>").expect("valid regex"));

static INLINE_BACKTICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// Renders documents with the built-in template.
#[derive(Debug, Clone)]
pub struct HtmlAssembler {
    prose_language: String,
}

impl HtmlAssembler {
    pub fn new(prose_language: impl Into<String>) -> Self {
        Self {
            prose_language: prose_language.into(),
        }
    }

    pub fn render(&self, doc: &ArticleDocument) -> String {
        let (html_lang, toc_label) = locale(&self.prose_language);
        let plan = &doc.plan;
        let lang_class = language_class(&plan.language);

        let mut toc = String::new();
        let mut content = String::new();
        for (i, section) in plan.sections.iter().enumerate() {
            let id = anchor(BodySlot::section(i));
            toc.push_str(&format!(
                "                <li><a href=\"#{id}\">{}</a>",
                escape_html(&section.heading)
            ));
            content.push_str(&format!(
                "        <section id=\"{id}\">\n            <h2>{}</h2>\n",
                escape_html(&section.heading)
            ));
            push_body(&mut content, section.body.as_deref(), &lang_class);

            if !section.subsections.is_empty() {
                toc.push_str("\n                    <ol>\n");
                for (j, sub) in section.subsections.iter().enumerate() {
                    let sub_id = anchor(BodySlot::subsection(i, j));
                    toc.push_str(&format!(
                        "                        <li><a href=\"#{sub_id}\">{}</a></li>\n",
                        escape_html(&sub.heading)
                    ));
                    content.push_str(&format!(
                        "            <h3 id=\"{sub_id}\">{}</h3>\n",
                        escape_html(&sub.heading)
                    ));
                    push_body(&mut content, sub.body.as_deref(), &lang_class);
                }
                toc.push_str("                    </ol>\n                ");
            }
            toc.push_str("</li>\n");
            content.push_str("        </section>\n");
        }

        let meta = &doc.metadata;
        PLACEHOLDER
            .replace_all(TEMPLATE, |caps: &Captures<'_>| match &caps[1] {
                "html_lang" => html_lang.to_string(),
                "title" => escape_html(&meta.title),
                "description" => escape_html(&meta.description),
                "keywords" => escape_html(&meta.keywords_csv()),
                "language" => escape_html(&plan.language),
                "slug" => meta.slug.clone(),
                "generated_at" => doc.generated_at.to_rfc3339(),
                "generated_date" => doc.generated_at.format("%Y-%m-%d").to_string(),
                "toc_label" => toc_label.to_string(),
                "toc" => toc.trim_end().to_string(),
                "content" => content.trim_end().to_string(),
                other => format!("{{{{{other}}}}}"),
            })
            .into_owned()
    }

    /// Render `doc` and write it as `<YYYYmmdd-HHMMSS>_<slug>.html` under
    /// `output_dir`, creating the directory if needed.
    pub fn write(&self, doc: &ArticleDocument, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory {}", output_dir.display())
        })?;
        let path = output_dir.join(output_file_name(doc));
        std::fs::write(&path, self.render(doc))
            .with_context(|| format!("failed to write article to {}", path.display()))?;
        info!(path = %path.display(), "article written");
        Ok(path)
    }
}

pub fn output_file_name(doc: &ArticleDocument) -> String {
    format!(
        "{}_{}.html",
        doc.generated_at.format("%Y%m%d-%H%M%S"),
        doc.metadata.slug
    )
}

/// Remove stray markdown fences, turn leftover `` `inline` `` markdown into
/// `<strong>`, and give bare `<code>` tags the article's language class.
pub fn clean_body(body: &str, lang_class: &str) -> String {
    let unfenced = MARKDOWN_FENCE.replace_all(body, "");
    let emphasised = INLINE_BACKTICK.replace_all(&unfenced, "<strong>$1</strong>");
    BARE_CODE
        .replace_all(&emphasised, format!("<code class=\"language-{lang_class}\">").as_str())
        .trim()
        .to_string()
}

fn push_body(out: &mut String, body: Option<&str>, lang_class: &str) {
    match body {
        Some(body) => {
            for line in clean_body(body, lang_class).lines() {
                out.push_str("            ");
                out.push_str(line);
                out.push('\n');
            }
        }
        None => out.push_str("            <!-- not generated -->\n"),
    }
}

fn anchor(slot: BodySlot) -> String {
    match slot.subsection {
        Some(j) => format!("section-{}-{}", slot.section + 1, j + 1),
        None => format!("section-{}", slot.section + 1),
    }
}

fn language_class(language: &str) -> String {
    language.trim().to_lowercase().replace(' ', "-")
}

/// `lang` attribute and table-of-contents label for the prose language.
fn locale(prose_language: &str) -> (&'static str, &'static str) {
    match prose_language.trim().to_lowercase().as_str() {
        "french" | "français" | "francais" => ("fr", "Sommaire"),
        "spanish" | "español" => ("es", "Índice"),
        "german" | "deutsch" => ("de", "Inhalt"),
        _ => ("en", "Contents"),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
