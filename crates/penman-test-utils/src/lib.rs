//! Shared test utilities for penman integration tests.
//!
//! Two fakes, one per seam:
//! - **[`ScriptedService`]** stands in for a [`CompletionService`]. Responses
//!   are matched by prompt substring, so planner and per-section prompts can
//!   be scripted independently.
//! - **[`ScriptedTransport`]** stands in for the HTTP layer under a real
//!   `ProviderClient`, replaying queued responses in order.
//!
//! Both record what they were asked and the peak number of concurrent calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use penman_core::plan::PLAN_MARKER;
use penman_core::provider::{
    CompletionService, GenerationRequest, HttpRequest, HttpResponse, HttpTransport, ProviderError,
    ProviderKind,
};
use penman_core::writer::SECTION_MARKER;

type Reply = Result<String, ProviderError>;

// ---------------------------------------------------------------------------
// Concurrency tracking
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ScriptedService
// ---------------------------------------------------------------------------

struct Rule {
    needle: String,
    replies: VecDeque<Reply>,
}

/// A [`CompletionService`] that answers from a script.
///
/// The first rule whose needle occurs in the prompt answers. Each rule's
/// replies are consumed in order; the last one repeats forever. Prompts
/// that match no rule get the default reply.
pub struct ScriptedService {
    provider: ProviderKind,
    rules: Mutex<Vec<Rule>>,
    default_reply: Option<Reply>,
    latency: Option<Duration>,
    calls: Mutex<Vec<GenerationRequest>>,
    in_flight: InFlight,
}

impl ScriptedService {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            rules: Mutex::new(Vec::new()),
            default_reply: None,
            latency: None,
            calls: Mutex::new(Vec::new()),
            in_flight: InFlight::default(),
        }
    }

    /// Planner returns [`sample_plan_json`]; every body is [`long_body`].
    pub fn happy_path(provider: ProviderKind) -> Self {
        Self::new(provider)
            .on_plan(sample_plan_json())
            .with_default(Ok(long_body("contenu")))
    }

    pub fn with_rule(self, needle: impl Into<String>, replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "a rule needs at least one reply");
        self.rules
            .lock()
            .expect("rules lock poisoned")
            .push(Rule {
                needle: needle.into(),
                replies: replies.into(),
            });
        self
    }

    pub fn on_plan(self, raw: impl Into<String>) -> Self {
        self.with_rule(PLAN_MARKER, vec![Ok(raw.into())])
    }

    /// Successive planner replies, e.g. a broken one then a valid one.
    pub fn on_plan_sequence(self, replies: Vec<Reply>) -> Self {
        self.with_rule(PLAN_MARKER, replies)
    }

    /// Script the body for `heading_path` (`"Section"` or `"Section - Sub"`).
    pub fn on_section(self, heading_path: &str, reply: Reply) -> Self {
        self.with_rule(section_needle(heading_path), vec![reply])
    }

    pub fn on_section_sequence(self, heading_path: &str, replies: Vec<Reply>) -> Self {
        self.with_rule(section_needle(heading_path), replies)
    }

    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    pub fn plan_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.prompt.contains(PLAN_MARKER))
            .count()
    }

    pub fn section_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.prompt.contains(SECTION_MARKER))
            .count()
    }

    /// Calls whose prompt is for `heading_path`.
    pub fn calls_for_section(&self, heading_path: &str) -> usize {
        let needle = section_needle(heading_path);
        self.calls()
            .iter()
            .filter(|r| r.prompt.contains(&needle))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.peak()
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        let mut rules = self.rules.lock().expect("rules lock poisoned");
        if let Some(rule) = rules.iter_mut().find(|r| prompt.contains(&r.needle)) {
            if rule.replies.len() > 1 {
                if let Some(reply) = rule.replies.pop_front() {
                    return reply;
                }
            }
            if let Some(reply) = rule.replies.front() {
                return reply.clone();
            }
        }
        self.default_reply.clone().unwrap_or_else(|| {
            Err(ProviderError::MalformedResponse(
                "no scripted reply for prompt".into(),
            ))
        })
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(request.clone());
        self.in_flight.enter();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let reply = self.reply_for(&request.prompt);
        self.in_flight.exit();
        reply
    }
}

fn section_needle(heading_path: &str) -> String {
    format!("{SECTION_MARKER} \"{heading_path}\"")
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// An [`HttpTransport`] that replays queued responses in order and records
/// every request. An exhausted queue answers with a transport error.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ProviderError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
    in_flight: InFlight,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<HttpResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, response: Result<HttpResponse, ProviderError>) {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);
        self.in_flight.enter();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let response = self
            .responses
            .lock()
            .expect("responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted response".into())));
        self.in_flight.exit();
        response
    }
}

/// A 200 OpenRouter chat completion carrying `content`.
pub fn openrouter_ok(content: &str) -> HttpResponse {
    HttpResponse::ok(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string())
}

/// A 200 Gemini `generateContent` response carrying `text`.
pub fn gemini_ok(text: &str) -> HttpResponse {
    HttpResponse::ok(
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
            .to_string(),
    )
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const SAMPLE_TITLE: &str = "Les Fonctions en Python";
pub const SAMPLE_TOPIC: &str = "functions";
pub const SAMPLE_LANGUAGE: &str = "Python";

/// Planner output for [`SAMPLE_TITLE`]: introduction, three sections (two
/// with subsections), one exercise and a conclusion.
pub fn sample_plan_json() -> String {
    json!({
        "introduction": "Pourquoi les fonctions sont essentielles en Python.",
        "sections": [
            {
                "title": "Définir une fonction",
                "description": "Le mot-clé def et la valeur de retour",
                "subsections": [
                    {"title": "Syntaxe de base", "description": "def, nom, paramètres, corps"},
                    {"title": "Valeur de retour", "description": "return et None implicite"}
                ]
            },
            {
                "title": "Les arguments",
                "description": "Positionnels, nommés, valeurs par défaut",
                "subsections": [
                    {"title": "Arguments nommés", "description": "Appel par mot-clé"},
                    {"title": "*args et **kwargs", "description": "Arguments variadiques"}
                ]
            },
            {
                "title": "Portée des variables",
                "description": "Règle LEGB",
                "subsections": []
            }
        ],
        "exercises": [
            {
                "title": "Calculer une moyenne",
                "description": "Écrire average(values)",
                "solution": "def average(values): return sum(values) / len(values)"
            }
        ],
        "conclusion": "Récapitulatif des bonnes pratiques."
    })
    .to_string()
}

/// Heading paths of every body in the parsed [`sample_plan_json`], in
/// document order.
pub fn sample_heading_paths() -> Vec<&'static str> {
    vec![
        "Introduction",
        "Définir une fonction",
        "Définir une fonction - Syntaxe de base",
        "Définir une fonction - Valeur de retour",
        "Les arguments",
        "Les arguments - Arguments nommés",
        "Les arguments - *args et **kwargs",
        "Portée des variables",
        "Exercises",
        "Exercises - Calculer une moyenne",
        "Conclusion",
    ]
}

/// An HTML body that passes the default content checks.
pub fn long_body(topic: &str) -> String {
    format!(
        "<p>Cette partie présente {topic} en détail. Une fonction regroupe des instructions \
         réutilisables, reçoit des paramètres et renvoie un résultat au code appelant. \
         Bien nommer ses fonctions rend le programme plus lisible et plus facile à tester.</p>\n\
         <pre><code class=\"language-python\">def greet(name):\n    \
         # Build a greeting message\n    return f\"Hello, {{name}}!\"\n</code></pre>"
    )
}
