//! Provider abstraction over remote LLM completion APIs.
//!
//! Callers talk to a [`CompletionService`]; the production implementation is
//! [`ProviderClient`], which owns one [`Provider`] variant, an HTTP
//! transport, a [`RetryPolicy`] and a per-credential request gate.
//!
//! # Architecture
//!
//! ```text
//! ArticlePlanner / ArticleWriter
//!     |
//!     v
//! CompletionService::complete(&GenerationRequest)
//!     |
//!     v
//! ProviderClient
//!     |-- RetryPolicy::run ------------------+
//!     |-- gate (Semaphore) + timeout         |
//!     v                                      |
//! Provider::{OpenRouter, Gemini}             |
//!     authenticate / build_request           |
//!     |                                      |
//!     v                                      |
//! HttpTransport::post_json --> HttpResponse -+
//!     |
//!     v
//! Provider::parse_response --> String
//! ```

pub mod client;
pub mod error;
pub mod gemini;
pub mod openrouter;
pub mod registry;
pub mod retry;
pub mod trait_def;
pub mod transport;
pub mod types;

pub use client::{ClientOptions, ProviderClient};
pub use error::{ConfigurationError, ProviderError};
pub use gemini::GeminiBackend;
pub use openrouter::OpenRouterBackend;
pub use registry::{ModelCatalog, Provider, ProviderSettings};
pub use retry::RetryPolicy;
pub use trait_def::{CompletionService, ProviderBackend};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{GenerationRequest, ModelRole, ProviderKind, ResponseFormat};
