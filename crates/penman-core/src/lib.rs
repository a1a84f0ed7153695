//! Article generation pipeline: plan an outline with an LLM, expand every
//! section, validate the result, and hand back an [`ArticleDocument`].
//!
//! ```text
//! generate(request)
//!     |
//!     v
//! ArticlePlanner --complete()--> ProviderClient --HTTP--> OpenRouter | Gemini
//!     |
//!     v
//! ArticleValidator (structure)
//!     |
//!     v
//! ArticleWriter  --complete() per section/subsection-->
//!     |
//!     v
//! ArticleValidator (content) --> regenerate flagged bodies
//!     |
//!     v
//! ArticleDocument
//! ```
//!
//! The crate performs no file I/O. Rendering and writing the document is
//! the caller's job.

pub mod config;
pub mod document;
pub mod pipeline;
pub mod plan;
pub mod provider;
pub mod seo;
pub mod validate;
pub mod writer;

pub use config::GeneratorConfig;
pub use document::ArticleDocument;
pub use pipeline::{
    ArticleRequest, GenerateError, Pipeline, PipelineConfig, PlanSink, Stage, generate,
    generate_with_cancel,
};
pub use plan::{ArticlePlan, ArticlePlanner, BodySlot, Section, Subsection};
pub use provider::{
    CompletionService, ConfigurationError, GenerationRequest, ProviderClient, ProviderError,
    ProviderKind,
};
pub use validate::{ArticleValidator, ValidationConfig, ValidationPass, ValidationResult};
pub use writer::{ArticleWriter, SectionFailurePolicy, WriterConfig};
