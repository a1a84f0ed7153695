//! The seams between the generation stages and a remote provider.
//!
//! [`CompletionService`] is what the planner and writer depend on. It is
//! object-safe so the pipeline can hold an `Arc<dyn CompletionService>`
//! and tests can substitute a scripted implementation.
//!
//! [`ProviderBackend`] captures the per-provider wire differences:
//! credential headers, request body shape and response extraction.

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;
use super::transport::HttpRequest;
use super::types::{GenerationRequest, ProviderKind};

/// Something that turns a prompt into completion text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Provider this service is bound to.
    fn provider(&self) -> ProviderKind;

    /// Send one prompt and return the completion text.
    ///
    /// Implementations own their retry behaviour; callers treat a returned
    /// error as final for this request.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError>;
}

/// Wire-level adapter for one provider API.
pub trait ProviderBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Headers carrying the credential.
    fn authenticate(&self) -> Vec<(String, String)>;

    /// Build the HTTP request for `request`, credential included.
    fn build_request(&self, request: &GenerationRequest) -> HttpRequest;

    /// Extract the completion text from a 2xx response body.
    fn parse_response(&self, body: &Value) -> Result<String, ProviderError>;
}

// Compile-time assertion: both seams must stay object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn CompletionService, _: &dyn ProviderBackend) {}
};
