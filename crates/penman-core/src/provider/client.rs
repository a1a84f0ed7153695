//! [`ProviderClient`]: the production [`CompletionService`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::debug;

use super::error::{ConfigurationError, ProviderError, classify_status, snippet};
use super::registry::{Provider, ProviderSettings};
use super::retry::RetryPolicy;
use super::trait_def::{CompletionService, ProviderBackend};
use super::transport::{HttpTransport, ReqwestTransport};
use super::types::{GenerationRequest, ProviderKind};

/// Knobs shared by every client regardless of provider.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout around the transport call.
    pub timeout: Duration,
    /// Permits in the request gate. Zero is treated as one.
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_in_flight: 2,
            retry: RetryPolicy::default(),
        }
    }
}

/// Sends [`GenerationRequest`]s to one provider with retry, a timeout and a
/// bounded number of in-flight requests.
///
/// Clones share the same gate.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Provider,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    gate: Arc<Semaphore>,
    timeout: Duration,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .field("available_permits", &self.gate.available_permits())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    /// Build a client over the real HTTPS transport.
    ///
    /// Fails before any network activity if the credential is missing.
    pub fn new(
        kind: ProviderKind,
        settings: &ProviderSettings,
        options: ClientOptions,
    ) -> Result<Self, ConfigurationError> {
        let provider = Provider::from_settings(kind, settings)?;
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(provider, transport, options))
    }

    pub fn with_transport(
        provider: Provider,
        transport: Arc<dyn HttpTransport>,
        options: ClientOptions,
    ) -> Self {
        Self {
            provider,
            transport,
            retry: options.retry,
            gate: Arc::new(Semaphore::new(options.max_in_flight.max(1))),
            timeout: options.timeout,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// One attempt: gate, timeout, transport, status classification, parse.
    async fn attempt(
        &self,
        request: &GenerationRequest,
        attempt: u32,
    ) -> Result<String, ProviderError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ProviderError::Transport("request gate closed".into()))?;

        let http = self.provider.build_request(request);
        debug!(
            provider = %self.kind(),
            model = %request.model,
            attempt,
            prompt_chars = request.prompt.len(),
            "sending completion request"
        );

        let response = tokio::time::timeout(self.timeout, self.transport.post_json(http))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        if let Some(err) =
            classify_status(self.kind(), response.status, response.retry_after, &response.body)
        {
            return Err(err);
        }

        let body: Value = serde_json::from_str(&response.body).map_err(|e| {
            ProviderError::MalformedResponse(format!(
                "response is not JSON ({e}): {}",
                snippet(&response.body)
            ))
        })?;
        let text = self.provider.parse_response(&body)?;

        if request.wants_json() && !text.contains('{') {
            return Err(ProviderError::MalformedResponse(format!(
                "expected a JSON object, got: {}",
                snippet(&text)
            )));
        }

        debug!(
            provider = %self.kind(),
            model = %request.model,
            attempt,
            response_chars = text.len(),
            "completion received"
        );
        Ok(text)
    }
}

#[async_trait]
impl CompletionService for ProviderClient {
    fn provider(&self) -> ProviderKind {
        self.kind()
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        if request.provider != self.kind() {
            return Err(ConfigurationError::Invalid(format!(
                "request for {} sent to {} client",
                request.provider,
                self.kind()
            ))
            .into());
        }
        self.retry
            .run(|attempt| self.attempt(request, attempt))
            .await
    }
}
