//! ProviderClient against a scripted HTTP transport: request shapes,
//! status handling, retry, timeout and the in-flight gate.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use penman_core::provider::{
    ClientOptions, CompletionService, ConfigurationError, GenerationRequest, HttpResponse,
    Provider, ProviderClient, ProviderError, ProviderKind, ProviderSettings, RetryPolicy,
};
use penman_test_utils::{ScriptedTransport, gemini_ok, openrouter_ok};

// ===========================================================================
// Helpers
// ===========================================================================

fn client_with(
    kind: ProviderKind,
    transport: Arc<ScriptedTransport>,
    options: ClientOptions,
) -> ProviderClient {
    let settings = ProviderSettings::defaults_for(kind).with_api_key("test-key-123");
    let provider = Provider::from_settings(kind, &settings).expect("key is configured");
    ProviderClient::with_transport(provider, transport, options)
}

fn immediate(attempts: u32) -> ClientOptions {
    ClientOptions {
        retry: RetryPolicy::immediate(attempts),
        ..ClientOptions::default()
    }
}

// ===========================================================================
// Request shapes
// ===========================================================================

#[tokio::test]
async fn openrouter_request_shape() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(openrouter_ok(
        r#"{"sections": []}"#,
    ))]));
    let client = client_with(ProviderKind::OpenRouter, transport.clone(), immediate(1));

    let request =
        GenerationRequest::new(ProviderKind::OpenRouter, "deepseek/deepseek-r1", "Plan it")
            .expect_json();
    let text = client.complete(&request).await.expect("completion succeeds");
    assert_eq!(text, r#"{"sections": []}"#);

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    let req = &sent[0];
    assert_eq!(req.url, "https://openrouter.ai/api/v1/chat/completions");
    assert_eq!(req.header("authorization"), Some("Bearer test-key-123"));
    assert!(req.header("HTTP-Referer").is_some());
    assert_eq!(req.body["model"], "deepseek/deepseek-r1");
    assert_eq!(req.body["messages"][0]["role"], "user");
    assert_eq!(req.body["messages"][0]["content"], "Plan it");
    assert_eq!(req.body["response_format"]["type"], "json_object");
}

#[tokio::test]
async fn openrouter_text_request_has_no_response_format() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(openrouter_ok("<p>x</p>"))]));
    let client = client_with(ProviderKind::OpenRouter, transport.clone(), immediate(1));

    let request = GenerationRequest::new(ProviderKind::OpenRouter, "m", "Write it");
    client.complete(&request).await.expect("completion succeeds");

    assert!(transport.requests()[0].body.get("response_format").is_none());
}

#[tokio::test]
async fn gemini_request_shape() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(gemini_ok("<p>Bonjour</p>"))]));
    let client = client_with(ProviderKind::Gemini, transport.clone(), immediate(1));

    let request = GenerationRequest::new(ProviderKind::Gemini, "gemini-3-flash-preview", "Écris");
    let text = client.complete(&request).await.expect("completion succeeds");
    assert_eq!(text, "<p>Bonjour</p>");

    let req = &transport.requests()[0];
    assert_eq!(
        req.url,
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent"
    );
    assert_eq!(req.header("x-goog-api-key"), Some("test-key-123"));
    assert!(req.header("authorization").is_none());
    assert_eq!(req.body["contents"][0]["parts"][0]["text"], "Écris");
}

#[tokio::test]
async fn gemini_json_request_sets_mime_type() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(gemini_ok(r#"{"a": 1}"#))]));
    let client = client_with(ProviderKind::Gemini, transport.clone(), immediate(1));

    let request = GenerationRequest::new(ProviderKind::Gemini, "g", "p").expect_json();
    client.complete(&request).await.expect("completion succeeds");

    assert_eq!(
        transport.requests()[0].body["generationConfig"]["responseMimeType"],
        "application/json"
    );
}

#[test]
fn request_debug_redacts_credentials() {
    let settings =
        ProviderSettings::defaults_for(ProviderKind::OpenRouter).with_api_key("sk-very-secret");
    let provider = Provider::from_settings(ProviderKind::OpenRouter, &settings).unwrap();
    let request = penman_core::provider::ProviderBackend::build_request(
        &provider,
        &GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"),
    );
    let printed = format!("{request:?} {settings:?} {provider:?}");
    assert!(!printed.contains("sk-very-secret"), "{printed}");
}

// ===========================================================================
// Status handling and retry
// ===========================================================================

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(HttpResponse::status(401, r#"{"error": "invalid key"}"#)),
        Ok(openrouter_ok("never reached")),
    ]));
    let client = client_with(ProviderKind::OpenRouter, transport.clone(), immediate(3));

    let err = client
        .complete(&GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Authentication { status: 401, .. }));
    assert!(err.is_fatal());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(HttpResponse {
            status: 429,
            retry_after: Some(Duration::from_secs(5)),
            body: "slow down".into(),
        }),
        Ok(openrouter_ok("<p>finally</p>")),
    ]));
    // immediate() caps every delay at zero, including the Retry-After hint.
    let client = client_with(ProviderKind::OpenRouter, transport.clone(), immediate(3));

    let text = client
        .complete(&GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"))
        .await
        .expect("second attempt succeeds");

    assert_eq!(text, "<p>finally</p>");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn server_errors_exhaust_the_attempt_budget() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(HttpResponse::status(502, "bad gateway")),
        Ok(HttpResponse::status(503, "unavailable")),
        Ok(HttpResponse::status(500, "boom")),
        Ok(openrouter_ok("too late")),
    ]));
    let client = client_with(ProviderKind::OpenRouter, transport.clone(), immediate(3));

    let err = client
        .complete(&GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport(ref msg) if msg.contains("500")));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse::status(
        400,
        "unknown model",
    ))]));
    let client = client_with(ProviderKind::Gemini, transport.clone(), immediate(3));

    let err = client
        .complete(&GenerationRequest::new(ProviderKind::Gemini, "nope", "p"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Request { status: 400, .. }));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn empty_choices_is_malformed() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(HttpResponse::ok(
        r#"{"choices": []}"#,
    ))]));
    let client = client_with(ProviderKind::OpenRouter, transport, immediate(3));

    let err = client
        .complete(&GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_transport_times_out_and_is_retried() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![
            Ok(openrouter_ok("late")),
            Ok(openrouter_ok("late again")),
        ])
        .with_latency(Duration::from_millis(500)),
    );
    let client = client_with(
        ProviderKind::OpenRouter,
        transport.clone(),
        ClientOptions {
            timeout: Duration::from_millis(20),
            retry: RetryPolicy::immediate(2),
            ..ClientOptions::default()
        },
    );

    let err = client
        .complete(&GenerationRequest::new(ProviderKind::OpenRouter, "m", "p"))
        .await
        .unwrap_err();

    assert_eq!(err, ProviderError::Timeout(Duration::from_millis(20)));
    assert!(err.is_transient());
    assert_eq!(transport.request_count(), 2);
}

// ===========================================================================
// Configuration and gate
// ===========================================================================

#[test]
fn missing_api_key_is_a_configuration_error() {
    for kind in ProviderKind::ALL {
        let err = ProviderClient::new(
            kind,
            &ProviderSettings::defaults_for(kind),
            ClientOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingApiKey {
                provider: kind,
                env_var: kind.api_key_env(),
            }
        );
    }
}

#[test]
fn blank_api_key_counts_as_missing() {
    let settings = ProviderSettings::defaults_for(ProviderKind::Gemini).with_api_key("   ");
    let err = Provider::from_settings(ProviderKind::Gemini, &settings).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingApiKey { .. }));
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn gate_bounds_requests_in_flight() {
    let transport = Arc::new(
        ScriptedTransport::new((0..6).map(|i| Ok(openrouter_ok(&format!("<p>{i}</p>")))).collect())
            .with_latency(Duration::from_millis(40)),
    );
    let client = client_with(
        ProviderKind::OpenRouter,
        transport.clone(),
        ClientOptions {
            max_in_flight: 2,
            ..immediate(1)
        },
    );

    let request = GenerationRequest::new(ProviderKind::OpenRouter, "m", "p");
    let results = join_all((0..6).map(|_| client.complete(&request))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(transport.request_count(), 6);
    assert_eq!(transport.peak_concurrency(), 2);
}

#[tokio::test]
async fn clones_share_the_gate() {
    let transport = Arc::new(
        ScriptedTransport::new((0..4).map(|_| Ok(openrouter_ok("<p>x</p>"))).collect())
            .with_latency(Duration::from_millis(40)),
    );
    let a = client_with(
        ProviderKind::OpenRouter,
        transport.clone(),
        ClientOptions {
            max_in_flight: 1,
            ..immediate(1)
        },
    );
    let b = a.clone();

    let request = GenerationRequest::new(ProviderKind::OpenRouter, "m", "p");
    let (ra, rb) = tokio::join!(
        join_all((0..2).map(|_| a.complete(&request))),
        join_all((0..2).map(|_| b.complete(&request))),
    );

    assert!(ra.iter().chain(rb.iter()).all(Result::is_ok));
    assert_eq!(transport.peak_concurrency(), 1);
}
