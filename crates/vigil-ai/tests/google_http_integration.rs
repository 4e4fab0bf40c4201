use httpmock::prelude::*;
use serde_json::json;
use vigil_ai::{GenerationRequest, GoogleClient, GoogleConfig, LlmClient, VigilAiError};

fn client_for(server: &MockServer, max_retries: usize) -> GoogleClient {
    GoogleClient::new(GoogleConfig {
        api_base: server.base_url(),
        api_key: "test-google-key".to_string(),
        request_timeout_ms: 5_000,
        max_retries,
        retry_budget_ms: 0,
        retry_jitter: false,
    })
    .expect("google client should be created")
}

#[tokio::test]
async fn functional_google_client_sends_expected_http_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent")
            .query_param("key", "test-google-key")
            .header_exists("x-vigil-request-id")
            .header("x-vigil-retry-attempt", "0")
            .json_body_includes(
                json!({
                    "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                    "systemInstruction": {"parts": [{"text": "system"}]}
                })
                .to_string(),
            );

        then.status(200).json_body(json!({
            "candidates": [{
                "content": {"parts": [{"text": "google ok"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 9,
                "candidatesTokenCount": 5,
                "totalTokenCount": 14
            }
        }));
    });

    let request = GenerationRequest::new("gemini-2.0-flash", "hello")
        .with_system_instruction("system");
    let response = client_for(&server, 2)
        .complete(request)
        .await
        .expect("google completion should succeed");

    mock.assert();
    assert_eq!(response.text, "google ok");
    assert_eq!(response.usage.total_tokens, 14);
}

#[tokio::test]
async fn integration_google_client_retries_on_rate_limit_then_succeeds() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent")
            .header("x-vigil-retry-attempt", "0");
        then.status(429).body("rate limited");
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent")
            .header("x-vigil-retry-attempt", "1");
        then.status(200).json_body(json!({
            "candidates": [{"content": {"parts": [{"text": "ok after retry"}]}}]
        }));
    });

    let response = client_for(&server, 2)
        .complete(GenerationRequest::new("gemini-2.0-flash", "hello"))
        .await
        .expect("retry should eventually succeed");

    assert_eq!(response.text, "ok after retry");
    first.assert_calls(1);
    second.assert_calls(1);
}

#[tokio::test]
async fn regression_google_client_surfaces_non_retryable_status() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent");
        then.status(403).body("permission denied");
    });

    let error = client_for(&server, 3)
        .complete(GenerationRequest::new("gemini-2.0-flash", "hello"))
        .await
        .expect_err("403 should not be retried");

    mock.assert_calls(1);
    match error {
        VigilAiError::HttpStatus { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("permission denied"));
        }
        other => panic!("expected VigilAiError::HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn regression_google_client_surfaces_blocked_prompt_without_retry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-2.0-flash:generateContent");
        then.status(200)
            .json_body(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
    });

    let error = client_for(&server, 3)
        .complete(GenerationRequest::new("gemini-2.0-flash", "hello"))
        .await
        .expect_err("blocked prompt");

    mock.assert_calls(1);
    assert!(matches!(error, VigilAiError::Blocked(reason) if reason == "SAFETY"));
}
