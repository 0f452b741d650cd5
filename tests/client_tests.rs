use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use tod_bench::{
    services::{ChatCompletionRequest, FunctionCallMode},
    AgentError, ChatModel, OpenAIClient, RetryPolicy,
};

fn fast_retry(attempts: usize) -> RetryPolicy {
    RetryPolicy::default()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_max_attempts(attempts)
}

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new(
        "gpt-3.5-turbo-0613",
        vec![json!({"role": "user", "content": "Find me a hotel"})],
    )
    .with_functions(vec![json!({
        "name": "query_hotels",
        "description": "Query the hotel table.",
        "parameters": {"type": "object", "properties": {"sql": {"type": "string"}}}
    })])
}

#[tokio::test]
async fn test_function_call_parsed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-3.5-turbo-0613",
            "function_call": "auto"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "gpt-3.5-turbo-0613",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "function_call": {
                            "name": "query_hotels",
                            "arguments": "{\"sql\": \"SELECT name FROM hotel\"}"
                        }
                    }
                }],
                "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string()).with_base_url(server.url());
    let completion = client
        .complete(request().with_function_call(FunctionCallMode::Auto))
        .await
        .unwrap();

    mock.assert_async().await;
    let call = completion.function_call.unwrap();
    assert_eq!(call.name, "query_hotels");
    assert_eq!(call.arguments, "{\"sql\": \"SELECT name FROM hotel\"}");
    assert_eq!(completion.usage.unwrap().total_tokens, 138);
    assert_eq!(completion.model.as_deref(), Some("gpt-3.5-turbo-0613"));
}

#[tokio::test]
async fn test_forced_reply_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"function_call": "none"})))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "The acorn guest house is in the north."}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string()).with_base_url(server.url());
    let completion = client
        .complete(request().with_function_call(FunctionCallMode::None))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(
        completion.content.as_deref(),
        Some("The acorn guest house is in the north.")
    );
    assert!(completion.function_call.is_none());
    assert!(completion.usage.is_none());
    // falls back to the requested model when the provider omits it
    assert_eq!(completion.model.as_deref(), Some("gpt-3.5-turbo-0613"));
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(400)
        .with_body(json!({"error": {"message": "Invalid schema for function"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string())
        .with_base_url(server.url())
        .with_retry_policy(fast_retry(3));
    let error = client.complete(request()).await.unwrap_err();

    mock.assert_async().await;
    match error {
        AgentError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid schema for function");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(3)
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string())
        .with_base_url(server.url())
        .with_retry_policy(fast_retry(3));
    let error = client.complete(request()).await.unwrap_err();

    mock.assert_async().await;
    match error {
        AgentError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("upstream unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(json!({"error": {"message": "Rate limit reached"}}).to_string())
        .expect(2)
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string())
        .with_base_url(server.url())
        .with_retry_policy(fast_retry(2));
    let error = client.complete(request()).await.unwrap_err();

    mock.assert_async().await;
    match error {
        AgentError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("retry after 0s"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_provider_error_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(json!({"error": {"message": "model overloaded"}}).to_string())
        .create_async()
        .await;

    let client = OpenAIClient::new("test-key".to_string()).with_base_url(server.url());
    let error = client.complete(request()).await.unwrap_err();
    assert!(matches!(error, AgentError::Provider(message) if message == "model overloaded"));
}
