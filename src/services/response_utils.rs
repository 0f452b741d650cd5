use super::chat_model::Completion;
use crate::core::function_call::RawFunctionCall;
use crate::error::{AgentError, Result};
use crate::types::cost::TokenUsage;
use serde_json::Value;

/// Extract the assistant message of the first choice
pub(super) fn extract_message(response: &Value) -> Result<&Value> {
    let choices = response
        .get("choices")
        .and_then(|value| value.as_array())
        .ok_or_else(|| {
            AgentError::Provider("Missing 'choices' array in completion response".to_string())
        })?;

    let first_choice = choices.first().ok_or_else(|| {
        AgentError::Provider("Completion response contained no choices".to_string())
    })?;

    first_choice.get("message").ok_or_else(|| {
        AgentError::Provider("Completion response missing assistant message".to_string())
    })
}

pub(super) fn extract_usage(response: &Value) -> Option<TokenUsage> {
    let usage = response.get("usage")?;
    let field = |name: &str| -> Option<u32> { u32::try_from(usage.get(name)?.as_u64()?).ok() };
    let prompt_tokens = field("prompt_tokens")?;
    let completion_tokens = field("completion_tokens")?;
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: field("total_tokens").unwrap_or(prompt_tokens + completion_tokens),
    })
}

/// The legacy `function_call` field, falling back on the first `tool_calls`
/// entry for providers that only speak the tools API
pub(super) fn extract_function_call(message: &Value) -> Option<RawFunctionCall> {
    if let Some(call) = message
        .get("function_call")
        .and_then(RawFunctionCall::from_function_call)
    {
        return Some(call);
    }
    message
        .get("tool_calls")
        .and_then(|value| value.as_array())
        .and_then(|calls| calls.first())
        .and_then(RawFunctionCall::from_tool_call)
}

pub(super) fn parse_completion(response: &Value) -> Result<Completion> {
    let message = extract_message(response)?;
    Ok(Completion {
        content: message
            .get("content")
            .and_then(|value| value.as_str())
            .map(|s| s.to_string()),
        function_call: extract_function_call(message),
        usage: extract_usage(response),
        model: response
            .get("model")
            .and_then(|value| value.as_str())
            .map(|s| s.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_completion() {
        let completion = parse_completion(&json!({
            "model": "gpt-3.5-turbo-0613",
            "choices": [{"message": {"role": "assistant", "content": "Hello there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }))
        .unwrap();
        assert_eq!(completion.content.as_deref(), Some("Hello there"));
        assert!(completion.function_call.is_none());
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
        assert_eq!(completion.model.as_deref(), Some("gpt-3.5-turbo-0613"));
    }

    #[test]
    fn test_parse_function_call_completion() {
        let completion = parse_completion(&json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "function_call": {"name": "query_trains", "arguments": "{\"sql\": \"SELECT 1\"}"}
            }}]
        }))
        .unwrap();
        assert!(completion.content.is_none());
        assert_eq!(
            completion.function_call,
            Some(RawFunctionCall::new("query_trains", "{\"sql\": \"SELECT 1\"}"))
        );
        assert!(completion.usage.is_none());
    }

    #[test]
    fn test_tool_calls_fallback() {
        let message = json!({
            "role": "assistant",
            "tool_calls": [
                {"id": "a", "type": "function", "function": {"name": "book_hotel", "arguments": "{}"}},
                {"id": "b", "type": "function", "function": {"name": "book_taxi", "arguments": "{}"}}
            ]
        });
        assert_eq!(extract_function_call(&message).unwrap().name, "book_hotel");
    }

    #[test]
    fn test_missing_choices_is_provider_error() {
        let result = parse_completion(&json!({"choices": []}));
        assert!(matches!(result, Err(AgentError::Provider(_))));
    }
}
