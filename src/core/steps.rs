use super::function_call::RawFunctionCall;
use serde::{Deserialize, Serialize};

/// Name used for function messages when the model's name cannot be sent back
pub const INVALID_CALL_NAME: &str = "invalid_call";

/// Represents a single message in the assistant's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStep {
    /// Utterance of the simulated user
    UserTurn { content: String },
    /// Visible reply of the assistant
    AssistantReply { content: String },
    /// Function call proposed by the assistant, after repair
    FunctionCall { call: RawFunctionCall },
    /// Dispatch result or corrective feedback for the preceding call
    FunctionResult {
        name: String,
        content: String,
        is_error: bool,
    },
}

/// Function names accepted by the completion API: 1 to 64 characters of
/// `[A-Za-z0-9_-]`
pub fn message_name(name: &str) -> &str {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        name
    } else {
        INVALID_CALL_NAME
    }
}

impl AgentStep {
    /// Convert step to the chat message format
    pub fn to_message(&self) -> serde_json::Value {
        match self {
            AgentStep::UserTurn { content } => {
                serde_json::json!({
                    "role": "user",
                    "content": content
                })
            }
            AgentStep::AssistantReply { content } => {
                serde_json::json!({
                    "role": "assistant",
                    "content": content
                })
            }
            AgentStep::FunctionCall { call } => {
                serde_json::json!({
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": message_name(&call.name),
                        "arguments": call.arguments
                    }
                })
            }
            AgentStep::FunctionResult { name, content, .. } => {
                serde_json::json!({
                    "role": "function",
                    "name": message_name(name),
                    "content": content
                })
            }
        }
    }

    /// Get a human-readable description of the step
    pub fn describe(&self) -> String {
        match self {
            AgentStep::UserTurn { content } => format!("🧭 User: {}", content),
            AgentStep::AssistantReply { content } => format!("✅ AI Assistant: {}", content),
            AgentStep::FunctionCall { call } => format!("🔧 Call: {}", call.describe()),
            AgentStep::FunctionResult {
                content, is_error, ..
            } => {
                if *is_error {
                    format!("❌ Rejected: {}", content)
                } else {
                    format!("👁 Result: {}", content)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_messages() {
        let call = AgentStep::FunctionCall {
            call: RawFunctionCall::new("book_hotel", "{\"name\": \"acorn guest house\"}"),
        };
        let message = call.to_message();
        assert_eq!(message["role"], "assistant");
        assert!(message["content"].is_null());
        assert_eq!(message["function_call"]["name"], "book_hotel");

        let result = AgentStep::FunctionResult {
            name: "book_hotel".to_string(),
            content: "Booking succeed. The reference number is abcd1234.".to_string(),
            is_error: false,
        };
        let message = result.to_message();
        assert_eq!(message["role"], "function");
        assert_eq!(message["name"], "book_hotel");
    }

    #[test]
    fn test_unsendable_names_replaced() {
        assert_eq!(message_name("Buses_1_FindBus"), "Buses_1_FindBus");
        assert_eq!(message_name("functions.query hotels"), INVALID_CALL_NAME);
        assert_eq!(message_name(""), INVALID_CALL_NAME);
        assert_eq!(message_name(&"x".repeat(65)), INVALID_CALL_NAME);
    }
}
