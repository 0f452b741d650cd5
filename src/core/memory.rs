use super::steps::AgentStep;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// The assistant's side of the conversation.
///
/// Holds the steps in order and renders them as chat messages behind the
/// system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    steps: Vec<AgentStep>,
    system_prompt: Option<String>,
}

impl AgentMemory {
    /// Create a new memory with optional system prompt
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            steps: Vec::new(),
            system_prompt,
        }
    }

    /// Add a step to memory
    pub fn add_step(&mut self, step: AgentStep) {
        let description = step.describe();
        info!(target: "tod_bench::steps", "{}", description);
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[AgentStep] {
        &self.steps
    }

    pub fn last_step(&self) -> Option<&AgentStep> {
        self.steps.last()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Convert memory to chat message format
    pub fn as_messages(&self) -> Vec<Value> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = &self.system_prompt {
            messages.push(serde_json::json!({
                "role": "system",
                "content": system_prompt
            }));
        }

        for step in &self.steps {
            messages.push(step.to_message());
        }

        messages
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn count_calls(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, AgentStep::FunctionCall { .. }))
            .count()
    }

    /// Count function results that were corrective feedback
    pub fn count_rejections(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, AgentStep::FunctionResult { is_error: true, .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function_call::RawFunctionCall;

    #[test]
    fn test_memory_creation() {
        let memory = AgentMemory::new(Some("System".to_string()));
        assert_eq!(memory.step_count(), 0);
        assert!(memory.is_empty());
        assert_eq!(memory.system_prompt(), Some("System"));
    }

    #[test]
    fn test_as_messages() {
        let mut memory = AgentMemory::new(Some("System".to_string()));
        memory.add_step(AgentStep::UserTurn {
            content: "Hello".to_string(),
        });

        let messages = memory.as_messages();
        assert_eq!(messages.len(), 2); // system + user
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn test_counts() {
        let mut memory = AgentMemory::new(None);
        memory.add_step(AgentStep::FunctionCall {
            call: RawFunctionCall::new("query_hotels", "{}"),
        });
        memory.add_step(AgentStep::FunctionResult {
            name: "query_hotels".to_string(),
            content: "The required parameters \"sql\" are missing.".to_string(),
            is_error: true,
        });
        memory.add_step(AgentStep::FunctionCall {
            call: RawFunctionCall::new("query_hotels", "{\"sql\": \"SELECT name FROM hotel\"}"),
        });
        assert_eq!(memory.count_calls(), 2);
        assert_eq!(memory.count_rejections(), 1);
        assert!(matches!(
            memory.last_step(),
            Some(AgentStep::FunctionCall { .. })
        ));
    }
}
