use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// A function call exactly as the model proposed it.
///
/// The arguments stay undecoded text until the validator parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl RawFunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the legacy `function_call` object of a chat message
    pub fn from_function_call(function_call: &Value) -> Option<Self> {
        let name = function_call.get("name")?.as_str()?.to_string();
        let arguments = match function_call.get("arguments") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Some(Self { name, arguments })
    }

    /// Parse the first entry of a `tool_calls` array
    pub fn from_tool_call(tool_call: &Value) -> Option<Self> {
        Self::from_function_call(tool_call.get("function")?)
    }

    /// Convert to the legacy `function_call` message field
    pub fn to_function_call(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "arguments": self.arguments,
        })
    }

    pub fn describe(&self) -> String {
        format!("{}({})", self.name, self.arguments)
    }
}

/// One dispatched call with its decoded arguments and raw result text,
/// kept in turn order for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRecord {
    pub turn_index: usize,
    pub name: String,
    pub arguments: Value,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

impl FunctionCallRecord {
    pub fn new(turn_index: usize, name: String, arguments: Value, result: String) -> Self {
        Self {
            turn_index,
            name,
            arguments,
            result,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis());
        self
    }
}

/// Times one dispatch
#[derive(Debug)]
pub struct CallExecution {
    turn_index: usize,
    name: String,
    arguments: Value,
    start_time: Instant,
}

impl CallExecution {
    pub fn start(turn_index: usize, name: &str, arguments: Value) -> Self {
        Self {
            turn_index,
            name: name.to_string(),
            arguments,
            start_time: Instant::now(),
        }
    }

    pub fn complete(self, result: String) -> FunctionCallRecord {
        let duration = self.start_time.elapsed();
        FunctionCallRecord::new(self.turn_index, self.name, self.arguments, result)
            .with_duration(duration)
    }
}
