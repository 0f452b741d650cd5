use crate::{
    core::{function_call::FunctionCallRecord, memory::AgentMemory},
    functions::FunctionDispatcher,
    schemas::SchemaRegistry,
    services::chat_model::ChatModel,
};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_CALLS_PER_TURN: usize = 10;

/// Function-calling assistant under evaluation.
///
/// Keeps its own conversation memory for the length of one dialogue; the
/// per-turn loop lives in `services::execution`.
pub struct FunctionAgent {
    model: Arc<dyn ChatModel>,
    model_name: String,
    registry: SchemaRegistry,
    functions: Vec<Value>,
    dispatcher: Arc<FunctionDispatcher>,
    memory: AgentMemory,
    max_calls_per_turn: usize,
    temperature: f32,
    max_tokens: Option<u32>,
}

/// Outcome of one assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub utterance: String,
    pub calls: Vec<FunctionCallRecord>,
}

impl FunctionAgent {
    /// `registry` is the subset of functions declared to the model in this
    /// dialogue
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: SchemaRegistry,
        dispatcher: Arc<FunctionDispatcher>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let functions = registry.function_definitions();
        Self {
            model,
            model_name: "gpt-3.5-turbo-0613".to_string(),
            registry,
            functions,
            dispatcher,
            memory: AgentMemory::new(Some(system_prompt.into())),
            max_calls_per_turn: DEFAULT_MAX_CALLS_PER_TURN,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_max_calls_per_turn(mut self, max_calls: usize) -> Self {
        self.max_calls_per_turn = max_calls;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub(crate) fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    pub(crate) fn model(&self) -> &dyn ChatModel {
        self.model.as_ref()
    }

    pub(crate) fn model_name(&self) -> &str {
        &self.model_name
    }

    pub(crate) fn functions(&self) -> &[Value] {
        &self.functions
    }

    pub(crate) fn dispatcher(&self) -> &FunctionDispatcher {
        &self.dispatcher
    }

    pub(crate) fn max_calls_per_turn(&self) -> usize {
        self.max_calls_per_turn
    }

    pub(crate) fn temperature(&self) -> f32 {
        self.temperature
    }

    pub(crate) fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }
}

impl std::fmt::Debug for FunctionAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionAgent")
            .field("model_name", &self.model_name)
            .field("functions", &self.functions.len())
            .field("steps", &self.memory.step_count())
            .field("max_calls_per_turn", &self.max_calls_per_turn)
            .finish()
    }
}
