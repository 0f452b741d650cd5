use crate::{
    error::Result,
    services::{chat_model::ChatModel, openai_client::ChatCompletionRequest, prompts::user_prompt},
    types::{
        cost::CostTracker,
        goal::{DialogueGoal, AGENT_NAME, USER_NAME},
    },
};
use serde_json::json;
use std::sync::Arc;

/// Language-model user pursuing a dialogue goal
pub struct SimulatedUser {
    model: Arc<dyn ChatModel>,
    model_name: String,
    goal: DialogueGoal,
    history: Vec<String>,
    temperature: f32,
}

impl SimulatedUser {
    pub fn new(model: Arc<dyn ChatModel>, goal: DialogueGoal) -> Self {
        Self {
            model,
            model_name: "gpt-3.5-turbo-0613".to_string(),
            goal,
            history: Vec::new(),
            temperature: 0.0,
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn goal(&self) -> &DialogueGoal {
        &self.goal
    }

    /// Conversation so far as `Speaker: text` lines
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Produce the next user utterance.
    ///
    /// The opening utterance comes from the goal, not the model.
    pub async fn respond(
        &mut self,
        agent_utterance: Option<&str>,
        costs: &mut CostTracker,
    ) -> Result<String> {
        if self.history.is_empty() {
            let utterance = self.goal.first_utterance.clone();
            self.history.push(format!("{}: {}", USER_NAME, utterance));
            return Ok(utterance);
        }

        let agent_utterance = agent_utterance.unwrap_or_default();
        let prompt = user_prompt(&self.goal, &self.history, agent_utterance);
        let stop_span = format!("{}:", AGENT_NAME);
        let request = ChatCompletionRequest::new(
            self.model_name.clone(),
            vec![json!({"role": "user", "content": prompt})],
        )
        .with_temperature(self.temperature)
        .with_stop(stop_span.clone());

        let completion = self.model.complete(request).await?;
        if let Some(usage) = completion.usage {
            costs.record(completion.model.as_deref().unwrap_or(&self.model_name), usage);
        }

        let text = completion.content_text();
        let utterance = match text.find(&stop_span) {
            Some(position) => &text[..position],
            None => text,
        }
        .trim()
        .to_string();

        self.history.push(format!("{}: {}", AGENT_NAME, agent_utterance));
        self.history.push(format!("{}: {}", USER_NAME, utterance));
        Ok(utterance)
    }
}

impl std::fmt::Debug for SimulatedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedUser")
            .field("model_name", &self.model_name)
            .field("goal", &self.goal.id)
            .field("history", &self.history.len())
            .finish()
    }
}
