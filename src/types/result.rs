use super::cost::{CostTracker, TokenUsage};
use super::goal::{DatasetFamily, DialogueGoal, AGENT_NAME, USER_NAME};
use crate::core::{
    dialogue::{DialogueTurn, FinishStatus},
    function_call::FunctionCallRecord,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one simulated dialogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub dialogue_id: String,
    pub family: DatasetFamily,
    pub services: Vec<String>,
    pub goal_text: String,
    /// Turns in order; the last one has no assistant utterance when the user
    /// ended the dialogue
    pub turns: Vec<DialogueTurn>,
    /// Every dispatched call across all turns, in turn order
    pub function_calls: Vec<FunctionCallRecord>,
    pub finish_status: FinishStatus,
    pub usage: TokenUsage,
    /// Estimated dollar cost of every model call
    pub cost: f64,
    pub duration: Duration,
}

impl Transcript {
    pub fn new(
        goal: &DialogueGoal,
        turns: Vec<DialogueTurn>,
        finish_status: FinishStatus,
        costs: &CostTracker,
        duration: Duration,
    ) -> Self {
        let function_calls = turns
            .iter()
            .flat_map(|turn| turn.actions.iter().cloned())
            .collect();
        Self {
            dialogue_id: goal.id.clone(),
            family: goal.family,
            services: goal.services.clone(),
            goal_text: goal.goal_text.clone(),
            turns,
            function_calls,
            finish_status,
            usage: costs.usage(),
            cost: costs.cost(),
            duration,
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Generate a human-readable replay of the dialogue
    pub fn replay(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Dialogue {} ({}) ===", self.dialogue_id, self.family));
        lines.push(format!("Duration: {:.2}s", self.duration.as_secs_f64()));
        lines.push(format!("Finish: {:?}", self.finish_status));
        lines.push(format!(
            "Tokens: {} prompt + {} completion = {} total",
            self.usage.prompt_tokens, self.usage.completion_tokens, self.usage.total_tokens
        ));
        lines.push(format!("Cost: ${:.4}", self.cost));

        for turn in &self.turns {
            lines.push(String::new());
            lines.push(format!("--- Turn {} ---", turn.turn_index));
            lines.push(format!("{}: {}", USER_NAME, turn.user_utterance));
            for action in &turn.actions {
                lines.push(format!("  🔧 {}({})", action.name, action.arguments));
                lines.push(format!("  👁 {}", action.result));
            }
            if let Some(agent_utterance) = &turn.agent_utterance {
                lines.push(format!("{}: {}", AGENT_NAME, agent_utterance));
            }
        }

        lines.join("\n")
    }
}
