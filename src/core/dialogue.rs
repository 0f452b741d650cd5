use crate::{
    core::{agent::FunctionAgent, function_call::FunctionCallRecord, user::SimulatedUser},
    error::Result,
    types::{cost::CostTracker, result::Transcript},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_MAX_TURNS: usize = 15;
pub const DEFAULT_END_MARKER: &str = "dialogue ends";

/// Cuts canned closing sentences off assistant replies from a given turn on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceTrimmer {
    from_turn: usize,
    patterns: Vec<String>,
}

impl Default for UtteranceTrimmer {
    fn default() -> Self {
        Self {
            from_turn: 3,
            patterns: vec![
                "\nSure! I can help you with that.".to_string(),
                "\nSure, I can help you with that.".to_string(),
            ],
        }
    }
}

impl UtteranceTrimmer {
    /// A trimmer that never changes anything
    pub fn disabled() -> Self {
        Self {
            from_turn: usize::MAX,
            patterns: Vec::new(),
        }
    }

    pub fn with_from_turn(mut self, turn_index: usize) -> Self {
        self.from_turn = turn_index;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn trim(&self, turn_index: usize, utterance: &str) -> String {
        if turn_index < self.from_turn {
            return utterance.to_string();
        }
        let mut text = utterance;
        for pattern in &self.patterns {
            if let Some(position) = text.find(pattern.as_str()) {
                text = &text[..position];
            }
        }
        text.trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueConfig {
    max_turns: usize,
    end_marker: String,
    trimmer: UtteranceTrimmer,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            end_marker: DEFAULT_END_MARKER.to_string(),
            trimmer: UtteranceTrimmer::default(),
        }
    }
}

impl DialogueConfig {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_end_marker(mut self, marker: impl Into<String>) -> Self {
        self.end_marker = marker.into().to_lowercase();
        self
    }

    pub fn with_trimmer(mut self, trimmer: UtteranceTrimmer) -> Self {
        self.trimmer = trimmer;
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Whether the user signalled the end of the dialogue
    pub fn is_end(&self, user_utterance: &str) -> bool {
        user_utterance.to_lowercase().contains(&self.end_marker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishStatus {
    DialogueEnded,
    TurnBudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    AwaitingUserTurn,
    AwaitingAgentTurn,
    Terminal(FinishStatus),
}

impl DriverState {
    /// Whether the driver may move from `self` to `next`
    pub fn can_advance_to(self, next: DriverState) -> bool {
        match (self, next) {
            (DriverState::Terminal(_), _) => false,
            (DriverState::AwaitingUserTurn, DriverState::AwaitingAgentTurn) => true,
            (DriverState::AwaitingAgentTurn, DriverState::AwaitingUserTurn) => true,
            (_, DriverState::Terminal(_)) => true,
            _ => false,
        }
    }
}

/// One user utterance with the assistant's answer and the calls made for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub turn_index: usize,
    pub user_utterance: String,
    pub agent_utterance: Option<String>,
    pub actions: Vec<FunctionCallRecord>,
}

/// Alternates the simulated user and the assistant until the dialogue ends
#[derive(Debug)]
pub struct DialogueDriver {
    user: SimulatedUser,
    agent: FunctionAgent,
    config: DialogueConfig,
    state: DriverState,
    turns: Vec<DialogueTurn>,
    costs: CostTracker,
}

impl DialogueDriver {
    pub fn new(user: SimulatedUser, agent: FunctionAgent) -> Self {
        Self {
            user,
            agent,
            config: DialogueConfig::default(),
            state: DriverState::AwaitingUserTurn,
            turns: Vec::new(),
            costs: CostTracker::new(),
        }
    }

    pub fn with_config(mut self, config: DialogueConfig) -> Self {
        self.config = config;
        self
    }

    fn transition(&mut self, next: DriverState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal driver transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(target: "tod_bench::dialogue", from = ?self.state, to = ?next, "driver state");
        self.state = next;
    }

    /// Run the dialogue to completion.
    ///
    /// Fails only when the provider gives up or a configuration fault
    /// surfaces; the partial dialogue is then discarded.
    pub async fn run(mut self) -> Result<Transcript> {
        let start_time = Instant::now();
        let mut agent_utterance: Option<String> = None;
        let mut turn_index = 0;

        let status = loop {
            turn_index += 1;
            let user_utterance = self
                .user
                .respond(agent_utterance.as_deref(), &mut self.costs)
                .await?;
            info!(target: "tod_bench::dialogue", turn = turn_index, "User: {}", user_utterance);

            if self.config.is_end(&user_utterance) {
                self.turns.push(DialogueTurn {
                    turn_index,
                    user_utterance,
                    agent_utterance: None,
                    actions: Vec::new(),
                });
                break FinishStatus::DialogueEnded;
            }

            self.transition(DriverState::AwaitingAgentTurn);
            let reply = self
                .agent
                .respond(&user_utterance, turn_index, &mut self.costs)
                .await?;
            let utterance = self.config.trimmer.trim(turn_index, &reply.utterance);
            info!(target: "tod_bench::dialogue", turn = turn_index, "AI Assistant: {}", utterance);

            self.turns.push(DialogueTurn {
                turn_index,
                user_utterance,
                agent_utterance: Some(utterance.clone()),
                actions: reply.calls,
            });
            agent_utterance = Some(utterance);

            if turn_index >= self.config.max_turns {
                break FinishStatus::TurnBudgetExhausted;
            }
            self.transition(DriverState::AwaitingUserTurn);
        };

        self.transition(DriverState::Terminal(status));
        info!(
            target: "tod_bench::dialogue",
            goal = %self.user.goal().id,
            turns = self.turns.len(),
            status = ?status,
            cost = self.costs.cost(),
            "dialogue finished"
        );

        Ok(Transcript::new(
            self.user.goal(),
            self.turns,
            status,
            &self.costs,
            start_time.elapsed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_transitions() {
        use DriverState::*;
        let ended = Terminal(FinishStatus::DialogueEnded);

        assert!(AwaitingUserTurn.can_advance_to(AwaitingAgentTurn));
        assert!(AwaitingAgentTurn.can_advance_to(AwaitingUserTurn));
        assert!(AwaitingUserTurn.can_advance_to(ended));
        assert!(AwaitingAgentTurn.can_advance_to(Terminal(FinishStatus::TurnBudgetExhausted)));

        assert!(!AwaitingUserTurn.can_advance_to(AwaitingUserTurn));
        assert!(!AwaitingAgentTurn.can_advance_to(AwaitingAgentTurn));
        assert!(!ended.can_advance_to(AwaitingUserTurn));
        assert!(!ended.can_advance_to(ended));
    }

    #[test]
    fn test_trimmer_from_third_turn() {
        let trimmer = UtteranceTrimmer::default();
        let reply = "Your table is booked.\nSure! I can help you with that. Anything else?";
        assert_eq!(trimmer.trim(2, reply), reply);
        assert_eq!(trimmer.trim(3, reply), "Your table is booked.");
        assert_eq!(
            trimmer.trim(5, "Done.\nSure, I can help you with that."),
            "Done."
        );
        assert_eq!(UtteranceTrimmer::disabled().trim(9, reply), reply);
    }

    #[test]
    fn test_end_marker_case_insensitive() {
        let config = DialogueConfig::default();
        assert!(config.is_end("Thanks, bye. Dialogue Ends"));
        assert!(config.is_end("DIALOGUE ENDS"));
        assert!(!config.is_end("Is the dialogue over?"));

        let config = DialogueConfig::default().with_end_marker("[END]");
        assert!(config.is_end("ok [end]"));
    }

    #[test]
    fn test_max_turns_at_least_one() {
        assert_eq!(DialogueConfig::default().max_turns(), 15);
        assert_eq!(DialogueConfig::default().with_max_turns(0).max_turns(), 1);
    }
}
