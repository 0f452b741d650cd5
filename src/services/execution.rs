use crate::{
    core::{
        agent::{AgentReply, FunctionAgent},
        function_call::{CallExecution, RawFunctionCall},
        steps::{AgentStep, INVALID_CALL_NAME},
    },
    error::Result,
    schemas::{repair, validate, ValidationError},
    services::{
        chat_model::Completion,
        openai_client::{ChatCompletionRequest, FunctionCallMode},
    },
    types::cost::CostTracker,
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Per-turn bookkeeping of the call loop
#[derive(Debug, Default)]
struct LoopState {
    /// Last dispatched call as the model proposed it
    last_call: Option<RawFunctionCall>,
    /// Calls and empty replies answered with feedback so far
    attempts: usize,
    /// Disable calling for the next request only
    force_reply: bool,
}

impl FunctionAgent {
    /// Answer one user utterance.
    ///
    /// Function calls are repaired, validated and dispatched until the model
    /// replies in text. Rejected calls come back to the model as function
    /// messages; only provider and storage faults escape as errors.
    pub async fn respond(
        &mut self,
        user_utterance: &str,
        turn_index: usize,
        costs: &mut CostTracker,
    ) -> Result<AgentReply> {
        self.memory_mut().add_step(AgentStep::UserTurn {
            content: user_utterance.to_string(),
        });

        let mut state = LoopState::default();
        let mut calls = Vec::new();

        loop {
            let cap_reached = state.attempts >= self.max_calls_per_turn();
            if cap_reached && !state.force_reply {
                warn!(
                    target: "tod_bench::agent",
                    turn = turn_index,
                    attempts = state.attempts,
                    "function call cap reached, requesting a reply"
                );
            }
            let forced = state.force_reply || cap_reached;
            state.force_reply = false;

            let completion = self.request_completion(forced, costs).await?;

            let call = match (completion.function_call.clone(), forced) {
                (Some(call), false) => call,
                (call, _) => {
                    let content = completion.content_text().trim().to_string();
                    if call.is_some() {
                        warn!(
                            target: "tod_bench::agent",
                            turn = turn_index,
                            "model called a function while calls were disabled, ending the turn"
                        );
                    } else if content.is_empty() && !forced {
                        state.attempts += 1;
                        self.reject(INVALID_CALL_NAME, ValidationError::MissingCall);
                        continue;
                    }

                    self.memory_mut().add_step(AgentStep::AssistantReply {
                        content: content.clone(),
                    });
                    info!(
                        target: "tod_bench::agent",
                        turn = turn_index,
                        calls = calls.len(),
                        "assistant replied"
                    );
                    return Ok(AgentReply {
                        utterance: content,
                        calls,
                    });
                }
            };

            if state.last_call.as_ref() == Some(&call) {
                warn!(
                    target: "tod_bench::agent",
                    turn = turn_index,
                    call = %call.describe(),
                    "repeated function call, requesting a reply instead"
                );
                state.force_reply = true;
                continue;
            }
            state.attempts += 1;

            let outcome = repair(&call);
            if !outcome.is_unchanged() {
                let applied: Vec<String> = outcome.applied.iter().map(|kind| kind.to_string()).collect();
                warn!(
                    target: "tod_bench::agent",
                    original = %call.describe(),
                    repaired = %outcome.call.describe(),
                    applied = ?applied,
                    "repaired function call"
                );
            }
            let repaired = outcome.call;
            self.memory_mut().add_step(AgentStep::FunctionCall {
                call: repaired.clone(),
            });

            let arguments = match validate(Some(&repaired), self.registry()) {
                Ok(arguments) => arguments,
                Err(error) => {
                    self.reject(&repaired.name, error);
                    continue;
                }
            };

            let execution =
                CallExecution::start(turn_index, &repaired.name, Value::Object(arguments.clone()));
            let result = self.dispatcher().dispatch(&repaired.name, &arguments)?;
            debug!(
                target: "tod_bench::agent",
                function = %repaired.name,
                result = %result,
                "dispatched call"
            );
            self.memory_mut().add_step(AgentStep::FunctionResult {
                name: repaired.name.clone(),
                content: result.clone(),
                is_error: false,
            });
            calls.push(execution.complete(result));
            state.last_call = Some(call);
        }
    }

    async fn request_completion(
        &self,
        forced: bool,
        costs: &mut CostTracker,
    ) -> Result<Completion> {
        let mode = if forced {
            FunctionCallMode::None
        } else {
            FunctionCallMode::Auto
        };
        let request = ChatCompletionRequest::new(self.model_name(), self.memory().as_messages())
            .with_functions(self.functions().to_vec())
            .with_function_call(mode)
            .with_temperature(self.temperature())
            .with_max_tokens(self.max_tokens());

        let completion = self.model().complete(request).await?;
        if let Some(usage) = completion.usage {
            costs.record(completion.model.as_deref().unwrap_or(self.model_name()), usage);
        }
        Ok(completion)
    }

    /// Feed a validation failure back to the model as a function message
    fn reject(&mut self, name: &str, error: ValidationError) {
        info!(
            target: "tod_bench::agent",
            function = name,
            kind = ?error.kind(),
            "rejected function call"
        );
        self.memory_mut().add_step(AgentStep::FunctionResult {
            name: name.to_string(),
            content: error.to_string(),
            is_error: true,
        });
    }
}
