//! tod-bench: simulated task-oriented dialogue with LLM function calling
//!
//! A language-model user pursues a scripted goal while a function-calling
//! assistant answers it. The assistant's calls are repaired, validated
//! against the declared schemas and dispatched to read-only venue queries or
//! to an append-only booking store; every rejection is fed back to the model
//! as corrective text.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tod_bench::{
//!     functions::{BookingStore, FunctionDispatcher, VenueStore},
//!     schemas::multiwoz,
//!     services::{prompts::multiwoz_system_prompt, ChatModel, OpenAIClient},
//!     types::goal::{find_multiwoz_goal, load_multiwoz},
//!     DialogueDriver, FunctionAgent, SimulatedUser,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let venues = Arc::new(VenueStore::open("multiwoz.db")?);
//!     let bookings = Arc::new(BookingStore::open("booking.db")?);
//!     let goal = find_multiwoz_goal(&load_multiwoz("data.json")?, "SNG0073")?;
//!
//!     let registry = multiwoz::build_registry(&venues)?.subset(&goal.services)?;
//!     let dispatcher = Arc::new(FunctionDispatcher::new(&registry, venues, bookings));
//!     let client: Arc<dyn ChatModel> = Arc::new(OpenAIClient::from_env()?);
//!
//!     let prompt = multiwoz_system_prompt(&goal.services);
//!     let agent = FunctionAgent::new(client.clone(), registry, dispatcher, prompt);
//!     let user = SimulatedUser::new(client, goal);
//!
//!     let transcript = DialogueDriver::new(user, agent).run().await?;
//!     println!("{}", transcript.replay());
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod functions;
pub mod schemas;
pub mod services;
pub mod types;

pub use crate::core::{
    AgentMemory, AgentReply, AgentStep, DialogueConfig, DialogueDriver, DialogueTurn,
    FinishStatus, FunctionAgent, FunctionCallRecord, RawFunctionCall, SimulatedUser,
    UtteranceTrimmer,
};
pub use error::{AgentError, Result};
pub use functions::{BookingStore, FunctionDispatcher, VenueStore};
pub use schemas::{repair, validate, SchemaRegistry, SgdCatalog, ValidationError};
pub use services::{ChatModel, Completion, OpenAIClient, RetryPolicy};
pub use types::{DialogueGoal, Transcript, TokenUsage};

#[cfg(feature = "cli")]
pub mod cli;
