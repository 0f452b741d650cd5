pub mod chat_model;
pub mod execution;
pub mod openai_client;
pub mod prompts;
pub(crate) mod response_utils;

pub use chat_model::{ChatModel, Completion};
pub use openai_client::{ChatCompletionRequest, FunctionCallMode, OpenAIClient, RetryPolicy};
