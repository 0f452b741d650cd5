pub mod agent;
pub mod dialogue;
pub mod function_call;
pub mod memory;
pub mod steps;
pub mod user;

pub use agent::{AgentReply, FunctionAgent};
pub use dialogue::{
    DialogueConfig, DialogueDriver, DialogueTurn, DriverState, FinishStatus, UtteranceTrimmer,
};
pub use function_call::{CallExecution, FunctionCallRecord, RawFunctionCall};
pub use memory::AgentMemory;
pub use steps::AgentStep;
pub use user::SimulatedUser;
