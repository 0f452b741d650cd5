pub mod cost;
pub mod goal;
pub mod result;

pub use cost::{pricing_for, CostTracker, ModelPricing, TokenUsage};
pub use goal::{DatasetFamily, DialogueGoal, ReferenceUtterance};
pub use result::Transcript;
