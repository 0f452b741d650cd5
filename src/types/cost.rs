use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::AddAssign;
use tracing::warn;

/// Token usage reported by the completion API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Dollar price per thousand tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) * self.input_per_1k / 1000.0
            + f64::from(usage.completion_tokens) * self.output_per_1k / 1000.0
    }
}

// longer prefixes first so "gpt-4o-mini" is not priced as "gpt-4o"
const PRICES: [(&str, ModelPricing); 5] = [
    (
        "gpt-3.5-turbo",
        ModelPricing {
            input_per_1k: 0.0015,
            output_per_1k: 0.002,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_1k: 0.00015,
            output_per_1k: 0.0006,
        },
    ),
    (
        "gpt-4o",
        ModelPricing {
            input_per_1k: 0.0025,
            output_per_1k: 0.01,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPricing {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    ),
    (
        "gpt-4",
        ModelPricing {
            input_per_1k: 0.03,
            output_per_1k: 0.06,
        },
    ),
];

/// Price of a model, matched by name prefix
pub fn pricing_for(model: &str) -> Option<ModelPricing> {
    // provider-prefixed names such as "openai/gpt-4o" price like the bare model
    let model = model.rsplit('/').next().unwrap_or(model);
    PRICES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, pricing)| *pricing)
}

/// Running usage and cost over every model call of a dialogue
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    usage: TokenUsage,
    cost: f64,
    unpriced: HashSet<String>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, usage: TokenUsage) {
        self.usage += usage;
        match pricing_for(model) {
            Some(pricing) => self.cost += pricing.cost(&usage),
            None => {
                if self.unpriced.insert(model.to_string()) {
                    warn!(target: "tod_bench::cost", model, "no pricing for model, counting as free");
                }
            }
        }
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_prefix_pricing() {
        let pricing = pricing_for("gpt-3.5-turbo-0613").unwrap();
        assert!((pricing.cost(&usage(1000, 1000)) - 0.0035).abs() < 1e-12);
        assert_eq!(pricing_for("gpt-4o-mini-2024-07-18").unwrap().input_per_1k, 0.00015);
        assert_eq!(pricing_for("openai/gpt-4o").unwrap().input_per_1k, 0.0025);
        assert!(pricing_for("llama-3-70b").is_none());
    }

    #[test]
    fn test_tracker_sums_and_ignores_unknown() {
        let mut tracker = CostTracker::new();
        tracker.record("gpt-3.5-turbo", usage(2000, 500));
        tracker.record("mystery-model", usage(100, 100));
        assert_eq!(tracker.usage(), usage(2100, 600));
        assert!((tracker.cost() - 0.004).abs() < 1e-12);
    }
}
