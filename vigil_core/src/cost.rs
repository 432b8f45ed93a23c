use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prices a batch of tokens in USD.
pub trait CostModel: Send + Sync {
    fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64;
}

impl<F> CostModel for F
where
    F: Fn(u64, u64) -> f64 + Send + Sync,
{
    fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self(input_tokens, output_tokens)
    }
}

pub type DynCostModel = Arc<dyn CostModel>;

/// Flat per-token pricing, expressed per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenPricing {
    pub input_per_1k_usd: f64,
    pub output_per_1k_usd: f64,
}

impl TokenPricing {
    pub fn new(input_per_1k_usd: f64, output_per_1k_usd: f64) -> Self {
        Self {
            input_per_1k_usd,
            output_per_1k_usd,
        }
    }

    pub fn free() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Default for TokenPricing {
    fn default() -> Self {
        Self::new(0.0015, 0.002)
    }
}

impl CostModel for TokenPricing {
    fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k_usd
            + (output_tokens as f64 / 1000.0) * self.output_per_1k_usd
    }
}
