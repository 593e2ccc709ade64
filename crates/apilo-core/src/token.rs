//! Token usage estimation and cost accounting.
//!
//! Token counts follow the standard chars/4 heuristic; costs accumulate in
//! integer cents and only become dollar values at the display boundary.

use serde::{Deserialize, Serialize};

/// Token usage attached to a cached response or request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// True when the counts come from the chars/4 heuristic rather than an
    /// upstream-reported figure.
    pub is_estimated: bool,
}

impl TokenUsage {
    /// Builds an estimated usage from raw request and response bodies.
    pub fn estimated(request_body: &[u8], response_body: &[u8]) -> Self {
        let input_tokens = estimate_tokens(request_body);
        let output_tokens = estimate_tokens(response_body);
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            is_estimated: true,
        }
    }
}

/// Estimates the token count of a body: ceil(len / 4), with a floor of one
/// token for non-empty content.
pub fn estimate_tokens(content: &[u8]) -> u64 {
    if content.is_empty() {
        return 0;
    }
    ((content.len() as u64).div_ceil(4)).max(1)
}

/// Per-million-token pricing, held in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPricing {
    /// Cents per million input tokens.
    pub input_cents_per_million: u64,
    /// Cents per million output tokens.
    pub output_cents_per_million: u64,
}

impl Default for TokenPricing {
    /// $3 per million input tokens, $15 per million output tokens.
    fn default() -> Self {
        Self {
            input_cents_per_million: 300,
            output_cents_per_million: 1500,
        }
    }
}

impl TokenPricing {
    /// Cost of a token count in integer cents, truncating toward zero.
    pub fn cost_cents(tokens: u64, cents_per_million: u64) -> u64 {
        tokens * cents_per_million / 1_000_000
    }

    /// Combined input+output cost in cents for one usage record.
    pub fn usage_cost_cents(&self, usage: &TokenUsage) -> u64 {
        Self::cost_cents(usage.input_tokens, self.input_cents_per_million)
            + Self::cost_cents(usage.output_tokens, self.output_cents_per_million)
    }

    /// Dollar cost for raw input/output token totals.
    pub fn cost_dollars(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 / 1_000_000.0 * (self.input_cents_per_million as f64 / 100.0)
            + output_tokens as f64 / 1_000_000.0 * (self.output_cents_per_million as f64 / 100.0)
    }
}
