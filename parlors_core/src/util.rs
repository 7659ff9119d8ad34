//! Prompt constants and a dependency-free token estimate.

use crate::TokenCounter;

/// System instruction prepended to every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly alien, full of wisdom and goodness. Answer all questions to the best of your ability.";

/// Rough token counter: one token per four characters, rounded up.
///
/// Used when the tokenizer tables cannot be loaded and in tests that need
/// predictable budgets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}
