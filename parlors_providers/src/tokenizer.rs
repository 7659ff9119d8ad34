//! Token counting with the cl100k BPE tables.
//!
//! Llama-family models hosted behind OpenAI-compatible endpoints do not
//! publish their tokenizer over the API, so prompt budgets are measured with
//! cl100k, which tracks them closely enough for trimming decisions.

use parlors_core::{ChatMessage, TokenCounter};
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Framing tokens charged per chat message (role marker and separators).
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> anyhow::Result<Self> {
        let bpe = cl100k_base()?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn count_message(&self, message: &ChatMessage) -> usize {
        self.count_tokens(&message.content) + MESSAGE_OVERHEAD_TOKENS
    }
}
