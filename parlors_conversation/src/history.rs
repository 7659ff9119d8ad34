//! Conversation history trimming.
//!
//! Selects the most recent turns that fit a token budget so the prompt sent
//! to the model never exceeds it.

use parlors_core::{ChatMessage, Role, TokenCounter};
use thiserror::Error;
use tracing::debug;

/// Trimming policy for prompt history.
#[derive(Debug, Clone)]
pub struct TrimPolicy {
    /// Maximum prompt size in tokens, system instruction included
    pub max_tokens: usize,
    /// Role the kept window must begin with
    pub start_on: Role,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            start_on: Role::User,
        }
    }
}

impl TrimPolicy {
    #[must_use]
    pub const fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrimError {
    #[error(
        "no window starting on a {start_on:?} turn fits in {budget} tokens (newest turn needs {required})"
    )]
    Infeasible {
        start_on: Role,
        budget: usize,
        required: usize,
    },
}

/// A token-budgeted window over conversation history.
///
/// Keeps the newest whole turns that fit, then drops leading turns until
/// the window begins on the policy's starting role.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    policy: TrimPolicy,
}

impl HistoryWindow {
    #[must_use]
    pub const fn with_policy(policy: TrimPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &TrimPolicy {
        &self.policy
    }

    /// Select the turns to send after `system`.
    ///
    /// `turns` must not contain the system instruction; its cost is charged
    /// against the budget first and it is always kept.
    pub fn select_messages<C>(
        &self,
        system: &ChatMessage,
        turns: &[ChatMessage],
        counter: &C,
    ) -> Result<Vec<ChatMessage>, TrimError>
    where
        C: TokenCounter + ?Sized,
    {
        if turns.is_empty() {
            return Ok(Vec::new());
        }

        let budget = self.policy.max_tokens;
        let mut used = counter.count_message(system);
        let mut start = turns.len();

        for (idx, turn) in turns.iter().enumerate().rev() {
            let cost = counter.count_message(turn);
            if used + cost > budget {
                break;
            }
            used += cost;
            start = idx;
        }

        while start < turns.len() && turns[start].role != self.policy.start_on {
            start += 1;
        }

        if start == turns.len() {
            let newest = &turns[turns.len() - 1];
            return Err(TrimError::Infeasible {
                start_on: self.policy.start_on,
                budget,
                required: counter.count_message(system) + counter.count_message(newest),
            });
        }

        debug!(
            "Trimmed history: kept {} of {} turns ({used}/{budget} tokens before alignment)",
            turns.len() - start,
            turns.len()
        );

        Ok(turns[start..].to_vec())
    }

    /// Build the full prompt: system instruction followed by the trimmed turns.
    pub fn build_prompt<C>(
        &self,
        system_prompt: &str,
        turns: &[ChatMessage],
        counter: &C,
    ) -> Result<Vec<ChatMessage>, TrimError>
    where
        C: TokenCounter + ?Sized,
    {
        let system = ChatMessage::system(system_prompt);
        let kept = self.select_messages(&system, turns, counter)?;

        let mut messages = Vec::with_capacity(kept.len() + 1);
        messages.push(system);
        messages.extend(kept);
        Ok(messages)
    }
}
