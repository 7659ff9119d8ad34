//! The single-step inference pipeline.
//!
//! `ConversationManager` trims a session's history to the prompt budget,
//! asks the remote model for a reply, and commits both turns to the session
//! and its checkpoint.

use std::sync::Arc;

use parlors_core::{
    ChatMessage, CompletionOptions, DEFAULT_SYSTEM_PROMPT, LLMProvider, Role, TokenCounter,
};
use serde_json::{Map, json};
use tracing::{debug, info, warn};

use crate::checkpoint::MESSAGES_CHANNEL;
use crate::error::ConversationError;
use crate::history::{HistoryWindow, TrimPolicy};
use crate::session::ConversationSession;
use crate::store::SnapshotStore;

/// Node name recorded in checkpoints written by the inference step.
const MODEL_NODE: &str = "model";

/// Configuration for the inference step.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Model to use for completions
    pub model: String,
    /// Temperature for sampling
    pub temperature: f64,
    /// System prompt
    pub system_prompt: String,
    /// Prompt budget in tokens, system prompt included
    pub max_prompt_tokens: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_prompt_tokens: 500,
        }
    }
}

impl ConversationConfig {
    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Set the prompt token budget.
    #[must_use]
    pub const fn with_max_prompt_tokens(mut self, limit: usize) -> Self {
        self.max_prompt_tokens = limit;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

/// Single-step inference pipeline.
pub struct ConversationManager<P = Arc<dyn LLMProvider>, C = Arc<dyn TokenCounter>>
where
    P: Send + Sync,
    C: Send + Sync,
{
    provider: P,
    counter: C,
    store: Arc<SnapshotStore>,
    config: ConversationConfig,
    window: HistoryWindow,
}

impl<P, C> ConversationManager<P, C>
where
    P: LLMProvider + Send + Sync,
    C: TokenCounter + Send + Sync,
{
    pub fn new(
        provider: P,
        counter: C,
        store: Arc<SnapshotStore>,
        config: ConversationConfig,
    ) -> Self {
        info!(
            "Creating conversation manager: model={}, max_prompt_tokens={}",
            config.model, config.max_prompt_tokens
        );
        let window = HistoryWindow::with_policy(
            TrimPolicy::default().with_max_tokens(config.max_prompt_tokens),
        );
        Self {
            provider,
            counter,
            store,
            config,
            window,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Run one inference step for `input` and commit the result.
    ///
    /// The user turn and the reply are only committed once the remote call
    /// succeeds; on any error the session is left untouched.
    pub async fn infer(
        &self,
        session: &mut ConversationSession,
        input: &str,
    ) -> Result<ChatMessage, ConversationError> {
        let turn_number = session.message_count() / 2 + 1;
        info!(
            "Processing turn {turn_number} for thread: {}",
            session.thread_id()
        );

        let mut pending = session.messages.clone();
        pending.push(ChatMessage::user(input));

        let prompt = self
            .window
            .build_prompt(&self.config.system_prompt, &pending, &self.counter)
            .inspect_err(|e| warn!("Cannot fit prompt for thread {}: {e}", session.thread_id()))?;

        debug!(
            "Prompt for turn {turn_number}: {} messages ({} history turns dropped)",
            prompt.len(),
            pending.len() + 1 - prompt.len()
        );

        let llm_response = self
            .provider
            .chat(&prompt, &self.config.completion_options())
            .await
            .map_err(|e| {
                warn!("Completion failed for thread {}: {e:#}", session.thread_id());
                ConversationError::remote(&e)
            })?;

        let reply = llm_response.content.trim().to_string();
        if reply.is_empty() {
            warn!("Empty completion for thread {}", session.thread_id());
            return Err(ConversationError::RemoteUnavailable(
                "Empty response from LLM".to_string(),
            ));
        }

        if let Some(usage) = &llm_response.usage {
            debug!(
                "Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        self.commit(session, input, &reply).await?;

        debug!("Turn {turn_number} completed successfully");
        Ok(ChatMessage::assistant(reply))
    }

    /// Append the exchange to the session and write the next checkpoint.
    async fn commit(
        &self,
        session: &mut ConversationSession,
        input: &str,
        reply: &str,
    ) -> Result<(), ConversationError> {
        let Some(tuple) = self.store.get_tuple(&session.config).await else {
            return Err(ConversationError::SnapshotUnavailable(
                session.thread_id().to_string(),
            ));
        };

        session.add_message(Role::User, input.to_string());
        session.add_message(Role::Assistant, reply.to_string());

        let mut writes = Map::new();
        writes.insert(MESSAGES_CHANNEL.to_string(), json!(session.messages));
        let (checkpoint, new_version) = tuple.checkpoint.advance(MODEL_NODE, writes);
        let metadata = tuple.metadata.advance(json!({
            MODEL_NODE: {
                MESSAGES_CHANNEL: [ChatMessage::user(input), ChatMessage::assistant(reply)],
            }
        }));

        session.config = self
            .store
            .put(session.config.clone(), checkpoint, metadata, new_version)
            .await;
        Ok(())
    }
}
