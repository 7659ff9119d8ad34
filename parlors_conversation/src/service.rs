//! Request-level orchestration: restore, infer, snapshot.

use std::sync::Arc;

use parlors_core::{LLMProvider, TokenCounter};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::checkpoint::SessionConfig;
use crate::codec::{StateCodec, TransportableState};
use crate::error::ConversationError;
use crate::manager::ConversationManager;
use crate::store::SnapshotStore;

/// Result of one served turn: the reply text and the state to replay next.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub history: TransportableState,
}

/// Serves conversation turns, one thread at a time per thread id.
pub struct ConversationService<P = Arc<dyn LLMProvider>, C = Arc<dyn TokenCounter>>
where
    P: Send + Sync,
    C: Send + Sync,
{
    codec: StateCodec,
    manager: ConversationManager<P, C>,
}

impl<P, C> ConversationService<P, C>
where
    P: LLMProvider + Send + Sync,
    C: TokenCounter + Send + Sync,
{
    /// `manager` must write to the same store the codec reads from.
    pub const fn new(codec: StateCodec, manager: ConversationManager<P, C>) -> Self {
        Self { codec, manager }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SnapshotStore> {
        self.codec.store()
    }

    #[must_use]
    pub const fn manager(&self) -> &ConversationManager<P, C> {
        &self.manager
    }

    /// Serve one turn for `human_input`, resuming from `history` when given.
    ///
    /// Restore, inference and snapshot run under the thread's lock, so two
    /// requests replaying the same conversation never interleave. Nothing is
    /// returned on failure; the caller keeps its previous state.
    pub async fn respond(
        &self,
        human_input: &str,
        history: Option<Value>,
    ) -> Result<TurnOutcome, ConversationError> {
        if human_input.trim().is_empty() {
            return Err(ConversationError::BadRequest(
                "human_input must be non-empty".to_string(),
            ));
        }

        let state = history
            .filter(|value| !value.is_null())
            .map(TransportableState::from_value)
            .transpose()?;

        let config = state
            .as_ref()
            .map_or_else(SessionConfig::fresh, |s| s.config.clone());
        let _lane = self.store().lock_thread(config.thread_id()).await;

        let mut session = match state {
            Some(state) => self.codec.restore(Some(state)).await?,
            None => self.codec.start(config).await,
        };
        info!(
            "Serving thread {} ({} prior turns)",
            session.thread_id(),
            session.message_count()
        );

        let reply = self.manager.infer(&mut session, human_input).await?;
        let history = self.codec.snapshot(&session).await?;

        Ok(TurnOutcome {
            response: reply.content,
            history,
        })
    }
}
