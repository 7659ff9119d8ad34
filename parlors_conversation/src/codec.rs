//! Conversion between live sessions and the client-held state blob.

use std::sync::Arc;

use parlors_core::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointMetadata, MESSAGES_CHANNEL, SessionConfig,
};
use crate::error::ConversationError;
use crate::session::ConversationSession;
use crate::store::SnapshotStore;

/// Resumable conversation state, stored by the client and replayed verbatim.
///
/// `prompt_list` holds the text of every turn; even positions are user turns
/// and odd positions assistant turns. The checkpoint never carries message
/// text and the metadata never carries step writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportableState {
    pub config: SessionConfig,
    pub checkpoint: Checkpoint,
    pub prompt_list: Vec<String>,
    pub metadata: CheckpointMetadata,
    pub new_version: ChannelVersions,
}

impl TransportableState {
    /// Decode and validate a client-supplied blob.
    pub fn from_value(value: Value) -> Result<Self, ConversationError> {
        let state: Self = serde_json::from_value(value).map_err(ConversationError::malformed)?;
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> Result<(), ConversationError> {
        if self.config.thread_id().trim().is_empty() {
            return Err(ConversationError::malformed(
                "config.configurable.thread_id must be non-empty",
            ));
        }
        if self.prompt_list.len() % 2 != 0 {
            return Err(ConversationError::malformed(format!(
                "prompt_list must hold complete user/assistant pairs, got {} entries",
                self.prompt_list.len()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        self.config.thread_id()
    }
}

fn messages_value(messages: &[ChatMessage]) -> Value {
    json!(messages)
}

pub struct StateCodec {
    store: Arc<SnapshotStore>,
}

impl StateCodec {
    #[must_use]
    pub const fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Rebuild a session from client state, or start a new one.
    pub async fn restore(
        &self,
        history: Option<TransportableState>,
    ) -> Result<ConversationSession, ConversationError> {
        let Some(state) = history else {
            return Ok(self.start(SessionConfig::fresh()).await);
        };
        state.validate()?;

        let TransportableState {
            config,
            mut checkpoint,
            prompt_list,
            mut metadata,
            new_version,
        } = state;

        let mut session = ConversationSession::from_prompt_list(config.clone(), &prompt_list);
        checkpoint
            .channel_values
            .insert(MESSAGES_CHANNEL.to_string(), messages_value(&session.messages));
        metadata.writes = None;

        debug!(
            "Restoring thread {} with {} turns at step {}",
            config.thread_id(),
            session.message_count(),
            metadata.step
        );

        session.config = self
            .store
            .put(config, checkpoint, metadata, new_version)
            .await;
        Ok(session)
    }

    /// Begin an empty conversation under `config`.
    pub async fn start(&self, config: SessionConfig) -> ConversationSession {
        let mut checkpoint = Checkpoint::empty();
        checkpoint
            .channel_values
            .insert(MESSAGES_CHANNEL.to_string(), messages_value(&[]));

        debug!("Starting new thread {}", config.thread_id());

        let config = self
            .store
            .put(
                config,
                checkpoint,
                CheckpointMetadata::input(),
                ChannelVersions::new(),
            )
            .await;
        ConversationSession::new(config)
    }

    /// Flatten the session's latest checkpoint into transportable form.
    pub async fn snapshot(
        &self,
        session: &ConversationSession,
    ) -> Result<TransportableState, ConversationError> {
        let Some(tuple) = self.store.get_tuple(&session.config).await else {
            error!("No checkpoint stored for thread {}", session.thread_id());
            return Err(ConversationError::SnapshotUnavailable(
                session.thread_id().to_string(),
            ));
        };

        let mut checkpoint = tuple.checkpoint;
        let messages = match checkpoint.channel_values.remove(MESSAGES_CHANNEL) {
            Some(value) => serde_json::from_value::<Vec<ChatMessage>>(value).map_err(|e| {
                error!("Corrupt message channel for thread {}: {e}", session.thread_id());
                ConversationError::SnapshotUnavailable(session.thread_id().to_string())
            })?,
            None => Vec::new(),
        };

        let mut metadata = tuple.metadata;
        metadata.writes = None;

        Ok(TransportableState {
            config: tuple.config,
            checkpoint,
            prompt_list: messages.into_iter().map(|m| m.content).collect(),
            metadata,
            new_version: tuple.new_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlors_core::Role;

    fn codec() -> StateCodec {
        StateCodec::new(Arc::new(SnapshotStore::new()))
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn fresh_restore_snapshots_empty() {
        let codec = codec();
        let session = codec.restore(None).await.expect("fresh session");

        assert!(session.is_empty());
        let state = codec.snapshot(&session).await.expect("snapshot");
        assert!(state.prompt_list.is_empty());
        assert_eq!(state.metadata.step, -1);
        assert!(state.metadata.writes.is_none());
        assert!(!state.checkpoint.channel_values.contains_key(MESSAGES_CHANNEL));
        assert_eq!(
            state.config.configurable.checkpoint_id.as_deref(),
            Some(state.checkpoint.id.as_str())
        );
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn restore_assigns_roles_by_parity() {
        let codec = codec();
        let mut state = codec
            .snapshot(&codec.restore(None).await.expect("fresh"))
            .await
            .expect("snapshot");
        state.prompt_list = vec!["Hello".into(), "Hi".into(), "How are you?".into(), "Well".into()];

        let session = codec.restore(Some(state)).await.expect("restore");

        let roles: Vec<Role> = session.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn restore_then_snapshot_is_identity() {
        let codec = codec();
        let mut state = codec
            .snapshot(&codec.restore(None).await.expect("fresh"))
            .await
            .expect("snapshot");
        state.prompt_list = vec!["Hello".into(), "Hi".into()];
        let before = serde_json::to_string(&state).expect("encode");

        let session = codec.restore(Some(state)).await.expect("restore");
        let after = codec.snapshot(&session).await.expect("snapshot");

        assert_eq!(serde_json::to_string(&after).expect("encode"), before);
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn writes_are_stripped_on_restore() {
        let codec = codec();
        let mut state = codec
            .snapshot(&codec.restore(None).await.expect("fresh"))
            .await
            .expect("snapshot");
        state.metadata.writes = Some(json!({"model": {"messages": []}}));

        let session = codec.restore(Some(state)).await.expect("restore");
        let after = codec.snapshot(&session).await.expect("snapshot");

        assert!(after.metadata.writes.is_none());
    }

    #[test]
    fn prompt_list_must_be_strings() {
        let blob = json!({
            "config": {"configurable": {"thread_id": "t"}},
            "checkpoint": {"v": 1, "id": "c", "ts": "2024-05-01T12:00:00Z", "channel_values": {}},
            "prompt_list": ["Hello", 42],
            "metadata": {"source": "loop", "step": 0},
            "new_version": {}
        });

        assert!(matches!(
            TransportableState::from_value(blob),
            Err(ConversationError::MalformedHistory(_))
        ));
    }

    #[test]
    fn missing_substructure_is_malformed() {
        let blob = json!({
            "config": {"configurable": {"thread_id": "t"}},
            "checkpoint": {"v": 1},
            "prompt_list": [],
            "metadata": {},
            "new_version": {}
        });

        assert!(matches!(
            TransportableState::from_value(blob),
            Err(ConversationError::MalformedHistory(_))
        ));
    }

    #[test]
    fn empty_thread_and_odd_lists_are_malformed() {
        let base = json!({
            "config": {"configurable": {"thread_id": " "}},
            "checkpoint": {"v": 1, "id": "c", "ts": "2024-05-01T12:00:00Z", "channel_values": {}},
            "prompt_list": [],
            "metadata": {"source": "loop", "step": 0},
            "new_version": {}
        });
        assert!(TransportableState::from_value(base.clone()).is_err());

        let mut odd = base;
        odd["config"]["configurable"]["thread_id"] = json!("t");
        odd["prompt_list"] = json!(["dangling"]);
        assert!(TransportableState::from_value(odd).is_err());
    }

    #[tokio::test]
    async fn snapshot_without_checkpoint_fails() {
        let codec = codec();
        let orphan = ConversationSession::new(SessionConfig::new("never-stored"));

        assert!(matches!(
            codec.snapshot(&orphan).await,
            Err(ConversationError::SnapshotUnavailable(_))
        ));
    }
}
