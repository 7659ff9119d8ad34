//! Checkpoint bookkeeping carried alongside a conversation.
//!
//! A checkpoint records the pipeline state after a step: channel values,
//! per-channel versions and which versions each node has consumed. Message
//! text lives in the [`MESSAGES_CHANNEL`] channel only while the checkpoint
//! is held by the [`SnapshotStore`](crate::SnapshotStore); it travels to the
//! client separately as a flat prompt list.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Channel holding the conversation turns.
pub const MESSAGES_CHANNEL: &str = "messages";

/// Checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Channel name to monotonically increasing version.
pub type ChannelVersions = BTreeMap<String, u64>;

/// Routing information identifying one conversation and its latest checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub configurable: Configurable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Configurable {
    pub thread_id: String,
    #[serde(default)]
    pub checkpoint_ns: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            configurable: Configurable {
                thread_id: thread_id.into(),
                checkpoint_ns: String::new(),
                checkpoint_id: None,
            },
        }
    }

    /// A config for a brand-new conversation.
    #[must_use]
    pub fn fresh() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.configurable.thread_id
    }

    #[must_use]
    pub fn with_checkpoint_id(mut self, id: impl Into<String>) -> Self {
        self.configurable.checkpoint_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub v: u32,
    pub id: String,
    pub ts: DateTime<Utc>,
    pub channel_values: Map<String, Value>,
    #[serde(default)]
    pub channel_versions: ChannelVersions,
    #[serde(default)]
    pub versions_seen: BTreeMap<String, ChannelVersions>,
    #[serde(default)]
    pub pending_sends: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Checkpoint {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            v: CHECKPOINT_VERSION,
            id: Uuid::now_v7().to_string(),
            ts: Utc::now(),
            channel_values: Map::new(),
            channel_versions: ChannelVersions::new(),
            versions_seen: BTreeMap::new(),
            pending_sends: Vec::new(),
            extra: Map::new(),
        }
    }

    fn max_version(&self) -> u64 {
        self.channel_versions.values().copied().max().unwrap_or(0)
    }

    /// The checkpoint after `node` writes `writes` into their channels.
    ///
    /// Every written channel is bumped past the current highest version,
    /// `node` is recorded as having seen the pre-write versions, and the
    /// bumped versions are returned alongside the new checkpoint.
    #[must_use]
    pub fn advance(&self, node: &str, writes: Map<String, Value>) -> (Self, ChannelVersions) {
        let next_version = self.max_version() + 1;
        let mut next = self.clone();
        next.id = Uuid::now_v7().to_string();
        next.ts = Utc::now();
        next.versions_seen
            .insert(node.to_string(), self.channel_versions.clone());

        let mut new_versions = ChannelVersions::new();
        for (channel, value) in writes {
            next.channel_versions.insert(channel.clone(), next_version);
            new_versions.insert(channel.clone(), next_version);
            next.channel_values.insert(channel, value);
        }

        (next, new_versions)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    pub source: String,
    pub step: i64,
    /// Writes made by the step that produced the checkpoint; never transported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writes: Option<Value>,
    #[serde(default)]
    pub parents: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CheckpointMetadata {
    /// Metadata of the input checkpoint that precedes the first step.
    #[must_use]
    pub fn input() -> Self {
        Self {
            source: "input".to_string(),
            step: -1,
            writes: None,
            parents: Map::new(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn advance(&self, writes: Value) -> Self {
        Self {
            source: "loop".to_string(),
            step: self.step + 1,
            writes: Some(writes),
            parents: self.parents.clone(),
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn advance_bumps_written_channels_only() {
        let mut base = Checkpoint::empty();
        base.channel_versions.insert("__start__".to_string(), 2);
        base.channel_versions.insert(MESSAGES_CHANNEL.to_string(), 1);

        let mut writes = Map::new();
        writes.insert(MESSAGES_CHANNEL.to_string(), json!(["hi"]));
        let (next, new_versions) = base.advance("model", writes);

        assert_ne!(next.id, base.id);
        assert_eq!(next.channel_versions[MESSAGES_CHANNEL], 3);
        assert_eq!(next.channel_versions["__start__"], 2);
        assert_eq!(new_versions.len(), 1);
        assert_eq!(new_versions[MESSAGES_CHANNEL], 3);
        assert_eq!(next.versions_seen["model"], base.channel_versions);
        assert_eq!(next.channel_values[MESSAGES_CHANNEL], json!(["hi"]));
    }

    #[test]
    fn metadata_advance_increments_step() {
        let input = CheckpointMetadata::input();
        let next = input.advance(json!({"model": {}}));

        assert_eq!(next.step, 0);
        assert_eq!(next.source, "loop");
        assert!(next.writes.is_some());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn unknown_fields_survive_serde() {
        let raw = json!({
            "v": 1,
            "id": "abc",
            "ts": "2024-05-01T12:00:00Z",
            "channel_values": {},
            "channel_versions": {"messages": 2},
            "versions_seen": {},
            "pending_sends": [],
            "custom": {"kept": true}
        });

        let checkpoint: Checkpoint = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(checkpoint.extra["custom"], json!({"kept": true}));
        assert_eq!(serde_json::to_value(&checkpoint).expect("encode"), raw);
    }

    #[test]
    fn missing_channel_values_is_rejected() {
        let raw = json!({"v": 1, "id": "abc", "ts": "2024-05-01T12:00:00Z"});
        assert!(serde_json::from_value::<Checkpoint>(raw).is_err());
    }
}
