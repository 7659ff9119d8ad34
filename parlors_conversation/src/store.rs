//! In-memory snapshot store keyed by conversation thread id.
//!
//! Holds the latest checkpoint of every live conversation plus a per-thread
//! lane that serializes restore, inference and snapshot for that thread.
//! Threads left idle longer than the configured TTL are evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::checkpoint::{ChannelVersions, Checkpoint, CheckpointMetadata, SessionConfig};

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// The latest checkpoint of one thread, as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    pub config: SessionConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
    pub new_version: ChannelVersions,
}

struct Slot {
    lane: Arc<Mutex<()>>,
    latest: Option<CheckpointTuple>,
    touched_at: DateTime<Utc>,
}

impl Slot {
    fn new() -> Self {
        Self {
            lane: Arc::new(Mutex::new(())),
            latest: None,
            touched_at: Utc::now(),
        }
    }

    fn in_use(&self) -> bool {
        Arc::strong_count(&self.lane) > 1
    }
}

pub struct SnapshotStore {
    slots: RwLock<HashMap<String, Slot>>,
    ttl: Duration,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Acquire exclusive use of a thread until the guard is dropped.
    pub async fn lock_thread(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lane = {
            let mut slots = self.slots.write().await;
            let slot = slots.entry(thread_id.to_string()).or_insert_with(Slot::new);
            slot.touched_at = Utc::now();
            Arc::clone(&slot.lane)
        };
        lane.lock_owned().await
    }

    /// Store `checkpoint` as the latest for the config's thread.
    ///
    /// Returns the config pointing at the stored checkpoint.
    pub async fn put(
        &self,
        config: SessionConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_version: ChannelVersions,
    ) -> SessionConfig {
        self.evict_expired().await;

        let config = config.with_checkpoint_id(checkpoint.id.clone());
        let thread_id = config.thread_id().to_string();
        debug!(
            "Storing checkpoint {} for thread {thread_id} (step {})",
            checkpoint.id, metadata.step
        );

        let mut slots = self.slots.write().await;
        let slot = slots.entry(thread_id).or_insert_with(Slot::new);
        slot.touched_at = Utc::now();
        slot.latest = Some(CheckpointTuple {
            config: config.clone(),
            checkpoint,
            metadata,
            new_version,
        });

        config
    }

    /// Latest checkpoint for the config's thread, if any.
    pub async fn get_tuple(&self, config: &SessionConfig) -> Option<CheckpointTuple> {
        let slots = self.slots.read().await;
        slots
            .get(config.thread_id())
            .and_then(|slot| slot.latest.clone())
    }

    /// Drop idle threads older than the TTL.
    pub async fn evict_expired(&self) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.evict_idle_since(cutoff).await
    }

    /// Drop threads last touched before `cutoff` that nobody holds.
    pub async fn evict_idle_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| slot.in_use() || slot.touched_at >= cutoff);
        let evicted = before - slots.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle conversation(s)");
        }
        evicted
    }

    /// Number of threads currently holding a checkpoint.
    pub async fn len(&self) -> usize {
        let slots = self.slots.read().await;
        slots.values().filter(|slot| slot.latest.is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
