#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Resumable conversations over a stateless completion API.
//!
//! Every request rebuilds its conversation from a client-held
//! [`TransportableState`], runs one inference step against the remote model,
//! and hands back an updated state for the client to replay next time.
//!
//! # Key Features
//! - Conversations keyed by a per-conversation thread id
//! - Token-budgeted history trimming that always starts on a user turn
//! - Checkpoint bookkeeping that round-trips through the client
//! - Restore, infer and snapshot serialized per conversation

mod checkpoint;
mod codec;
mod error;
mod history;
mod manager;
mod service;
mod session;
mod store;

pub use checkpoint::{
    Checkpoint, CheckpointMetadata, ChannelVersions, Configurable, MESSAGES_CHANNEL, SessionConfig,
};
pub use codec::{StateCodec, TransportableState};
pub use error::ConversationError;
pub use history::{HistoryWindow, TrimError, TrimPolicy};
pub use manager::{ConversationConfig, ConversationManager};
pub use service::{ConversationService, TurnOutcome};
pub use session::ConversationSession;
pub use store::{CheckpointTuple, SnapshotStore};
