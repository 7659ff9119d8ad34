//! End-to-end conversation tests against a scripted model.
//!
//! These exercise the full restore → infer → snapshot cycle the way the
//! HTTP layer drives it, including replaying the returned state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parlors_conversation::{
    ConversationConfig, ConversationError, ConversationManager, ConversationService,
    SnapshotStore, StateCodec, TransportableState,
};
use parlors_core::{
    ApproxTokenCounter, ChatMessage, CompletionOptions, LLMProvider, LLMResponse, Role,
};
use serde_json::json;

/// Answers "reply N to: <last user text>" and counts calls.
struct EchoProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl LLMProvider for EchoProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> anyhow::Result<LLMResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(LLMResponse {
            content: format!("reply {n} to: {last}"),
            usage: None,
        })
    }
}

fn service(max_prompt_tokens: usize) -> ConversationService<Arc<EchoProvider>, ApproxTokenCounter> {
    let store = Arc::new(SnapshotStore::new());
    let provider = Arc::new(EchoProvider {
        calls: AtomicUsize::new(0),
    });
    let manager = ConversationManager::new(
        provider,
        ApproxTokenCounter,
        Arc::clone(&store),
        ConversationConfig::default().with_max_prompt_tokens(max_prompt_tokens),
    );
    ConversationService::new(StateCodec::new(store), manager)
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn two_turn_conversation_accumulates_history() {
    let service = service(500);

    let first = service.respond("Hello", None).await.expect("first turn");
    assert_eq!(first.response, "reply 1 to: Hello");
    assert_eq!(first.history.prompt_list, vec!["Hello", "reply 1 to: Hello"]);

    let replay = serde_json::to_value(&first.history).expect("encode history");
    let second = service
        .respond("And you?", Some(replay))
        .await
        .expect("second turn");

    assert_eq!(second.history.prompt_list.len(), 4);
    assert_eq!(second.history.prompt_list[0], "Hello");
    assert_eq!(second.history.prompt_list[2], "And you?");
    assert_eq!(second.history.thread_id(), first.history.thread_id());
    assert_eq!(second.history.metadata.step, first.history.metadata.step + 1);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn independent_starts_do_not_share_state() {
    let service = service(500);

    let a = service.respond("I am A", None).await.expect("a");
    let b = service.respond("I am B", None).await.expect("b");

    assert_ne!(a.history.thread_id(), b.history.thread_id());
    assert_eq!(a.history.prompt_list.len(), 2);
    assert_eq!(b.history.prompt_list.len(), 2);
    assert_eq!(a.history.prompt_list[0], "I am A");
    assert_eq!(b.history.prompt_list[0], "I am B");
    assert_eq!(service.store().len().await, 2);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn replayed_state_survives_a_fresh_process() {
    let first = service(500).respond("Hello", None).await.expect("first");
    let replay = serde_json::to_value(&first.history).expect("encode");

    // A different service instance has never seen this thread.
    let second = service(500)
        .respond("Again", Some(replay))
        .await
        .expect("resume elsewhere");

    assert_eq!(
        second.history.prompt_list,
        vec!["Hello", "reply 1 to: Hello", "Again", "reply 1 to: Again"]
    );
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn prompt_list_parity_holds_over_many_turns() {
    let service = service(500);
    let mut history = None;

    for i in 0..5 {
        let outcome = service
            .respond(&format!("question {i}"), history.take())
            .await
            .expect("turn");
        for (idx, text) in outcome.history.prompt_list.iter().enumerate() {
            assert_eq!(idx % 2 == 0, text.starts_with("question"));
        }
        history = Some(serde_json::to_value(&outcome.history).expect("encode"));
    }
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn long_history_still_trims_to_budget() {
    let service = service(60);
    let mut history = None;

    for _ in 0..6 {
        let outcome = service
            .respond(&"word ".repeat(20), history.take())
            .await
            .expect("each turn fits once trimmed");
        history = Some(serde_json::to_value(&outcome.history).expect("encode"));
    }

    let state = TransportableState::from_value(history.expect("history")).expect("decode");
    // Trimming only affects the prompt; the transported history keeps everything.
    assert_eq!(state.prompt_list.len(), 12);
}

#[tokio::test]
async fn malformed_history_is_rejected_before_inference() {
    let service = service(500);

    let err = service
        .respond("Hello", Some(json!({"prompt_list": "not a list"})))
        .await;

    assert!(matches!(err, Err(ConversationError::MalformedHistory(_))));
    assert!(service.store().is_empty().await);
}

#[tokio::test]
#[expect(clippy::expect_used, reason = "Test failure should panic with context")]
async fn null_history_starts_fresh() {
    let service = service(500);

    let outcome = service
        .respond("Hello", Some(serde_json::Value::Null))
        .await
        .expect("null is treated as absent");

    assert_eq!(outcome.history.prompt_list.len(), 2);
}

#[tokio::test]
async fn blank_input_is_rejected_before_inference() {
    let service = service(500);

    let err = service.respond("  \n\t", None).await;

    assert!(matches!(err, Err(ConversationError::BadRequest(_))));
    assert!(service.store().is_empty().await);
}
