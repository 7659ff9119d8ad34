//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;
use std::time::Duration;

use parlors_config::Config;
use parlors_conversation::{
    ConversationConfig, ConversationManager, ConversationService, SnapshotStore, StateCodec,
};
use parlors_core::{ApproxTokenCounter, LLMProvider, TokenCounter};
use parlors_providers::{ApiKey, GroqProvider, TiktokenCounter};
use tracing::{info, warn};

mod chat;
mod info;
mod init;
mod serve;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use serve::{ServeInput, ServeStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Example
/// ```rust
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Token counter for prompt trimming: the cl100k tokenizer when it loads,
/// otherwise the character estimate.
fn token_counter() -> Arc<dyn TokenCounter> {
    match TiktokenCounter::new() {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!("Tokenizer unavailable, estimating tokens from characters: {e}");
            Arc::new(ApproxTokenCounter)
        }
    }
}

fn conversation_config(config: &Config) -> ConversationConfig {
    ConversationConfig::default()
        .with_model(config.model.model_id.clone())
        .with_temperature(config.model.temperature)
        .with_system_prompt(config.model.system_prompt.clone())
        .with_max_prompt_tokens(config.model.max_prompt_tokens)
}

/// Wire provider, tokenizer and snapshot store into a conversation service.
fn build_service(config: &Config) -> ConversationService {
    let provider: Arc<dyn LLMProvider> = Arc::new(
        GroqProvider::new(ApiKey::Env(config.provider.api_key_env.clone()))
            .with_base_url(config.provider.base_url.clone()),
    );
    let store = Arc::new(SnapshotStore::with_ttl(Duration::from_secs(
        config.server.session_ttl_secs,
    )));

    info!(
        "Conversation service: model={}, temperature={}, max_prompt_tokens={}",
        config.model.model_id, config.model.temperature, config.model.max_prompt_tokens
    );

    let manager = ConversationManager::new(
        provider,
        token_counter(),
        Arc::clone(&store),
        conversation_config(config),
    );
    ConversationService::new(StateCodec::new(store), manager)
}
