//! One conversation turn from the command line.
//!
//! The conversation state lives in a JSON file in the same shape the HTTP
//! endpoint returns as `history`, so a turn can be resumed by either.

use std::path::{Path, PathBuf};

use parlors_config::Config;
use serde_json::Value;
use tracing::info;

use super::build_service;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Message to send
    pub message: String,
    /// State file; read when it exists, rewritten after a successful turn
    pub state: Option<PathBuf>,
    /// Optional model override
    pub model: Option<String>,
}

/// Strategy for running a single turn and printing the reply.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

fn read_state(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid state file {}: {e}", path.display()))?;
    Ok(Some(value))
}

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(model) = input.model {
            config.model.model_id = model;
        }

        let history = match input.state.as_deref() {
            Some(path) => read_state(path)?,
            None => None,
        };

        let service = build_service(&config);
        let outcome = service.respond(&input.message, history).await?;

        println!("{}", outcome.response);

        if let Some(path) = input.state {
            std::fs::write(&path, serde_json::to_string_pretty(&outcome.history)?)?;
            info!(
                "Saved thread {} ({} turns) to {}",
                outcome.history.thread_id(),
                outcome.history.prompt_list.len(),
                path.display()
            );
        }

        Ok(())
    }
}
