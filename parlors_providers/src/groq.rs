use async_trait::async_trait;
use parlors_core::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse};
use reqwest::Client;
use serde_json::json;
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
pub enum ApiKey {
    /// Read from this environment variable on every request.
    Env(String),
    Literal(String),
}

impl ApiKey {
    fn resolve(&self) -> anyhow::Result<String> {
        match self {
            Self::Env(var) => std::env::var(var)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("API key not set: export {var}")),
            Self::Literal(key) => Ok(key.clone()),
        }
    }
}

pub struct GroqProvider {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: ApiKey) -> Self {
        info!("Creating GroqProvider");
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn try_send(&self, request: &serde_json::Value) -> anyhow::Result<LLMResponse> {
        let api_key = self.api_key.resolve()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing content"))?
            .to_string();

        let usage = response["usage"].as_object().map(|u| parlors_core::Usage {
            prompt_tokens: u32::try_from(u["prompt_tokens"].as_u64().unwrap_or(0)).unwrap_or(0),
            completion_tokens: u32::try_from(u["completion_tokens"].as_u64().unwrap_or(0))
                .unwrap_or(0),
            total_tokens: u32::try_from(u["total_tokens"].as_u64().unwrap_or(0)).unwrap_or(0),
        });

        Ok(LLMResponse { content, usage })
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> anyhow::Result<LLMResponse> {
        let request = json!({
            "model": options.model,
            "messages": messages,
            "temperature": options.temperature,
        });

        info!(
            "Sending request to Groq API: model={}, messages={}",
            options.model,
            messages.len()
        );

        let response = self.try_send(&request).await?;

        info!("Received response from Groq API");
        Ok(response)
    }
}
