use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use parlors_core::DEFAULT_SYSTEM_PROMPT;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// Upper bound on one request, remote completion included.
    #[serde(default = "ServerConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Snapshots untouched for this long are evicted.
    #[serde(default = "ServerConfig::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            session_ttl_secs: Self::default_session_ttl_secs(),
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u16 {
        8000
    }

    const fn default_request_timeout_secs() -> u64 {
        60
    }

    const fn default_session_ttl_secs() -> u64 {
        3600
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "ModelConfig::default_model_id")]
    pub model_id: String,
    #[serde(default = "ModelConfig::default_temperature")]
    pub temperature: f64,
    #[serde(default = "ModelConfig::default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,
    #[serde(default = "ModelConfig::default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: Self::default_model_id(),
            temperature: Self::default_temperature(),
            max_prompt_tokens: Self::default_max_prompt_tokens(),
            system_prompt: Self::default_system_prompt(),
        }
    }
}

impl ModelConfig {
    fn default_model_id() -> String {
        "llama3-8b-8192".to_string()
    }

    const fn default_temperature() -> f64 {
        0.7
    }

    const fn default_max_prompt_tokens() -> usize {
        500
    }

    fn default_system_prompt() -> String {
        DEFAULT_SYSTEM_PROMPT.to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "ProviderConfig::default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key; read on every request.
    #[serde(default = "ProviderConfig::default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key_env: Self::default_api_key_env(),
        }
    }
}

impl ProviderConfig {
    fn default_base_url() -> String {
        "https://api.groq.com/openai/v1".to_string()
    }

    fn default_api_key_env() -> String {
        "GROQ_API_KEY".to_string()
    }
}

impl Config {
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("parlors")
            .join("config.json"))
    }

    /// Load `~/parlors/config.json`, falling back to defaults when it is absent.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("parlors");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Export your Groq API key: export GROQ_API_KEY=...");
        println!("   2. Run 'parlors serve' to start the HTTP service");
        println!();
        println!("🔧 Configuration options:");
        println!("   - server.host / server.port: listen address (default 0.0.0.0:8000)");
        println!("   - model.model_id: model to use (llama3-8b-8192, llama3-70b-8192, ...)");
        println!("   - model.max_prompt_tokens: prompt budget for trimming history");
        println!("   - provider.api_key_env: environment variable holding the API key");
        println!();
        Ok(())
    }

    fn write_template(path: &Path) -> anyhow::Result<()> {
        let template = serde_json::to_string_pretty(&Self::default())?;
        std::fs::write(path, template)?;
        Ok(())
    }
}
