use parlors_config::Config;

/// Strategy for displaying the effective configuration.
///
/// The API key is read from its environment variable and shown masked.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== parlors Configuration ===\n");

        println!("Config File: {}", Config::config_path()?.display());
        println!();

        println!("Provider:");
        println!("  Base URL: {}", config.provider.base_url);
        let key = std::env::var(&config.provider.api_key_env).ok();
        println!(
            "  API Key ({}): {}",
            config.provider.api_key_env,
            mask_key(key.as_deref())
        );
        println!();

        println!("Model:");
        println!("  Model: {}", config.model.model_id);
        println!("  Temperature: {}", config.model.temperature);
        println!("  Max Prompt Tokens: {}", config.model.max_prompt_tokens);
        println!("  System Prompt: {}", truncate(&config.model.system_prompt, 60));
        println!();

        println!("Server:");
        println!("  Listen: {}", config.server.bind_addr());
        println!("  Request Timeout: {}s", config.server.request_timeout_secs);
        println!("  Session TTL: {}s", config.server.session_ttl_secs);

        Ok(())
    }
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        None | Some("") => "(not set)".to_string(),
        Some(key) if key.chars().count() > 8 => {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().skip(key.chars().count() - 4).collect();
            format!("{head}...{tail}")
        }
        Some(_) => "***".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{head}...")
    }
}
