use std::sync::Arc;
use std::time::Duration;

use parlors_config::Config;
use parlors_conversation::SnapshotStore;
use tokio::task::JoinHandle;
use tracing::info;

use super::build_service;

/// How often idle conversations are swept from the snapshot store.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Input parameters for the Serve command strategy.
#[derive(Debug, Clone)]
pub struct ServeInput {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_prompt_tokens: Option<usize>,
}

/// Strategy for running the HTTP service.
///
/// Command line flags override the matching fields of the loaded config.
#[derive(Debug, Clone, Copy)]
pub struct ServeStrategy;

impl ServeInput {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(model) = self.model {
            config.model.model_id = model;
        }
        if let Some(temperature) = self.temperature {
            config.model.temperature = temperature;
        }
        if let Some(limit) = self.max_prompt_tokens {
            config.model.max_prompt_tokens = limit;
        }
    }
}

/// Evict idle conversations every `period` until the task is aborted.
fn spawn_eviction_sweep(store: Arc<SnapshotStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            store.evict_expired().await;
        }
    })
}

impl super::CommandStrategy for ServeStrategy {
    type Input = ServeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        input.apply(&mut config);

        let service = Arc::new(build_service(&config));

        let sweeper = spawn_eviction_sweep(Arc::clone(service.store()), EVICTION_INTERVAL);

        info!("Starting parlors on {}", config.server.bind_addr());
        let result = parlors_server::run_http(
            service,
            &config.server.bind_addr(),
            Duration::from_secs(config.server.request_timeout_secs),
        )
        .await;

        sweeper.abort();
        result
    }
}
