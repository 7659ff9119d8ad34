//! Service configuration loaded from `~/parlors/config.json`.

mod schema;

pub use schema::{Config, ModelConfig, ProviderConfig, ServerConfig};
