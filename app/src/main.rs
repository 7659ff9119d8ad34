#![deny(
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

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, ServeInput,
    ServeStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "parlors")]
#[command(about = "Resumable conversations with a hosted language model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP endpoint
    Serve {
        /// Listen host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config)
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short = 't', long)]
        temperature: Option<f64>,

        /// Prompt budget in tokens
        #[arg(long)]
        max_prompt_tokens: Option<usize>,
    },
    /// Run one conversation turn locally
    Chat {
        /// Message to send
        #[arg(short = 'm', long)]
        message: String,

        /// File holding the conversation state; read if present, rewritten after the turn
        #[arg(short = 's', long)]
        state: Option<PathBuf>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,
    },
    /// Initialize configuration
    Init,
    /// Show effective configuration
    Info,
    /// Show version
    Version,
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
///
/// With no `path`, the file is searched for in the working directory and its
/// parents. Variables already set are left alone. Returns the loaded file, or
/// `None` when there is none.
fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file(None);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match env_file {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => debug!("No .env file found"),
        Err(e) => warn!("Ignoring unreadable .env file: {e}"),
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            model,
            temperature,
            max_prompt_tokens,
        } => {
            ServeStrategy
                .execute(ServeInput {
                    host,
                    port,
                    model,
                    temperature,
                    max_prompt_tokens,
                })
                .await
        }
        Commands::Chat {
            message,
            state,
            model,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    state,
                    model,
                })
                .await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
