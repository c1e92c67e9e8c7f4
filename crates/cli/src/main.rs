//! Aru CLI: the main entry point.
//!
//! Commands:
//! - `chat`     Interactive REPL or single-message mode
//! - `memory`   Search and maintain long-term memory
//! - `mcp`      Inspect configured tool servers
//! - `onboard`  Write the default config
//! - `doctor`   Diagnose configuration, memory and tool servers

use aru_config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "aru", about = "Aru: a routed personal assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.aru/config.toml
    #[arg(long, global = true, env = "ARU_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Resume (or start) a named session
        #[arg(long)]
        session: Option<String>,

        /// Skip the router and answer through the tool loop directly
        #[arg(long)]
        direct: bool,
    },

    /// Search and maintain long-term memory
    Memory {
        #[command(subcommand)]
        action: commands::memory::MemoryAction,
    },

    /// Inspect configured MCP tool servers
    Mcp {
        #[command(subcommand)]
        action: commands::mcp::McpAction,
    },

    /// Write the default configuration
    Onboard,

    /// Diagnose system health
    Doctor,
}

fn init_tracing(verbose: bool, configured_level: &str) {
    let filter = if verbose { "debug" } else { configured_level };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Onboard and doctor must work with a missing or broken config.
    let loaded = commands::load_config(cli.config.as_deref());
    let level = loaded.as_ref().map(|c| c.log_level.clone()).unwrap_or_else(|_| "info".into());
    init_tracing(cli.verbose, &level);

    let result = match cli.command {
        Commands::Onboard => commands::onboard::run().await,
        Commands::Doctor => commands::doctor::run(cli.config.as_deref()).await,
        command => match loaded {
            Ok(config) => dispatch(command, config).await,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Chat {
            message,
            session,
            direct,
        } => {
            if let Err(e) = config.check_credentials() {
                eprintln!("Configuration error: {e}");
                std::process::exit(1);
            }
            commands::chat::run(config, message, session, direct).await
        }
        Commands::Memory { action } => commands::memory::run(config, action).await,
        Commands::Mcp { action } => commands::mcp::run(config, action).await,
        Commands::Onboard | Commands::Doctor => Ok(()),
    }
}
