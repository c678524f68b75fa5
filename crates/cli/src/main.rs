//! toolchat CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP/SSE gateway
//! - `chat`   : Run one turn in-process and print the streamed reply
//! - `doctor` : Diagnose configuration and backends
//! - `init`   : Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolchat",
    about = "toolchat: a streaming tool-calling agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of ~/.toolchat/config.toml
    #[arg(short, long, global = true, env = "TOOLCHAT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message to the agent
    Chat {
        message: String,

        /// Resume an existing session
        #[arg(long)]
        checkpoint_id: Option<String>,
    },

    /// Diagnose configuration and backends
    Doctor,

    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "toolchat=debug,tower_http=debug"
    } else {
        "toolchat=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let config_path = cli.config.as_deref();
    tracing::debug!(config = ?config_path, "toolchat starting");
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat {
            message,
            checkpoint_id,
        } => commands::chat::run(config_path, message, checkpoint_id).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Init => commands::init::run(config_path).await?,
    }

    Ok(())
}
