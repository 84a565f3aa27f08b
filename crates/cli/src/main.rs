//! DocChat CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `serve`    — Start the HTTP gateway
//! - `chat`     — Interactive terminal session
//! - `register` — Create an account
//! - `history`  — Show or clear a user's chat history
//! - `doctor`   — Diagnose configuration and storage

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docchat",
    about = "DocChat — ask questions about your PDF documents",
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
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.docchat/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Interactive chat in the terminal
    Chat,

    /// Create a new account (password is read from stdin)
    Register {
        username: String,
    },

    /// Show a user's chat history
    History {
        username: String,

        /// Delete the history instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Diagnose configuration, API key and database
    Doctor {
        /// Also call the generation service
        #[arg(long)]
        online: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    if let Some(path) = docchat_config::load_dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Register { username } => commands::register::run(&username).await?,
        Commands::History { username, clear } => commands::history::run(&username, clear).await?,
        Commands::Doctor { online } => commands::doctor::run(online).await?,
    }

    Ok(())
}
