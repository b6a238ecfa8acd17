//! Game Wizard CLI, the main entry point.
//!
//! Commands:
//! - `serve`   Start the web UI and JSON API
//! - `ask`     Ask a single question
//! - `chat`    Interactive question-answer session in the terminal
//! - `config`  Show, validate or create the configuration
//! - `doctor`  Check configuration and backend connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gamewizard",
    about = "Game Wizard: your guide to gaming knowledge",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.gamewizard/config.toml
    #[arg(short, long, global = true, env = "GAMEWIZARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI and JSON API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the wizard a single question
    Ask {
        /// The question
        question: String,

        /// Knowledge depth: how many chunks to retrieve (1-20)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Completion model
        #[arg(short, long)]
        model: Option<String>,

        /// Print the retrieved context after the answer
        #[arg(long)]
        show_context: bool,
    },

    /// Chat with the wizard in the terminal
    Chat {
        /// Knowledge depth: how many chunks to retrieve (1-20)
        #[arg(short, long)]
        depth: Option<usize>,

        /// Completion model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check configuration and backend connectivity
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Validate the configuration
    Validate,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            question,
            depth,
            model,
            show_context,
        } => commands::ask::run(config_path, question, depth, model, show_context).await?,
        Commands::Chat { depth, model } => commands::chat::run(config_path, depth, model).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
        },
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
