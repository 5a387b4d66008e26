//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Stream one answer from a configured bot
//! - `config`: Show, locate or validate the configuration
//! - `init`: Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — streaming LLM chat with tool resolution",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and stream the answer
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Bot to answer (defaults to `default_bot_name`)
        #[arg(short, long, env = "PARLEY_BOT")]
        bot: Option<String>,

        /// Attach an image (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// Extra system instructions for this request
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Write a default configuration file
    Init,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers stay clean on stdout
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            bot,
            images,
            system,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                message,
                bot,
                images,
                system,
            })
            .await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
        Commands::Init => commands::init::run()?,
    }

    Ok(())
}
