mod preview;

use std::path::Path;

use clap::{Parser, Subcommand};

use wabot_config::WabotConfig;

#[derive(Parser)]
#[command(name = "wabot", about = "WhatsApp assignment-reminder bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the channels and run the bot until interrupted
    Run {
        /// Config file path (defaults to ~/.wabot/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show what the next daily sweep would do, without touching anything
    SweepPreview {
        /// Config file path (defaults to ~/.wabot/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Check configuration and probe the database and bridge endpoints
    Health {
        /// Config file path (defaults to ~/.wabot/config.json5)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn load(config: Option<String>) -> anyhow::Result<WabotConfig> {
    match config {
        Some(path) => Ok(wabot_config::load_config_from(Path::new(&path))?),
        None => Ok(wabot_config::load_config()?),
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = load(config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let mut factories: std::collections::HashMap<
                    String,
                    wabot_gateway::ChannelFactory,
                > = std::collections::HashMap::new();
                factories.insert(
                    "whatsapp".into(),
                    Box::new(wabot_channel_whatsapp::create_whatsapp_channel),
                );

                wabot_gateway::start_bot(config, factories).await
            })?;
        }
        Commands::SweepPreview { config } => {
            let config = load(config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(preview::run_preview(config))?;
        }
        Commands::Health { config } => {
            let config = load(config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(preview::run_health(config))?;
        }
    }

    Ok(())
}
