mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alterego_config::AppConfig;
use alterego_runtime::Services;

use crate::commands::SettingArgs;

const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "alterego",
    version,
    about = "A persona that drifts with what you write"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show or change the agent setting stored alongside the persona.
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
    /// Inspect the persona.
    Persona {
        #[command(subcommand)]
        command: PersonaCommands,
    },
    /// Record new content and run one persona update for it.
    Ingest {
        /// Content text.
        text: String,
        /// Print model output as it streams in.
        #[arg(long)]
        stream: bool,
    },
    /// Summarise recent content (cached until the next ingest).
    Recent,
    /// Read content lines from stdin and publish each as an event.
    Watch,
    Doctor,
}

#[derive(Debug, Subcommand)]
enum SettingCommands {
    Show,
    Set(SettingArgs),
}

#[derive(Debug, Subcommand)]
enum PersonaCommands {
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let services = Services::open(&config)
        .with_context(|| format!("failed to open store at {}", config.store.path))?;

    match cli.command {
        Commands::Setting { command } => match command {
            SettingCommands::Show => commands::run_setting_show(&services)?,
            SettingCommands::Set(args) => commands::run_setting_set(&services, &args)?,
        },
        Commands::Persona {
            command: PersonaCommands::Show,
        } => commands::run_persona_show(&services)?,
        Commands::Ingest { text, stream } => commands::run_ingest(&services, &text, stream).await?,
        Commands::Recent => commands::run_recent(&services).await?,
        Commands::Watch => commands::run_watch(&services).await?,
        Commands::Doctor => {
            let config_exists = Path::new(&cli.config).exists();
            commands::run_doctor(&config, &cli.config, config_exists, &services)?;
        }
    }

    Ok(())
}
