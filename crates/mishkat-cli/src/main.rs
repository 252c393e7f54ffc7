//! Mishkat CLI - hybrid search over Quran, hadith, and book corpora
//!
//! # Usage
//!
//! ```bash
//! # Run one query end to end
//! mishkat search "آية الكرسي"
//!
//! # Refine mode with expansion and reranking
//! mishkat search --refine "stories of Musa and Pharaoh"
//!
//! # Check every external collaborator
//! mishkat doctor
//!
//! # Serve the HTTP endpoint
//! mishkat serve --bind 0.0.0.0:8080
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Mishkat - Arabic-Islamic hybrid search
#[derive(Parser, Debug)]
#[command(name = "mishkat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Vector store URL
    #[arg(long, global = true, env = "MISHKAT_VECTOR_URL")]
    vector_url: Option<String>,

    /// Text engine URL
    #[arg(long, global = true, env = "MISHKAT_TEXT_ENGINE_URL")]
    text_engine_url: Option<String>,

    /// Relational store URL
    #[arg(long, global = true, env = "MISHKAT_DATABASE_URL")]
    database_url: Option<String>,

    /// Graph store URL
    #[arg(long, global = true, env = "MISHKAT_GRAPH_URL")]
    graph_url: Option<String>,

    /// Log filter (overrides config), e.g. `mishkat=debug`
    #[arg(long, global = true, env = "MISHKAT_LOG")]
    log: Option<String>,
}

impl GlobalOptions {
    fn to_config_overrides(&self) -> mishkat_config::ConfigOverrides {
        mishkat_config::ConfigOverrides {
            vector_url: self.vector_url.clone(),
            text_engine_url: self.text_engine_url.clone(),
            database_url: self.database_url.clone(),
            graph_url: self.graph_url.clone(),
            log_level: self.log.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one search query end to end
    Search(commands::search::SearchArgs),

    /// Check connectivity to every external collaborator
    Doctor(commands::doctor::DoctorArgs),

    /// Serve the HTTP search endpoint
    Serve(commands::serve::ServeArgs),

    /// View or initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Load the merged configuration for the current directory.
pub fn load_config(global: &GlobalOptions) -> Result<mishkat_config::MishkatConfig> {
    let cwd = std::env::current_dir()?;
    let mut loader = mishkat_config::ConfigLoader::new();
    let config = loader.load(&cwd, Some(&global.to_config_overrides()))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.global)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search(args) => commands::search::execute(args, config).await,
        Commands::Doctor(args) => commands::doctor::execute(args, config).await,
        Commands::Serve(args) => commands::serve::execute(args, config).await,
        Commands::Config(command) => commands::config::execute(command, config),
    }
}
