//! Config command - view and initialize configuration

use anyhow::{Context, Result};
use clap::Subcommand;

use mishkat_config::{ConfigLoader, MishkatConfig};

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged effective configuration as TOML
    Show,

    /// Write a default config file
    Init {
        /// Write to `~/.mishkat/config.toml` instead of the workspace
        #[arg(long)]
        global: bool,
    },
}

/// Execute the config command
pub fn execute(command: ConfigCommand, config: MishkatConfig) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
        ConfigCommand::Init { global } => {
            let loader = ConfigLoader::new();
            let path = if global {
                loader.init_global().context("failed to write global config")?
            } else {
                let cwd = std::env::current_dir()?;
                loader
                    .init_local(&cwd)
                    .context("failed to write local config")?
            };
            println!("Config written to {}", path.display());
            Ok(())
        }
    }
}

