//! Serve command - run the HTTP search endpoint

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use mishkat_config::MishkatConfig;
use mishkat_engine::SearchEngine;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1:8080", env = "MISHKAT_BIND")]
    bind: String,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: MishkatConfig) -> Result<()> {
    let engine = Arc::new(
        SearchEngine::connect(config)
            .await
            .context("failed to assemble the search engine")?,
    );

    mishkat_server::serve(engine, &args.bind)
        .await
        .context("server exited with an error")
}
