//! Doctor command - connectivity checks for every external collaborator

use anyhow::{Context, Result};
use clap::Args;

use mishkat_config::MishkatConfig;
use mishkat_engine::SearchEngine;

/// Arguments for the doctor command
#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Exit non-zero if any probe fails
    #[arg(long)]
    strict: bool,
}

/// Execute the doctor command
pub async fn execute(args: DoctorArgs, config: MishkatConfig) -> Result<()> {
    let engine = SearchEngine::connect(config)
        .await
        .context("failed to assemble the search engine")?;

    let probes = engine.doctor().await;
    let mut all_ok = true;

    for probe in &probes {
        let status = if probe.ok { "ok" } else { "FAIL" };
        match &probe.detail {
            Some(detail) => println!("{:<20} {status}  ({detail})", probe.name),
            None => println!("{:<20} {status}", probe.name),
        }
        all_ok &= probe.ok;
    }

    if !all_ok {
        println!("\nSome collaborators are unreachable; affected channels degrade at query time.");
        if args.strict {
            anyhow::bail!("doctor found failing probes");
        }
    }

    Ok(())
}
