//! `kill-server`: writes one clip into many playback streams at once.
//!
//! Every stream forces the server to rewind and remix; with 256 of them the mixing
//! thread exceeds its real-time budget and the kernel kills the server.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use hostile_client::cli::KillArgs;
use hostile_client::runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let args = KillArgs::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,hostile_client=info")
        }))
        .init();

    let (client, config) = args.into_configs();
    let status = runtime::run_flood(client, config)?;
    Ok(status.into())
}
