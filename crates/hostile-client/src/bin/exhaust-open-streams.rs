//! `exhaust-open-streams`: occupies every playback stream slot of the default sink.
//!
//! PulseAudio accepts at most 256 inputs per sink. Once they are all held by this
//! client, other applications are told "too many inputs per sink" and go silent.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use hostile_client::cli::ExhaustArgs;
use hostile_client::runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let args = ExhaustArgs::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,hostile_client=info")
        }))
        .init();

    let (client, config) = args.into_configs();
    let status = runtime::run_exhaust(client, config)?;
    Ok(status.into())
}
