//! Entry points used by the binaries.

use anyhow::{Context, Result};

use crate::clip::load_clip;
use crate::config::{ClientConfig, ExhaustConfig, FloodConfig};
use crate::exhaust::ExhaustStreams;
use crate::flood::FloodStreams;
use crate::pulse::PulseServer;
use crate::session::{ExitStatus, run_session};

/// Fill every stream slot of the default sink.
pub fn run_exhaust(client: ClientConfig, config: ExhaustConfig) -> Result<ExitStatus> {
    tracing::info!(
        app = %client.app_name,
        server = client.server.as_deref().unwrap_or("default"),
        streams = config.max_streams,
        "opening playback streams until the sink refuses"
    );
    let mut server = PulseServer::new(&client)?;
    let mut handler = ExhaustStreams::new(config);
    run_session(&mut server, &mut handler)
}

/// Load the clip, then write it into many streams at once.
pub fn run_flood(client: ClientConfig, config: FloodConfig) -> Result<ExitStatus> {
    let clip = load_clip(&config.path)
        .with_context(|| format!("load audio clip {:?}", config.path))?;
    tracing::info!(
        app = %client.app_name,
        server = client.server.as_deref().unwrap_or("default"),
        streams = config.stream_count,
        "flooding playback streams"
    );
    let mut server = PulseServer::new(&client)?;
    let mut handler = FloodStreams::new(clip, config);
    run_session(&mut server, &mut handler)
}
