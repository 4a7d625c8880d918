use std::path::PathBuf;

use clap::Parser;
use clap::builder::RangedU64ValueParser;

use crate::config::{
    ClientConfig, DEFAULT_CLIP_PATH, EXHAUST_APP_NAME, ExhaustConfig, FloodConfig, KILL_APP_NAME,
};
use crate::session::MAX_INPUTS_PER_SINK;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

fn stream_count() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..)
}

#[derive(Parser, Debug)]
#[command(name = "exhaust-open-streams", version = VERSION)]
pub struct ExhaustArgs {
    /// Sound server address (defaults to the one the client library picks)
    #[arg(long)]
    pub server: Option<String>,

    /// Playback streams to open; matches the server's per-sink input ceiling
    #[arg(long, default_value_t = MAX_INPUTS_PER_SINK, value_parser = stream_count())]
    pub streams: usize,

    /// application.name announced to the server
    #[arg(long, default_value = EXHAUST_APP_NAME)]
    pub app_name: String,
}

impl ExhaustArgs {
    pub fn into_configs(self) -> (ClientConfig, ExhaustConfig) {
        (
            ClientConfig::new(self.app_name, self.server),
            ExhaustConfig {
                max_streams: self.streams,
                ..ExhaustConfig::default()
            },
        )
    }
}

#[derive(Parser, Debug)]
#[command(name = "kill-server", version = VERSION)]
pub struct KillArgs {
    /// WAV file written into every stream
    #[arg(default_value = DEFAULT_CLIP_PATH)]
    pub path: PathBuf,

    /// Sound server address (defaults to the one the client library picks)
    #[arg(long)]
    pub server: Option<String>,

    /// Playback streams written in parallel
    #[arg(long, default_value_t = MAX_INPUTS_PER_SINK, value_parser = stream_count())]
    pub streams: usize,

    /// application.name announced to the server
    #[arg(long, default_value = KILL_APP_NAME)]
    pub app_name: String,
}

impl KillArgs {
    pub fn into_configs(self) -> (ClientConfig, FloodConfig) {
        (
            ClientConfig::new(self.app_name, self.server),
            FloodConfig {
                path: self.path,
                stream_count: self.streams,
                ..FloodConfig::default()
            },
        )
    }
}
