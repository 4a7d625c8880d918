use std::path::PathBuf;

use crate::format::SampleSpec;
use crate::session::MAX_INPUTS_PER_SINK;

pub const EXHAUST_APP_NAME: &str = "malicious-client-exhaust-open-streams";
pub const KILL_APP_NAME: &str = "malicious-client-kill-server";
pub const DEFAULT_CLIP_PATH: &str = "samples/sample.wav";
pub const STREAM_NAME: &str = "playback stream";

/// How the client presents itself and which server it talks to.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Announced as the `application.name` property.
    pub app_name: String,
    /// Server address; `None` lets the client library pick the default server.
    pub server: Option<String>,
}

impl ClientConfig {
    pub fn new(app_name: impl Into<String>, server: Option<String>) -> Self {
        Self {
            app_name: app_name.into(),
            server: normalize_server(server),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExhaustConfig {
    /// Streams to open; mirrors the server's per-sink input ceiling.
    pub max_streams: usize,
    pub stream_name: String,
    pub spec: SampleSpec,
}

impl Default for ExhaustConfig {
    fn default() -> Self {
        Self {
            max_streams: MAX_INPUTS_PER_SINK,
            stream_name: STREAM_NAME.to_string(),
            spec: SampleSpec::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FloodConfig {
    /// Clip written into every stream.
    pub path: PathBuf,
    pub stream_count: usize,
    pub stream_name: String,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CLIP_PATH),
            stream_count: MAX_INPUTS_PER_SINK,
            stream_name: STREAM_NAME.to_string(),
        }
    }
}

fn normalize_server(server: Option<String>) -> Option<String> {
    server.and_then(|addr| {
        let trimmed = addr.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
