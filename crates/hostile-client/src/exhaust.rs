//! Stream-slot exhaustion.
//!
//! Opens playback streams on the default sink until the server's per-sink input
//! ceiling is reached. While the connection stays up, other clients get
//! "too many inputs per sink" and cannot play anything.

use crate::config::ExhaustConfig;
use crate::server::{SoundServer, StreamId, StreamState};
use crate::session::{EventHandler, ExitStatus, Flow, open_streams};
use crate::stream::stream_state_flow;

pub struct ExhaustStreams {
    config: ExhaustConfig,
    streams: Vec<StreamId>,
    ready: usize,
}

impl ExhaustStreams {
    pub fn new(config: ExhaustConfig) -> Self {
        Self {
            config,
            streams: Vec::new(),
            ready: 0,
        }
    }

    /// Streams currently holding a slot on the sink.
    pub fn ready(&self) -> usize {
        self.ready
    }

    pub fn opened(&self) -> usize {
        self.streams.len()
    }

    fn ceiling_reached(&self) -> Flow {
        tracing::info!(
            ready = self.ready,
            opened = self.streams.len(),
            "stream ceiling reached"
        );
        Flow::Quit(ExitStatus::Success)
    }
}

impl EventHandler for ExhaustStreams {
    fn on_ready(&mut self, server: &mut dyn SoundServer) -> Flow {
        let report = match open_streams(
            server,
            self.config.max_streams,
            &self.config.stream_name,
            &self.config.spec,
        ) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("playback stream connect failed: {e}");
                return Flow::Quit(ExitStatus::Failure);
            }
        };

        let exhausted = report.exhausted();
        self.streams = report.streams;
        if exhausted {
            let err = server.last_error();
            if !err.is_resource_limit() {
                tracing::error!(
                    opened = self.streams.len(),
                    "couldn't create playback stream: {err}"
                );
                return Flow::Quit(ExitStatus::Failure);
            }
            tracing::info!("no stream handle after {} streams: {err}", self.streams.len());
            return self.ceiling_reached();
        }
        Flow::Continue
    }

    fn on_stream_state(
        &mut self,
        server: &mut dyn SoundServer,
        stream: StreamId,
        state: StreamState,
    ) -> Flow {
        match state {
            StreamState::Failed => {
                let err = server.last_error();
                if err.is_resource_limit() {
                    tracing::info!(stream = %stream, "server refused stream: {err}");
                    return self.ceiling_reached();
                }
                stream_state_flow(server, stream, state)
            }
            StreamState::Ready => {
                self.ready += 1;
                if self.ready == self.streams.len() {
                    tracing::info!(
                        streams = self.ready,
                        "all playback streams connected; holding their slots"
                    );
                }
                stream_state_flow(server, stream, state)
            }
            _ => stream_state_flow(server, stream, state),
        }
    }
}
