//! Write-driven playback flood.
//!
//! Opens many playback streams and keeps all of them fed from one clip at once. The
//! server has to rewind and remix for every stream it serves; with enough of them the
//! mixing thread overruns its real-time budget and the kernel kills it.
//!
//! End of clip: a stream is drained rather than dropped, so the tail is played out
//! instead of being cut off. The program only exits once every drain is confirmed.

use std::collections::HashMap;

use crate::clip::AudioClip;
use crate::config::FloodConfig;
use crate::server::{SoundServer, StreamId, StreamState};
use crate::session::{EventHandler, ExitStatus, Flow, open_streams};
use crate::stream::stream_state_flow;

/// Bytes to write for a request of `requested` bytes with `remaining` bytes left.
///
/// Never more than either, and always a whole number of frames.
pub fn next_chunk(requested: usize, remaining: usize, frame_size: usize) -> usize {
    if frame_size == 0 {
        return 0;
    }
    let chunk = requested.min(remaining);
    chunk - chunk % frame_size
}

/// Read position of one stream inside the shared clip.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    pub pos: usize,
    pub draining: bool,
    pub drained: bool,
}

pub struct FloodStreams {
    clip: AudioClip,
    config: FloodConfig,
    cursors: HashMap<StreamId, StreamCursor>,
    drained: usize,
}

impl FloodStreams {
    pub fn new(clip: AudioClip, config: FloodConfig) -> Self {
        Self {
            clip,
            config,
            cursors: HashMap::new(),
            drained: 0,
        }
    }

    pub fn cursor(&self, stream: StreamId) -> Option<&StreamCursor> {
        self.cursors.get(&stream)
    }

    pub fn opened(&self) -> usize {
        self.cursors.len()
    }
}

impl EventHandler for FloodStreams {
    fn on_ready(&mut self, server: &mut dyn SoundServer) -> Flow {
        let report = match open_streams(
            server,
            self.config.stream_count,
            &self.config.stream_name,
            self.clip.spec(),
        ) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("playback stream connect failed: {e}");
                return Flow::Quit(ExitStatus::Failure);
            }
        };
        if report.exhausted() {
            tracing::error!(
                opened = report.streams.len(),
                "couldn't create playback stream: {}",
                server.last_error()
            );
            return Flow::Quit(ExitStatus::Failure);
        }
        if report.streams.is_empty() {
            tracing::info!("no playback streams requested; nothing to drain");
            return Flow::Quit(ExitStatus::Success);
        }

        self.cursors = report
            .streams
            .into_iter()
            .map(|id| (id, StreamCursor::default()))
            .collect();
        tracing::info!(
            streams = self.cursors.len(),
            spec = %self.clip.spec(),
            "playback streams connecting"
        );
        Flow::Continue
    }

    fn on_stream_state(
        &mut self,
        server: &mut dyn SoundServer,
        stream: StreamId,
        state: StreamState,
    ) -> Flow {
        stream_state_flow(server, stream, state)
    }

    fn on_write_ready(
        &mut self,
        server: &mut dyn SoundServer,
        stream: StreamId,
        length: usize,
    ) -> Flow {
        let Some(cursor) = self.cursors.get_mut(&stream) else {
            return Flow::Continue;
        };
        // Notifications queued before the write callback was detached.
        if cursor.draining {
            return Flow::Continue;
        }

        let data = self.clip.data();
        let frame_size = self.clip.spec().frame_size();
        debug_assert!(cursor.pos <= data.len());

        let chunk = next_chunk(length, data.len() - cursor.pos, frame_size);
        if chunk > 0 {
            if let Err(e) = server.write(stream, &data[cursor.pos..cursor.pos + chunk]) {
                tracing::error!(stream = %stream, "failed writing audio data to stream: {e}");
                return Flow::Quit(ExitStatus::Failure);
            }
            cursor.pos += chunk;
        }
        debug_assert!(cursor.pos <= data.len());

        if data.len() - cursor.pos < frame_size {
            tracing::info!(stream = %stream, "reached end of clip; draining playback stream");
            server.stop_write_notify(stream);
            if let Err(e) = server.drain(stream) {
                tracing::error!(stream = %stream, "could not drain playback stream: {e}");
                return Flow::Quit(ExitStatus::Failure);
            }
            cursor.draining = true;
        }
        Flow::Continue
    }

    fn on_drain_complete(
        &mut self,
        server: &mut dyn SoundServer,
        stream: StreamId,
        success: bool,
    ) -> Flow {
        let Some(cursor) = self.cursors.get_mut(&stream) else {
            return Flow::Continue;
        };
        if !success {
            tracing::error!(
                stream = %stream,
                "playback stream drain failed: {}",
                server.last_error()
            );
            return Flow::Quit(ExitStatus::Failure);
        }
        if cursor.drained {
            return Flow::Continue;
        }
        cursor.drained = true;
        self.drained += 1;
        tracing::debug!(stream = %stream, drained = self.drained, "playback stream drained");

        if self.drained == self.cursors.len() {
            tracing::info!(
                streams = self.drained,
                "playback streams fully drained; exiting"
            );
            return Flow::Quit(ExitStatus::Success);
        }
        Flow::Continue
    }
}
