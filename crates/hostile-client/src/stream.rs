//! Per-stream state machine shared by both clients.

use crate::server::{SoundServer, StreamId, StreamState};
use crate::session::{ExitStatus, Flow};

/// React to a stream state change.
///
/// `Ready` is logged, `Failed` is fatal, every other state is transient.
pub fn stream_state_flow(server: &dyn SoundServer, stream: StreamId, state: StreamState) -> Flow {
    match state {
        StreamState::Unconnected | StreamState::Creating | StreamState::Terminated => {
            Flow::Continue
        }
        StreamState::Ready => {
            tracing::info!(stream = %stream, "playback stream successfully created");
            Flow::Continue
        }
        StreamState::Failed => {
            tracing::error!(stream = %stream, "playback stream error: {}", server.last_error());
            Flow::Quit(ExitStatus::Failure)
        }
    }
}
