//! Event dispatch and the shutdown path shared by both clients.
//!
//! [`run_session`] is the only way out once the connection has been started: every
//! success or failure becomes a [`Flow::Quit`], which first asks the event loop to stop
//! and only then hands the status back to `main`.

use anyhow::Result;

use crate::format::SampleSpec;
use crate::server::{
    ContextState, EventSource, ServerError, ServerEvent, SoundServer, StreamId, StreamState, Wake,
};

/// Playback streams one sink accepts (PulseAudio >= 5.0).
pub const MAX_INPUTS_PER_SINK: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    /// Stopped by SIGINT/SIGTERM.
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
            ExitStatus::Interrupted => 130,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            130 => ExitStatus::Interrupted,
            _ => ExitStatus::Failure,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => std::process::ExitCode::SUCCESS,
            ExitStatus::Failure => std::process::ExitCode::FAILURE,
            ExitStatus::Interrupted => std::process::ExitCode::from(130),
        }
    }
}

/// What the loop does after a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit(ExitStatus),
}

/// Per-client reaction to server notifications.
///
/// [`EventHandler::handle`] is the dispatch table; implementors only fill in the
/// variant-specific hooks.
pub trait EventHandler {
    /// The connection reached `Ready`.
    fn on_ready(&mut self, server: &mut dyn SoundServer) -> Flow;

    fn on_stream_state(
        &mut self,
        server: &mut dyn SoundServer,
        stream: StreamId,
        state: StreamState,
    ) -> Flow;

    fn on_write_ready(
        &mut self,
        _server: &mut dyn SoundServer,
        _stream: StreamId,
        _length: usize,
    ) -> Flow {
        Flow::Continue
    }

    fn on_drain_complete(
        &mut self,
        _server: &mut dyn SoundServer,
        _stream: StreamId,
        _success: bool,
    ) -> Flow {
        Flow::Continue
    }

    fn handle(&mut self, server: &mut dyn SoundServer, event: ServerEvent) -> Flow {
        match event {
            ServerEvent::Context(state) => match state {
                ContextState::Unconnected
                | ContextState::Connecting
                | ContextState::Authorizing
                | ContextState::SettingName => Flow::Continue,
                ContextState::Ready => {
                    tracing::info!("connection established with sound server");
                    self.on_ready(server)
                }
                ContextState::Terminated => {
                    tracing::info!("connection terminated");
                    Flow::Quit(ExitStatus::Success)
                }
                ContextState::Failed => {
                    tracing::error!("sound server connection failure: {}", server.last_error());
                    Flow::Quit(ExitStatus::Failure)
                }
            },
            ServerEvent::Stream(stream, state) => self.on_stream_state(server, stream, state),
            ServerEvent::WriteReady(stream, length) => self.on_write_ready(server, stream, length),
            ServerEvent::DrainComplete(stream, success) => {
                self.on_drain_complete(server, stream, success)
            }
            ServerEvent::Interrupted => {
                tracing::warn!("interrupted; shutting down");
                Flow::Quit(ExitStatus::Interrupted)
            }
        }
    }
}

/// Connect and dispatch events until the loop stops.
///
/// After the first [`Flow::Quit`] the rest of the batch is dropped and no further
/// events reach the handler, so no stream operation follows a shutdown request.
pub fn run_session<S, H>(server: &mut S, handler: &mut H) -> Result<ExitStatus>
where
    S: SoundServer + EventSource,
    H: EventHandler,
{
    let mut stopping = false;
    if let Err(e) = server.connect() {
        tracing::error!("couldn't connect to sound server: {e}");
        server.quit(ExitStatus::Failure);
        stopping = true;
    }

    loop {
        let events = match server.next_events()? {
            Wake::Stopped(status) => {
                tracing::debug!(code = status.code(), "event loop stopped");
                return Ok(status);
            }
            Wake::Events(events) => events,
        };
        if stopping {
            continue;
        }
        for event in events {
            if let Flow::Quit(status) = handler.handle(server, event) {
                server.quit(status);
                stopping = true;
                break;
            }
        }
    }
}

/// Streams created by [`open_streams`].
#[derive(Debug, Default)]
pub struct OpenReport {
    pub streams: Vec<StreamId>,
    pub requested: usize,
}

impl OpenReport {
    /// The library stopped handing out stream handles before `requested` was reached.
    pub fn exhausted(&self) -> bool {
        self.streams.len() < self.requested
    }
}

/// Create and connect up to `count` playback streams in one tight loop.
///
/// Stops at the first missing handle (see [`OpenReport::exhausted`]); a connect failure
/// is returned as-is. Nothing is retried.
pub fn open_streams(
    server: &mut dyn SoundServer,
    count: usize,
    name: &str,
    spec: &SampleSpec,
) -> Result<OpenReport, ServerError> {
    let mut report = OpenReport {
        streams: Vec::with_capacity(count),
        requested: count,
    };
    for _ in 0..count {
        let Some(stream) = server.create_stream(name, spec) else {
            break;
        };
        server.connect_playback(stream)?;
        report.streams.push(stream);
    }
    tracing::debug!(
        opened = report.streams.len(),
        requested = count,
        "playback connects issued"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeServer};
    use crate::server::ErrorKind;

    struct Recorder {
        seen: Vec<ServerEvent>,
        quit_on_ready: Option<ExitStatus>,
    }

    impl EventHandler for Recorder {
        fn on_ready(&mut self, _server: &mut dyn SoundServer) -> Flow {
            self.seen.push(ServerEvent::Context(ContextState::Ready));
            match self.quit_on_ready {
                Some(status) => Flow::Quit(status),
                None => Flow::Continue,
            }
        }

        fn on_stream_state(
            &mut self,
            _server: &mut dyn SoundServer,
            stream: StreamId,
            state: StreamState,
        ) -> Flow {
            self.seen.push(ServerEvent::Stream(stream, state));
            Flow::Continue
        }
    }

    #[test]
    fn connect_failure_takes_the_shutdown_path() {
        let mut server = FakeServer::new();
        server.fail_connect = Some(ServerError::other("Connection refused"));
        let mut handler = Recorder {
            seen: Vec::new(),
            quit_on_ready: None,
        };

        let status = run_session(&mut server, &mut handler).unwrap();

        assert_eq!(status, ExitStatus::Failure);
        assert!(handler.seen.is_empty());
        assert_eq!(server.calls, vec![Call::Connect, Call::Quit(ExitStatus::Failure)]);
    }

    #[test]
    fn context_failure_quits_with_failure() {
        let mut server = FakeServer::new();
        server.context_fails = true;
        let mut handler = Recorder {
            seen: Vec::new(),
            quit_on_ready: None,
        };

        let status = run_session(&mut server, &mut handler).unwrap();

        assert_eq!(status, ExitStatus::Failure);
        assert_eq!(server.calls.last(), Some(&Call::Quit(ExitStatus::Failure)));
    }

    #[test]
    fn context_terminated_quits_with_success() {
        let mut server = FakeServer::new();
        server.terminate_when_idle = true;
        let mut handler = Recorder {
            seen: Vec::new(),
            quit_on_ready: None,
        };

        let status = run_session(&mut server, &mut handler).unwrap();

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(handler.seen, vec![ServerEvent::Context(ContextState::Ready)]);
    }

    #[test]
    fn events_after_quit_are_not_dispatched() {
        let mut server = FakeServer::new();
        server.script(vec![ServerEvent::Stream(StreamId::new(9), StreamState::Ready)]);
        let mut handler = Recorder {
            seen: Vec::new(),
            quit_on_ready: Some(ExitStatus::Success),
        };

        let status = run_session(&mut server, &mut handler).unwrap();

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(handler.seen, vec![ServerEvent::Context(ContextState::Ready)]);
        assert_eq!(
            server.calls.iter().filter(|c| matches!(c, Call::Quit(_))).count(),
            1
        );
    }

    #[test]
    fn open_streams_stops_at_first_missing_handle() {
        let mut server = FakeServer::new();
        server.handle_limit = Some(3);

        let report = open_streams(&mut server, 5, "playback stream", &SampleSpec::default())
            .unwrap();

        assert_eq!(report.streams.len(), 3);
        assert!(report.exhausted());
        assert_eq!(server.created(), 3);
        assert_eq!(
            server.calls.iter().filter(|c| matches!(c, Call::CreateStream)).count(),
            4
        );
    }

    #[test]
    fn open_streams_propagates_connect_error() {
        let mut server = FakeServer::new();
        server.fail_connect_playback = Some(ServerError::new(ErrorKind::Other, "Bad state"));

        let err = open_streams(&mut server, 4, "playback stream", &SampleSpec::default())
            .unwrap_err();

        assert_eq!(err.message, "Bad state");
        assert_eq!(server.created(), 1);
    }

    #[test]
    fn open_streams_with_zero_count_is_not_exhausted() {
        let mut server = FakeServer::new();
        let report =
            open_streams(&mut server, 0, "playback stream", &SampleSpec::default()).unwrap();
        assert!(report.streams.is_empty());
        assert!(!report.exhausted());
    }

    #[test]
    fn exit_status_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert_eq!(ExitStatus::from_code(0), ExitStatus::Success);
        assert_eq!(ExitStatus::from_code(-2), ExitStatus::Failure);
        assert_eq!(ExitStatus::Interrupted.code(), 130);
        assert_eq!(ExitStatus::from_code(130), ExitStatus::Interrupted);
    }

    #[test]
    fn interrupt_takes_the_shutdown_path() {
        let mut server = FakeServer::new();
        server.script(vec![
            ServerEvent::Stream(StreamId::new(0), StreamState::Ready),
            ServerEvent::Interrupted,
            ServerEvent::Stream(StreamId::new(1), StreamState::Ready),
        ]);
        let mut handler = Recorder {
            seen: Vec::new(),
            quit_on_ready: None,
        };

        let status = run_session(&mut server, &mut handler).unwrap();

        assert_eq!(status, ExitStatus::Interrupted);
        assert_eq!(
            handler.seen,
            vec![
                ServerEvent::Context(ContextState::Ready),
                ServerEvent::Stream(StreamId::new(0), StreamState::Ready),
            ]
        );
        assert_eq!(server.calls.last(), Some(&Call::Quit(ExitStatus::Interrupted)));
    }
}
