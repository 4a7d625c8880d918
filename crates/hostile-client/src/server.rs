//! Connection and stream handles, and the notifications the sound server delivers.
//!
//! The clients never talk to a concrete library directly: everything goes through
//! [`SoundServer`] (requests) and [`EventSource`] (the external scheduler that turns
//! library callbacks into [`ServerEvent`]s).

use std::fmt;

use anyhow::Result;

use crate::format::SampleSpec;
use crate::session::ExitStatus;

/// Opaque handle for one stream owned by the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection lifecycle as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Unconnected,
    Connecting,
    Authorizing,
    SettingName,
    Ready,
    Failed,
    Terminated,
}

/// Stream lifecycle as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Unconnected,
    Creating,
    Ready,
    Failed,
    Terminated,
}

/// One notification from the scheduler, dispatched to an event handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Context(ContextState),
    Stream(StreamId, StreamState),
    /// The stream can take more data; the length is the server's suggestion in bytes.
    WriteReady(StreamId, usize),
    /// Drain finished; `false` when the server reports the drain failed.
    DrainComplete(StreamId, bool),
    /// The user asked the process to stop (SIGINT/SIGTERM), delivered by the event loop.
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A fixed server limit was hit (e.g. too many inputs per sink).
    ResourceLimit,
    Other,
}

/// Failure reported by the server, carrying its own error text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    pub fn is_resource_limit(&self) -> bool {
        self.kind == ErrorKind::ResourceLimit
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServerError {}

/// Requests a client can make over its connection.
///
/// All calls are asynchronous from the server's point of view: results of
/// `connect`, `connect_playback` and `drain` arrive later as [`ServerEvent`]s.
pub trait SoundServer {
    /// Start connecting to the server.
    fn connect(&mut self) -> Result<(), ServerError>;

    /// Allocate a new stream handle. `None` means the library refused to hand one out.
    ///
    /// State and write notifications are attached before this returns, so they are in
    /// place before the stream is connected.
    fn create_stream(&mut self, name: &str, spec: &SampleSpec) -> Option<StreamId>;

    /// Connect the stream for playback on the sink the server picks.
    fn connect_playback(&mut self, stream: StreamId) -> Result<(), ServerError>;

    /// Queue `data` for playback. `data.len()` must be a whole number of frames.
    fn write(&mut self, stream: StreamId, data: &[u8]) -> Result<(), ServerError>;

    /// Stop delivering [`ServerEvent::WriteReady`] for this stream.
    fn stop_write_notify(&mut self, stream: StreamId);

    /// Ask the server to play out everything buffered on the stream.
    fn drain(&mut self, stream: StreamId) -> Result<(), ServerError>;

    /// Error of the last failed operation on this connection.
    fn last_error(&self) -> ServerError;

    /// Ask the event loop to stop with `status`.
    fn quit(&mut self, status: ExitStatus);
}

/// Result of one event-loop iteration.
#[derive(Debug)]
pub enum Wake {
    Events(Vec<ServerEvent>),
    /// The loop honoured a quit request.
    Stopped(ExitStatus),
}

/// The external scheduler driving the callbacks.
pub trait EventSource {
    /// Run one loop iteration, blocking until something happens.
    fn next_events(&mut self) -> Result<Wake>;
}
