//! PulseAudio backend.
//!
//! Owns the standard mainloop, the context and every stream. libpulse callbacks only
//! push a [`Notify`] into a channel; after each `iterate(true)` the backend turns the
//! queued notifications into [`ServerEvent`]s by reading the current state. Callbacks
//! can fire synchronously from inside `connect`/`connect_playback`, so they must not
//! touch the handles themselves.
//!
//! SIGINT and SIGTERM are hooked into the same mainloop, so an interrupt arrives as
//! [`ServerEvent::Interrupted`] and leaves through the session's shutdown path.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, unbounded};
use libpulse_binding as pulse;
use pulse::context::{Context, FlagSet as ContextFlagSet, State as PaContextState};
use pulse::def::Retval;
use pulse::error::{Code, PAErr};
use pulse::mainloop::signal::{Event as SignalEvent, MainloopSignals};
use pulse::mainloop::standard::{IterateResult, Mainloop};
use pulse::proplist::{Proplist, properties};
use pulse::sample::{Format, Spec};
use pulse::stream::{FlagSet as StreamFlagSet, SeekMode, State as PaStreamState, Stream};

use crate::config::ClientConfig;
use crate::format::{SampleFormat, SampleSpec};
use crate::server::{
    ContextState, ErrorKind, EventSource, ServerError, ServerEvent, SoundServer, StreamId,
    StreamState, Wake,
};
use crate::session::ExitStatus;

enum Notify {
    Context,
    Stream(StreamId),
    WriteReady(StreamId, usize),
    Drained(StreamId, bool),
    Signal(i32),
}

struct TrackedStream {
    stream: Stream,
    last_state: Option<StreamState>,
}

/// Connection to a PulseAudio server driven by a standard (non-threaded) mainloop.
pub struct PulseServer {
    // Dropped in declaration order: streams, then the context, then the mainloop.
    // Signal events are released in `Drop` before the mainloop's signal source.
    signals: Vec<SignalEvent>,
    streams: HashMap<StreamId, TrackedStream>,
    context: Context,
    mainloop: Mainloop,
    server: Option<String>,
    notify_tx: Sender<Notify>,
    notify_rx: Receiver<Notify>,
    last_context_state: Option<ContextState>,
    next_id: u32,
}

impl PulseServer {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut proplist =
            Proplist::new().ok_or_else(|| anyhow!("couldn't create a PulseAudio property list"))?;
        proplist
            .set_str(properties::APPLICATION_NAME, &config.app_name)
            .map_err(|_| anyhow!("couldn't set {}", properties::APPLICATION_NAME))?;

        let mut mainloop =
            Mainloop::new().ok_or_else(|| anyhow!("couldn't create PulseAudio mainloop"))?;
        let mut context = Context::new_with_proplist(&mainloop, &config.app_name, &proplist)
            .ok_or_else(|| anyhow!("couldn't create client context"))?;

        let (notify_tx, notify_rx) = unbounded();
        let tx = notify_tx.clone();
        context.set_state_callback(Some(Box::new(move || {
            let _ = tx.send(Notify::Context);
        })));

        mainloop
            .init_signals()
            .map_err(|e| anyhow!("couldn't hook signals into the mainloop: {e}"))?;
        let signals = [libc::SIGINT, libc::SIGTERM]
            .into_iter()
            .map(|sig| {
                let tx = notify_tx.clone();
                SignalEvent::new(sig, move |sig| {
                    let _ = tx.send(Notify::Signal(sig));
                })
            })
            .collect();

        Ok(Self {
            signals,
            streams: HashMap::new(),
            context,
            mainloop,
            server: config.server.clone(),
            notify_tx,
            notify_rx,
            last_context_state: None,
            next_id: 0,
        })
    }

    fn error_from(&self, err: PAErr) -> ServerError {
        ServerError::new(error_kind(err), format!("{err}"))
    }

    fn unknown_stream(stream: StreamId) -> ServerError {
        ServerError::other(format!("unknown stream {stream}"))
    }

    fn translate(&mut self, notify: Notify) -> Option<ServerEvent> {
        match notify {
            Notify::Context => {
                let state = context_state(self.context.get_state());
                if self.last_context_state == Some(state) {
                    return None;
                }
                self.last_context_state = Some(state);
                Some(ServerEvent::Context(state))
            }
            Notify::Stream(id) => {
                let tracked = self.streams.get_mut(&id)?;
                let state = stream_state(tracked.stream.get_state());
                if tracked.last_state == Some(state) {
                    return None;
                }
                tracked.last_state = Some(state);
                Some(ServerEvent::Stream(id, state))
            }
            Notify::WriteReady(id, length) => self
                .streams
                .contains_key(&id)
                .then_some(ServerEvent::WriteReady(id, length)),
            Notify::Drained(id, success) => Some(ServerEvent::DrainComplete(id, success)),
            Notify::Signal(sig) => {
                tracing::debug!(signal = sig, "signal received");
                Some(ServerEvent::Interrupted)
            }
        }
    }
}

impl Drop for PulseServer {
    fn drop(&mut self) {
        self.signals.clear();
        self.mainloop.signals_done();
    }
}

impl SoundServer for PulseServer {
    fn connect(&mut self) -> Result<(), ServerError> {
        let result = self
            .context
            .connect(self.server.as_deref(), ContextFlagSet::NOFLAGS, None);
        result.map_err(|e| self.error_from(e))
    }

    fn create_stream(&mut self, name: &str, spec: &SampleSpec) -> Option<StreamId> {
        let pa_spec = to_pa_spec(spec);
        let mut stream = Stream::new(&mut self.context, name, &pa_spec, None)?;
        let id = StreamId::new(self.next_id);
        self.next_id += 1;

        let tx = self.notify_tx.clone();
        stream.set_state_callback(Some(Box::new(move || {
            let _ = tx.send(Notify::Stream(id));
        })));
        let tx = self.notify_tx.clone();
        stream.set_write_callback(Some(Box::new(move |length: usize| {
            let _ = tx.send(Notify::WriteReady(id, length));
        })));

        self.streams.insert(
            id,
            TrackedStream {
                stream,
                last_state: None,
            },
        );
        Some(id)
    }

    fn connect_playback(&mut self, stream: StreamId) -> Result<(), ServerError> {
        let tracked = self
            .streams
            .get_mut(&stream)
            .ok_or_else(|| Self::unknown_stream(stream))?;
        let result = tracked
            .stream
            .connect_playback(None, None, StreamFlagSet::NOFLAGS, None, None);
        result.map_err(|e| self.error_from(e))
    }

    fn write(&mut self, stream: StreamId, data: &[u8]) -> Result<(), ServerError> {
        let tracked = self
            .streams
            .get_mut(&stream)
            .ok_or_else(|| Self::unknown_stream(stream))?;
        let result = tracked.stream.write(data, None, 0, SeekMode::Relative);
        result.map_err(|e| self.error_from(e))
    }

    fn stop_write_notify(&mut self, stream: StreamId) {
        if let Some(tracked) = self.streams.get_mut(&stream) {
            tracked.stream.set_write_callback(None);
        }
    }

    fn drain(&mut self, stream: StreamId) -> Result<(), ServerError> {
        let tracked = self
            .streams
            .get_mut(&stream)
            .ok_or_else(|| Self::unknown_stream(stream))?;
        // libpulse refuses to drain a stream that is not ready.
        if let Err(e) = drainable(tracked.stream.get_state(), self.context.errno()) {
            return Err(self.error_from(e));
        }
        let tx = self.notify_tx.clone();
        let _op = tracked.stream.drain(Some(Box::new(move |success: bool| {
            let _ = tx.send(Notify::Drained(stream, success));
        })));
        Ok(())
    }

    fn last_error(&self) -> ServerError {
        self.error_from(self.context.errno())
    }

    fn quit(&mut self, status: ExitStatus) {
        self.mainloop.quit(Retval(status.code()));
    }
}

impl EventSource for PulseServer {
    fn next_events(&mut self) -> Result<Wake> {
        match self.mainloop.iterate(true) {
            IterateResult::Quit(retval) => {
                return Ok(Wake::Stopped(ExitStatus::from_code(retval.0)));
            }
            IterateResult::Err(e) => return Err(anyhow!("PulseAudio mainloop error: {e}")),
            IterateResult::Success(_) => {}
        }

        let mut events = Vec::new();
        while let Ok(notify) = self.notify_rx.try_recv() {
            if let Some(event) = self.translate(notify) {
                events.push(event);
            }
        }
        Ok(Wake::Events(events))
    }
}

/// Errors for fixed server limits are the expected outcome of exhausting a sink.
fn error_kind(err: PAErr) -> ErrorKind {
    if err.0.abs() == Code::TooLarge as i32 {
        ErrorKind::ResourceLimit
    } else {
        ErrorKind::Other
    }
}

/// Error to report instead of draining a stream in `state`.
fn drainable(state: PaStreamState, errno: PAErr) -> Result<(), PAErr> {
    if matches!(state, PaStreamState::Ready) {
        return Ok(());
    }
    if errno.0 == 0 {
        Err(PAErr(Code::BadState as i32))
    } else {
        Err(errno)
    }
}

fn to_pa_spec(spec: &SampleSpec) -> Spec {
    let format = match spec.format {
        SampleFormat::U8 => Format::U8,
        SampleFormat::S16Le => Format::S16le,
        SampleFormat::S24Le => Format::S24le,
        SampleFormat::S32Le => Format::S32le,
        SampleFormat::F32Le => Format::F32le,
    };
    Spec {
        format,
        rate: spec.rate,
        channels: spec.channels,
    }
}

fn context_state(state: PaContextState) -> ContextState {
    match state {
        PaContextState::Unconnected => ContextState::Unconnected,
        PaContextState::Connecting => ContextState::Connecting,
        PaContextState::Authorizing => ContextState::Authorizing,
        PaContextState::SettingName => ContextState::SettingName,
        PaContextState::Ready => ContextState::Ready,
        PaContextState::Failed => ContextState::Failed,
        PaContextState::Terminated => ContextState::Terminated,
    }
}

fn stream_state(state: PaStreamState) -> StreamState {
    match state {
        PaStreamState::Unconnected => StreamState::Unconnected,
        PaStreamState::Creating => StreamState::Creating,
        PaStreamState::Ready => StreamState::Ready,
        PaStreamState::Failed => StreamState::Failed,
        PaStreamState::Terminated => StreamState::Terminated,
    }
}
