//! In-memory sound server used by the unit tests.
//!
//! Behaves like a cooperative server: connecting yields `Connecting`/`Ready`, each
//! playback connect yields `Creating`/`Ready`, ready streams keep asking for
//! `write_request` bytes until their write notification is detached, and drains
//! complete on the next iteration.

use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::format::SampleSpec;
use crate::server::{
    ContextState, ErrorKind, EventSource, ServerError, ServerEvent, SoundServer, StreamId,
    StreamState, Wake,
};
use crate::session::ExitStatus;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Connect,
    CreateStream,
    ConnectPlayback(StreamId),
    Write(StreamId, usize),
    StopWriteNotify(StreamId),
    Drain(StreamId),
    Quit(ExitStatus),
}

pub(crate) struct FakeServer {
    pub calls: Vec<Call>,
    pub written: Vec<(StreamId, Vec<u8>)>,
    /// Handles handed out before `create_stream` returns `None`.
    pub handle_limit: Option<usize>,
    /// Error reported once `handle_limit` is hit.
    pub handle_error: ServerError,
    /// Streams connected beyond this many fail with a resource-limit error.
    pub slot_limit: Option<usize>,
    pub fail_connect: Option<ServerError>,
    pub fail_connect_playback: Option<ServerError>,
    pub fail_write: Option<ServerError>,
    pub fail_drain: Option<ServerError>,
    /// Drains complete with `success == false`.
    pub drain_reports_failure: bool,
    pub context_fails: bool,
    pub terminate_when_idle: bool,
    /// Byte length suggested by every write notification; `0` disables them.
    pub write_request: usize,
    queued: Vec<ServerEvent>,
    scripted: Vec<ServerEvent>,
    write_notify: HashSet<StreamId>,
    connected: usize,
    next_id: u32,
    last_error: ServerError,
    stopped: Option<ExitStatus>,
    terminated: bool,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            written: Vec::new(),
            handle_limit: None,
            handle_error: ServerError::new(ErrorKind::ResourceLimit, "Too large"),
            slot_limit: None,
            fail_connect: None,
            fail_connect_playback: None,
            fail_write: None,
            fail_drain: None,
            drain_reports_failure: false,
            context_fails: false,
            terminate_when_idle: false,
            write_request: 0,
            queued: Vec::new(),
            scripted: Vec::new(),
            write_notify: HashSet::new(),
            connected: 0,
            next_id: 0,
            last_error: ServerError::other("OK"),
            stopped: None,
            terminated: false,
        }
    }

    /// Extra events delivered right after the connection becomes ready.
    pub fn script(&mut self, events: Vec<ServerEvent>) {
        self.scripted.extend(events);
    }

    /// Number of stream handles handed out.
    pub fn created(&self) -> usize {
        self.next_id as usize
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn fail(&mut self, err: ServerError) -> ServerError {
        self.last_error = err.clone();
        err
    }
}

impl SoundServer for FakeServer {
    fn connect(&mut self) -> Result<(), ServerError> {
        self.calls.push(Call::Connect);
        if let Some(err) = self.fail_connect.clone() {
            return Err(self.fail(err));
        }
        self.queued.push(ServerEvent::Context(ContextState::Connecting));
        if self.context_fails {
            self.last_error = ServerError::other("Connection refused");
            self.queued.push(ServerEvent::Context(ContextState::Failed));
        } else {
            self.queued.push(ServerEvent::Context(ContextState::Ready));
            self.queued.append(&mut self.scripted);
        }
        Ok(())
    }

    fn create_stream(&mut self, _name: &str, spec: &SampleSpec) -> Option<StreamId> {
        self.calls.push(Call::CreateStream);
        if !spec.is_valid() {
            self.last_error = ServerError::other("Invalid argument");
            return None;
        }
        if self.handle_limit.is_some_and(|limit| self.created() >= limit) {
            self.last_error = self.handle_error.clone();
            return None;
        }
        let id = StreamId::new(self.next_id);
        self.next_id += 1;
        Some(id)
    }

    fn connect_playback(&mut self, stream: StreamId) -> Result<(), ServerError> {
        self.calls.push(Call::ConnectPlayback(stream));
        if let Some(err) = self.fail_connect_playback.clone() {
            return Err(self.fail(err));
        }
        self.queued.push(ServerEvent::Stream(stream, StreamState::Creating));
        if self.slot_limit.is_some_and(|limit| self.connected >= limit) {
            self.last_error = ServerError::new(ErrorKind::ResourceLimit, "Too large");
            self.queued.push(ServerEvent::Stream(stream, StreamState::Failed));
            return Ok(());
        }
        self.connected += 1;
        self.queued.push(ServerEvent::Stream(stream, StreamState::Ready));
        if self.write_request > 0 {
            self.write_notify.insert(stream);
            self.queued.push(ServerEvent::WriteReady(stream, self.write_request));
        }
        Ok(())
    }

    fn write(&mut self, stream: StreamId, data: &[u8]) -> Result<(), ServerError> {
        self.calls.push(Call::Write(stream, data.len()));
        if let Some(err) = self.fail_write.clone() {
            return Err(self.fail(err));
        }
        self.written.push((stream, data.to_vec()));
        if self.write_notify.contains(&stream) {
            self.queued.push(ServerEvent::WriteReady(stream, self.write_request));
        }
        Ok(())
    }

    fn stop_write_notify(&mut self, stream: StreamId) {
        self.calls.push(Call::StopWriteNotify(stream));
        self.write_notify.remove(&stream);
    }

    fn drain(&mut self, stream: StreamId) -> Result<(), ServerError> {
        self.calls.push(Call::Drain(stream));
        if let Some(err) = self.fail_drain.clone() {
            return Err(self.fail(err));
        }
        if self.drain_reports_failure {
            self.last_error = ServerError::other("Bad state");
        }
        self.queued
            .push(ServerEvent::DrainComplete(stream, !self.drain_reports_failure));
        Ok(())
    }

    fn last_error(&self) -> ServerError {
        self.last_error.clone()
    }

    fn quit(&mut self, status: ExitStatus) {
        self.calls.push(Call::Quit(status));
        self.stopped = Some(status);
    }
}

impl EventSource for FakeServer {
    fn next_events(&mut self) -> Result<Wake> {
        if let Some(status) = self.stopped {
            return Ok(Wake::Stopped(status));
        }
        if self.queued.is_empty() {
            if self.terminate_when_idle && !self.terminated {
                self.terminated = true;
                return Ok(Wake::Events(vec![ServerEvent::Context(
                    ContextState::Terminated,
                )]));
            }
            bail!("fake server has nothing left to deliver");
        }
        Ok(Wake::Events(std::mem::take(&mut self.queued)))
    }
}
