//! Hostile sound-server clients.
//!
//! Two small programs that misuse the ordinary PulseAudio client protocol:
//! - `exhaust-open-streams` occupies every playback stream slot of the default sink.
//! - `kill-server` writes a clip into many streams at once so the server overruns its
//!   real-time budget.
//!
//! ## Layout
//! - [`server`]: the connection/stream abstraction and the notifications it delivers.
//! - [`session`]: the event dispatch loop and the single shutdown path.
//! - [`exhaust`] / [`flood`]: the two event handlers.
//! - [`clip`]: WAV loading via Symphonia.
//! - `pulse`: the libpulse backend (feature `pulse`).

pub mod cli;
pub mod clip;
pub mod config;
pub mod exhaust;
pub mod flood;
pub mod format;
#[cfg(feature = "pulse")]
pub mod pulse;
#[cfg(feature = "pulse")]
pub mod runtime;
pub mod server;
pub mod session;
pub mod stream;

#[cfg(test)]
mod fake;
