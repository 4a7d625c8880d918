//! Sample formats and stream specs announced to the sound server.

use std::fmt;

/// Highest sample rate the server accepts.
pub const MAX_RATE_HZ: u32 = 48_000 * 8;

/// Highest channel count the server accepts.
pub const MAX_CHANNELS: u8 = 32;

/// Sample encodings used by the clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

impl SampleFormat {
    /// Width of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16Le => 2,
            SampleFormat::S24Le => 3,
            SampleFormat::S32Le | SampleFormat::F32Le => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16Le => "s16le",
            SampleFormat::S24Le => "s24le",
            SampleFormat::S32Le => "s32le",
            SampleFormat::F32Le => "float32le",
        }
    }
}

/// Encoding, rate and channel count of one stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSpec {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u8,
}

impl SampleSpec {
    pub const fn new(format: SampleFormat, rate: u32, channels: u8) -> Self {
        Self {
            format,
            rate,
            channels,
        }
    }

    /// Bytes in one frame (one sample per channel). Writes must be a multiple of this.
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.rate as usize
    }

    pub fn is_valid(&self) -> bool {
        (1..=MAX_RATE_HZ).contains(&self.rate) && (1..=MAX_CHANNELS).contains(&self.channels)
    }
}

impl Default for SampleSpec {
    /// CD-quality stereo, the format the exhaust streams announce.
    fn default() -> Self {
        Self::new(SampleFormat::S16Le, 44_100, 2)
    }
}

impl fmt::Display for SampleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}ch {}Hz",
            self.format.label(),
            self.channels,
            self.rate
        )
    }
}
