//! Audio clip loading.
//!
//! Uses Symphonia to:
//! - probe the input container/codec
//! - decode every packet into interleaved signed 16-bit samples
//! - keep the result as one immutable little-endian byte buffer
//!
//! The clip is loaded once before connecting and is never rewritten afterwards.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::format::{SampleFormat, SampleSpec};

/// Decoded audio ready to be written to playback streams.
#[derive(Clone, Debug)]
pub struct AudioClip {
    spec: SampleSpec,
    data: Vec<u8>,
}

impl AudioClip {
    pub fn new(spec: SampleSpec, data: Vec<u8>) -> Result<Self> {
        ensure!(spec.is_valid(), "invalid sample spec: {spec}");
        Ok(Self { spec, data })
    }

    pub fn spec(&self) -> &SampleSpec {
        &self.spec
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole frames in the clip.
    pub fn frames(&self) -> usize {
        self.data.len() / self.spec.frame_size()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.frames() as u64).saturating_mul(1000) / self.spec.rate as u64
    }
}

/// Load and fully decode an audio file (WAV in practice) into an [`AudioClip`].
pub fn load_clip(path: &Path) -> Result<AudioClip> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {:?}", path))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let channels = u8::try_from(channels).map_err(|_| anyhow!("Too many channels: {channels}"))?;
    let spec = SampleSpec::new(SampleFormat::S16Le, rate, channels);

    let codec_params: CodecParameters = track.codec_params.clone();
    let data = decode_to_s16le(format, &codec_params)?;
    ensure!(!data.is_empty(), "no audio decoded from {:?}", path);

    let clip = AudioClip::new(spec, data)?;
    tracing::info!(
        path = %path.display(),
        spec = %clip.spec(),
        frames = clip.frames(),
        duration_ms = clip.duration_ms(),
        "audio clip loaded"
    );
    Ok(clip)
}

/// Decode packets from a probed `FormatReader` into interleaved S16LE bytes.
fn decode_to_s16le(
    mut format: Box<dyn FormatReader>,
    codec_params: &CodecParameters,
) -> Result<Vec<u8>> {
    let mut decoder =
        symphonia::default::get_codecs().make(codec_params, &DecoderOptions::default())?;

    let mut data = Vec::new();
    let mut skipped = 0usize;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(e) if is_end_of_stream(&e) => break,
            Err(e) => return Err(e).context("read packet"),
        };

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::warn!(ts = packet.ts(), "skipping undecodable packet: {reason}");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e).context("decode packet"),
        };

        let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);

        data.reserve(sample_buf.samples().len() * 2);
        for sample in sample_buf.samples() {
            data.extend_from_slice(&sample.to_le_bytes());
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "clip is shorter than the file: packets failed to decode");
    }
    Ok(data)
}

fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}
