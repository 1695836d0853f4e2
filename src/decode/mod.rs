//! Frame-level MP3/AAC decoding from raw byte buffers.
//!
//! Frame sync and header parsing happen here; the per-frame decoding is done
//! by symphonia's MPEG audio and AAC decoders fed one frame per packet.

mod aac;
mod mp3;

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use tracing::{debug, info};

use crate::error::{RadioError, Result};
use crate::session::Shared;

pub use aac::{find_adts_sync, AacState, AdtsHeader};
pub use mp3::{find_mpeg_sync, FrameHeader, Mp3State};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Mp3,
    Aac,
    #[default]
    Unknown,
}

/// One decoded frame, always interleaved stereo
#[derive(Debug)]
pub struct DecodedFrame {
    pub consumed: usize,
    pub sample_rate: u32,
    pub channels: usize,
    pub pcm: Vec<i16>,
}

/// Result of one decode attempt at a sync position
#[derive(Debug)]
pub enum Step {
    Decoded(DecodedFrame),
    /// Bad header or undecodable frame; skip this many bytes and resync
    Skip(usize),
    /// The frame at the sync position is not complete yet
    NeedMore,
}

pub enum Decoder {
    Mp3(Mp3State),
    Aac(AacState),
}

impl Decoder {
    pub fn new(codec: AudioCodec) -> Result<Self> {
        match codec {
            AudioCodec::Mp3 => Ok(Decoder::Mp3(Mp3State::new()?)),
            AudioCodec::Aac => Ok(Decoder::Aac(AacState::new())),
            AudioCodec::Unknown => Err(RadioError::DecoderInitFailure("unknown codec".into())),
        }
    }

    pub fn codec(&self) -> AudioCodec {
        match self {
            Decoder::Mp3(_) => AudioCodec::Mp3,
            Decoder::Aac(_) => AudioCodec::Aac,
        }
    }

    pub fn find_sync(&self, buf: &[u8]) -> Option<usize> {
        match self {
            Decoder::Mp3(_) => find_mpeg_sync(buf),
            Decoder::Aac(_) => find_adts_sync(buf),
        }
    }

    /// Decodes the frame starting at `buf[0]`
    pub fn step(&mut self, buf: &[u8]) -> Step {
        match self {
            Decoder::Mp3(state) => state.step(buf),
            Decoder::Aac(state) => state.step(buf),
        }
    }
}

/// Sniffs the codec of an elementary stream from its first sync word.
///
/// ADTS and MPEG audio share the `0xFFF` prefix; the layer bits tell them
/// apart (`00` is ADTS).
pub fn sniff_elementary(buf: &[u8]) -> AudioCodec {
    for i in 0..buf.len().saturating_sub(1) {
        if buf[i] == 0xFF && buf[i + 1] & 0xE0 == 0xE0 {
            if buf[i + 1] & 0xF6 == 0xF0 {
                return AudioCodec::Aac;
            }
            if FrameHeader::parse(&buf[i..]).is_some() {
                return AudioCodec::Mp3;
            }
        }
    }
    AudioCodec::Unknown
}

/// Decoder plus the once-per-session sample-rate latch
#[derive(Default)]
pub struct DecodePipeline {
    decoder: Option<Decoder>,
    sample_rate: Option<u32>,
}

impl DecodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn codec(&self) -> AudioCodec {
        self.decoder
            .as_ref()
            .map(Decoder::codec)
            .unwrap_or_default()
    }

    pub fn init(&mut self, codec: AudioCodec) -> Result<()> {
        self.decoder = Some(Decoder::new(codec)?);
        info!(?codec, "decoder initialized");
        Ok(())
    }

    /// Sample rate latched from the first decoded frame
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Decodes every complete frame in `buf`, pushing PCM into the ring.
    ///
    /// Returns how many bytes of `buf` were consumed. When no sync word is
    /// left, everything but a short tail is consumed so a sync word split
    /// across reads is not lost.
    pub fn decode(&mut self, buf: &[u8], shared: &Shared) -> usize {
        let Some(decoder) = self.decoder.as_mut() else {
            return 0;
        };

        let mut pos = 0;
        while pos < buf.len() && !shared.stop.load(Ordering::Relaxed) {
            let Some(offset) = decoder.find_sync(&buf[pos..]) else {
                pos = pos.max(buf.len().saturating_sub(3));
                break;
            };
            pos += offset;

            match decoder.step(&buf[pos..]) {
                Step::Decoded(frame) => {
                    pos += frame.consumed;
                    if self.sample_rate.is_none() && frame.sample_rate > 0 {
                        self.sample_rate = Some(frame.sample_rate);
                        info!(
                            sample_rate = frame.sample_rate,
                            channels = frame.channels,
                            "stream format latched"
                        );
                        shared.output.set_sample_rate(frame.sample_rate);
                        shared.output.resume();
                    }
                    let accepted = shared.ring.push(&frame.pcm);
                    if accepted < frame.pcm.len() {
                        debug!(dropped = frame.pcm.len() - accepted, "ring full, dropping pcm");
                    }
                }
                Step::Skip(n) => pos += n.max(1),
                Step::NeedMore => break,
            }
        }
        pos.min(buf.len())
    }
}

/// Converts any decoded buffer to interleaved stereo i16
pub(crate) fn interleave_stereo(decoded: AudioBufferRef<'_>) -> (Vec<i16>, u32, usize) {
    let spec = *decoded.spec();
    let channels = spec.channels.count();
    if decoded.frames() == 0 || channels == 0 {
        return (Vec::new(), spec.rate, channels);
    }

    let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
    buf.copy_interleaved_ref(decoded);
    let samples = buf.samples();

    let pcm = match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    };
    (pcm, spec.rate, channels)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::output::NullOutput;

    /// MPEG-1 layer III, 128 kbps, 44.1 kHz, joint stereo, silent
    fn mp3_frame() -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFB, 0x90, 0x64];
        frame.resize(417, 0);
        frame
    }

    #[test]
    fn unknown_codec_fails_init() {
        assert!(matches!(
            Decoder::new(AudioCodec::Unknown),
            Err(RadioError::DecoderInitFailure(_))
        ));
    }

    #[test]
    fn sniff_adts_vs_mpeg() {
        assert_eq!(sniff_elementary(&[0x00, 0xFF, 0xF1, 0x50, 0x80]), AudioCodec::Aac);
        // MPEG-1 layer III, 128 kbps, 44.1 kHz
        assert_eq!(sniff_elementary(&[0xFF, 0xFB, 0x90, 0x64]), AudioCodec::Mp3);
        assert_eq!(sniff_elementary(&[1, 2, 3]), AudioCodec::Unknown);
    }

    #[test]
    fn pipeline_decodes_mp3_and_latches_rate() {
        let output = Arc::new(NullOutput::new());
        let shared = Shared::new(EngineConfig::default(), output.clone());
        let stream: Vec<u8> = (0..10).flat_map(|_| mp3_frame()).collect();

        let mut pipeline = DecodePipeline::new();
        assert_eq!(pipeline.decode(&stream, &shared), 0);
        pipeline.init(AudioCodec::Mp3).unwrap();
        let used = pipeline.decode(&stream, &shared);

        assert!(used > 0 && used <= stream.len());
        assert_eq!(pipeline.sample_rate(), Some(44_100));
        assert_eq!(output.sample_rate(), 44_100);
        assert!(output.is_running());
        // 1152 stereo samples per frame
        assert!(!shared.ring.is_empty());
        assert_eq!(shared.ring.len() % 2304, 0);
    }
}
