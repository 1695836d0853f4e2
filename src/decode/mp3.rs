use symphonia::core::codecs::{CodecParameters, Decoder as _, DecoderOptions, CODEC_TYPE_MP3};
use symphonia::core::formats::Packet;
use symphonia::default::codecs::MpaDecoder;
use tracing::trace;

use super::{interleave_stereo, DecodedFrame, Step};
use crate::error::{RadioError, Result};

const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];
const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];
const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44_100, 48_000, 32_000],
    [22_050, 24_000, 16_000],
    [11_025, 12_000, 8_000],
];

/// `0xFF` followed by a byte with the top three bits set
pub fn find_mpeg_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0)
}

/// Fields of a 4-byte MPEG audio frame header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// 1 = MPEG-1, 2 = MPEG-2, 3 = MPEG-2.5
    pub version: u8,
    pub layer: u8,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub mono: bool,
}

impl FrameHeader {
    /// `None` for reserved/free-format values or a missing sync
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 || buf[0] != 0xFF || buf[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (buf[1] >> 3) & 0x03 {
            0 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };
        let layer = match (buf[1] >> 1) & 0x03 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };
        let bitrate_index = (buf[2] >> 4) as usize;
        let rate_index = ((buf[2] >> 2) & 0x03) as usize;
        if bitrate_index == 0 || bitrate_index == 15 || rate_index == 3 {
            return None;
        }
        let bitrate_kbps = if version == 1 {
            BITRATES_V1[layer as usize - 1][bitrate_index]
        } else if layer == 1 {
            BITRATES_V2[0][bitrate_index]
        } else {
            BITRATES_V2[1][bitrate_index]
        };

        Some(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate: SAMPLE_RATES[version as usize - 1][rate_index],
            padding: buf[2] & 0x02 != 0,
            mono: buf[3] >> 6 == 3,
        })
    }

    pub fn frame_len(&self) -> usize {
        let bits = self.bitrate_kbps as usize * 1000;
        let rate = self.sample_rate as usize;
        let pad = usize::from(self.padding);
        match self.layer {
            1 => (12 * bits / rate + pad) * 4,
            3 if self.version != 1 => 72 * bits / rate + pad,
            _ => 144 * bits / rate + pad,
        }
    }
}

pub struct Mp3State {
    decoder: MpaDecoder,
}

impl Mp3State {
    pub fn new() -> Result<Self> {
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_MP3);
        let decoder = MpaDecoder::try_new(&params, &DecoderOptions::default())
            .map_err(|e| RadioError::DecoderInitFailure(e.to_string()))?;
        Ok(Self { decoder })
    }

    pub(super) fn step(&mut self, buf: &[u8]) -> Step {
        if buf.len() < 4 {
            return Step::NeedMore;
        }
        let Some(header) = FrameHeader::parse(buf) else {
            return Step::Skip(1);
        };
        let len = header.frame_len();
        if len <= 4 {
            return Step::Skip(1);
        }
        if buf.len() < len {
            return Step::NeedMore;
        }

        let packet = Packet::new_from_slice(0, 0, 0, &buf[..len]);
        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let (pcm, sample_rate, channels) = interleave_stereo(decoded);
                Step::Decoded(DecodedFrame {
                    consumed: len,
                    sample_rate: if sample_rate > 0 { sample_rate } else { header.sample_rate },
                    channels,
                    pcm,
                })
            }
            Err(e) => {
                trace!(error = %e, len, "discarding mp3 frame");
                Step::Skip(len)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_search() {
        assert_eq!(find_mpeg_sync(&[0, 0xFF, 0xE0]), Some(1));
        assert_eq!(find_mpeg_sync(&[0xFF, 0x10, 0xFF]), None);
    }

    #[test]
    fn mpeg1_layer3_frame_length() {
        let h = FrameHeader::parse(&[0xFF, 0xFB, 0x90, 0x64]).unwrap();
        assert_eq!((h.version, h.layer, h.bitrate_kbps, h.sample_rate), (1, 3, 128, 44_100));
        assert_eq!(h.frame_len(), 417);
        let padded = FrameHeader::parse(&[0xFF, 0xFB, 0x92, 0x64]).unwrap();
        assert_eq!(padded.frame_len(), 418);
    }

    #[test]
    fn mpeg2_layer3_uses_half_slot_count() {
        // MPEG-2, layer III, 64 kbps, 24 kHz, mono
        let h = FrameHeader::parse(&[0xFF, 0xF3, 0x84, 0xC4]).unwrap();
        assert_eq!((h.version, h.bitrate_kbps, h.sample_rate), (2, 64, 24_000));
        assert!(h.mono);
        assert_eq!(h.frame_len(), 192);
    }

    #[test]
    fn reserved_values_rejected() {
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0xF0, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0xFB, 0x0C, 0x00]).is_none());
        assert!(FrameHeader::parse(&[0xFF, 0xE9, 0x90, 0x00]).is_none());
    }

    #[test]
    fn short_or_false_sync() {
        let mut state = Mp3State::new().unwrap();
        assert!(matches!(state.step(&[0xFF, 0xFB]), Step::NeedMore));
        assert!(matches!(state.step(&[0xFF, 0xFB, 0xF0, 0x00, 0, 0]), Step::Skip(1)));
        assert!(matches!(state.step(&[0xFF, 0xFB, 0x90, 0x64, 0, 0]), Step::NeedMore));
    }
}
