use symphonia::core::audio::Channels;
use symphonia::core::codecs::{CodecParameters, Decoder as _, DecoderOptions, CODEC_TYPE_AAC};
use symphonia::core::formats::Packet;
use symphonia::default::codecs::AacDecoder;
use tracing::{debug, trace};

use super::{interleave_stereo, DecodedFrame, Step};

const SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

/// 12-bit sync word with layer `00`
pub fn find_adts_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w[0] == 0xFF && w[1] & 0xF6 == 0xF0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdtsHeader {
    pub header_len: usize,
    pub frame_len: usize,
    pub sample_rate: u32,
    pub channel_config: u8,
    pub profile: u8,
}

impl AdtsHeader {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 7 || buf[0] != 0xFF || buf[1] & 0xF6 != 0xF0 {
            return None;
        }
        let protection_absent = buf[1] & 0x01 != 0;
        let rate_index = ((buf[2] >> 2) & 0x0F) as usize;
        let sample_rate = *SAMPLE_RATES.get(rate_index)?;
        let channel_config = ((buf[2] & 0x01) << 2) | (buf[3] >> 6);
        let frame_len = (((buf[3] & 0x03) as usize) << 11)
            | ((buf[4] as usize) << 3)
            | ((buf[5] as usize) >> 5);
        let header_len = if protection_absent { 7 } else { 9 };
        if frame_len <= header_len {
            return None;
        }
        Some(Self {
            header_len,
            frame_len,
            sample_rate,
            channel_config,
            profile: buf[2] >> 6,
        })
    }

    fn channel_count(&self) -> usize {
        match self.channel_config {
            7 => 8,
            n => n as usize,
        }
    }
}

/// Decoder state, created from the first ADTS header and rebuilt if the
/// stream switches sample rate or channel layout
#[derive(Default)]
pub struct AacState {
    decoder: Option<(AacDecoder, u32, u8)>,
}

impl AacState {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_decoder(&mut self, header: &AdtsHeader) -> Option<&mut AacDecoder> {
        let current = self
            .decoder
            .as_ref()
            .map(|(_, rate, cfg)| (*rate, *cfg));
        if current != Some((header.sample_rate, header.channel_config)) {
            let channels = match header.channel_count() {
                0 => return None,
                1 => Channels::FRONT_CENTRE,
                2 => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
                n => Channels::from_bits_truncate((1u32 << n) - 1),
            };
            let mut params = CodecParameters::new();
            params
                .for_codec(CODEC_TYPE_AAC)
                .with_sample_rate(header.sample_rate)
                .with_channels(channels);
            match AacDecoder::try_new(&params, &DecoderOptions::default()) {
                Ok(dec) => {
                    debug!(
                        sample_rate = header.sample_rate,
                        channels = header.channel_count(),
                        "aac decoder configured"
                    );
                    self.decoder = Some((dec, header.sample_rate, header.channel_config));
                }
                Err(e) => {
                    debug!(error = %e, "aac decoder rejected stream parameters");
                    self.decoder = None;
                    return None;
                }
            }
        }
        self.decoder.as_mut().map(|(dec, _, _)| dec)
    }

    pub(super) fn step(&mut self, buf: &[u8]) -> Step {
        if buf.len() < 7 {
            return Step::NeedMore;
        }
        let Some(header) = AdtsHeader::parse(buf) else {
            return Step::Skip(1);
        };
        if buf.len() < header.frame_len {
            return Step::NeedMore;
        }
        let Some(decoder) = self.ensure_decoder(&header) else {
            return Step::Skip(1);
        };

        let packet = Packet::new_from_slice(0, 0, 0, &buf[header.header_len..header.frame_len]);
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let (pcm, sample_rate, channels) = interleave_stereo(decoded);
                Step::Decoded(DecodedFrame {
                    consumed: header.frame_len,
                    sample_rate: if sample_rate > 0 { sample_rate } else { header.sample_rate },
                    channels,
                    pcm,
                })
            }
            Err(e) => {
                trace!(error = %e, "aac decode error, resyncing");
                Step::Skip(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // AAC-LC, 44.1 kHz, stereo, 371-byte frame, no CRC
    const HEADER: [u8; 7] = [0xFF, 0xF1, 0x50, 0x80, 0x2E, 0x7F, 0xFC];

    #[test]
    fn parses_adts_header() {
        let h = AdtsHeader::parse(&HEADER).unwrap();
        assert_eq!(h.header_len, 7);
        assert_eq!(h.sample_rate, 44_100);
        assert_eq!(h.channel_config, 2);
        assert_eq!(h.frame_len, 371);
        assert_eq!(h.profile, 1);
    }

    #[test]
    fn rejects_mpeg_layer_bits_and_bad_rate() {
        assert!(AdtsHeader::parse(&[0xFF, 0xFB, 0x50, 0x80, 0x2E, 0x7F, 0xFC]).is_none());
        assert!(AdtsHeader::parse(&[0xFF, 0xF1, 0x3C, 0x80, 0x2E, 0x7F, 0xFC]).is_none());
        assert_eq!(find_adts_sync(&[0x12, 0xFF, 0xFB, 0xFF, 0xF9]), Some(3));
    }

    #[test]
    fn incomplete_frame_needs_more() {
        let mut state = AacState::new();
        let mut buf = HEADER.to_vec();
        buf.resize(100, 0);
        assert!(matches!(state.step(&buf), Step::NeedMore));
        assert!(matches!(state.step(&HEADER[..5]), Step::NeedMore));
    }

    /// ADTS frame (AAC-LC, 44.1 kHz, no CRC) around `payload`
    fn adts(channel_config: u8, payload: &[u8]) -> Vec<u8> {
        let len = 7 + payload.len();
        let mut frame = vec![
            0xFF,
            0xF1,
            0x50 | (channel_config >> 2),
            (channel_config << 6) | ((len >> 11) as u8 & 0x03),
            (len >> 3) as u8,
            ((len & 0x07) as u8) << 5 | 0x1F,
            0xFC,
        ];
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn silent_stereo_frame_decodes() {
        let frame = adts(2, &[0x21, 0x10, 0x04, 0x60, 0x8C, 0x1C]);
        assert_eq!(AdtsHeader::parse(&frame).unwrap().frame_len, frame.len());

        let mut state = AacState::new();
        let Step::Decoded(decoded) = state.step(&frame) else {
            panic!("frame did not decode");
        };
        assert_eq!(decoded.consumed, frame.len());
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.pcm.len(), 2048);
    }

    #[test]
    fn silent_mono_frame_is_upmixed() {
        let frame = adts(1, &[0x01, 0x40, 0x20, 0x07]);
        let mut state = AacState::new();
        let Step::Decoded(decoded) = state.step(&frame) else {
            panic!("frame did not decode");
        };
        assert_eq!(decoded.channels, 1);
        // 1024 frames, each duplicated to both channels
        assert_eq!(decoded.pcm.len(), 2 * 1024);
    }

    #[test]
    fn garbage_at_sync_skips_one_byte() {
        let mut state = AacState::new();
        assert!(matches!(state.step(&[0xFF, 0xF1, 0x3C, 0, 0, 0, 0, 0]), Step::Skip(1)));
    }
}
