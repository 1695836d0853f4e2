//! MPEG-TS demuxing down to the audio elementary stream

use mpeg2ts::ts::{ReadTsPacket, TsPacket, TsPacketReader, TsPayload};
use tracing::debug;

use crate::decode::AudioCodec;

pub const PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;

/// Remembers the audio PID across segments of one session
#[derive(Debug, Default)]
pub struct TsDemuxer {
    audio: Option<(u16, AudioCodec)>,
}

impl TsDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audio_pid(&self) -> Option<u16> {
        self.audio.map(|(pid, _)| pid)
    }

    /// Codec announced by the PMT, `Unknown` until detected
    pub fn codec(&self) -> AudioCodec {
        self.audio.map(|(_, c)| c).unwrap_or_default()
    }

    /// Appends the audio payload of every packet in `data` to `out`.
    ///
    /// Garbage before a sync byte is skipped. A packet whose payload would
    /// grow `out` past `limit` bytes is dropped.
    pub fn demux(&mut self, data: &[u8], out: &mut Vec<u8>, limit: usize) {
        let mut pos = 0;
        while pos + PACKET_SIZE <= data.len() {
            match data[pos..].iter().position(|&b| b == SYNC_BYTE) {
                Some(off) => pos += off,
                None => break,
            }

            let mut reader = TsPacketReader::new(&data[pos..]);
            let mut read = 0;
            loop {
                let at = pos + read * PACKET_SIZE;
                match reader.read_ts_packet() {
                    Ok(Some(packet)) => {
                        read += 1;
                        self.packet(packet, &data[at..at + PACKET_SIZE], out, limit);
                    }
                    Ok(None) => return,
                    Err(e) => {
                        // the reader only knows PIDs from a PAT/PMT it has seen
                        match data.get(at..at + PACKET_SIZE) {
                            Some(raw) if self.cached_pid_packet(raw, out, limit) => {
                                pos = at + PACKET_SIZE;
                            }
                            _ => {
                                debug!(offset = at, error = %e, "resyncing transport stream");
                                pos = at + 1;
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    fn packet(&mut self, packet: TsPacket, raw: &[u8], out: &mut Vec<u8>, limit: usize) {
        let pid = packet.header.pid.as_u16();
        let Some(payload) = packet.payload else {
            return;
        };

        let data = match &payload {
            TsPayload::Pmt(pmt) => {
                if self.audio.is_none() {
                    self.audio = pmt.es_info.iter().find_map(|es| {
                        codec_for(es.stream_type as u8).map(|codec| (es.elementary_pid.as_u16(), codec))
                    });
                    if let Some((pid, codec)) = self.audio {
                        debug!(pid, ?codec, "audio elementary stream found");
                    }
                }
                return;
            }
            _ if self.audio_pid() != Some(pid) => return,
            TsPayload::PesStart(pes) => pes.data.as_ref(),
            TsPayload::PesContinuation(data) => data.as_ref(),
            TsPayload::Raw(_) => {
                self.cached_pid_packet(raw, out, limit);
                return;
            }
            _ => return,
        };
        push_limited(out, data, limit);
    }

    /// Takes a packet on the cached audio PID straight from its bytes.
    /// Returns false when the packet is not one.
    fn cached_pid_packet(&self, pkt: &[u8], out: &mut Vec<u8>, limit: usize) -> bool {
        let pid = (u16::from(pkt[1] & 0x1F) << 8) | u16::from(pkt[2]);
        if pkt[0] != SYNC_BYTE || self.audio_pid() != Some(pid) {
            return false;
        }
        let unit_start = pkt[1] & 0x40 != 0;
        let adaptation = (pkt[3] >> 4) & 0x03;
        let mut header_len = 4;
        if adaptation & 0x02 != 0 {
            header_len += 1 + pkt[4] as usize;
        }
        if adaptation & 0x01 == 0 || header_len >= PACKET_SIZE {
            return true;
        }
        let payload = &pkt[header_len..];
        let data = if unit_start { pes_payload(payload) } else { Some(payload) };
        if let Some(data) = data {
            push_limited(out, data, limit);
        }
        true
    }
}

fn push_limited(out: &mut Vec<u8>, data: &[u8], limit: usize) {
    if out.len() + data.len() <= limit {
        out.extend_from_slice(data);
    }
}

/// AAC (`0x0F`/`0x11`) or MPEG audio (`0x03`/`0x04`)
fn codec_for(stream_type: u8) -> Option<AudioCodec> {
    match stream_type {
        0x0F | 0x11 => Some(AudioCodec::Aac),
        0x03 | 0x04 => Some(AudioCodec::Mp3),
        _ => None,
    }
}

/// Elementary-stream bytes after the PES header
fn pes_payload(pes: &[u8]) -> Option<&[u8]> {
    if pes.len() < 9 || pes[..3] != [0x00, 0x00, 0x01] {
        return None;
    }
    let header_len = 9 + pes[8] as usize;
    (header_len < pes.len()).then(|| &pes[header_len..])
}
