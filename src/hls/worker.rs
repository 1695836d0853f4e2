use std::sync::Arc;

use tracing::{debug, info, warn};

use super::playlist::{self, resume_index, HlsSegment, MediaPlaylist};
use crate::metadata::NowPlayingMetadata;
use crate::decode::{sniff_elementary, AudioCodec, DecodePipeline};
use crate::error::{RadioError, Result};
use crate::http;
use crate::id3;
use crate::session::Shared;
use crate::state::StreamState;
use crate::ts::{TsDemuxer, SYNC_BYTE};

pub(crate) struct HlsSession {
    playlist_url: String,
    playlist: MediaPlaylist,
    current: usize,
    last_played: Option<u64>,
    demux: TsDemuxer,
    pipeline: DecodePipeline,
}

impl HlsSession {
    pub fn new(playlist_url: &str, playlist: MediaPlaylist) -> Self {
        Self {
            playlist_url: playlist_url.to_string(),
            playlist,
            current: 0,
            last_played: None,
            demux: TsDemuxer::new(),
            pipeline: DecodePipeline::new(),
        }
    }

    pub fn run(mut self, shared: Arc<Shared>) {
        shared.state.transition(StreamState::Connecting, StreamState::Buffering);
        match self.stream(&shared) {
            Ok(()) => debug!("hls worker stopped"),
            Err(e) => shared.fail(&e),
        }
    }

    fn stream(&mut self, shared: &Shared) -> Result<()> {
        let poll = shared.config.poll_interval();
        while !shared.stopping() {
            if self.current >= self.playlist.segments.len() {
                if !self.playlist.is_live {
                    info!("end of playlist");
                    return self.drain(shared);
                }
                self.refresh(shared);
                if self.current >= self.playlist.segments.len() {
                    shared.sleep(poll);
                    continue;
                }
            }

            if !self.wait_for_room(shared) {
                break;
            }

            let segment = self.playlist.segments[self.current].clone();
            let sequence = self.playlist.media_sequence + self.current as u64;
            self.current += 1;
            self.play_segment(shared, &segment)?;
            self.last_played = Some(sequence);
            shared.check_fill();
        }
        Ok(())
    }

    // a failed refresh keeps the old list and is retried next pass
    fn refresh(&mut self, shared: &Shared) {
        match playlist::load(&self.playlist_url, &shared.config) {
            Ok(fresh) => {
                self.current =
                    resume_index(self.last_played, fresh.media_sequence, fresh.segments.len());
                if self.current < fresh.segments.len() {
                    debug!(
                        sequence = fresh.media_sequence,
                        resume = self.current,
                        "playlist refreshed"
                    );
                }
                self.playlist = fresh;
            }
            Err(e) => warn!(error = %e, "playlist refresh failed"),
        }
    }

    // above 3/4 full, wait for the ring to drain to 1/2
    fn wait_for_room(&self, shared: &Shared) -> bool {
        let capacity = shared.ring.capacity();
        if shared.ring.len() <= capacity * 3 / 4 {
            return !shared.stopping();
        }
        while shared.ring.len() > capacity / 2 {
            if !shared.sleep(shared.config.poll_interval()) {
                return false;
            }
        }
        !shared.stopping()
    }

    fn play_segment(&mut self, shared: &Shared, segment: &HlsSegment) -> Result<()> {
        if !segment.title.is_empty() || !segment.artist.is_empty() {
            shared.update_metadata(|m| apply_segment_tags(m, segment));
        }

        let fetched = match http::fetch(&segment.url, &shared.config, shared.config.segment_limit) {
            Ok(f) if !f.body.is_empty() => f,
            Ok(_) => {
                warn!(url = %segment.url, "empty segment, skipping");
                return Ok(());
            }
            Err(e) => {
                warn!(url = %segment.url, error = %e, "segment fetch failed, skipping");
                return Ok(());
            }
        };

        let mut body = fetched.body.as_slice();
        if segment.duration > 0.0 {
            let kbps = (body.len() as f32 * 8.0 / segment.duration / 1000.0) as u32;
            if kbps > 0 && kbps < 1000 {
                shared.update_metadata(|m| m.bitrate = kbps);
            }
        }

        if let Some(tag) = id3::parse(body) {
            if !tag.is_empty() {
                shared.update_metadata(|m| tag.apply(m));
            }
            body = &body[tag.size.min(body.len())..];
        }
        if body.is_empty() {
            return Ok(());
        }

        let (elementary, codec) = if body[0] == SYNC_BYTE {
            let mut es = Vec::with_capacity(body.len());
            self.demux.demux(body, &mut es, shared.config.segment_limit);
            let codec = self.demux.codec();
            (es, codec)
        } else {
            (body.to_vec(), AudioCodec::Unknown)
        };

        if !self.pipeline.is_ready() {
            let codec = match codec {
                AudioCodec::Unknown => match sniff_elementary(&elementary) {
                    AudioCodec::Unknown => AudioCodec::Aac,
                    sniffed => sniffed,
                },
                known => known,
            };
            self.pipeline.init(codec)?;
        }

        // frames never span segments here; leftovers are dropped
        let used = self.pipeline.decode(&elementary, shared);
        if used < elementary.len() {
            debug!(leftover = elementary.len() - used, "segment tail discarded");
        }
        Ok(())
    }

    fn drain(&self, shared: &Shared) -> Result<()> {
        while !shared.ring.is_empty() {
            if !shared.sleep(shared.config.poll_interval()) {
                return Ok(());
            }
        }
        Err(RadioError::StreamEnded)
    }
}

fn apply_segment_tags(meta: &mut NowPlayingMetadata, segment: &HlsSegment) {
    if !segment.title.is_empty() {
        meta.title = segment.title.clone();
    }
    if !segment.artist.is_empty() && segment.artist != " " {
        meta.artist = segment.artist.clone();
    }
}
