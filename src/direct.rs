use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::decode::{find_mpeg_sync, AudioCodec, DecodePipeline};
use crate::error::{RadioError, Result};
use crate::http;
use crate::metadata::{parse_stream_title, IcyDemux};
use crate::session::Shared;
use crate::state::StreamState;
use crate::transport::{self, Connection};

const RECV_CHUNK: usize = 8192;

pub(crate) fn run(shared: Arc<Shared>, url: String) {
    let result = connect(&shared, &url).and_then(|opened| match opened {
        Some((conn, metaint, codec)) => DirectStream::new(conn, metaint, codec).pump(&shared),
        None => Ok(()),
    });
    match result {
        Ok(()) => debug!("stream worker stopped"),
        Err(e) => shared.fail(&e),
    }
}

fn connect(shared: &Shared, url: &str) -> Result<Option<(Connection, usize, AudioCodec)>> {
    let config = &shared.config;
    let opened = http::open(url, config, true, config.header_limit)?;
    if shared.stopping() {
        opened.conn.close();
        return Ok(None);
    }

    let icy = opened.head.icy();
    info!(
        url = %opened.url,
        station = %icy.station_name,
        content_type = %icy.content_type,
        bitrate = icy.bitrate,
        metaint = icy.metaint,
        "stream connected"
    );
    shared.update_metadata(|m| {
        m.station_name = icy.station_name.clone();
        m.content_type = icy.content_type.clone();
        m.bitrate = icy.bitrate;
    });
    opened.conn.set_read_timeout(config.poll_interval())?;
    Ok(Some((opened.conn, icy.metaint, icy.codec())))
}

struct DirectStream {
    conn: Option<Connection>,
    demux: IcyDemux,
    codec: AudioCodec,
    staging: Vec<u8>,
    pipeline: DecodePipeline,
}

impl DirectStream {
    fn new(conn: Connection, metaint: usize, codec: AudioCodec) -> Self {
        Self {
            conn: Some(conn),
            demux: IcyDemux::new(metaint),
            codec,
            staging: Vec::new(),
            pipeline: DecodePipeline::new(),
        }
    }

    // Ok only when stopped
    fn pump(&mut self, shared: &Shared) -> Result<()> {
        let config = &shared.config;
        let mut chunk = vec![0u8; RECV_CHUNK];
        let mut idle = Duration::ZERO;

        while !shared.stopping() {
            let Some(conn) = self.conn.as_mut() else {
                break;
            };
            let n = match conn.recv(&mut chunk) {
                Ok(0) => {
                    info!("server closed the stream");
                    return Err(RadioError::StreamEnded);
                }
                Ok(n) => {
                    idle = Duration::ZERO;
                    n
                }
                Err(e) if transport::is_timeout(&e) => {
                    idle += config.poll_interval();
                    if idle >= config.io_timeout() {
                        warn!(idle_secs = idle.as_secs(), "no data from server");
                        return Err(RadioError::StreamEnded);
                    }
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    return Err(RadioError::StreamEnded);
                }
            };

            self.ingest(shared, &chunk[..n]);
            if !self.pipeline.is_ready() && self.staging.len() >= config.decoder_init_bytes {
                self.init_decoder()?;
            }
            if self.pipeline.is_ready() {
                let used = self.pipeline.decode(&self.staging, shared);
                self.staging.drain(..used);
                shared.check_fill();
            }
        }
        Ok(())
    }

    fn ingest(&mut self, shared: &Shared, data: &[u8]) {
        let limit = shared.config.staging_limit;
        let staging = &mut self.staging;
        let mut dropped = 0;
        self.demux.feed(
            data,
            |audio| {
                let room = limit.saturating_sub(staging.len());
                let take = audio.len().min(room);
                staging.extend_from_slice(&audio[..take]);
                dropped += audio.len() - take;
            },
            |block| {
                if let Some(song) = parse_stream_title(block) {
                    info!(title = %song, "stream title");
                    shared.update_metadata(|m| m.set_song(&song));
                }
            },
        );
        if dropped > 0 {
            debug!(dropped, "staging buffer full");
        }
        if !self.staging.is_empty() {
            shared.state.transition(StreamState::Connecting, StreamState::Buffering);
        }
    }

    fn init_decoder(&mut self) -> Result<()> {
        let codec = match self.codec {
            AudioCodec::Unknown => AudioCodec::Mp3,
            known => known,
        };
        if codec == AudioCodec::Mp3 {
            match find_mpeg_sync(&self.staging) {
                Some(offset) => {
                    self.staging.drain(..offset);
                }
                None => {
                    debug!("no MPEG sync in staged data yet");
                    let keep = self.staging.len().saturating_sub(3);
                    self.staging.drain(..keep);
                    return Ok(());
                }
            }
        }
        self.pipeline.init(codec)
    }
}

impl Drop for DirectStream {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}
