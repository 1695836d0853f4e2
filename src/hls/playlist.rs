use m3u8_rs::Playlist as M3u8;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{RadioError, Result};
use crate::http;
use crate::url;

pub const MAX_SEGMENTS: usize = 64;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HlsSegment {
    /// Absolute URL
    pub url: String,
    pub duration: f32,
    pub title: String,
    pub artist: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaPlaylist {
    /// Where the playlist was fetched from, after redirects
    pub url: String,
    pub segments: Vec<HlsSegment>,
    pub target_duration: f32,
    pub media_sequence: u64,
    /// No `#EXT-X-ENDLIST`
    pub is_live: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Playlist {
    Media(MediaPlaylist),
    /// Master playlist; holds the first variant, resolved
    Master(String),
}

// `title="..."` style attributes in the text after the EXTINF duration
fn quoted_attr<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];
    rest.find('"').map(|end| &rest[..end])
}

impl Playlist {
    /// Parses M3U8 text; relative URIs are resolved against `playlist_url`.
    pub fn parse(text: &[u8], playlist_url: &str) -> Result<Playlist> {
        match m3u8_rs::parse_playlist(text) {
            Ok((_, M3u8::MasterPlaylist(master))) => {
                let variant = master
                    .variants
                    .first()
                    .ok_or_else(|| RadioError::PlaylistFetchFailure("master playlist has no variants".into()))?;
                Ok(Playlist::Master(url::join(playlist_url, &variant.uri)?))
            }
            Ok((_, M3u8::MediaPlaylist(pl))) => {
                let mut segments = Vec::with_capacity(pl.segments.len().min(MAX_SEGMENTS));
                for seg in pl.segments.iter().take(MAX_SEGMENTS) {
                    let url = match url::join(playlist_url, &seg.uri) {
                        Ok(url) => url,
                        Err(e) => {
                            warn!(uri = %seg.uri, error = %e, "skipping segment");
                            continue;
                        }
                    };
                    let info = seg.title.as_deref().unwrap_or_default();
                    segments.push(HlsSegment {
                        url,
                        duration: seg.duration,
                        title: quoted_attr(info, "title=\"").unwrap_or_default().to_string(),
                        artist: quoted_attr(info, "artist=\"").unwrap_or_default().to_string(),
                    });
                }
                Ok(Playlist::Media(MediaPlaylist {
                    url: playlist_url.to_string(),
                    segments,
                    target_duration: pl.target_duration as f32,
                    media_sequence: pl.media_sequence,
                    is_live: !pl.end_list,
                }))
            }
            Err(e) => Err(RadioError::PlaylistFetchFailure(format!("invalid playlist: {e}"))),
        }
    }
}

/// Fetches `playlist_url`, following one level of master indirection.
pub fn load(playlist_url: &str, config: &EngineConfig) -> Result<MediaPlaylist> {
    let mut current = playlist_url.to_string();
    for _ in 0..2 {
        let fetched = http::fetch(&current, config, config.playlist_limit)
            .map_err(|e| RadioError::PlaylistFetchFailure(e.to_string()))?;
        if fetched.body.is_empty() {
            return Err(RadioError::PlaylistFetchFailure(format!("empty playlist at {current}")));
        }
        match Playlist::parse(&fetched.body, &fetched.url)? {
            Playlist::Media(media) => {
                debug!(
                    url = %fetched.url,
                    segments = media.segments.len(),
                    sequence = media.media_sequence,
                    live = media.is_live,
                    "playlist loaded"
                );
                return Ok(media);
            }
            Playlist::Master(variant) => {
                info!(variant = %variant, "master playlist, using first variant");
                current = variant;
            }
        }
    }
    Err(RadioError::NoSegments)
}

/// Index in a refreshed playlist of the segment after `last_played`.
///
/// Clamped to `[0, count]`; a sequence that jumped past the last played
/// segment restarts from the first entry.
pub fn resume_index(last_played: Option<u64>, media_sequence: u64, count: usize) -> usize {
    let next = last_played.map_or(0, |last| last as i128 + 1);
    let index = next - media_sequence as i128;
    index.clamp(0, count as i128) as usize
}
