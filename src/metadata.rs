use serde::{Deserialize, Serialize};

/// What the UI shows for the current stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingMetadata {
    pub station_name: String,
    pub content_type: String,
    /// kbps, 0 when unknown
    pub bitrate: u32,
    pub title: String,
    pub artist: String,
}

impl NowPlayingMetadata {
    /// Sets title/artist from an `"Artist - Title"` string.
    ///
    /// Without a separator the whole string is the title and the artist is
    /// cleared.
    pub fn set_song(&mut self, combined: &str) {
        let (artist, title) = split_artist_title(combined);
        self.artist = artist.to_string();
        self.title = title.to_string();
    }
}

/// Splits on the first `" - "`; no separator means an empty artist
pub fn split_artist_title(s: &str) -> (&str, &str) {
    match s.split_once(" - ") {
        Some((artist, title)) => (artist, title),
        None => ("", s),
    }
}

/// Extracts the value of `StreamTitle='...'` from a metadata block.
///
/// The value normally ends at `';`, which keeps apostrophes inside titles;
/// a lone closing quote is accepted as well.
pub fn parse_stream_title(block: &[u8]) -> Option<String> {
    const KEY: &[u8] = b"StreamTitle='";
    let start = find(block, KEY)? + KEY.len();
    let rest = &block[start..];
    let end = find(rest, b"';").or_else(|| rest.iter().position(|&b| b == b'\''))?;
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug)]
enum Phase {
    Audio { remaining: usize },
    Length,
    Meta { needed: usize, block: Vec<u8> },
}

/// Separates interleaved ICY metadata from audio bytes.
///
/// After every `metaint` audio bytes the server sends one length byte `L`
/// followed by `L * 16` bytes of metadata. Blocks may straddle reads.
#[derive(Debug)]
pub struct IcyDemux {
    metaint: usize,
    phase: Phase,
}

impl IcyDemux {
    /// `metaint == 0` passes everything through as audio
    pub fn new(metaint: usize) -> Self {
        Self {
            metaint,
            phase: Phase::Audio { remaining: metaint },
        }
    }

    /// Feeds received bytes. `audio` gets runs of audio bytes, `meta` gets
    /// each complete non-empty metadata block.
    pub fn feed(&mut self, mut data: &[u8], mut audio: impl FnMut(&[u8]), mut meta: impl FnMut(&[u8])) {
        if self.metaint == 0 {
            if !data.is_empty() {
                audio(data);
            }
            return;
        }

        while !data.is_empty() {
            match &mut self.phase {
                Phase::Audio { remaining } => {
                    let n = (*remaining).min(data.len());
                    audio(&data[..n]);
                    *remaining -= n;
                    data = &data[n..];
                    if *remaining == 0 {
                        self.phase = Phase::Length;
                    }
                }
                Phase::Length => {
                    let needed = data[0] as usize * 16;
                    data = &data[1..];
                    self.phase = if needed == 0 {
                        Phase::Audio { remaining: self.metaint }
                    } else {
                        Phase::Meta {
                            needed,
                            block: Vec::with_capacity(needed),
                        }
                    };
                }
                Phase::Meta { needed, block } => {
                    let n = (*needed - block.len()).min(data.len());
                    block.extend_from_slice(&data[..n]);
                    data = &data[n..];
                    if block.len() == *needed {
                        meta(block);
                        self.phase = Phase::Audio { remaining: self.metaint };
                    }
                }
            }
        }
    }
}
