//! ID3v2 tags prepended to HLS segments

use crate::metadata::{find, NowPlayingMetadata};

const HEADER_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Update {
    Title(String),
    Artist(String),
    /// `"Artist - Title"` style text; `clear_artist` drops a stale artist
    /// when no separator is present
    Song { text: String, clear_artist: bool },
}

/// Text frames found in one tag, in tag order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Tag {
    /// Bytes to skip, header included
    pub size: usize,
    updates: Vec<Update>,
}

impl Id3Tag {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn apply(&self, meta: &mut NowPlayingMetadata) {
        for update in &self.updates {
            match update {
                Update::Title(t) => meta.title = t.clone(),
                Update::Artist(a) => meta.artist = a.clone(),
                Update::Song { text, clear_artist } => match text.split_once(" - ") {
                    Some((artist, title)) => {
                        meta.artist = artist.to_string();
                        meta.title = title.to_string();
                    }
                    None => {
                        meta.title = text.clone();
                        if *clear_artist {
                            meta.artist.clear();
                        }
                    }
                },
            }
        }
    }
}

fn syncsafe(b: &[u8]) -> usize {
    b.iter().take(4).fold(0, |acc, &x| (acc << 7) | usize::from(x & 0x7F))
}

fn big_endian(b: &[u8]) -> usize {
    b.iter().take(4).fold(0, |acc, &x| (acc << 8) | usize::from(x))
}

/// Decodes a text payload in ISO-8859-1 (0) or UTF-8 (3)
fn text(encoding: u8, raw: &[u8]) -> Option<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let raw = &raw[..end];
    let s = match encoding {
        0 => raw.iter().map(|&b| char::from(b)).collect(),
        3 => String::from_utf8_lossy(raw).into_owned(),
        _ => return None,
    };
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn stream_title(payload: &[u8]) -> Option<String> {
    let start = find(payload, b"StreamTitle='")? + b"StreamTitle='".len();
    let rest = &payload[start..];
    let end = rest.iter().position(|&b| b == b'\'')?;
    text(3, &rest[..end])
}

fn frame(id: &[u8], body: &[u8]) -> Option<Update> {
    match id {
        b"TIT2" | b"TPE1" => {
            let (&encoding, raw) = body.split_first()?;
            let value = text(encoding, raw)?;
            Some(if id == b"TIT2" {
                Update::Title(value)
            } else {
                Update::Artist(value)
            })
        }
        b"TXXX" => {
            let (&encoding, raw) = body.split_first()?;
            if encoding != 0 && encoding != 3 {
                return None;
            }
            let desc_end = raw.iter().position(|&b| b == 0)?;
            let desc = &raw[..desc_end];
            if find(desc, b"StreamTitle").is_none() && find(desc, b"TITLE").is_none() {
                return None;
            }
            let value = text(encoding, &raw[desc_end + 1..])?;
            Some(Update::Song {
                text: value,
                clear_artist: false,
            })
        }
        b"PRIV" => stream_title(body).map(|text| Update::Song {
            text,
            clear_artist: true,
        }),
        _ => None,
    }
}

/// Parses an ID3v2 tag at the start of `data`.
///
/// Returns `None` when there is no tag or it is cut short.
pub fn parse(data: &[u8]) -> Option<Id3Tag> {
    if data.len() < HEADER_LEN || &data[..3] != b"ID3" {
        return None;
    }
    let version = data[3];
    let flags = data[5];
    let size = HEADER_LEN + syncsafe(&data[6..10]);
    if data.len() < size {
        return None;
    }

    let mut pos = HEADER_LEN;
    if flags & 0x40 != 0 && pos + 4 <= size {
        pos += match version {
            4.. => syncsafe(&data[pos..pos + 4]),
            _ => 4 + big_endian(&data[pos..pos + 4]),
        };
    }

    let mut updates = Vec::new();
    while pos + HEADER_LEN < size {
        let id = &data[pos..pos + 4];
        let frame_size = if version >= 4 {
            syncsafe(&data[pos + 4..pos + 8])
        } else {
            big_endian(&data[pos + 4..pos + 8])
        };
        let body_start = pos + HEADER_LEN;
        if frame_size == 0 || body_start + frame_size > size {
            break;
        }
        if let Some(update) = frame(id, &data[body_start..body_start + frame_size]) {
            updates.push(update);
        }
        pos = body_start + frame_size;
    }
    Some(Id3Tag { size, updates })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_syncsafe(n: usize) -> [u8; 4] {
        [
            (n >> 21) as u8 & 0x7F,
            (n >> 14) as u8 & 0x7F,
            (n >> 7) as u8 & 0x7F,
            n as u8 & 0x7F,
        ]
    }

    fn frame_bytes(version: u8, id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut f = id.to_vec();
        if version >= 4 {
            f.extend_from_slice(&encode_syncsafe(body.len()));
        } else {
            f.extend_from_slice(&(body.len() as u32).to_be_bytes());
        }
        f.extend_from_slice(&[0, 0]);
        f.extend_from_slice(body);
        f
    }

    fn tag(version: u8, frames: &[Vec<u8>], padding: usize) -> Vec<u8> {
        let body: Vec<u8> = frames.concat();
        let mut t = b"ID3".to_vec();
        t.extend_from_slice(&[version, 0, 0]);
        t.extend_from_slice(&encode_syncsafe(body.len() + padding));
        t.extend(body);
        t.extend(std::iter::repeat(0).take(padding));
        t
    }

    fn applied(data: &[u8]) -> NowPlayingMetadata {
        let mut meta = NowPlayingMetadata::default();
        parse(data).expect("tag").apply(&mut meta);
        meta
    }

    #[test]
    fn absent_or_truncated() {
        assert!(parse(b"\x47\x40\x00\x10").is_none());
        let t = tag(4, &[frame_bytes(4, b"TIT2", b"\x03Song")], 0);
        assert!(parse(&t[..t.len() - 1]).is_none());
    }

    #[test]
    fn v4_title_and_artist() {
        let t = tag(
            4,
            &[
                frame_bytes(4, b"TIT2", b"\x03Song Name"),
                frame_bytes(4, b"TPE1", b"\x03Band"),
            ],
            20,
        );
        let parsed = parse(&t).unwrap();
        assert_eq!(parsed.size, t.len());
        let meta = applied(&t);
        assert_eq!(meta.title, "Song Name");
        assert_eq!(meta.artist, "Band");
    }

    #[test]
    fn v3_big_endian_frame_sizes_and_latin1() {
        let t = tag(3, &[frame_bytes(3, b"TIT2", b"\x00Caf\xE9")], 0);
        assert_eq!(applied(&t).title, "Café");
    }

    #[test]
    fn txxx_splits_artist() {
        let t = tag(4, &[frame_bytes(4, b"TXXX", b"\x03StreamTitle\x00Artist - Track")], 0);
        let meta = applied(&t);
        assert_eq!(meta.artist, "Artist");
        assert_eq!(meta.title, "Track");
    }

    #[test]
    fn txxx_without_separator_keeps_artist() {
        let t = tag(
            4,
            &[
                frame_bytes(4, b"TPE1", b"\x03Band"),
                frame_bytes(4, b"TXXX", b"\x03TITLE\x00Just a title"),
            ],
            0,
        );
        let meta = applied(&t);
        assert_eq!(meta.artist, "Band");
        assert_eq!(meta.title, "Just a title");
    }

    #[test]
    fn priv_stream_title_clears_artist() {
        let t = tag(
            4,
            &[
                frame_bytes(4, b"TPE1", b"\x03Band"),
                frame_bytes(4, b"PRIV", b"com.example\x00StreamTitle='Station jingle';"),
            ],
            0,
        );
        let meta = applied(&t);
        assert_eq!(meta.artist, "");
        assert_eq!(meta.title, "Station jingle");
    }

    #[test]
    fn unsupported_encoding_and_other_frames_are_ignored() {
        let t = tag(
            4,
            &[
                frame_bytes(4, b"TIT2", b"\x01\xFF\xFEx\x00"),
                frame_bytes(4, b"TALB", b"\x03Album"),
            ],
            0,
        );
        assert!(parse(&t).unwrap().is_empty());
    }

    #[test]
    fn oversized_frame_stops_parsing() {
        let mut t = tag(4, &[frame_bytes(4, b"TIT2", b"\x03Song")], 0);
        // claim a frame larger than the tag
        t[14..18].copy_from_slice(&encode_syncsafe(500));
        assert!(parse(&t).unwrap().is_empty());
    }
}
