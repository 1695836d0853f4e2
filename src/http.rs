//! Minimal HTTP/1.0 + ICY client: request writing, header parsing and
//! redirect following. Bodies are read until the peer closes; there is no
//! chunked encoding and no keep-alive.

use std::io::Read;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::decode::AudioCodec;
use crate::error::{RadioError, Result};
use crate::transport::{self, Connection};
use crate::url::{self as urls, StreamUrl};

/// Status line and headers of a response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// `None` for a legacy `ICY 200 OK` status line
    pub status: Option<u16>,
    /// Header names are lowercased, values are kept as sent after the colon
    pub headers: Vec<(String, String)>,
}

/// Classification of a parsed response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadOutcome {
    Success(ResponseHead),
    Redirect(String),
}

/// Stream properties announced in the response headers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IcyHeaders {
    pub metaint: usize,
    pub bitrate: u32,
    pub station_name: String,
    pub content_type: String,
}

impl IcyHeaders {
    pub fn codec(&self) -> AudioCodec {
        sniff_codec(&self.content_type)
    }
}

impl ResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn icy(&self) -> IcyHeaders {
        let station_name = self.header("icy-name").unwrap_or_default();
        IcyHeaders {
            metaint: self.header("icy-metaint").map(leading_number).unwrap_or(0) as usize,
            bitrate: self.header("icy-br").map(leading_number).unwrap_or(0) as u32,
            station_name: station_name
                .strip_prefix(' ')
                .unwrap_or(station_name)
                .trim_end()
                .to_string(),
            content_type: self
                .header("content-type")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        }
    }

    /// Content type without parameters
    pub fn mime(&self) -> Option<String> {
        self.header("content-type")
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// `aac`/`mp4`/`m4a` select AAC, anything else (including no hint) MP3
pub fn sniff_codec(content_type: &str) -> AudioCodec {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("aac") || ct.contains("mp4") || ct.contains("m4a") {
        AudioCodec::Aac
    } else {
        AudioCodec::Mp3
    }
}

fn leading_number(value: &str) -> u64 {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

pub fn build_request(url: &StreamUrl, user_agent: &str, icy: bool) -> String {
    let mut req = format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\n",
        url.path,
        url.host_header(),
        user_agent
    );
    if icy {
        req.push_str("Icy-MetaData: 1\r\n");
    }
    req.push_str("Connection: close\r\n\r\n");
    req
}

/// Reads one byte at a time until `\r\n\r\n`, so no body byte is consumed.
pub fn read_head<R: Read>(reader: &mut R, limit: usize) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    while head.len() < limit {
        match reader.read(&mut byte) {
            Ok(0) => return Err(RadioError::malformed("connection closed in headers")),
            Ok(_) => head.push(byte[0]),
            Err(e) if transport::is_timeout(&e) => {
                return Err(RadioError::connect("timed out reading headers"))
            }
            Err(e) => return Err(RadioError::malformed(format!("header read failed: {e}"))),
        }
        if head.ends_with(b"\r\n\r\n") {
            return Ok(head);
        }
    }
    Err(RadioError::HeaderTooLarge)
}

/// Classifies a raw header block as success, redirect or error
pub fn parse_head(raw: &[u8]) -> Result<HeadOutcome> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();

    let status = if status_line.starts_with("HTTP/1.") {
        let code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| RadioError::malformed(status_line.to_string()))?;
        Some(code)
    } else if status_line.starts_with("ICY") {
        None
    } else {
        return Err(RadioError::malformed(status_line.to_string()));
    };

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.to_string()))
        .collect();
    let head = ResponseHead { status, headers };

    match status {
        Some(code) if (300..400).contains(&code) => match head.header("location") {
            Some(loc) if !loc.trim().is_empty() => Ok(HeadOutcome::Redirect(loc.trim().to_string())),
            _ => Err(RadioError::malformed("redirect without Location")),
        },
        Some(code) if code >= 400 => Err(RadioError::HttpError(code)),
        _ => Ok(HeadOutcome::Success(head)),
    }
}

/// An open response positioned at the first body byte
pub struct OpenedStream {
    pub conn: Connection,
    pub head: ResponseHead,
    pub url: String,
}

/// Connects, sends a GET and follows up to `max_redirects` redirects.
pub fn open(url: &str, config: &EngineConfig, icy: bool, header_limit: usize) -> Result<OpenedStream> {
    let mut current = url.to_string();
    for redirects in 0..=config.max_redirects {
        let target = StreamUrl::resolve(&current)?;
        let mut conn = Connection::connect(&target.host, target.port, target.tls, config.io_timeout())?;
        conn.send(build_request(&target, &config.user_agent, icy).as_bytes())?;

        let outcome = read_head(&mut conn, header_limit).and_then(|raw| parse_head(&raw));
        match outcome {
            Ok(HeadOutcome::Success(head)) => {
                debug!(url = %current, status = ?head.status, "response headers parsed");
                return Ok(OpenedStream { conn, head, url: current });
            }
            Ok(HeadOutcome::Redirect(location)) => {
                conn.close();
                if redirects == config.max_redirects {
                    return Err(RadioError::TooManyRedirects);
                }
                let next = urls::join(&current, &location)?;
                info!(from = %current, to = %next, "following redirect");
                current = next;
            }
            Err(e) => {
                conn.close();
                return Err(e);
            }
        }
    }
    Err(RadioError::TooManyRedirects)
}

/// A fully read response body
#[derive(Debug)]
pub struct Fetched {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// GETs `url` and reads the body until close or `body_limit` bytes.
///
/// A read error after some body bytes ends the body early rather than failing.
pub fn fetch(url: &str, config: &EngineConfig, body_limit: usize) -> Result<Fetched> {
    let OpenedStream { mut conn, head, url } = open(url, config, false, config.fetch_header_limit)?;
    let mut body = Vec::with_capacity(body_limit.min(64 * 1024));
    let mut chunk = [0u8; 8192];
    while body.len() < body_limit {
        let want = chunk.len().min(body_limit - body.len());
        match conn.recv(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(url = %url, error = %e, "body read ended");
                break;
            }
        }
    }
    conn.close();
    Ok(Fetched {
        content_type: head.mime(),
        url,
        body,
    })
}
