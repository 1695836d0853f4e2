//! Tiny blocking HTTP servers for exercising the engine end to end

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use netradio::{EngineConfig, RadioEngine, StreamState};

pub struct Reply {
    pub status: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: "HTTP/1.0 200 OK",
            headers: vec![("Content-Type".into(), content_type.into())],
            body: body.into(),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: "HTTP/1.0 302 Found",
            headers: vec![("Location".into(), location.into())],
            body: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: "HTTP/1.0 404 Not Found",
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Request line and headers, lowercased header names
pub struct Request {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let path = line.split_whitespace().nth(1)?.to_string();
    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((k, v)) = trimmed.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    Some(Request { path, headers })
}

fn write_reply(mut stream: TcpStream, reply: Reply) {
    let mut head = format!("{}\r\n", reply.status);
    for (k, v) in &reply.headers {
        head.push_str(&format!("{k}: {v}\r\n"));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&reply.body);
}

/// Serves every connection with `route`; returns the port
pub fn serve<F>(route: F) -> u16
where
    F: Fn(&Request) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            if let Some(req) = read_request(&stream) {
                write_reply(stream, route(&req));
            }
        }
    });
    port
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        io_timeout_secs: 3,
        poll_interval_ms: 20,
        stations_file: None,
        catalog_dirs: Vec::new(),
        ..EngineConfig::default()
    }
}

/// Polls `check` until it holds or five seconds pass
pub fn eventually(engine: &RadioEngine, check: impl Fn(&RadioEngine) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check(engine) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

pub fn in_state(state: StreamState) -> impl Fn(&RadioEngine) -> bool {
    move |e| e.state() == state
}
