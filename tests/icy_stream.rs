mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{eventually, fast_config, in_state, read_request};
use netradio::{NullOutput, RadioEngine, StreamKind, StreamState};

const METAINT: usize = 8192;

fn metadata_block(text: &str) -> Vec<u8> {
    let mut block = text.as_bytes().to_vec();
    block.resize(block.len().div_ceil(16) * 16, 0);
    let mut out = vec![(block.len() / 16) as u8];
    out.extend(block);
    out
}

/// Icecast-like server: one metadata block with a title, then silence
fn icecast() -> (u16, thread::JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let req = read_request(&stream).unwrap();
        let asked_for_metadata = req.header("Icy-MetaData") == Some("1");

        let head = format!(
            "ICY 200 OK\r\nicy-name: Test FM\r\nicy-br: 128\r\nicy-metaint: {METAINT}\r\ncontent-type: audio/mpeg\r\n\r\n"
        );
        if stream.write_all(head.as_bytes()).is_err() {
            return asked_for_metadata;
        }
        let audio = vec![0u8; METAINT];
        let mut first = true;
        for _ in 0..500 {
            let meta = if first {
                metadata_block("StreamTitle='Daft Punk - One More Time';")
            } else {
                vec![0]
            };
            first = false;
            if stream.write_all(&audio).is_err() || stream.write_all(&meta).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        asked_for_metadata
    });
    (port, handle)
}

#[test]
fn icy_title_reaches_metadata() {
    let (port, server) = icecast();
    let mut engine = RadioEngine::new(fast_config(), Arc::new(NullOutput::new()));
    engine.play(&format!("http://127.0.0.1:{port}/stream")).unwrap();
    assert_eq!(engine.stream_kind(), Some(StreamKind::Direct));

    assert!(eventually(&engine, |e| e.metadata().title == "One More Time"));
    let np = engine.metadata();
    assert_eq!(np.artist, "Daft Punk");
    assert_eq!(np.station_name, "Test FM");
    assert_eq!(np.bitrate, 128);
    assert_eq!(np.content_type, "audio/mpeg");
    // silence has no MPEG sync, so it never gets past buffering
    assert_eq!(engine.state(), StreamState::Buffering);

    engine.stop();
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(server.join().unwrap(), "Icy-MetaData request header missing");
}

#[test]
fn server_hangup_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&stream);
        let _ = stream.write_all(b"HTTP/1.0 200 OK\r\ncontent-type: audio/aacp\r\n\r\n");
        let _ = stream.write_all(&[0u8; 1000]);
    });

    let mut engine = RadioEngine::new(fast_config(), Arc::new(NullOutput::new()));
    engine.play(&format!("http://127.0.0.1:{port}/")).unwrap();
    assert!(eventually(&engine, in_state(StreamState::Error)));
    assert_eq!(engine.error(), "Stream ended");
    assert_eq!(engine.metadata().content_type, "audio/aacp");
}

#[test]
fn http_error_status_is_reported() {
    let port = common::serve(|_| common::Reply::not_found());
    let mut engine = RadioEngine::new(fast_config(), Arc::new(NullOutput::new()));
    engine.play(&format!("http://127.0.0.1:{port}/gone")).unwrap();
    assert!(eventually(&engine, in_state(StreamState::Error)));
    assert_eq!(engine.error(), "HTTP error 404");
}

/// MPEG-1 layer III, 128 kbps, 44.1 kHz, silent
fn mp3_frame() -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFB, 0x90, 0x64];
    frame.resize(417, 0);
    frame
}

#[test]
fn mp3_frames_reach_playing() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&stream);
        if stream.write_all(b"ICY 200 OK\r\ncontent-type: audio/mpeg\r\n\r\n").is_err() {
            return;
        }
        let frame = mp3_frame();
        for _ in 0..2000 {
            if stream.write_all(&frame).is_err() {
                return;
            }
        }
        // hold the connection until the client goes away
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf);
    });

    let output = Arc::new(NullOutput::new());
    let config = netradio::EngineConfig {
        ring_seconds: 2,
        ..fast_config()
    };
    let mut engine = RadioEngine::new(config, output.clone());
    engine.play(&format!("http://127.0.0.1:{port}/stream.mp3")).unwrap();

    assert!(eventually(&engine, in_state(StreamState::Playing)));
    assert_eq!(output.sample_rate(), 44_100);
    assert!(output.is_running());
    assert!(engine.buffer_level() > 0.6);

    engine.stop();
    assert_eq!(engine.state(), StreamState::Stopped);
}
