use anyhow::{anyhow, Result};
use netradio::{AudioOutput, AudioTap};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Samples handed to rodio per block; the rate may only change between blocks
const BLOCK: usize = 2048;

/// rodio sink the engine drives through [`AudioOutput`]
pub struct PlayerControl {
    sink: Arc<Mutex<Sink>>,
    rate: Arc<AtomicU32>,
}

impl PlayerControl {
    /// Queues the never-ending ring source on the sink
    pub fn attach(&self, tap: AudioTap) {
        let source = RingSource::new(tap, self.rate.clone());
        if let Ok(s) = self.sink.lock() {
            s.append(source);
        }
    }

    pub fn play(&self) {
        if let Ok(s) = self.sink.lock() {
            s.play();
        }
    }

    pub fn pause(&self) {
        if let Ok(s) = self.sink.lock() {
            s.pause();
        }
    }

    pub fn set_volume(&self, vol: f32) {
        if let Ok(s) = self.sink.lock() {
            s.set_volume(vol);
        }
    }

    pub fn is_paused(&self) -> bool {
        if let Ok(s) = self.sink.lock() {
            s.is_paused()
        } else {
            true
        }
    }

    pub fn volume(&self) -> f32 {
        if let Ok(s) = self.sink.lock() {
            s.volume()
        } else {
            0.0
        }
    }
}

impl AudioOutput for PlayerControl {
    fn set_sample_rate(&self, hz: u32) {
        self.rate.store(hz, Ordering::Relaxed);
    }

    fn resume(&self) {
        self.play();
    }

    fn pause(&self) {
        PlayerControl::pause(self);
    }
}

/// Opens the default device. The returned `OutputStream` must outlive playback.
pub fn open_output(sample_rate: u32) -> Result<(OutputStream, Arc<PlayerControl>)> {
    let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
        anyhow!(
            "Failed to initialize audio output: {}. Check your audio drivers.",
            e
        )
    })?;

    let sink =
        Sink::try_new(&stream_handle).map_err(|e| anyhow!("Failed to create audio sink: {}", e))?;
    sink.set_volume(0.5);
    sink.pause();

    let control = PlayerControl {
        sink: Arc::new(Mutex::new(sink)),
        rate: Arc::new(AtomicU32::new(sample_rate)),
    };
    Ok((stream, Arc::new(control)))
}

/// Pulls stereo PCM from the engine's ring in fixed blocks, silence when empty
struct RingSource {
    tap: AudioTap,
    rate: Arc<AtomicU32>,
    block: Vec<i16>,
    pos: usize,
    block_rate: u32,
}

impl RingSource {
    fn new(tap: AudioTap, rate: Arc<AtomicU32>) -> Self {
        let block_rate = rate.load(Ordering::Relaxed);
        RingSource {
            tap,
            rate,
            block: vec![0; BLOCK],
            pos: BLOCK,
            block_rate,
        }
    }
}

impl Iterator for RingSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.block.len() {
            self.block_rate = self.rate.load(Ordering::Relaxed);
            self.tap.fill(&mut self.block);
            self.pos = 0;
        }
        let s = self.block[self.pos];
        self.pos += 1;
        Some(s as f32 / 32768.0)
    }
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        match self.block.len() - self.pos {
            0 => Some(BLOCK),
            left => Some(left),
        }
    }
    fn channels(&self) -> u16 {
        2
    }
    fn sample_rate(&self) -> u32 {
        if self.pos >= self.block.len() {
            self.rate.load(Ordering::Relaxed)
        } else {
            self.block_rate
        }
    }
    fn total_duration(&self) -> Option<Duration> {
        None // live stream
    }
}
