//! Boundary to the audio device owned by the host application

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Calls the engine makes into the audio device.
///
/// The worker thread calls these, so implementations must be thread-safe.
pub trait AudioOutput: Send + Sync {
    /// The stream's real rate, known after the first decoded frame
    fn set_sample_rate(&self, hz: u32);
    fn resume(&self);
    fn pause(&self);
}

/// Output that only remembers what it was told; used headless and in tests
#[derive(Debug, Default)]
pub struct NullOutput {
    sample_rate: AtomicU32,
    running: AtomicBool,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last rate passed to `set_sample_rate`, 0 if never called
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl AudioOutput for NullOutput {
    fn set_sample_rate(&self, hz: u32) {
        self.sample_rate.store(hz, Ordering::Relaxed);
    }

    fn resume(&self) {
        self.running.store(true, Ordering::Relaxed);
    }

    fn pause(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
