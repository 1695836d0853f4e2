//! Coarse playback state shared between the controller and the worker

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RadioError;
use crate::ring::PcmRingBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamState {
    Stopped = 0,
    Connecting = 1,
    Buffering = 2,
    Playing = 3,
    Error = 4,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StreamState::Connecting,
            2 => StreamState::Buffering,
            3 => StreamState::Playing,
            4 => StreamState::Error,
            _ => StreamState::Stopped,
        }
    }

    /// Anything but Stopped and Error
    pub fn is_active(self) -> bool {
        !matches!(self, StreamState::Stopped | StreamState::Error)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Stopped => "Stopped",
            StreamState::Connecting => "Connecting",
            StreamState::Buffering => "Buffering",
            StreamState::Playing => "Playing",
            StreamState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Current state plus the last error message
pub struct StateCell {
    state: AtomicU8,
    error: Mutex<String>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(StreamState::Stopped as u8),
            error: Mutex::new(String::new()),
        }
    }
}

impl StateCell {
    pub fn get(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, next: StreamState) {
        let prev = StreamState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            debug!(from = %prev, to = %next, "state transition");
        }
    }

    /// Moves `from -> to` only if the state is still `from`
    pub fn transition(&self, from: StreamState, to: StreamState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            debug!(from = %from, to = %to, "state transition");
        }
        moved
    }

    /// Records a session-fatal error and enters `Error`
    pub fn fail(&self, err: &RadioError) {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = err.to_string();
        self.set(StreamState::Error);
    }

    pub fn error(&self) -> String {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_error(&self) {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Buffering -> Playing once the ring is more than two-thirds full
    pub fn promote_when_filled(&self, ring: &PcmRingBuffer) {
        if self.get() == StreamState::Buffering && ring.len() > ring.capacity() * 2 / 3 {
            self.transition(StreamState::Buffering, StreamState::Playing);
        }
    }

    /// Playing -> Buffering when less than `low_watermark` samples remain
    pub fn demote_on_underrun(&self, ring: &PcmRingBuffer, low_watermark: usize) {
        if self.get() == StreamState::Playing && ring.len() < low_watermark {
            self.transition(StreamState::Playing, StreamState::Buffering);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffering_promotes_above_two_thirds() {
        let cell = StateCell::default();
        let ring = PcmRingBuffer::new(30);
        cell.set(StreamState::Buffering);
        ring.push(&[0; 20]);
        cell.promote_when_filled(&ring);
        assert_eq!(cell.get(), StreamState::Buffering);
        ring.push(&[0; 1]);
        cell.promote_when_filled(&ring);
        assert_eq!(cell.get(), StreamState::Playing);
    }

    #[test]
    fn underrun_demotes_only_while_playing() {
        let cell = StateCell::default();
        let ring = PcmRingBuffer::new(30);
        cell.demote_on_underrun(&ring, 10);
        assert_eq!(cell.get(), StreamState::Stopped);

        cell.set(StreamState::Playing);
        ring.push(&[0; 10]);
        cell.demote_on_underrun(&ring, 10);
        assert_eq!(cell.get(), StreamState::Playing);
        let mut out = [0i16; 1];
        ring.pull(&mut out);
        cell.demote_on_underrun(&ring, 10);
        assert_eq!(cell.get(), StreamState::Buffering);
    }

    #[test]
    fn fail_records_message() {
        let cell = StateCell::default();
        cell.set(StreamState::Connecting);
        cell.fail(&RadioError::HttpError(500));
        assert_eq!(cell.get(), StreamState::Error);
        assert_eq!(cell.error(), "HTTP error 500");
        assert!(!cell.get().is_active());
    }

    #[test]
    fn transition_is_conditional() {
        let cell = StateCell::default();
        assert!(!cell.transition(StreamState::Playing, StreamState::Buffering));
        assert_eq!(cell.get(), StreamState::Stopped);
    }
}
