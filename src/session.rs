use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::RadioError;
use crate::metadata::NowPlayingMetadata;
use crate::output::AudioOutput;
use crate::ring::PcmRingBuffer;
use crate::state::{StateCell, StreamState};

pub(crate) struct Shared {
    pub config: EngineConfig,
    pub state: StateCell,
    pub ring: PcmRingBuffer,
    pub metadata: watch::Sender<NowPlayingMetadata>,
    pub stop: AtomicBool,
    pub output: Arc<dyn AudioOutput>,
}

impl Shared {
    pub fn new(config: EngineConfig, output: Arc<dyn AudioOutput>) -> Self {
        let ring = PcmRingBuffer::new(config.ring_capacity());
        let (metadata, _) = watch::channel(NowPlayingMetadata::default());
        Self {
            config,
            state: StateCell::default(),
            ring,
            metadata,
            stop: AtomicBool::new(false),
            output,
        }
    }

    pub fn stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn update_metadata(&self, f: impl FnOnce(&mut NowPlayingMetadata)) {
        self.metadata.send_modify(f);
    }

    // no-op once stopping
    pub fn fail(&self, err: &RadioError) {
        if self.stopping() {
            return;
        }
        tracing::error!(error = %err, "session failed");
        self.state.fail(err);
    }

    pub fn sleep(&self, total: Duration) -> bool {
        let slice = self.config.poll_interval().min(total).max(Duration::from_millis(1));
        let mut slept = Duration::ZERO;
        while slept < total {
            if self.stopping() {
                return false;
            }
            thread::sleep(slice);
            slept += slice;
        }
        !self.stopping()
    }

    pub fn check_fill(&self) {
        self.state.promote_when_filled(&self.ring);
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }
}

/// Cloneable handle the audio device uses to pull PCM
#[derive(Clone)]
pub struct AudioTap {
    pub(crate) shared: Arc<Shared>,
}

impl AudioTap {
    /// Fills `out` entirely; returns the number of real (non-silence) samples
    pub fn fill(&self, out: &mut [i16]) -> usize {
        self.shared.ring.pull(out)
    }

    pub fn samples(&self, max: usize) -> Vec<i16> {
        let mut out = vec![0; max];
        self.fill(&mut out);
        out
    }

    pub fn level(&self) -> f32 {
        self.shared.ring.level()
    }
}
