//! The engine handle the host application drives

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::direct;
use crate::error::{RadioError, Result};
use crate::hls::{self, worker::HlsSession};
use crate::metadata::NowPlayingMetadata;
use crate::output::AudioOutput;
use crate::session::{AudioTap, Shared};
use crate::state::StreamState;
use crate::stations::{CuratedCatalog, StationRegistry};
use crate::url;

const WORKER_STACK: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Direct,
    Hls,
}

impl StreamKind {
    pub fn of(url: &str) -> Self {
        if url::is_hls(url) {
            StreamKind::Hls
        } else {
            StreamKind::Direct
        }
    }
}

/// Plays one stream at a time on a background worker thread.
///
/// Everything except [`RadioEngine::play`] for an HLS URL returns without
/// waiting on the network.
pub struct RadioEngine {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    current: Option<(String, StreamKind)>,
    stations: StationRegistry,
    catalog: CuratedCatalog,
}

impl RadioEngine {
    /// Engine with an in-memory station list and no catalog
    pub fn new(config: EngineConfig, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, output)),
            worker: None,
            current: None,
            stations: StationRegistry::in_memory(),
            catalog: CuratedCatalog::default(),
        }
    }

    /// Engine with the user's station file and the curated catalog loaded
    pub fn init(config: EngineConfig, output: Arc<dyn AudioOutput>) -> Result<Self> {
        let stations = match &config.stations_file {
            Some(path) => StationRegistry::load(path)?,
            None => StationRegistry::in_memory(),
        };
        let catalog = CuratedCatalog::load_dirs(&config.catalog_dirs);
        let mut engine = Self::new(config, output);
        engine.stations = stations;
        engine.catalog = catalog;
        info!(
            sample_rate = engine.shared.config.output_sample_rate,
            ring = engine.shared.ring.capacity(),
            "engine initialized"
        );
        Ok(engine)
    }

    /// Stops any current stream and starts `stream_url`.
    ///
    /// For HLS the playlist is fetched before returning so an empty or
    /// unreachable playlist is reported here; direct streams connect on the
    /// worker and report failures through [`RadioEngine::state`].
    pub fn play(&mut self, stream_url: &str) -> Result<()> {
        self.stop();

        let shared = &self.shared;
        shared.output.set_sample_rate(shared.config.output_sample_rate);
        shared.ring.clear();
        shared.state.clear_error();
        shared.metadata.send_replace(NowPlayingMetadata::default());
        shared.state.set(StreamState::Connecting);

        let kind = StreamKind::of(stream_url);
        info!(url = %stream_url, ?kind, "starting stream");
        self.current = Some((stream_url.to_string(), kind));

        let spawned = match kind {
            StreamKind::Hls => {
                let playlist = match hls::playlist::load(stream_url, &shared.config) {
                    Ok(p) if p.segments.is_empty() => Err(RadioError::NoSegments),
                    other => other,
                };
                let playlist = match playlist {
                    Ok(p) => p,
                    Err(e) => {
                        shared.fail(&e);
                        return Err(e);
                    }
                };
                let session = HlsSession::new(stream_url, playlist);
                let worker_shared = Arc::clone(shared);
                thread::Builder::new()
                    .name("netradio-hls".into())
                    .stack_size(WORKER_STACK)
                    .spawn(move || session.run(worker_shared))
            }
            StreamKind::Direct => {
                let worker_shared = Arc::clone(shared);
                let url = stream_url.to_string();
                thread::Builder::new()
                    .name("netradio-stream".into())
                    .stack_size(WORKER_STACK)
                    .spawn(move || direct::run(worker_shared, url))
            }
        };

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                shared.output.resume();
                Ok(())
            }
            Err(e) => {
                let err = RadioError::ThreadCreationFailure(e.to_string());
                shared.fail(&err);
                Err(err)
            }
        }
    }

    /// Stops the worker, waits for it, and pauses output. Safe in any state.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("stream worker panicked");
            }
        }
        self.shared.stop.store(false, Ordering::Relaxed);
        if self.shared.state() != StreamState::Stopped {
            info!("stream stopped");
        }
        self.shared.state.set(StreamState::Stopped);
        self.shared.output.pause();
        self.current = None;
    }

    /// Call periodically; flags an underrun while playing
    pub fn update(&self) {
        let config = &self.shared.config;
        self.shared
            .state
            .demote_on_underrun(&self.shared.ring, config.one_second_samples());
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Consistent snapshot of the now-playing metadata
    pub fn metadata(&self) -> NowPlayingMetadata {
        self.shared.metadata.borrow().clone()
    }

    /// Receiver notified on every metadata change
    pub fn subscribe_metadata(&self) -> watch::Receiver<NowPlayingMetadata> {
        self.shared.metadata.subscribe()
    }

    /// Ring occupancy in `[0, 1]`
    pub fn buffer_level(&self) -> f32 {
        self.shared.ring.level()
    }

    /// Last failure message, empty when none
    pub fn error(&self) -> String {
        self.shared.state.error()
    }

    /// Pulls `max` interleaved stereo samples, silence-padded
    pub fn audio_samples(&self, max: usize) -> Vec<i16> {
        self.tap().samples(max)
    }

    /// Handle for the audio device callback
    pub fn tap(&self) -> AudioTap {
        AudioTap {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(u, _)| u.as_str())
    }

    pub fn stream_kind(&self) -> Option<StreamKind> {
        self.current.as_ref().map(|(_, k)| *k)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn stations(&self) -> &StationRegistry {
        &self.stations
    }

    pub fn stations_mut(&mut self) -> &mut StationRegistry {
        &mut self.stations
    }

    pub fn catalog(&self) -> &CuratedCatalog {
        &self.catalog
    }

    /// Stops playback and persists the station list
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop();
        self.stations.save()
    }
}

impl Drop for RadioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
