//! Internet radio streaming engine.
//!
//! Plays Icecast/Shoutcast (ICY) streams and HLS playlists, decoding MP3 or
//! AAC into a PCM ring buffer that an audio device drains through an
//! [`AudioTap`]. Stream state, now-playing metadata and buffer level are
//! observable from the owning thread without blocking on the network.

pub mod config;
pub mod decode;
mod direct;
pub mod engine;
pub mod error;
pub mod hls;
pub mod http;
pub mod id3;
pub mod metadata;
pub mod output;
pub mod ring;
mod session;
pub mod state;
pub mod stations;
pub mod transport;
pub mod ts;
pub mod url;

pub use config::EngineConfig;
pub use decode::AudioCodec;
pub use engine::{RadioEngine, StreamKind};
pub use error::{RadioError, Result};
pub use metadata::NowPlayingMetadata;
pub use output::{AudioOutput, NullOutput};
pub use ring::PcmRingBuffer;
pub use session::AudioTap;
pub use state::StreamState;
pub use stations::{CuratedCatalog, CuratedCountry, CuratedStation, StationRecord, StationRegistry};
