//! Engine configuration
//!
//! Every field has a default matching the values the engine was tuned with,
//! so an empty (or missing) config file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const APP_DIR: &str = "netradio";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output rate assumed until a stream reports its own
    pub output_sample_rate: u32,
    /// Ring buffer length in seconds of interleaved stereo audio
    pub ring_seconds: u32,
    /// Socket send/receive timeout
    pub io_timeout_secs: u64,
    /// Sleep slice for socket polling, live playlist retries and back-pressure
    pub poll_interval_ms: u64,
    pub max_redirects: usize,
    /// Header buffer for the direct stream response
    pub header_limit: usize,
    /// Header buffer for playlist and segment fetches
    pub fetch_header_limit: usize,
    /// Staged bytes needed before a direct-stream decoder is created
    pub decoder_init_bytes: usize,
    /// Upper bound of the raw staging buffer; extra network bytes are dropped
    pub staging_limit: usize,
    pub playlist_limit: usize,
    pub segment_limit: usize,
    pub user_agent: String,
    pub stations_file: Option<PathBuf>,
    pub catalog_dirs: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data = dirs::data_dir().map(|d| d.join(APP_DIR));
        let mut catalog_dirs = Vec::new();
        if let Some(d) = &data {
            catalog_dirs.push(d.join("stations"));
        }
        catalog_dirs.push(PathBuf::from("./stations"));

        Self {
            output_sample_rate: 48_000,
            ring_seconds: 10,
            io_timeout_secs: 10,
            poll_interval_ms: 100,
            max_redirects: 5,
            header_limit: 4096,
            fetch_header_limit: 2048,
            decoder_init_bytes: 16 * 1024,
            staging_limit: 128 * 1024,
            playlist_limit: 64 * 1024,
            segment_limit: 256 * 1024,
            user_agent: concat!("netradio/", env!("CARGO_PKG_VERSION")).to_string(),
            stations_file: data.map(|d| d.join("radio_stations.txt")),
            catalog_dirs,
        }
    }
}

impl EngineConfig {
    /// `<config_dir>/netradio/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
    }

    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Ring capacity in samples (stereo, interleaved)
    pub fn ring_capacity(&self) -> usize {
        self.output_sample_rate as usize * 2 * self.ring_seconds as usize
    }

    /// One second of interleaved stereo audio, the underrun watermark
    pub fn one_second_samples(&self) -> usize {
        self.output_sample_rate as usize * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"max_redirects": 2}"#).unwrap();
        assert_eq!(cfg.max_redirects, 2);
        assert_eq!(cfg.output_sample_rate, 48_000);
        assert_eq!(cfg.ring_capacity(), 48_000 * 2 * 10);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }
}
