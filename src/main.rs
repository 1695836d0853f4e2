mod player;
mod ui;

use anyhow::Result;
use netradio::{AudioOutput, EngineConfig, RadioEngine};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Logs go to a file; the terminal belongs to the UI
fn init_logging() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("netradio");
    std::fs::create_dir_all(&dir).ok()?;
    let log_path = dir.join("netradio.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netradio=info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Some(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = init_logging();
    info!(log = ?log_path, "starting netradio {}", env!("CARGO_PKG_VERSION"));

    let config = match EngineConfig::default_path() {
        Some(path) => EngineConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("Ignoring config {}: {}", path.display(), e);
            EngineConfig::default()
        }),
        None => EngineConfig::default(),
    };

    let (_stream, control) = player::open_output(config.output_sample_rate).map_err(|e| {
        eprintln!("Failed to start audio player: {}", e);
        eprintln!("Make sure you have audio drivers installed and working");
        e
    })?;

    let output: Arc<dyn AudioOutput> = control.clone();
    let mut engine = RadioEngine::init(config, output)?;
    control.attach(engine.tap());

    let mut rx = engine.subscribe_metadata();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let np = rx.borrow_and_update().clone();
            if !np.title.is_empty() {
                info!(station = %np.station_name, artist = %np.artist, title = %np.title, "now playing");
            }
        }
    });

    let ui_result = ui::run_ui(&mut engine, control).await;

    if let Err(e) = engine.shutdown() {
        warn!(error = %e, "saving stations failed");
    }

    if let Err(e) = ui_result {
        eprintln!("UI error: {:?}", e);
    } else {
        println!("Thanks for listening!");
    }

    Ok(())
}
