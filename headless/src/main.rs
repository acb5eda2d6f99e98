//! Framepace headless driver
//!
//! Runs the pacing engine against a synthetic emulator thread and a
//! simulated audio device, with no window. Useful for watching frameskip
//! react to a slow worker:
//!
//! ```bash
//! RUST_LOG=debug framepace-headless --frames 600 --worker-slowdown 3
//! ```

mod device;
mod synthetic;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use framepace_core::{
    AUTOSAVE_PERIOD, CartridgeManager, Config, FileStore, Frontend, KeyValueStore, MemoryStore,
    RenderHost, config, spawn_autosave, worker_channel,
};
use framepace_shared::{ControllerButtons, ControllerState};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::device::SimulatedAudio;
use crate::synthetic::WorkerProfile;

/// Framepace headless driver
#[derive(Parser, Debug)]
#[command(name = "framepace-headless")]
#[command(about = "Drive the frame pacing engine against a synthetic emulator")]
#[command(version)]
struct Cli {
    /// Stop after this many frames have been painted
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Simulated cost of rendering the panels, in milliseconds
    #[arg(long, default_value_t = 2.0)]
    render_cost_ms: f64,

    /// Multiplier on every worker cost (values above ~4 force frameskip)
    #[arg(long, default_value_t = 1.0)]
    worker_slowdown: f64,

    /// Directory for save-RAM files (overrides config)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hold Start on controller 1 for the whole run
    #[arg(long)]
    hold_start: bool,
}

/// Render host that only counts what it is asked to paint
#[derive(Debug, Default)]
struct CountingRender {
    painted: u64,
    bytes: u64,
}

impl RenderHost for CountingRender {
    fn paint(&mut self, _target: &str, pixels: &[u8], _width: u32, _height: u32) {
        self.painted += 1;
        self.bytes += pixels.len() as u64;
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => config::load(),
    };
    if let Some(dir) = &cli.save_dir {
        config.storage.save_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_store(config: &Config) -> Box<dyn KeyValueStore + Send> {
    match config.storage.resolve_save_dir() {
        Some(dir) => {
            info!("Saving sram to {}", dir.display());
            Box::new(FileStore::new(dir))
        }
        None => {
            warn!("No data directory available, sram will not persist");
            Box::new(MemoryStore::new())
        }
    }
}

/// Cartridge image for the synthetic worker; first byte flags battery save-RAM
fn synthetic_cartridge() -> Vec<u8> {
    let mut cart = b"\x01FRAMEPACE-SYNTHETIC".to_vec();
    cart.extend((0..16 * 1024u32).map(|i| (i % 251) as u8));
    cart
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let sample_rate = config.audio.sample_rate;

    let (port, inbox, endpoint) = worker_channel();
    let worker = synthetic::spawn(
        endpoint,
        WorkerProfile {
            samples_per_frame: (sample_rate / 60) as usize,
            sample_rate,
            emulate_cost: Duration::from_millis(2),
            render_cost: Duration::from_secs_f64(cli.render_cost_ms.max(0.0) / 1000.0),
            slowdown: cli.worker_slowdown,
        },
    )
    .context("failed to start worker thread")?;

    let (audio_tx, audio_rx) = mpsc::channel();
    let audio = SimulatedAudio::spawn(sample_rate, audio_tx)
        .context("failed to start audio device")?;

    let start = Instant::now();
    let mut frontend = Frontend::new(
        &config,
        port,
        inbox,
        audio_rx,
        audio,
        CountingRender::default(),
        start,
    );
    frontend
        .engine_mut()
        .set_active_panels(Some("screen".into()), Some("piano_roll".into()));
    let mut pad = ControllerState::new();
    if cli.hold_start {
        pad.press(ControllerButtons::START);
    }
    frontend.engine_mut().set_p1_keys(pad.buttons());

    let manager = Arc::new(Mutex::new(CartridgeManager::new(
        frontend.rpc(),
        open_store(&config),
    )));
    let checksum = manager
        .lock()
        .await
        .load_cartridge(synthetic_cartridge())
        .await?;
    info!("Loaded synthetic cartridge {checksum:08x}");
    let autosave = spawn_autosave(manager.clone(), AUTOSAVE_PERIOD);

    frontend.try_to_start_audio();
    let target = cli.frames;
    frontend
        .run_until(|f| f.render().painted >= target)
        .await
        .context("worker disconnected")?;

    autosave.abort();
    // Cancelled task releases its handle on the manager
    let _ = autosave.await;
    if let Err(e) = manager.lock().await.save_sram().await {
        warn!("Final sram save failed: {e}");
    }

    let elapsed = start.elapsed();
    let engine = frontend.engine();
    info!(
        painted = frontend.render().painted,
        bytes = frontend.render().bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        frameskip = engine.frameskip_level(),
        dropped = engine.presentation().dropped(),
        peak = frontend.audio().peak(),
        status = %frontend.run_status(Instant::now()),
        "Run complete"
    );

    drop(frontend);
    drop(manager);
    if worker.join().is_err() {
        warn!("Worker thread panicked");
    }
    Ok(())
}
