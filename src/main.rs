//! modstream CLI: realtime playback and WAV export of tracker modules.
//!
//! Usage:
//!   modstream path/to/file.mod
//!   modstream https://example.org/file.mod --wav output.wav --seconds 60

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ms_audio::{CpalOutput, OfflineOutput, OutputGraph, DEFAULT_SAMPLE_RATE};
use ms_engine::SharedEngine;
use ms_formats::TrackerEngine;
use ms_master::{PlaybackController, PlayerConfig, PlayerEvent, Source};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for modstream
#[derive(Parser, Debug)]
#[command(name = "modstream")]
#[command(about = "Stream tracker modules to the audio device or a WAV file")]
#[command(version)]
struct Args {
    /// Module file path or http(s) URL
    source: String,

    /// Render offline to this WAV file instead of playing
    #[arg(long, value_name = "OUT")]
    wav: Option<PathBuf>,

    /// Longest WAV export, in seconds
    #[arg(long, default_value_t = 300)]
    seconds: u32,

    /// TOML player configuration
    #[arg(short, long, env = "MODSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Extra passes through the song (-1 loops forever)
    #[arg(long, env = "MODSTREAM_REPEAT", allow_hyphen_values = true)]
    repeat: Option<i32>,

    /// Stereo separation in percent (0-200)
    #[arg(long, env = "MODSTREAM_STEREO_SEPARATION")]
    stereo_separation: Option<i32>,

    /// Interpolation filter length (1 = nearest)
    #[arg(long, env = "MODSTREAM_INTERPOLATION")]
    interpolation: Option<i32>,
}

impl Args {
    /// Config file values, overridden by any flags given.
    fn player_config(&self) -> Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PlayerConfig::default(),
        };
        if let Some(repeat) = self.repeat {
            config.repeat_count = repeat;
        }
        if let Some(separation) = self.stereo_separation {
            config.stereo_separation = separation;
        }
        if let Some(taps) = self.interpolation {
            config.interpolation_filter = taps;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modstream=info,ms_master=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.player_config()?;
    info!(?config, "player configuration");

    let engine: SharedEngine = Arc::new(Mutex::new(TrackerEngine::new()));
    let source = Source::parse(&args.source);

    match &args.wav {
        Some(path) => render_to_wav(engine, config, source, path, args.seconds).await,
        None => play_audio(engine, config, source).await,
    }
}

fn print_info<G: OutputGraph>(ctrl: &PlaybackController<G>) {
    let metadata = ctrl.metadata();
    let field = |key: &str| metadata.get(key).map(String::as_str).unwrap_or("");
    println!("Title:    {}", field("title"));
    println!("Type:     {}", field("type_long"));
    println!("Tracker:  {}", field("tracker"));
    println!("Duration: {:.1}s", ctrl.duration());
    println!("Patterns: {}", ctrl.total_patterns());
    println!("Orders:   {}", ctrl.total_orders());
    println!(
        "Tempo:    {} BPM, Speed: {}",
        ctrl.current_tempo(),
        ctrl.current_speed()
    );
    println!();
}

async fn play_audio(engine: SharedEngine, config: PlayerConfig, source: Source) -> Result<()> {
    let mut ctrl = PlaybackController::new(engine, CpalOutput::new(), config);

    // Handlers run on the audio thread; forward to this task instead of querying there.
    let (tx, mut rx) = mpsc::unbounded_channel();
    for name in ["onPatternChange", "onEnded", "onError"] {
        let tx = tx.clone();
        ctrl.on(name, move |event| {
            let _ = tx.send(*event);
        })
        .with_context(|| format!("Failed to register {name}"))?;
    }
    drop(tx);

    let bytes = ctrl.load(source).await.context("Failed to load module")?;
    ctrl.play(&bytes).context("Failed to start playback")?;
    print_info(&ctrl);
    println!("Playing...");
    println!();

    while let Some(event) = rx.recv().await {
        match event {
            PlayerEvent::PatternChange => {
                print!(
                    "\rOrd: {:02X} | Pat: {:02X} | Row: {:02X}",
                    ctrl.current_order(),
                    ctrl.current_pattern(),
                    ctrl.current_row()
                );
                let _ = std::io::stdout().flush();
            }
            PlayerEvent::Ended => break,
            PlayerEvent::Error { source } => {
                println!();
                anyhow::bail!("Playback failed ({})", source.tag());
            }
            PlayerEvent::RowChange { .. } => {}
        }
    }

    println!("\rDone.          ");
    Ok(())
}

async fn render_to_wav(
    engine: SharedEngine,
    config: PlayerConfig,
    source: Source,
    path: &Path,
    max_seconds: u32,
) -> Result<()> {
    let mut ctrl = PlaybackController::new(engine, OfflineOutput::new(DEFAULT_SAMPLE_RATE), config);
    let bytes = ctrl.load(source).await.context("Failed to load module")?;
    ctrl.play(&bytes).context("Failed to start playback")?;
    print_info(&ctrl);

    println!("Rendering to {} at {} Hz...", path.display(), DEFAULT_SAMPLE_RATE);
    let wav = ctrl.render_to_wav(max_seconds);
    println!("Rendered {} bytes", wav.len());

    tokio::fs::write(path, &wav)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Done.");
    Ok(())
}
