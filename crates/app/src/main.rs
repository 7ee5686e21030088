use std::{path::PathBuf, thread, time::Duration};

use audio_visualiser_core::{
    AnalysisSnapshot, AppConfig, AudioEngine, TestSignal, VisualiserRegistry,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Frames of audio followed by frames of silence in the demo signal.
const DEMO_AUDIBLE_FRAMES: u64 = 240;
const DEMO_SILENT_FRAMES: u64 = 60;

fn main() -> audio_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            config,
            visualiser,
            frames,
            realtime,
        } => run_live(config.as_deref(), visualiser, frames, realtime),
        Commands::List => {
            list_visualisers();
            Ok(())
        }
    }
}

fn run_live(
    config_path: Option<&std::path::Path>,
    visualiser: Option<String>,
    frames: u64,
    realtime: bool,
) -> audio_visualiser_core::Result<()> {
    let mut config = match config_path {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::live_defaults(),
    };
    if let Some(name) = visualiser {
        config.visualiser = name;
    }
    config.validate()?;

    tracing::info!(
        visualiser = %config.visualiser,
        fps = config.fps,
        frames,
        "starting live mode"
    );

    let sample_rate = config.analysis.sample_rate;
    let block_frames = (sample_rate / config.fps).max(1) as usize;
    let frame_period = Duration::from_secs_f64(1.0 / f64::from(config.fps));

    let mut audio = AudioEngine::new(config.analysis.clone())?;
    let reader = audio.reader();
    let mut visualisers = VisualiserRegistry::with_defaults();
    visualisers.select(&config.visualiser)?;

    let mut signal = TestSignal::new(sample_rate, block_frames);
    let mut snapshot = AnalysisSnapshot::default();

    for frame in 0..frames {
        let cycle = frame % (DEMO_AUDIBLE_FRAMES + DEMO_SILENT_FRAMES);
        signal.set_silent(cycle >= DEMO_AUDIBLE_FRAMES);

        audio.pump(&mut signal)?;
        reader.read_into(&mut snapshot)?;
        let commands = visualisers.render(&snapshot);

        if frame % u64::from(config.fps) == 0 {
            tracing::info!(
                frame,
                silent = signal.is_silent(),
                energy = snapshot.energy,
                bass = snapshot.bass,
                mid = snapshot.mid,
                treble = snapshot.treble,
                transient = snapshot.transient,
                commands = commands.len(),
                "frame"
            );
        }

        if realtime {
            thread::sleep(frame_period);
        }
    }

    audio.shutdown();
    tracing::info!(
        skipped_publishes = audio.skipped_publishes(),
        "live mode finished"
    );
    Ok(())
}

fn list_visualisers() {
    let registry = VisualiserRegistry::with_defaults();
    for (name, description) in registry.descriptions() {
        println!("{name:<14} {description}");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time audio visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse the built-in test signal and drive a visualiser once per frame.
    Live {
        /// JSON configuration file. Missing fields use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Visualiser to render, overriding the configuration.
        #[arg(short, long)]
        visualiser: Option<String>,
        /// Number of display frames to run.
        #[arg(short, long, default_value_t = 600)]
        frames: u64,
        /// Sleep between frames to run at the configured frame rate.
        #[arg(long)]
        realtime: bool,
    },
    /// List the available visualisers.
    List,
}
