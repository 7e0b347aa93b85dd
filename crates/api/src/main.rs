use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use uttercast_api::ws::registry::SubscriberSet;
use uttercast_api::{build_router, state::AppState, ws};
use uttercast_config::Settings;
use uttercast_pipeline::decode::DecodeEngine;
use uttercast_pipeline::source::{FrameSource, MicSource, WavFileSource};
use uttercast_pipeline::{
    DecodeDriver, EarshotDetector, FailurePolicy, PipelineConfig, PipelineWorker, ResultEvent,
    UtteranceSegmenter,
};

/// Stream microphone or WAV audio through voice-activity segmentation
/// and a streaming decoder, pushing partial and final transcripts to
/// WebSocket subscribers.
#[derive(Debug, Parser)]
#[command(name = "uttercast", version, about)]
struct Cli {
    /// Path to a TOML settings file
    #[arg(long, env = "UTTERCAST_CONFIG")]
    config: Option<String>,

    /// Path to the decoding model (file or model directory)
    #[arg(short, long)]
    model: Option<String>,

    /// Path to the external scorer file
    #[arg(short, long)]
    scorer: Option<String>,

    /// VAD aggressiveness: 0 (least) to 3 (most aggressive)
    #[arg(short = 'v', long)]
    vad_aggressiveness: Option<u8>,

    /// Read from a WAV file instead of the microphone
    #[arg(short, long)]
    file: Option<String>,

    /// Capture device name, as printed by --list-devices
    #[arg(short, long)]
    device: Option<String>,

    /// Input sample rate in Hz (defaults to the device rate)
    #[arg(short, long)]
    rate: Option<u32>,

    /// host:port for the WebSocket push service
    #[arg(long)]
    listen: Option<String>,

    /// Print capture device names and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model_path = model.clone();
        }
        if let Some(scorer) = &self.scorer {
            settings.scorer_path = Some(scorer.clone());
        }
        if let Some(aggressiveness) = self.vad_aggressiveness {
            settings.vad_aggressiveness = aggressiveness;
        }
        if let Some(file) = &self.file {
            settings.wav_path = Some(file.clone());
        }
        if let Some(device) = &self.device {
            settings.input_device = Some(device.clone());
        }
        if let Some(rate) = self.rate {
            settings.input_rate = Some(rate);
        }
        if let Some(listen) = &self.listen {
            settings.listen_addr = listen.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if cli.list_devices {
        for name in MicSource::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;
    if settings.wav_path.is_none()
        && let Some(device) = &settings.input_device
    {
        let known = MicSource::list_devices()?;
        if !known.iter().any(|name| name == device) {
            anyhow::bail!("capture device '{device}' not found (try --list-devices)");
        }
    }

    // The engine loads up front so a bad model aborts startup instead
    // of killing the pipeline thread mid-flight.
    let engine = build_engine(&settings)?;

    let stop = Arc::new(AtomicBool::new(false));
    let (result_tx, result_rx) = mpsc::unbounded_channel();

    let subscribers = Arc::new(SubscriberSet::new());
    let state = AppState::new(subscribers.clone());

    // Domain A: the sequential capture → segment → decode flow.
    let producer = {
        let settings = settings.clone();
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("pipeline".to_string())
            .spawn(move || run_pipeline(settings, engine, result_tx, stop))
            .context("failed to spawn pipeline thread")?
    };

    // Domain B: subscriber handling.
    tokio::spawn(ws::publisher::run(result_rx, subscribers.clone()));

    let listener = tokio::net::TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    info!(addr = %settings.listen_addr, "push service listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Orderly teardown: the producer finishes its current event, then
    // every subscriber queue is dropped, closing the connections.
    stop.store(true, Ordering::Relaxed);
    subscribers.clear();
    if producer.join().is_err() {
        error!("pipeline thread panicked");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

/// Body of the producer thread. The capture stream must be opened on
/// the thread that reads it, so sources are built here rather than in
/// `main`.
fn run_pipeline(
    settings: Settings,
    engine: Box<dyn DecodeEngine>,
    results: UnboundedSender<ResultEvent>,
    stop: Arc<AtomicBool>,
) {
    let source: Box<dyn FrameSource> = match settings.wav_path.as_deref() {
        Some(path) => match WavFileSource::open(Path::new(path), settings.input_rate) {
            Ok(source) => Box::new(source),
            Err(e) => {
                error!(%e, "failed to open WAV source");
                return;
            }
        },
        None => match MicSource::open(settings.input_device.as_deref(), settings.input_rate) {
            Ok(source) => Box::new(source),
            Err(e) => {
                error!(%e, "failed to open capture device");
                return;
            }
        },
    };

    let config = PipelineConfig {
        padding_ms: settings.padding_ms,
        trigger_ratio: settings.trigger_ratio,
        vad_aggressiveness: settings.vad_aggressiveness,
        partial_interval_ms: settings.partial_interval_ms,
        failure_policy: if settings.recover_on_decode_failure {
            FailurePolicy::Recover
        } else {
            FailurePolicy::Abort
        },
        max_consecutive_failures: settings.max_decode_failures,
    };

    let detector = Box::new(EarshotDetector::new(config.vad_aggressiveness));
    let segmenter =
        UtteranceSegmenter::new(source, detector, config.padding_ms, config.trigger_ratio);
    let driver = match DecodeDriver::new(engine, &config, results, Instant::now()) {
        Ok(driver) => driver,
        Err(e) => {
            error!(%e, "failed to create decode session");
            return;
        }
    };

    PipelineWorker::new(segmenter, driver, stop).run();
}

#[cfg(feature = "vosk")]
fn build_engine(settings: &Settings) -> anyhow::Result<Box<dyn DecodeEngine>> {
    let engine = uttercast_pipeline::decode::VoskEngine::load(
        Path::new(&settings.model_path),
        settings.scorer_path.as_deref().map(Path::new),
    )?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "vosk"))]
fn build_engine(_settings: &Settings) -> anyhow::Result<Box<dyn DecodeEngine>> {
    anyhow::bail!("no decode backend compiled in; rebuild with `--features vosk`")
}
