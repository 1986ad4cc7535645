//! Hearken - voice commands from a fixed grammar
//!
//! Listens on a microphone, speaks a canned response for every recognized
//! command and prints the command name on stdout.

use clap::Parser;
use hearken::asr::VoskRecognizer;
use hearken::audio::CpalSource;
use hearken::commands::CommandTable;
use hearken::config::Config;
use hearken::error::{Error, RecognizerError};
use hearken::recognition::{
    CommandEvent, LoopOptions, LoopOutcome, RecognitionLoop, StopReason,
};
use hearken::tts::{self, ResponseDispatcher};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Time given to queued responses after the loop stops
const DRAIN_GRACE: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Audio input device index
    #[arg(short, long)]
    device: Option<usize>,

    /// Audio input device name
    #[arg(long, conflicts_with = "device")]
    device_name: Option<String>,

    /// Acoustic model directory
    #[arg(long)]
    model: Option<PathBuf>,

    /// Pronunciation dictionary
    #[arg(long)]
    dict: Option<PathBuf>,

    /// JSGF grammar file
    #[arg(long)]
    grammar: Option<PathBuf>,

    /// Name declared inside the grammar file
    #[arg(long)]
    grammar_name: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    /// Samples per frame
    #[arg(long)]
    frame_size: Option<usize>,

    /// Speech engine: flite or system
    #[arg(long)]
    tts: Option<String>,

    /// Write the effective config to the config path and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(idx) = self.device {
            config.device_index = Some(idx);
            config.device_name = None;
        }
        if let Some(name) = &self.device_name {
            config.device_name = Some(name.clone());
            config.device_index = None;
        }
        if let Some(path) = &self.model {
            config.model_path = path.clone();
        }
        if let Some(path) = &self.dict {
            config.dictionary_path = path.clone();
        }
        if let Some(path) = &self.grammar {
            config.grammar_path = path.clone();
        }
        if let Some(name) = &self.grammar_name {
            config.grammar_name = name.clone();
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(size) = self.frame_size {
            config.frame_size = size;
        }
        if let Some(engine) = &self.tts {
            config.tts_engine = engine.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr, stdout carries detected commands
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        return match init_config(&args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("❌ {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    info!("👂 Hearken v{} starting...", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_config(args: &Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) if path.exists() => Config::load(Some(path))?,
        _ => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    match &args.config {
        Some(path) => config.save_to(path),
        None => config.save(),
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let table = Arc::new(CommandTable::new(&config.commands)?);
    info!("📋 Commands: {}", table.phrases().collect::<Vec<_>>().join(", "));

    let recognizer = VoskRecognizer::from_config(&config)?;
    info!("✅ Recognizer ready");

    let engine = tts::create_engine(&config);
    let dispatcher = ResponseDispatcher::spawn(
        engine,
        config.dispatch_queue,
        Duration::from_millis(config.speak_timeout_ms),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Interrupt received");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let (events_tx, events_rx) = broadcast::channel(16);
    let printer = tokio::spawn(print_events(events_rx));

    let responder = dispatcher.handle();
    // cpal streams are not Send, so the device is opened on the loop thread
    let recognition = tokio::task::spawn_blocking(move || -> hearken::Result<LoopOutcome> {
        let source = CpalSource::open(&config)?;
        info!("🎙️ Microphone audio stream opened");

        let prompt = config.ready_prompt();
        info!("{}", prompt);
        if let Err(e) = responder.speak(&prompt) {
            warn!("⚠️ Could not speak ready prompt: {}", e);
        }

        let mut recognition = RecognitionLoop::new(
            source,
            recognizer,
            table,
            responder,
            LoopOptions::from_config(&config),
        )
        .with_shutdown(shutdown)
        .with_events(events_tx);

        recognition.run()
    });

    let result = match recognition.await {
        Ok(result) => result,
        Err(e) => Err(RecognizerError::DecoderFault(format!("recognition thread failed: {e}")).into()),
    };

    let stats = dispatcher.shutdown(DRAIN_GRACE).await;
    info!(
        "🔊 Responses spoken: {}, failed: {}",
        stats.spoken, stats.failed
    );
    let _ = printer.await;

    let outcome = result?;
    match outcome.reason {
        StopReason::ExitCommand => info!("👋 Exit command received"),
        StopReason::Interrupted => info!("👋 Stopped by interrupt"),
    }
    info!(
        "Frames: {} read, {} decoded, {} muted, {} read errors; utterances: {}; commands: {}",
        outcome.stats.frames_read,
        outcome.stats.frames_fed,
        outcome.stats.frames_muted,
        outcome.stats.read_errors,
        outcome.stats.utterances,
        outcome.stats.commands
    );
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<CommandEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => println!("{}", event.command),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("⚠️ Missed {} command events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
