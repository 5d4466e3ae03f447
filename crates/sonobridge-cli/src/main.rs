//! Sonobridge CLI — drive the bridge engine from a terminal
//!
//! Runs the engine against a synthetic capture and a simulated OS, printing
//! band bars and session events as they arrive.

mod sim;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use crossbeam_channel::{select, unbounded};

use sonobridge::config::BridgeConfig;
use sonobridge::session::{BridgeEngine, BridgeEvent};
use sonobridge::visualizer::{BandVector, SignalTag, SyntheticCapture, SyntheticSignal};

use sim::SimulatedPlatform;

const BAR_WIDTH: usize = 24;
const PRINT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Signal {
    Tone,
    Silence,
}

#[derive(Parser)]
#[command(name = "sonobridge", about = "Band visualizer and audio-session bridge", version)]
struct Cli {
    /// Audio session to analyze (0 = default output mix)
    #[arg(long, default_value_t = BridgeEngine::default_audio_session_id())]
    session_id: i32,

    /// Synthetic signal fed into the capture
    #[arg(long, value_enum, default_value_t = Signal::Tone)]
    signal: Signal,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,

    /// How long to run
    #[arg(long, default_value_t = 3)]
    duration_secs: u64,

    /// TOML file overriding the engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulate an OS interruption after this many milliseconds (ends after as many again)
    #[arg(long)]
    interrupt_after_ms: Option<u64>,

    /// Answer the capture-permission prompt with a denial
    #[arg(long)]
    deny_permission: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(BridgeConfig::from_toml_str(&text)?)
        }
        None => Ok(BridgeConfig::default()),
    }
}

fn bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round()) as usize;
    format!("{}{}", "█".repeat(filled), "·".repeat(BAR_WIDTH - filled))
}

fn print_bands(vector: &BandVector) {
    if vector.is_special() {
        println!("  [{}] {:?}", vector.tag, vector.wire_values());
        return;
    }
    let bars: Vec<String> = vector.values.iter().map(|&v| bar(v)).collect();
    println!("  {:<18} {}", vector.tag.to_string(), bars.join(" "));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;

    let signal = match cli.signal {
        Signal::Tone => SyntheticSignal::Tone {
            frequency_hz: cli.frequency,
            amplitude: 0.8,
        },
        Signal::Silence => SyntheticSignal::Silence,
    };

    let permission_granted = Arc::new(AtomicBool::new(false));
    let (prompt_tx, prompt_rx) = unbounded::<i32>();
    let platform = SimulatedPlatform::new(permission_granted.clone(), prompt_tx);

    let engine = BridgeEngine::new(
        config,
        Box::new(SyntheticCapture::new(signal)),
        Box::new(platform),
    )?;
    let os = engine.os_events();

    engine.start_foreground_service();
    engine.request_audio_focus();
    if !engine.start_visualizer(cli.session_id) {
        eprintln!("Visualizer failed to start");
    }

    let started = Instant::now();
    let deadline = started + Duration::from_secs(cli.duration_secs);
    let interrupt_at = cli
        .interrupt_after_ms
        .map(|ms| started + Duration::from_millis(ms));
    let resume_at = cli
        .interrupt_after_ms
        .map(|ms| started + Duration::from_millis(ms * 2));
    let mut interrupted = false;
    let mut resumed = false;
    let mut last_print: Option<Instant> = None;
    let mut engine_gone = false;

    while !engine_gone && Instant::now() < deadline {
        select! {
            recv(engine.event_receiver()) -> event => match event {
                Ok(BridgeEvent::Bands(vector)) => {
                    let due = last_print.map_or(true, |at| at.elapsed() >= PRINT_INTERVAL);
                    if vector.tag != SignalTag::Normal || due {
                        print_bands(&vector);
                        last_print = Some(Instant::now());
                    }
                }
                Ok(BridgeEvent::FocusChanged { has_focus }) => println!("focus: {}", has_focus),
                Ok(BridgeEvent::StateChanged { from, to }) => println!("state: {} -> {}", from, to),
                Err(_) => engine_gone = true,
            },
            recv(prompt_rx) -> code => {
                if let Ok(code) = code {
                    let granted = !cli.deny_permission;
                    println!("permission prompt {}: {}", code, if granted { "allow" } else { "deny" });
                    permission_granted.store(granted, Ordering::SeqCst);
                    os.permission_result(code, granted);
                }
            },
            default(Duration::from_millis(20)) => {}
        }

        let now = Instant::now();
        if !interrupted && interrupt_at.is_some_and(|at| now >= at) {
            interrupted = true;
            os.interruption_began();
        }
        if interrupted && !resumed && resume_at.is_some_and(|at| now >= at) {
            resumed = true;
            os.interruption_ended();
        }
    }

    println!(
        "visualizer active: {}, wake lock held: {}, service running: {}",
        engine.is_visualizer_active(),
        engine.is_wake_lock_held(),
        engine.is_audio_service_running()
    );

    engine.stop_visualizer();
    engine.stop_playback();
    engine.shutdown();
    Ok(())
}
