pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod ledger;
pub mod settings;
pub mod timer;
mod utils;

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub use app::MeditationApp;
pub use audio::{SoundEngine, SoundKind, VoiceHandle};
pub use config::{BackgroundSound, SessionConfig, StopPolicy};
pub use error::{CoreError, CoreResult};
pub use ledger::{ProgressLedger, ProgressSnapshot, SessionRecord};
pub use settings::{SettingsStore, SoundSettings};
pub use timer::{format_clock, SessionPhase, TimerController, TimerEvent, TimerSnapshot};

use audio::{default_output, EngineOptions};

/// What the terminal front-end asks for.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: SessionConfig,
    pub stop_policy: StopPolicy,
    /// Overrides the saved master volume for this run and saves it.
    pub volume: Option<f32>,
    pub settings_path: Option<PathBuf>,
}

/// Runs one session in the terminal, printing the clock every second and the
/// progress totals at the end. Ctrl-C stops the session early.
pub fn run(options: RunOptions) -> Result<()> {
    // Info by default, overridable through RUST_LOG
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    log::info!("Stillness starting up...");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the tokio runtime")?;
    runtime.block_on(run_session(options))
}

async fn run_session(options: RunOptions) -> Result<()> {
    let settings = options
        .settings_path
        .map(SettingsStore::new)
        .transpose()?
        .map(Arc::new);
    if let Some(store) = &settings {
        log::info!("Sound settings: {}", store.path().display());
    }

    let engine_options = settings
        .as_ref()
        .map(|store| EngineOptions::from_settings(&store.sound()))
        .unwrap_or_default();
    let engine = SoundEngine::with_options(default_output(), engine_options)?;
    if !engine.is_available() {
        log::warn!("No audio output; the session will be silent");
    }

    let mut app = MeditationApp::new(options.config, options.stop_policy, engine).await?;
    if let Some(store) = settings {
        app = app.with_settings(store);
    }
    if let Some(volume) = options.volume {
        app.set_master_volume(volume)?;
    }

    let mut events = app.subscribe();
    app.start().await?;

    let mut stdout = std::io::stdout();
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                app.stop().await?;
                continue;
            }
        };

        match event {
            TimerEvent::PreparationTick { remaining } => {
                write!(stdout, "\rSettling in... {:>3}s ", remaining)?;
            }
            TimerEvent::Tick {
                remaining_time,
                progress_percent,
            } => {
                write!(
                    stdout,
                    "\r{}  {:>5.1}% ",
                    format_clock(remaining_time),
                    progress_percent
                )?;
            }
            TimerEvent::IntervalBell => writeln!(stdout, "\r(interval bell)")?,
            TimerEvent::Paused => writeln!(stdout, "\rPaused")?,
            TimerEvent::Completed { .. } => writeln!(stdout, "\rSession complete")?,
            TimerEvent::Stopped { record } => {
                match record {
                    Some(record) => writeln!(
                        stdout,
                        "\rStopped after {} minute(s)",
                        record.completed_minutes
                    )?,
                    None => writeln!(stdout, "\rStopped")?,
                }
                break;
            }
            TimerEvent::Reset => break,
            TimerEvent::Bell | TimerEvent::PhaseChanged { .. } => {}
        }
        stdout.flush()?;
    }

    let progress = app.progress().await;
    println!(
        "Sessions: {}  Minutes: {}  Streak: {}",
        progress.total_sessions, progress.total_minutes, progress.current_streak
    );
    Ok(())
}
