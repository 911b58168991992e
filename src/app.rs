use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::audio::{SoundEngine, SoundKind, VoiceHandle, BELL_DURATION_MS};
use crate::config::{BackgroundSound, SessionConfig, StopPolicy};
use crate::error::{CoreError, CoreResult};
use crate::ledger::ProgressSnapshot;
use crate::settings::SettingsStore;
use crate::timer::{SessionPhase, TimerController, TimerEvent, TimerSnapshot};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// One meditation timer with its sound engine: the command surface a UI
/// talks to.
///
/// Timer events are routed to the engine by a background task: bells ring
/// on `Bell`/`IntervalBell` and the configured background plays only while
/// the session is Running.
pub struct MeditationApp {
    timer: TimerController,
    sound: SoundEngine,
    settings: Option<Arc<SettingsStore>>,
    router: CancellationToken,
}

impl MeditationApp {
    /// Must be called from within a tokio runtime.
    pub async fn new(
        config: SessionConfig,
        stop_policy: StopPolicy,
        sound: SoundEngine,
    ) -> CoreResult<Self> {
        let timer = TimerController::new(config, stop_policy)?;
        let router = CancellationToken::new();
        spawn_router(timer.clone(), sound.clone(), timer.subscribe(), router.clone());

        Ok(Self {
            timer,
            sound,
            settings: None,
            router,
        })
    }

    /// Persists volume changes made through this app to `store`.
    pub fn with_settings(mut self, store: Arc<SettingsStore>) -> Self {
        self.settings = Some(store);
        self
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    pub fn sound(&self) -> &SoundEngine {
        &self.sound
    }

    pub fn subscribe(&self) -> UnboundedReceiver<TimerEvent> {
        self.timer.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot().await
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        self.timer.progress().await
    }

    pub async fn configure(&self, config: SessionConfig) -> CoreResult<()> {
        self.soft("configure", self.timer.configure(config).await)
    }

    pub async fn set_total_duration(&self, seconds: u32) -> CoreResult<()> {
        self.soft(
            "set_total_duration",
            self.timer.set_total_duration(seconds).await,
        )
    }

    pub async fn start(&self) -> CoreResult<SessionPhase> {
        self.soft("start", self.timer.start().await)
    }

    pub async fn pause(&self) -> CoreResult<()> {
        self.soft("pause", self.timer.pause().await)
    }

    pub async fn resume(&self) -> CoreResult<SessionPhase> {
        self.soft("resume", self.timer.resume().await)
    }

    /// Pauses a running session or resumes a paused one.
    pub async fn toggle_pause(&self) -> CoreResult<SessionPhase> {
        match self.timer.phase().await {
            SessionPhase::Running => self.pause().await.map(|_| SessionPhase::Paused),
            SessionPhase::Paused => self.resume().await,
            phase => self.soft(
                "toggle_pause",
                Err(CoreError::IllegalTransition {
                    command: "toggle_pause",
                    phase,
                }),
            ),
        }
    }

    pub async fn stop(&self) -> CoreResult<()> {
        self.soft("stop", self.timer.stop().await)
    }

    pub async fn dismiss(&self) {
        self.timer.dismiss().await;
    }

    /// Configures a session of `minutes` with `sound` and starts it at once.
    pub async fn quick_start(
        &self,
        minutes: u32,
        sound: BackgroundSound,
    ) -> CoreResult<SessionPhase> {
        let config = SessionConfig::from_minutes(minutes).with_background(sound);
        self.configure(config).await?;
        self.start().await
    }

    /// Auditions a background sound by name. `"silent"` plays nothing.
    pub fn preview_sound(&self, sound: &str) -> CoreResult<Option<VoiceHandle>> {
        let sound: BackgroundSound = sound.parse()?;
        Ok(sound.kind().and_then(|kind| self.sound.preview(kind)))
    }

    pub fn set_master_volume(&self, volume: f32) -> CoreResult<f32> {
        let applied = self.sound.set_master_volume(volume)?;
        if let Some(store) = &self.settings {
            if let Err(err) = store.set_master_volume(applied) {
                log_warn!("failed to save master volume: {:#}", err);
            }
        }
        Ok(applied)
    }

    pub fn set_voice_volume(&self, kind: SoundKind, volume: f32) -> CoreResult<f32> {
        let applied = self.sound.set_voice_volume(kind, volume)?;
        if let Some(store) = &self.settings {
            if let Err(err) = store.set_voice_volume(kind, applied) {
                log_warn!("failed to save {} volume: {:#}", kind, err);
            }
        }
        Ok(applied)
    }

    fn soft<T>(&self, command: &str, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result {
            if err.is_illegal_transition() {
                log_warn!("ignored {}: {}", command, err);
            } else {
                log_warn!("{} rejected: {}", command, err);
            }
        }
        result
    }
}

impl Drop for MeditationApp {
    fn drop(&mut self) {
        self.router.cancel();
        self.sound.stop_all();
    }
}

fn spawn_router(
    timer: TimerController,
    sound: SoundEngine,
    mut events: UnboundedReceiver<TimerEvent>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                TimerEvent::Bell | TimerEvent::IntervalBell => {
                    if let Err(err) = sound.play_one_shot(SoundKind::Bell, BELL_DURATION_MS) {
                        log_warn!("bell failed: {}", err);
                    }
                }
                TimerEvent::PhaseChanged { from, to } => {
                    log_debug!("phase {} -> {}", from.as_str(), to.as_str());
                    if to == SessionPhase::Running {
                        let background = timer.config().await.background_sound;
                        if let Some(kind) = background.kind() {
                            if let Err(err) = sound.play_loop(kind, None) {
                                log_warn!("background {} failed: {}", kind, err);
                            }
                        }
                    } else if from == SessionPhase::Running {
                        sound.stop_background();
                    }
                }
                _ => {}
            }
        }
    });
}
