pub mod bell;
pub mod bowl;
pub mod dsp;
pub mod gain;
pub mod kind;
pub mod ocean;
pub mod output;
pub mod rain;
pub mod stream;
pub mod voice;

pub use bell::{BELL_DURATION_MS, DEFAULT_BELL_FREQUENCY};
pub use bowl::DEFAULT_BOWL_FREQUENCY;
pub use gain::{clamp_volume, GainStage, DEFAULT_VOLUME};
pub use kind::SoundKind;
#[cfg(feature = "playback")]
pub use output::RodioOutput;
pub use output::{default_output, AudioOutput, NullOutput};
pub use voice::{Playback, SynthParams, Voice, VoiceHandle, VoiceId};

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, Weak,
};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};
use crate::settings::SoundSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const SAMPLE_RATE: u32 = 44_100;

/// Length of a preview audition.
pub const PREVIEW_DURATION_MS: u64 = 3000;

/// Shortest accepted gap between loop refreshes.
pub const MIN_LOOP_RESTART: Duration = Duration::from_secs(1);

/// How a background loop is rendered and refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Length of the rendered texture buffer.
    pub buffer: Duration,
    /// When a fresh voice replaces the current one. At least
    /// [`MIN_LOOP_RESTART`] and shorter than `buffer`.
    pub restart_after: Duration,
}

impl LoopTiming {
    pub fn validate(&self) -> CoreResult<()> {
        if self.restart_after < MIN_LOOP_RESTART {
            return Err(CoreError::invalid(format!(
                "loop restart must be at least {:?}, got {:?}",
                MIN_LOOP_RESTART, self.restart_after
            )));
        }
        if self.restart_after >= self.buffer {
            return Err(CoreError::invalid(format!(
                "loop restart ({:?}) must come before the buffer ends ({:?})",
                self.restart_after, self.buffer
            )));
        }
        Ok(())
    }
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            buffer: Duration::from_secs(60),
            restart_after: Duration::from_secs(55),
        }
    }
}

#[derive(Clone, Default)]
pub struct EngineOptions {
    pub gain: GainStage,
    pub params: SynthParams,
    pub loop_timing: LoopTiming,
}

impl EngineOptions {
    pub fn from_settings(settings: &SoundSettings) -> Self {
        Self {
            gain: GainStage::new(settings.master_volume, settings.kind_volumes()),
            params: SynthParams {
                bell_frequency: settings.bell_frequency,
                bowl_frequency: settings.bowl_frequency,
            },
            loop_timing: LoopTiming::default(),
        }
    }
}

struct ActiveVoice {
    handle: VoiceHandle,
    /// Id of the voice currently sounding on the output. Differs from
    /// `handle.id` once a loop has been restarted.
    output_id: VoiceId,
    expires_at: Option<Instant>,
    restart: Option<CancellationToken>,
}

impl ActiveVoice {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn release(&self) {
        if let Some(token) = &self.restart {
            token.cancel();
        }
    }
}

#[derive(Default)]
struct VoiceRegistry {
    next_id: VoiceId,
    active: HashMap<VoiceId, ActiveVoice>,
    background: Option<VoiceId>,
    preview: Option<VoiceId>,
}

impl VoiceRegistry {
    fn allocate(&mut self) -> VoiceId {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, id: VoiceId) -> Option<ActiveVoice> {
        if self.background == Some(id) {
            self.background = None;
        }
        if self.preview == Some(id) {
            self.preview = None;
        }
        self.active.remove(&id)
    }

    fn prune(&mut self, now: Instant) {
        let expired: Vec<VoiceId> = self
            .active
            .iter()
            .filter(|(_, voice)| voice.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.remove(id);
        }
    }
}

struct EngineShared {
    output: Box<dyn AudioOutput>,
    gain: GainStage,
    params: SynthParams,
    loop_timing: LoopTiming,
    registry: Mutex<VoiceRegistry>,
    sink_warned: AtomicBool,
}

/// Procedural synthesizer for the session's bells and background textures.
///
/// Cheap to clone; clones share voices and volumes. Every call is safe when
/// no audio device exists: synthesis then becomes a silent no-op.
#[derive(Clone)]
pub struct SoundEngine {
    shared: Arc<EngineShared>,
}

impl Default for SoundEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundEngine {
    pub fn new() -> Self {
        Self::with_output(default_output())
    }

    /// An engine that never produces sound.
    pub fn silent() -> Self {
        Self::with_output(Box::new(NullOutput::new("audio disabled")))
    }

    pub fn with_output(output: Box<dyn AudioOutput>) -> Self {
        Self::build(output, EngineOptions::default())
    }

    /// Rejects loop timings that would refresh too eagerly or too late.
    pub fn with_options(output: Box<dyn AudioOutput>, options: EngineOptions) -> CoreResult<Self> {
        options.loop_timing.validate()?;
        Ok(Self::build(output, options))
    }

    fn build(output: Box<dyn AudioOutput>, options: EngineOptions) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                output,
                gain: options.gain,
                params: options.params,
                loop_timing: options.loop_timing,
                registry: Mutex::new(VoiceRegistry::default()),
                sink_warned: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        self.shared.output.is_available()
    }

    pub fn master_volume(&self) -> f32 {
        self.shared.gain.master()
    }

    pub fn voice_volume(&self, kind: SoundKind) -> f32 {
        self.shared.gain.kind(kind)
    }

    /// Applies to every sounding voice immediately. Returns the clamped value.
    pub fn set_master_volume(&self, volume: f32) -> CoreResult<f32> {
        self.shared.gain.set_master(volume)
    }

    pub fn set_voice_volume(&self, kind: SoundKind, volume: f32) -> CoreResult<f32> {
        self.shared.gain.set_kind(kind, volume)
    }

    /// Strikes a sound once. Overlapping one-shots are allowed.
    pub fn play_one_shot(&self, kind: SoundKind, duration_ms: u64) -> CoreResult<VoiceHandle> {
        if duration_ms == 0 {
            return Err(CoreError::invalid("one-shot duration must be positive"));
        }
        let length = Duration::from_millis(duration_ms);

        let mut registry = self.registry();
        let id = registry.allocate();
        self.start_voice(&mut registry, id, kind, length, Playback::Once);
        Ok(VoiceHandle { id, kind })
    }

    /// Starts the background sound, replacing any current one. `volume`, when
    /// given, becomes the kind's volume.
    ///
    /// Noise textures loop until stopped and are refreshed with new material
    /// before their buffer runs out. Tonal kinds ring once across the buffer
    /// length.
    pub fn play_loop(&self, kind: SoundKind, volume: Option<f32>) -> CoreResult<VoiceHandle> {
        if let Some(volume) = volume {
            self.shared.gain.set_kind(kind, volume)?;
        }

        let timing = self.shared.loop_timing;
        let mut registry = self.registry();
        if let Some(previous) = registry.background {
            self.stop_locked(&mut registry, previous);
        }

        let id = registry.allocate();
        let playback = if kind.is_tonal() {
            Playback::Once
        } else {
            Playback::Loop
        };
        if !self.start_voice(&mut registry, id, kind, timing.buffer, playback) {
            return Ok(VoiceHandle { id, kind });
        }
        registry.background = Some(id);

        if playback == Playback::Loop {
            if let Some(token) = self.schedule_restart(id) {
                if let Some(active) = registry.active.get_mut(&id) {
                    active.restart = Some(token);
                }
            }
        }

        log_info!("background {} started", kind);
        Ok(VoiceHandle { id, kind })
    }

    /// Auditions a kind for a few seconds. A new preview cuts the previous
    /// one; `None` when there is no output to play it on.
    pub fn preview(&self, kind: SoundKind) -> Option<VoiceHandle> {
        let mut registry = self.registry();
        if let Some(previous) = registry.preview {
            self.stop_locked(&mut registry, previous);
        }

        let id = registry.allocate();
        let length = Duration::from_millis(PREVIEW_DURATION_MS);
        if !self.start_voice(&mut registry, id, kind, length, Playback::Once) {
            return None;
        }
        registry.preview = Some(id);
        Some(VoiceHandle { id, kind })
    }

    /// Stops a voice. Stopping a finished or unknown voice does nothing.
    pub fn stop(&self, handle: VoiceHandle) {
        let mut registry = self.registry();
        self.stop_locked(&mut registry, handle.id);
    }

    pub fn stop_background(&self) {
        let mut registry = self.registry();
        if let Some(id) = registry.background {
            self.stop_locked(&mut registry, id);
            log_info!("background stopped");
        }
    }

    pub fn stop_all(&self) {
        let mut registry = self.registry();
        for (_, voice) in registry.active.drain() {
            voice.release();
        }
        registry.background = None;
        registry.preview = None;
        self.shared.output.stop_all();
    }

    /// Voices still sounding, oldest first.
    pub fn active_voices(&self) -> Vec<VoiceHandle> {
        let mut registry = self.registry();
        registry.prune(Instant::now());
        let mut handles: Vec<VoiceHandle> =
            registry.active.values().map(|voice| voice.handle).collect();
        handles.sort_by_key(|handle| handle.id);
        handles
    }

    pub fn background(&self) -> Option<VoiceHandle> {
        let mut registry = self.registry();
        registry.prune(Instant::now());
        registry
            .background
            .and_then(|id| registry.active.get(&id))
            .map(|voice| voice.handle)
    }

    fn registry(&self) -> MutexGuard<'_, VoiceRegistry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, kind: SoundKind, length: Duration, playback: Playback) -> Voice {
        let samples = voice::synthesize(kind, length, playback, &self.shared.params);
        let total_duration = match playback {
            Playback::Once => Some(length),
            Playback::Loop => None,
        };
        Voice::new(kind, samples, self.shared.gain.clone(), total_duration)
    }

    /// Hands a freshly rendered voice to the output and registers it.
    /// Returns false when the output refused it.
    fn start_voice(
        &self,
        registry: &mut VoiceRegistry,
        id: VoiceId,
        kind: SoundKind,
        length: Duration,
        playback: Playback,
    ) -> bool {
        registry.prune(Instant::now());
        let voice = self.render(kind, length, playback);
        if let Err(err) = self.shared.output.start(id, voice) {
            self.report_output_failure(&err);
            return false;
        }

        // A one-shot too long to land on the clock simply never expires.
        let expires_at = match playback {
            Playback::Once => Instant::now().checked_add(length),
            Playback::Loop => None,
        };
        registry.active.insert(
            id,
            ActiveVoice {
                handle: VoiceHandle { id, kind },
                output_id: id,
                expires_at,
                restart: None,
            },
        );
        log_debug!("voice {} ({}) started", id, kind);
        true
    }

    fn stop_locked(&self, registry: &mut VoiceRegistry, id: VoiceId) {
        if let Some(voice) = registry.remove(id) {
            voice.release();
            self.shared.output.stop(voice.output_id);
            log_debug!("voice {} ({}) stopped", id, voice.handle.kind);
        }
    }

    fn report_output_failure(&self, err: &CoreError) {
        if !self.shared.sink_warned.swap(true, Ordering::SeqCst) {
            log_warn!("sound disabled: {}", err);
        }
    }

    /// Arms the refresh of loop `id`. Without a tokio runtime the loop simply
    /// keeps wrapping its buffer.
    fn schedule_restart(&self, id: VoiceId) -> Option<CancellationToken> {
        let runtime = Handle::try_current().ok()?;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(&self.shared);
        let after = self.shared.loop_timing.restart_after;

        runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = time::sleep(after) => restart_loop(weak, id, cancelled),
            }
        });
        Some(token)
    }
}

/// Swaps the sounding voice of loop `id` for fresh material. The new voice is
/// started before the old one is released, all under the registry lock, so a
/// concurrent stop either wins outright or sees the swapped voice.
fn restart_loop(weak: Weak<EngineShared>, id: VoiceId, token: CancellationToken) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let engine = SoundEngine { shared };

    let mut registry = engine.registry();
    if token.is_cancelled() || registry.background != Some(id) {
        return;
    }
    let Some((kind, old_output)) = registry
        .active
        .get(&id)
        .map(|voice| (voice.handle.kind, voice.output_id))
    else {
        return;
    };

    let fresh_output = registry.allocate();
    let voice = engine.render(kind, engine.shared.loop_timing.buffer, Playback::Loop);
    if let Err(err) = engine.shared.output.start(fresh_output, voice) {
        // The current voice keeps wrapping its buffer.
        engine.report_output_failure(&err);
        return;
    }
    engine.shared.output.stop(old_output);

    let next = engine.schedule_restart(id);
    if let Some(active) = registry.active.get_mut(&id) {
        active.output_id = fresh_output;
        active.restart = next;
    }
    log_debug!("background {} refreshed", kind);
}
