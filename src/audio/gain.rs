use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::error::{CoreError, CoreResult};

use super::SoundKind;

pub const DEFAULT_VOLUME: f32 = 0.3;

/// Clamps a user-supplied volume into `[0, 1]`.
pub fn clamp_volume(volume: f32) -> CoreResult<f32> {
    if !volume.is_finite() {
        return Err(CoreError::invalid(format!("volume must be a number, got {volume}")));
    }
    Ok(volume.clamp(0.0, 1.0))
}

struct Level(AtomicU32);

impl Level {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

struct GainLevels {
    master: Level,
    kinds: [Level; 5],
}

/// Master and per-kind gain shared between the control side and every
/// sounding voice. Voices read it per sample, so changes are heard at once.
#[derive(Clone)]
pub struct GainStage {
    levels: Arc<GainLevels>,
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME, [DEFAULT_VOLUME; 5])
    }
}

impl GainStage {
    pub fn new(master: f32, kinds: [f32; 5]) -> Self {
        Self {
            levels: Arc::new(GainLevels {
                master: Level::new(master.clamp(0.0, 1.0)),
                kinds: kinds.map(|volume| Level::new(volume.clamp(0.0, 1.0))),
            }),
        }
    }

    pub fn master(&self) -> f32 {
        self.levels.master.get()
    }

    pub fn kind(&self, kind: SoundKind) -> f32 {
        self.levels.kinds[kind.index()].get()
    }

    /// Returns the volume actually applied after clamping.
    pub fn set_master(&self, volume: f32) -> CoreResult<f32> {
        let volume = clamp_volume(volume)?;
        self.levels.master.set(volume);
        Ok(volume)
    }

    pub fn set_kind(&self, kind: SoundKind, volume: f32) -> CoreResult<f32> {
        let volume = clamp_volume(volume)?;
        self.levels.kinds[kind.index()].set(volume);
        Ok(volume)
    }

    pub fn effective(&self, kind: SoundKind) -> f32 {
        self.master() * self.kind(kind)
    }
}
