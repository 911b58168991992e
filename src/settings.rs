use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::audio::{
    clamp_volume, SoundKind, DEFAULT_BELL_FREQUENCY, DEFAULT_BOWL_FREQUENCY, DEFAULT_VOLUME,
};

/// Per-kind volume table, stored by name so the file stays readable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KindVolumes {
    pub bell: f32,
    pub bowl: f32,
    pub ocean: f32,
    pub rain: f32,
    pub stream: f32,
}

impl Default for KindVolumes {
    fn default() -> Self {
        Self {
            bell: DEFAULT_VOLUME,
            bowl: DEFAULT_VOLUME,
            ocean: DEFAULT_VOLUME,
            rain: DEFAULT_VOLUME,
            stream: DEFAULT_VOLUME,
        }
    }
}

impl KindVolumes {
    pub fn get(&self, kind: SoundKind) -> f32 {
        match kind {
            SoundKind::Bell => self.bell,
            SoundKind::Bowl => self.bowl,
            SoundKind::Ocean => self.ocean,
            SoundKind::Rain => self.rain,
            SoundKind::Stream => self.stream,
        }
    }

    pub fn set(&mut self, kind: SoundKind, volume: f32) {
        let slot = match kind {
            SoundKind::Bell => &mut self.bell,
            SoundKind::Bowl => &mut self.bowl,
            SoundKind::Ocean => &mut self.ocean,
            SoundKind::Rain => &mut self.rain,
            SoundKind::Stream => &mut self.stream,
        };
        *slot = volume;
    }
}

/// Sound preferences that survive restarts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundSettings {
    pub master_volume: f32,
    pub volumes: KindVolumes,
    pub bell_frequency: f32,
    pub bowl_frequency: f32,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            master_volume: DEFAULT_VOLUME,
            volumes: KindVolumes::default(),
            bell_frequency: DEFAULT_BELL_FREQUENCY,
            bowl_frequency: DEFAULT_BOWL_FREQUENCY,
        }
    }
}

impl SoundSettings {
    /// Volumes in `SoundKind::index` order.
    pub fn kind_volumes(&self) -> [f32; 5] {
        SoundKind::ALL.map(|kind| self.volumes.get(kind))
    }

    /// Replaces values a hand-edited file may have broken with defaults.
    fn sanitized(mut self) -> Self {
        let defaults = SoundSettings::default();
        self.master_volume = clamp_volume(self.master_volume).unwrap_or(defaults.master_volume);
        for kind in SoundKind::ALL {
            let volume = clamp_volume(self.volumes.get(kind)).unwrap_or(DEFAULT_VOLUME);
            self.volumes.set(kind, volume);
        }
        if !(self.bell_frequency.is_finite() && self.bell_frequency > 0.0) {
            self.bell_frequency = defaults.bell_frequency;
        }
        if !(self.bowl_frequency.is_finite() && self.bowl_frequency > 0.0) {
            self.bowl_frequency = defaults.bowl_frequency;
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    sound: SoundSettings,
}

/// JSON-backed settings file. Reads are served from memory; every update is
/// written through.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads `path`, falling back to defaults when it is missing or not
    /// valid JSON.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings in {}: {}", path.display(), err);
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(UserSettings {
                sound: data.sound.sanitized(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sound(&self) -> SoundSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sound
    }

    pub fn update_sound(&self, settings: SoundSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.sound = settings.sanitized();
        self.persist(&guard)
    }

    pub fn set_master_volume(&self, volume: f32) -> Result<()> {
        let mut sound = self.sound();
        sound.master_volume = volume;
        self.update_sound(sound)
    }

    pub fn set_voice_volume(&self, kind: SoundKind, volume: f32) -> Result<()> {
        let mut sound = self.sound();
        sound.volumes.set(kind, volume);
        self.update_sound(sound)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.sound = data.sound.sanitized();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.sound(), SoundSettings::default());
        assert_eq!(store.sound().kind_volumes(), [DEFAULT_VOLUME; 5]);
    }

    #[test]
    fn updates_survive_a_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_master_volume(0.8).unwrap();
        store.set_voice_volume(SoundKind::Ocean, 0.5).unwrap();

        assert!(store.path().is_file());

        let reopened = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        let sound = reopened.sound();
        assert_eq!(sound.master_volume, 0.8);
        assert_eq!(sound.volumes.ocean, 0.5);
        assert_eq!(sound.volumes.rain, DEFAULT_VOLUME);
    }

    #[test]
    fn out_of_range_values_are_repaired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"sound":{"masterVolume":4.0,"volumes":{"rain":-1.0},"bellFrequency":-5.0}}"#,
        )
        .unwrap();

        let sound = SettingsStore::new(path).unwrap().sound();
        assert_eq!(sound.master_volume, 1.0);
        assert_eq!(sound.volumes.rain, 0.0);
        assert_eq!(sound.volumes.bell, DEFAULT_VOLUME);
        assert_eq!(sound.bell_frequency, DEFAULT_BELL_FREQUENCY);
        assert_eq!(sound.bowl_frequency, DEFAULT_BOWL_FREQUENCY);
    }

    #[test]
    fn corrupt_file_falls_back_but_reload_reports_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.sound(), SoundSettings::default());
        assert!(store.reload().is_err());
    }
}
