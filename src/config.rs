use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::SoundKind;
use crate::error::{CoreError, CoreResult};

/// What plays underneath a running session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackgroundSound {
    #[default]
    Silent,
    Bell,
    Bowl,
    Ocean,
    Rain,
    Stream,
}

impl BackgroundSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundSound::Silent => "silent",
            BackgroundSound::Bell => "bell",
            BackgroundSound::Bowl => "bowl",
            BackgroundSound::Ocean => "ocean",
            BackgroundSound::Rain => "rain",
            BackgroundSound::Stream => "stream",
        }
    }

    /// The synthesized voice for this background, `None` for silence.
    pub fn kind(&self) -> Option<SoundKind> {
        match self {
            BackgroundSound::Silent => None,
            BackgroundSound::Bell => Some(SoundKind::Bell),
            BackgroundSound::Bowl => Some(SoundKind::Bowl),
            BackgroundSound::Ocean => Some(SoundKind::Ocean),
            BackgroundSound::Rain => Some(SoundKind::Rain),
            BackgroundSound::Stream => Some(SoundKind::Stream),
        }
    }
}

impl From<SoundKind> for BackgroundSound {
    fn from(kind: SoundKind) -> Self {
        match kind {
            SoundKind::Bell => BackgroundSound::Bell,
            SoundKind::Bowl => BackgroundSound::Bowl,
            SoundKind::Ocean => BackgroundSound::Ocean,
            SoundKind::Rain => BackgroundSound::Rain,
            SoundKind::Stream => BackgroundSound::Stream,
        }
    }
}

impl FromStr for BackgroundSound {
    type Err = CoreError;

    fn from_str(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("silent") || trimmed.eq_ignore_ascii_case("none") {
            return Ok(BackgroundSound::Silent);
        }
        trimmed.parse::<SoundKind>().map(BackgroundSound::from)
    }
}

impl fmt::Display for BackgroundSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether stopping a session early leaves a trace in the progress ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum StopPolicy {
    /// Record a partial session (`completed_fully = false`) when any time elapsed.
    #[default]
    RecordPartial,
    /// Forget stopped sessions entirely.
    Discard,
}

/// Parameters of one meditation session. All durations are whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub total_duration: u32,
    pub preparation_time: u32,
    /// Ring a bell every this many seconds of remaining time; 0 disables it.
    pub interval_bell_period: u32,
    pub background_sound: BackgroundSound,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_duration: 5 * 60,
            preparation_time: 0,
            interval_bell_period: 0,
            background_sound: BackgroundSound::Silent,
        }
    }
}

impl SessionConfig {
    pub fn new(total_duration: u32) -> Self {
        Self {
            total_duration,
            ..Self::default()
        }
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(minutes.saturating_mul(60))
    }

    pub fn with_preparation(mut self, seconds: u32) -> Self {
        self.preparation_time = seconds;
        self
    }

    pub fn with_interval_bells(mut self, seconds: u32) -> Self {
        self.interval_bell_period = seconds;
        self
    }

    pub fn with_background(mut self, sound: BackgroundSound) -> Self {
        self.background_sound = sound;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.total_duration == 0 {
            return Err(CoreError::invalid("total duration must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_background_names_case_insensitively() {
        assert_eq!("Ocean".parse::<BackgroundSound>().unwrap(), BackgroundSound::Ocean);
        assert_eq!(" silent ".parse::<BackgroundSound>().unwrap(), BackgroundSound::Silent);
        assert_matches!(
            "whale".parse::<BackgroundSound>(),
            Err(CoreError::InvalidConfig(_))
        );
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert_matches!(SessionConfig::new(0).validate(), Err(CoreError::InvalidConfig(_)));
        assert!(SessionConfig::from_minutes(10).validate().is_ok());
    }

    #[test]
    fn background_serializes_as_lowercase_name() {
        let json = serde_json::to_string(&BackgroundSound::Stream).unwrap();
        assert_eq!(json, "\"stream\"");
        assert_eq!(BackgroundSound::Rain.kind(), Some(SoundKind::Rain));
        assert_eq!(BackgroundSound::Silent.kind(), None);
    }
}
