use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SoundKind {
    Bell,
    Bowl,
    Ocean,
    Rain,
    Stream,
}

impl SoundKind {
    pub const ALL: [SoundKind; 5] = [
        SoundKind::Bell,
        SoundKind::Bowl,
        SoundKind::Ocean,
        SoundKind::Rain,
        SoundKind::Stream,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SoundKind::Bell => "bell",
            SoundKind::Bowl => "bowl",
            SoundKind::Ocean => "ocean",
            SoundKind::Rain => "rain",
            SoundKind::Stream => "stream",
        }
    }

    /// Stable slot used by per-kind tables.
    pub fn index(&self) -> usize {
        match self {
            SoundKind::Bell => 0,
            SoundKind::Bowl => 1,
            SoundKind::Ocean => 2,
            SoundKind::Rain => 3,
            SoundKind::Stream => 4,
        }
    }

    /// Tonal kinds are struck oscillator banks; the rest are shaped noise.
    pub fn is_tonal(&self) -> bool {
        matches!(self, SoundKind::Bell | SoundKind::Bowl)
    }
}

impl FromStr for SoundKind {
    type Err = CoreError;

    fn from_str(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        SoundKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::invalid(format!("unknown sound kind '{trimmed}'")))
    }
}

impl fmt::Display for SoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
