use thiserror::Error;

use crate::timer::SessionPhase;

/// Failures surfaced by the timer and the sound engine.
///
/// None of these are fatal: an unsupported sink degrades to silence, invalid
/// input leaves the previous state untouched and an illegal transition is a
/// no-op the caller may log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("audio output unavailable: {0}")]
    UnsupportedAudioSink(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot {command} while {phase:?}")]
    IllegalTransition {
        command: &'static str,
        phase: SessionPhase,
    },
}

impl CoreError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig(reason.into())
    }

    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, CoreError::IllegalTransition { .. })
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
