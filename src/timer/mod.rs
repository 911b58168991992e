pub mod controller;
pub mod events;
pub mod state;

pub use controller::{TimerController, TimerSnapshot, COMPLETION_HOLD};
pub use events::{EventBus, TimerEvent};
pub use state::{SessionMachine, SessionPhase};

/// Formats whole seconds as the `MM:SS` clock shown while meditating.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::format_clock;

    #[test]
    fn clock_pads_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(300), "05:00");
        assert_eq!(format_clock(3725), "62:05");
    }
}
