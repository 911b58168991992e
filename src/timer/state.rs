use serde::{Deserialize, Serialize};

use crate::config::{SessionConfig, StopPolicy};
use crate::error::{CoreError, CoreResult};
use crate::ledger::SessionRecord;

use super::TimerEvent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Preparing,
    Running,
    Paused,
    Completed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Preparing => "Preparing",
            SessionPhase::Running => "Running",
            SessionPhase::Paused => "Paused",
            SessionPhase::Completed => "Completed",
        }
    }

    /// Phases driven by the one-second tick.
    pub fn is_ticking(&self) -> bool {
        matches!(self, SessionPhase::Preparing | SessionPhase::Running)
    }
}

/// The session lifecycle without any notion of wall-clock time.
///
/// Every command either returns the events it produced or an error, in which
/// case nothing changed. Time only advances through [`SessionMachine::tick`].
#[derive(Debug, Clone)]
pub struct SessionMachine {
    config: SessionConfig,
    stop_policy: StopPolicy,
    phase: SessionPhase,
    remaining_time: u32,
    preparation_remaining: u32,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(SessionConfig::default(), StopPolicy::default())
    }
}

impl SessionMachine {
    /// `config` is trusted here; use [`SessionMachine::configure`] for user input.
    pub fn new(config: SessionConfig, stop_policy: StopPolicy) -> Self {
        Self {
            remaining_time: config.total_duration,
            config,
            stop_policy,
            phase: SessionPhase::Idle,
            preparation_remaining: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn remaining_time(&self) -> u32 {
        self.remaining_time
    }

    pub fn preparation_remaining(&self) -> u32 {
        self.preparation_remaining
    }

    pub fn elapsed_in_session(&self) -> u32 {
        self.config.total_duration - self.remaining_time
    }

    pub fn progress_percent(&self) -> f64 {
        let total = self.config.total_duration;
        if total == 0 {
            return 0.0;
        }
        f64::from(total - self.remaining_time) / f64::from(total) * 100.0
    }

    pub fn configure(&mut self, config: SessionConfig) -> CoreResult<()> {
        self.require(SessionPhase::Idle, "configure")?;
        config.validate()?;
        self.config = config;
        self.remaining_time = config.total_duration;
        Ok(())
    }

    pub fn set_total_duration(&mut self, seconds: u32) -> CoreResult<()> {
        let mut config = self.config;
        config.total_duration = seconds;
        self.configure(config)
    }

    pub fn start(&mut self) -> CoreResult<Vec<TimerEvent>> {
        match self.phase {
            SessionPhase::Idle if self.config.preparation_time > 0 => {
                self.preparation_remaining = self.config.preparation_time;
                Ok(vec![self.transition(SessionPhase::Preparing)])
            }
            SessionPhase::Idle | SessionPhase::Paused => {
                Ok(vec![self.transition(SessionPhase::Running)])
            }
            phase => Err(CoreError::IllegalTransition {
                command: "start",
                phase,
            }),
        }
    }

    pub fn resume(&mut self) -> CoreResult<Vec<TimerEvent>> {
        self.require(SessionPhase::Paused, "resume")?;
        self.start()
    }

    pub fn pause(&mut self) -> CoreResult<Vec<TimerEvent>> {
        self.require(SessionPhase::Running, "pause")?;
        Ok(vec![self.transition(SessionPhase::Paused), TimerEvent::Paused])
    }

    /// Abandons the session. Stopping an idle timer is a no-op, stopping a
    /// completed one dismisses it.
    pub fn stop(&mut self) -> CoreResult<Vec<TimerEvent>> {
        match self.phase {
            SessionPhase::Idle => Ok(Vec::new()),
            SessionPhase::Completed => Ok(self.dismiss()),
            SessionPhase::Preparing | SessionPhase::Running | SessionPhase::Paused => {
                let record = match self.stop_policy {
                    StopPolicy::RecordPartial => {
                        SessionRecord::from_elapsed(self.elapsed_in_session(), false)
                    }
                    StopPolicy::Discard => None,
                };
                self.remaining_time = self.config.total_duration;
                self.preparation_remaining = 0;
                Ok(vec![
                    self.transition(SessionPhase::Idle),
                    TimerEvent::Stopped { record },
                ])
            }
        }
    }

    /// Leaves the completed display hold.
    pub fn dismiss(&mut self) -> Vec<TimerEvent> {
        if self.phase != SessionPhase::Completed {
            return Vec::new();
        }
        self.remaining_time = self.config.total_duration;
        vec![self.transition(SessionPhase::Idle), TimerEvent::Reset]
    }

    /// Advances the session by one second.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        match self.phase {
            SessionPhase::Preparing => self.tick_preparation(),
            SessionPhase::Running => self.tick_running(),
            _ => Vec::new(),
        }
    }

    fn tick_preparation(&mut self) -> Vec<TimerEvent> {
        self.preparation_remaining = self.preparation_remaining.saturating_sub(1);
        let mut events = vec![TimerEvent::PreparationTick {
            remaining: self.preparation_remaining,
        }];
        if self.preparation_remaining == 0 {
            events.push(TimerEvent::Bell);
            events.push(self.transition(SessionPhase::Running));
        }
        events
    }

    fn tick_running(&mut self) -> Vec<TimerEvent> {
        self.remaining_time = self.remaining_time.saturating_sub(1);
        let remaining = self.remaining_time;
        let mut events = vec![TimerEvent::Tick {
            remaining_time: remaining,
            progress_percent: self.progress_percent(),
        }];

        let period = self.config.interval_bell_period;
        if period > 0 && remaining > 0 && remaining % period == 0 {
            events.push(TimerEvent::IntervalBell);
        }

        if remaining == 0 {
            let record = SessionRecord::from_elapsed(self.elapsed_in_session(), true);
            events.push(TimerEvent::Bell);
            events.push(self.transition(SessionPhase::Completed));
            events.push(TimerEvent::Completed { record });
        }
        events
    }

    fn transition(&mut self, to: SessionPhase) -> TimerEvent {
        let from = self.phase;
        self.phase = to;
        TimerEvent::PhaseChanged { from, to }
    }

    fn require(&self, phase: SessionPhase, command: &'static str) -> CoreResult<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(CoreError::IllegalTransition {
                command,
                phase: self.phase,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundSound;
    use assert_matches::assert_matches;

    fn machine(config: SessionConfig) -> SessionMachine {
        SessionMachine::new(config, StopPolicy::RecordPartial)
    }

    fn run_to_completion(machine: &mut SessionMachine) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while machine.phase() != SessionPhase::Completed {
            events.extend(machine.tick());
        }
        events
    }

    #[test]
    fn full_run_ticks_down_to_zero_once_per_second() {
        let total = 90;
        let mut machine = machine(SessionConfig::new(total));
        machine.start().unwrap();

        let events = run_to_completion(&mut machine);
        let remaining: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                TimerEvent::Tick { remaining_time, .. } => Some(*remaining_time),
                _ => None,
            })
            .collect();

        assert_eq!(remaining.len(), total as usize);
        assert!(remaining.windows(2).all(|pair| pair[0] == pair[1] + 1));
        assert_eq!(remaining.last(), Some(&0));

        let completed = events
            .iter()
            .filter(|event| matches!(event, TimerEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_matches!(events.last(), Some(TimerEvent::Completed { record: Some(r) }) if r.completed_fully);
    }

    #[test]
    fn completion_emits_tick_bell_phase_change_and_record_in_order() {
        let mut machine = machine(SessionConfig::new(1));
        machine.start().unwrap();
        let events = machine.tick();

        assert_eq!(events.len(), 4);
        assert_matches!(events[0], TimerEvent::Tick { remaining_time: 0, progress_percent } if progress_percent == 100.0);
        assert_eq!(events[1], TimerEvent::Bell);
        assert_eq!(
            events[2],
            TimerEvent::PhaseChanged {
                from: SessionPhase::Running,
                to: SessionPhase::Completed
            }
        );
        assert_matches!(&events[3], TimerEvent::Completed { record: Some(r) } if r.completed_minutes == 1);

        // Further ticks are inert.
        assert!(machine.tick().is_empty());
        assert_eq!(machine.remaining_time(), 0);
    }

    #[test]
    fn preparation_counts_down_then_rings_into_running() {
        let mut machine = machine(SessionConfig::new(60).with_preparation(10));
        let started = machine.start().unwrap();
        assert_eq!(
            started,
            vec![TimerEvent::PhaseChanged {
                from: SessionPhase::Idle,
                to: SessionPhase::Preparing
            }]
        );

        for expected in (1..10).rev() {
            let events = machine.tick();
            assert_eq!(events, vec![TimerEvent::PreparationTick { remaining: expected }]);
            assert_eq!(machine.phase(), SessionPhase::Preparing);
        }

        let tenth = machine.tick();
        assert_eq!(tenth[0], TimerEvent::PreparationTick { remaining: 0 });
        assert_eq!(tenth[1], TimerEvent::Bell);
        assert_eq!(machine.phase(), SessionPhase::Running);
        assert_eq!(machine.remaining_time(), 60);

        let eleventh = machine.tick();
        assert_matches!(eleventh[0], TimerEvent::Tick { remaining_time: 59, .. });
    }

    #[test]
    fn interval_bells_ring_at_multiples_below_total() {
        let mut machine = machine(SessionConfig::new(300).with_interval_bells(60));
        machine.start().unwrap();
        let events = run_to_completion(&mut machine);

        let interval_bells = events
            .iter()
            .filter(|event| **event == TimerEvent::IntervalBell)
            .count();
        let all_bells = interval_bells
            + events.iter().filter(|event| **event == TimerEvent::Bell).count();

        assert_eq!(interval_bells, 300 / 60 - 1);
        assert_eq!(all_bells, 300 / 60);
    }

    #[test]
    fn pause_and_resume_continue_from_remaining_time() {
        let mut machine = machine(SessionConfig::new(120));
        machine.start().unwrap();
        for _ in 0..30 {
            machine.tick();
        }

        let paused = machine.pause().unwrap();
        assert_eq!(paused.last(), Some(&TimerEvent::Paused));
        assert!(machine.tick().is_empty());
        assert_eq!(machine.remaining_time(), 90);

        machine.resume().unwrap();
        assert_eq!(machine.phase(), SessionPhase::Running);
        assert_matches!(machine.tick()[0], TimerEvent::Tick { remaining_time: 89, .. });
    }

    #[test]
    fn resume_skips_preparation() {
        let mut machine = machine(SessionConfig::new(60).with_preparation(5));
        machine.start().unwrap();
        for _ in 0..5 {
            machine.tick();
        }
        machine.tick();
        machine.pause().unwrap();

        let resumed = machine.start().unwrap();
        assert_eq!(
            resumed,
            vec![TimerEvent::PhaseChanged {
                from: SessionPhase::Paused,
                to: SessionPhase::Running
            }]
        );
    }

    #[test]
    fn illegal_commands_leave_state_untouched() {
        let mut machine = machine(SessionConfig::new(60));
        assert_matches!(
            machine.pause(),
            Err(CoreError::IllegalTransition { command: "pause", phase: SessionPhase::Idle })
        );
        assert_matches!(machine.resume(), Err(CoreError::IllegalTransition { .. }));

        machine.start().unwrap();
        machine.tick();
        assert_matches!(machine.start(), Err(CoreError::IllegalTransition { command: "start", .. }));
        assert_matches!(
            machine.configure(SessionConfig::new(600)),
            Err(CoreError::IllegalTransition { command: "configure", .. })
        );
        assert_matches!(machine.set_total_duration(600), Err(CoreError::IllegalTransition { .. }));
        assert_eq!(machine.remaining_time(), 59);
        assert_eq!(machine.config().total_duration, 60);
    }

    #[test]
    fn stop_twice_is_idempotent_from_every_phase() {
        let setups: Vec<fn(&mut SessionMachine)> = vec![
            |_| {},
            |m| {
                m.start().unwrap();
            },
            |m| {
                m.start().unwrap();
                m.tick();
                m.tick();
            },
            |m| {
                m.start().unwrap();
                m.tick();
                m.pause().unwrap();
            },
            |m| {
                m.start().unwrap();
                while m.phase() != SessionPhase::Completed {
                    m.tick();
                }
            },
        ];

        for setup in setups {
            let mut machine = machine(SessionConfig::new(5).with_preparation(0));
            setup(&mut machine);
            machine.stop().unwrap();
            let after_first = (machine.phase(), machine.remaining_time());
            assert!(machine.stop().unwrap().is_empty());
            assert_eq!(after_first, (SessionPhase::Idle, 5));
            assert_eq!((machine.phase(), machine.remaining_time()), after_first);
        }
    }

    #[test]
    fn stop_policy_controls_partial_records() {
        let mut recording = machine(SessionConfig::new(600));
        recording.start().unwrap();
        for _ in 0..61 {
            recording.tick();
        }
        let events = recording.stop().unwrap();
        assert_matches!(
            events.last(),
            Some(TimerEvent::Stopped { record: Some(r) }) if r.completed_minutes == 2 && !r.completed_fully
        );

        let mut discarding = SessionMachine::new(SessionConfig::new(600), StopPolicy::Discard);
        discarding.start().unwrap();
        discarding.tick();
        assert_matches!(
            discarding.stop().unwrap().last(),
            Some(TimerEvent::Stopped { record: None })
        );

        let mut untouched = machine(SessionConfig::new(600).with_preparation(10));
        untouched.start().unwrap();
        untouched.tick();
        assert_matches!(
            untouched.stop().unwrap().last(),
            Some(TimerEvent::Stopped { record: None })
        );
    }

    #[test]
    fn configure_while_idle_resets_remaining_time() {
        let mut machine = machine(SessionConfig::default());
        machine
            .configure(SessionConfig::new(600).with_background(BackgroundSound::Rain))
            .unwrap();
        assert_eq!(machine.remaining_time(), 600);
        assert_eq!(machine.config().background_sound, BackgroundSound::Rain);

        machine.set_total_duration(120).unwrap();
        assert_eq!(machine.remaining_time(), 120);

        assert_matches!(machine.set_total_duration(0), Err(CoreError::InvalidConfig(_)));
        assert_eq!(machine.remaining_time(), 120);
    }

    #[test]
    fn dismiss_returns_completed_session_to_idle() {
        let mut machine = machine(SessionConfig::new(2));
        assert!(machine.dismiss().is_empty());
        machine.start().unwrap();
        machine.tick();
        machine.tick();
        assert_eq!(machine.phase(), SessionPhase::Completed);

        let events = machine.dismiss();
        assert_eq!(events.last(), Some(&TimerEvent::Reset));
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert_eq!(machine.remaining_time(), 2);
        assert_eq!(machine.progress_percent(), 0.0);
    }
}
