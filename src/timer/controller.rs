use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{mpsc::UnboundedReceiver, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::config::{SessionConfig, StopPolicy};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{ProgressLedger, ProgressSnapshot};

use super::{EventBus, SessionMachine, SessionPhase, TimerEvent};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// How long a completed session stays on display before returning to Idle.
pub const COMPLETION_HOLD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: SessionPhase,
    pub remaining_time: u32,
    pub preparation_remaining: u32,
    pub progress_percent: f64,
    pub config: SessionConfig,
}

struct TimerInner {
    machine: SessionMachine,
    ledger: ProgressLedger,
    /// Bumped by every command that starts or ends a tick schedule. Scheduled
    /// work only acts while its captured epoch is still current.
    epoch: u64,
}

impl TimerInner {
    fn apply(&mut self, events: &[TimerEvent]) {
        for record in events.iter().filter_map(TimerEvent::record) {
            self.ledger.record(record.clone());
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.machine.phase(),
            remaining_time: self.machine.remaining_time(),
            preparation_remaining: self.machine.preparation_remaining(),
            progress_percent: self.machine.progress_percent(),
            config: *self.machine.config(),
        }
    }
}

/// Drives a [`SessionMachine`] from a one-second tokio schedule and publishes
/// its events.
#[derive(Clone)]
pub struct TimerController {
    inner: Arc<Mutex<TimerInner>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    events: EventBus,
    tick_interval: Duration,
    completion_hold: Duration,
    log_every_ticks: u32,
}

impl TimerController {
    pub fn new(config: SessionConfig, stop_policy: StopPolicy) -> CoreResult<Self> {
        config.validate()?;

        let debug_mode = std::env::var("STILLNESS_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            inner: Arc::new(Mutex::new(TimerInner {
                machine: SessionMachine::new(config, stop_policy),
                ledger: ProgressLedger::new(),
                epoch: 0,
            })),
            ticker: Arc::new(Mutex::new(None)),
            events: EventBus::new(),
            tick_interval: Duration::from_secs(1),
            completion_hold: COMPLETION_HOLD,
            log_every_ticks: if debug_mode { 1 } else { 60 },
        })
    }

    pub fn subscribe(&self) -> UnboundedReceiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.machine.phase()
    }

    pub async fn config(&self) -> SessionConfig {
        *self.inner.lock().await.machine.config()
    }

    pub async fn progress(&self) -> ProgressSnapshot {
        self.inner.lock().await.ledger.snapshot()
    }

    pub async fn configure(&self, config: SessionConfig) -> CoreResult<()> {
        self.inner.lock().await.machine.configure(config)
    }

    pub async fn set_total_duration(&self, seconds: u32) -> CoreResult<()> {
        self.inner.lock().await.machine.set_total_duration(seconds)
    }

    /// Starts a fresh session or resumes a paused one.
    pub async fn start(&self) -> CoreResult<SessionPhase> {
        let mut guard = self.inner.lock().await;
        let events = guard.machine.start()?;
        guard.epoch += 1;
        let epoch = guard.epoch;
        let phase = guard.machine.phase();
        self.events.publish(&events);
        log_info!(
            "session {} with {}s remaining",
            phase.as_str().to_lowercase(),
            guard.machine.remaining_time()
        );

        let handle = self.spawn_ticker(epoch);
        self.replace_ticker(Some(handle)).await;
        Ok(phase)
    }

    pub async fn resume(&self) -> CoreResult<SessionPhase> {
        {
            let guard = self.inner.lock().await;
            let phase = guard.machine.phase();
            if phase != SessionPhase::Paused {
                return Err(CoreError::IllegalTransition {
                    command: "resume",
                    phase,
                });
            }
        }
        self.start().await
    }

    pub async fn pause(&self) -> CoreResult<()> {
        let mut guard = self.inner.lock().await;
        let events = guard.machine.pause()?;
        guard.epoch += 1;
        self.events.publish(&events);
        log_info!("session paused at {}s", guard.machine.remaining_time());

        // Still under `inner`: a concurrent start cannot install its ticker
        // until this one is gone.
        self.replace_ticker(None).await;
        Ok(())
    }

    /// Abandons the current session. Safe to call in any phase.
    pub async fn stop(&self) -> CoreResult<()> {
        let mut guard = self.inner.lock().await;
        let events = guard.machine.stop()?;
        if !events.is_empty() {
            guard.epoch += 1;
            guard.apply(&events);
            self.events.publish(&events);
            log_info!("session stopped");
        }
        self.replace_ticker(None).await;
        Ok(())
    }

    /// Skips the rest of the completion hold.
    pub async fn dismiss(&self) {
        let mut guard = self.inner.lock().await;
        let events = guard.machine.dismiss();
        if !events.is_empty() {
            guard.epoch += 1;
            self.events.publish(&events);
        }
    }

    fn spawn_ticker(&self, epoch: u64) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let events = self.events.clone();
        let period = self.tick_interval;
        let hold = self.completion_hold;
        let log_every = self.log_every_ticks;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut ticks: u32 = 0;

            loop {
                interval.tick().await;

                let mut guard = inner.lock().await;
                if guard.epoch != epoch {
                    break;
                }

                let tick_events = guard.machine.tick();
                guard.apply(&tick_events);
                events.publish(&tick_events);

                ticks = ticks.wrapping_add(1);
                if ticks % log_every == 0 {
                    log_debug!(
                        "tick {} phase={} remaining={}s",
                        ticks,
                        guard.machine.phase().as_str(),
                        guard.machine.remaining_time()
                    );
                }

                match guard.machine.phase() {
                    SessionPhase::Completed => {
                        log_info!(
                            "session completed; ledger holds {} sessions",
                            guard.ledger.total_sessions()
                        );
                        schedule_reset(inner.clone(), events.clone(), epoch, hold);
                        break;
                    }
                    phase if !phase.is_ticking() => break,
                    _ => {}
                }
            }
        })
    }

    async fn replace_ticker(&self, next: Option<JoinHandle<()>>) {
        let mut ticker = self.ticker.lock().await;
        if let Some(previous) = ticker.take() {
            previous.abort();
        }
        *ticker = next;
    }
}

fn schedule_reset(inner: Arc<Mutex<TimerInner>>, events: EventBus, epoch: u64, hold: Duration) {
    tokio::spawn(async move {
        time::sleep(hold).await;
        let mut guard = inner.lock().await;
        if guard.epoch != epoch {
            return;
        }
        let reset = guard.machine.dismiss();
        events.publish(&reset);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_pause_and_resume_always_leave_a_live_ticker() {
        let mut timer =
            TimerController::new(SessionConfig::new(1_000_000), StopPolicy::default()).unwrap();
        timer.tick_interval = Duration::from_millis(1);
        timer.start().await.unwrap();

        for _ in 0..100 {
            let pausing = tokio::spawn({
                let timer = timer.clone();
                async move { timer.pause().await }
            });
            let resuming = tokio::spawn({
                let timer = timer.clone();
                async move { timer.resume().await }
            });
            let _ = pausing.await.unwrap();
            let _ = resuming.await.unwrap();
            if timer.phase().await == SessionPhase::Paused {
                timer.resume().await.unwrap();
            }

            assert_eq!(timer.phase().await, SessionPhase::Running);
            let before = timer.snapshot().await.remaining_time;
            time::sleep(Duration::from_millis(20)).await;
            assert!(
                timer.snapshot().await.remaining_time < before,
                "running session stopped ticking at {before}s"
            );
        }
    }
}
