use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::ledger::SessionRecord;

use super::SessionPhase;

/// Notifications published by the session timer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TimerEvent {
    Tick {
        remaining_time: u32,
        progress_percent: f64,
    },
    PreparationTick {
        remaining: u32,
    },
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    Bell,
    IntervalBell,
    Paused,
    Completed {
        record: Option<SessionRecord>,
    },
    Stopped {
        record: Option<SessionRecord>,
    },
    /// The timer returned to Idle after a completed session.
    Reset,
}

impl TimerEvent {
    /// The session record carried by this event, if any.
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            TimerEvent::Completed { record } | TimerEvent::Stopped { record } => record.as_ref(),
            _ => None,
        }
    }
}

/// Fan-out of timer events to any number of observers.
///
/// Each subscriber gets its own unbounded queue so a slow consumer never
/// drops ticks. Subscribers whose receiver was dropped are pruned on publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<UnboundedSender<TimerEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<TimerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, events: &[TimerEvent]) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let tick = TimerEvent::Tick {
            remaining_time: 42,
            progress_percent: 30.0,
        };
        let json = serde_json::to_value(&tick).unwrap();
        assert_eq!(json["type"], "tick");
        assert_eq!(json["remainingTime"], 42);
        assert_eq!(json["progressPercent"], 30.0);

        let changed = TimerEvent::PhaseChanged {
            from: SessionPhase::Idle,
            to: SessionPhase::Running,
        };
        let json = serde_json::to_value(&changed).unwrap();
        assert_eq!(json["type"], "phaseChanged");
        assert_eq!(json["to"], "running");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let mut kept = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        bus.publish(&[TimerEvent::Bell]);

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), TimerEvent::Bell);
    }
}
