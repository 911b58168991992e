use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One finished (or abandoned) session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub completed_minutes: u32,
    pub completed_fully: bool,
}

impl SessionRecord {
    /// Builds a record for `elapsed_secs` of practice, or `None` when nothing
    /// rounds up to a minute.
    pub fn from_elapsed(elapsed_secs: u32, completed_fully: bool) -> Option<Self> {
        let completed_minutes = elapsed_secs.div_ceil(60);
        if completed_minutes == 0 {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            completed_minutes,
            completed_fully,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub current_streak: u32,
    pub sessions: Vec<SessionRecord>,
}

/// In-memory practice history. Lives as long as the app instance that owns it.
#[derive(Debug, Default)]
pub struct ProgressLedger {
    records: Vec<SessionRecord>,
    total_minutes: u32,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: SessionRecord) {
        self.total_minutes = self.total_minutes.saturating_add(record.completed_minutes);
        self.records.push(record);
    }

    pub fn total_sessions(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn total_minutes(&self) -> u32 {
        self.total_minutes
    }

    /// Every recorded session counts towards the streak.
    pub fn current_streak(&self) -> u32 {
        self.total_sessions()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_sessions: self.total_sessions(),
            total_minutes: self.total_minutes,
            current_streak: self.current_streak(),
            sessions: self.records.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_round_up() {
        assert!(SessionRecord::from_elapsed(0, false).is_none());
        assert_eq!(SessionRecord::from_elapsed(1, false).unwrap().completed_minutes, 1);
        assert_eq!(SessionRecord::from_elapsed(60, true).unwrap().completed_minutes, 1);
        assert_eq!(SessionRecord::from_elapsed(61, false).unwrap().completed_minutes, 2);
    }

    #[test]
    fn aggregates_follow_records() {
        let mut ledger = ProgressLedger::new();
        ledger.record(SessionRecord::from_elapsed(300, true).unwrap());
        ledger.record(SessionRecord::from_elapsed(90, false).unwrap());

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.total_sessions, 2);
        assert_eq!(snapshot.total_minutes, 7);
        assert_eq!(snapshot.current_streak, 2);
        assert!(!snapshot.sessions[1].completed_fully);
    }
}
