//! Seams for the engine's external collaborators.
//!
//! None of these may abort a transition: the engine logs their errors and
//! carries on.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventData;
use super::transition::TransitionTable;

/// Observes every transition, before its conditions and after it completes.
pub trait TransitionObserver: Send + Sync {
    fn before_state(&self, _event: &EventData<'_>) -> Result<()> {
        Ok(())
    }

    fn after_state(&self, _event: &EventData<'_>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Before,
    After,
}

/// One entry in the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    /// Source state before the transition, destination after it.
    pub state: String,
    pub event: String,
}

impl EventRecord {
    pub fn new(run_id: Uuid, phase: Phase, event: &EventData<'_>) -> Self {
        let state = match phase {
            Phase::Before => event.source,
            Phase::After => event.dest,
        };
        Self {
            run_id,
            timestamp: Utc::now(),
            phase,
            state: state.to_string(),
            event: event.event.to_string(),
        }
    }
}

/// Append-only persistence of transition events.
pub trait EventSink: Send + Sync {
    fn record(&self, record: &EventRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _record: &EventRecord) -> Result<()> {
        Ok(())
    }
}

/// Produces a visual artifact for the latest transition.
pub trait DiagramRenderer: Send + Sync {
    fn render(&self, table: &TransitionTable, event: &str, state: &str) -> Result<()>;
}

/// Refreshes whatever status display the application keeps.
pub trait StatusReporter: Send + Sync {
    fn status(&self, state: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MachineControl;

    #[test]
    fn record_state_follows_phase() {
        let control = MachineControl::default();
        let event = EventData {
            event: "park",
            source: "ready",
            dest: "parking",
            control: &control,
        };
        let run_id = Uuid::new_v4();

        assert_eq!(EventRecord::new(run_id, Phase::Before, &event).state, "ready");
        let after = EventRecord::new(run_id, Phase::After, &event);
        assert_eq!(after.state, "parking");
        assert_eq!(after.event, "park");
    }

    #[test]
    fn record_serializes_phase_lowercase() {
        let control = MachineControl::default();
        let event = EventData {
            event: "park",
            source: "ready",
            dest: "parking",
            control: &control,
        };
        let record = EventRecord::new(Uuid::new_v4(), Phase::After, &event);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["phase"], "after");
        assert_eq!(json["state"], "parking");
    }
}
