//! Append-only JSON lines log of state events.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::state_machine::{EventRecord, EventSink};

/// Writes one [`EventRecord`] per line to a file opened in append mode.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn record(&self, record: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{EventData, MachineControl, Phase};
    use uuid::Uuid;

    #[test]
    fn appends_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/state.jsonl");
        let sink = JsonLinesSink::open(&path).unwrap();
        let control = MachineControl::default();
        let event = EventData {
            event: "park",
            source: "ready",
            dest: "parking",
            control: &control,
        };
        let run_id = Uuid::new_v4();

        sink.record(&EventRecord::new(run_id, Phase::Before, &event)).unwrap();
        sink.record(&EventRecord::new(run_id, Phase::After, &event)).unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let records: Vec<EventRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, "ready");
        assert_eq!(records[1].phase, Phase::After);
        assert_eq!(records[1].run_id, run_id);
    }

    #[test]
    fn reopening_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.jsonl");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();

        let sink = JsonLinesSink::open(&path).unwrap();
        let control = MachineControl::default();
        let event = EventData {
            event: "get_ready",
            source: "sleeping",
            dest: "ready",
            control: &control,
        };
        sink.record(&EventRecord::new(Uuid::new_v4(), Phase::After, &event)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("{\"existing\":true}"));
    }
}
