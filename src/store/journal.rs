//! Append-only transition journal.
//!
//! Every state-machine transition is appended here *before* it is applied in
//! memory or acknowledged to the caller. One JSON-lines file per workflow
//! instance under `<state>/journal/`; each line is a [`TransitionRecord`]
//! whose `seq` must be exactly one past the previous line. Appends are
//! flushed and fsynced before returning, so an acknowledged transition is
//! durable even across a crash.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::templates::schema::StepLink;
use crate::variance::Gap;

/// A single state-machine transition, as recorded durably
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// 1-based position in the instance's journal
    pub seq: u64,
    pub instance_id: Uuid,
    /// Wall-clock time of the transition; all session timestamps derive from
    /// these values on replay
    pub at: DateTime<Utc>,
    pub event: TransitionEvent,
}

/// The transition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionEvent {
    /// Instance created and first step opened
    Started {
        template_id: Uuid,
        ticket_id: String,
        owner_id: String,
    },
    /// Workflow and its open session paused
    Paused,
    /// Workflow and its open session resumed
    Resumed,
    /// Current step finished; facts are recorded as computed at commit time
    StepCompleted {
        step_index: usize,
        notes: Option<String>,
        #[serde(default)]
        links: Vec<StepLink>,
        actual_seconds: i64,
        gap: Gap,
    },
    /// Current step skipped; time is still recorded, no gap is classified
    StepSkipped {
        step_index: usize,
        actual_seconds: i64,
    },
    /// Instance cancelled; any open session was finalized
    Cancelled,
}

/// File-backed journal with per-instance sequence tracking
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    last_seq: Mutex<HashMap<Uuid, u64>>,
}

impl Journal {
    /// Open (and create if needed) a journal directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            last_seq: Mutex::new(HashMap::new()),
        })
    }

    fn instance_path(&self, instance_id: Uuid) -> PathBuf {
        self.dir.join(format!("{instance_id}.jsonl"))
    }

    /// Append one record, enforcing the sequence contract.
    ///
    /// The record only becomes visible to recovery once this returns `Ok`;
    /// a sequence mismatch means a concurrent writer got there first and is
    /// reported as `Conflict` without touching the file.
    pub fn append(&self, record: &TransitionRecord) -> Result<(), EngineError> {
        let mut seqs = self
            .last_seq
            .lock()
            .map_err(|_| EngineError::Storage("journal lock poisoned".to_string()))?;

        let last = seqs.get(&record.instance_id).copied().unwrap_or(0);
        if record.seq != last + 1 {
            return Err(EngineError::Conflict(format!(
                "journal sequence mismatch for {}: expected {}, got {}",
                record.instance_id,
                last + 1,
                record.seq
            )));
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.instance_path(record.instance_id))?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;

        seqs.insert(record.instance_id, record.seq);
        Ok(())
    }

    /// Load every instance's records, in sequence order.
    ///
    /// Also primes the sequence tracker, so appends after recovery continue
    /// where the journal left off.
    pub fn load_all(&self) -> Result<Vec<(Uuid, Vec<TransitionRecord>)>, EngineError> {
        let mut result = Vec::new();

        if !self.dir.exists() {
            return Ok(result);
        }

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() || path.extension().is_none_or(|e| e != "jsonl") {
                continue;
            }

            let records = Self::read_instance_file(&path)?;
            let Some(first) = records.first() else {
                continue;
            };
            let instance_id = first.instance_id;

            let mut seqs = self
                .last_seq
                .lock()
                .map_err(|_| EngineError::Storage("journal lock poisoned".to_string()))?;
            if let Some(last) = records.last() {
                seqs.insert(instance_id, last.seq);
            }
            drop(seqs);

            result.push((instance_id, records));
        }

        Ok(result)
    }

    fn read_instance_file(path: &Path) -> Result<Vec<TransitionRecord>, EngineError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut records: Vec<TransitionRecord> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TransitionRecord = serde_json::from_str(&line).map_err(|e| {
                EngineError::Storage(format!("corrupt journal {}: {}", path.display(), e))
            })?;

            let expected = records.last().map_or(1, |r: &TransitionRecord| r.seq + 1);
            if record.seq != expected {
                return Err(EngineError::Storage(format!(
                    "journal {} out of sequence: expected {}, got {}",
                    path.display(),
                    expected,
                    record.seq
                )));
            }
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(instance_id: Uuid, seq: u64, event: TransitionEvent) -> TransitionRecord {
        TransitionRecord {
            seq,
            instance_id,
            at: Utc::now(),
            event,
        }
    }

    fn started(instance_id: Uuid, seq: u64) -> TransitionRecord {
        record(
            instance_id,
            seq,
            TransitionEvent::Started {
                template_id: Uuid::new_v4(),
                ticket_id: "PROJ-1".to_string(),
                owner_id: "dana".to_string(),
            },
        )
    }

    #[test]
    fn test_append_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path()).unwrap();
        let id = Uuid::new_v4();

        journal.append(&started(id, 1)).unwrap();
        journal
            .append(&record(id, 2, TransitionEvent::Paused))
            .unwrap();
        journal
            .append(&record(id, 3, TransitionEvent::Resumed))
            .unwrap();

        let loaded = journal.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        let (loaded_id, records) = &loaded[0];
        assert_eq!(*loaded_id, id);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[1].event, TransitionEvent::Paused));
    }

    #[test]
    fn test_sequence_gap_is_conflict() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path()).unwrap();
        let id = Uuid::new_v4();

        journal.append(&started(id, 1)).unwrap();
        let err = journal
            .append(&record(id, 3, TransitionEvent::Paused))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn test_duplicate_seq_is_conflict() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path()).unwrap();
        let id = Uuid::new_v4();

        journal.append(&started(id, 1)).unwrap();
        let err = journal
            .append(&record(id, 1, TransitionEvent::Paused))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn test_instances_have_independent_sequences() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path()).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        journal.append(&started(a, 1)).unwrap();
        journal.append(&started(b, 1)).unwrap();
        journal.append(&record(a, 2, TransitionEvent::Paused)).unwrap();

        let loaded = journal.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let temp = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        {
            let journal = Journal::open(temp.path()).unwrap();
            journal.append(&started(id, 1)).unwrap();
        }

        let journal = Journal::open(temp.path()).unwrap();
        // Sequence tracker is primed by load_all
        journal.load_all().unwrap();

        let err = journal
            .append(&record(id, 1, TransitionEvent::Paused))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        journal
            .append(&record(id, 2, TransitionEvent::Paused))
            .unwrap();
    }

    #[test]
    fn test_corrupt_line_is_storage_error() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::open(temp.path()).unwrap();
        let id = Uuid::new_v4();
        journal.append(&started(id, 1)).unwrap();

        // Corrupt the file by hand
        let path = temp.path().join(format!("{id}.jsonl"));
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("{ definitely not json\n");
        fs::write(&path, contents).unwrap();

        let err = journal.load_all().unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
    }
}
