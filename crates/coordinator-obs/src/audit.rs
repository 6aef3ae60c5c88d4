//! The two on-disk audit artifacts described in the protocol's error and
//! observability taxonomy: `process-log.jsonl` (one line per lifecycle
//! event) and `runtime-services.jsonl` (periodic worker liveness
//! snapshots). Both are plain append-only JSON-lines files, following the
//! same "just append, let `sled`/the filesystem own durability" philosophy
//! the teacher applies to its own receipt log.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    #[error("failed to open audit log {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },
    #[error("failed to write audit log entry: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to serialize audit log entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One line of `process-log.jsonl`: a discrete lifecycle event. Kept as
/// free-form `worker`/`detail` fields rather than a closed enum so new
/// event kinds don't require touching this crate.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessLogEntry {
    pub ts: i64,
    pub worker: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ProcessLogEntry {
    pub fn new(worker: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            ts: Utc::now().timestamp(),
            worker: worker.into(),
            event: event.into(),
            scope_key: None,
            cycle_id: None,
            detail: None,
        }
    }

    pub fn with_scope(mut self, scope_key: impl Into<String>) -> Self {
        self.scope_key = Some(scope_key.into());
        self
    }

    pub fn with_cycle(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle_id = Some(cycle_id.into());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// One line of `runtime-services.jsonl`: a worker's heartbeat snapshot,
/// written by a background flusher task rather than inline on every tick.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeServiceSnapshot {
    pub ts: i64,
    pub worker: String,
    pub alive: bool,
    pub last_cycle_id: Option<String>,
    pub consecutive_failures: u32,
}

struct AppendOnlyFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl AppendOnlyFile {
    fn open(path: &Path) -> Result<Self, AuditLogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditLogError::Open { path: path.to_path_buf(), source })?;
        Ok(Self { path: path.to_path_buf(), file: Mutex::new(file) })
    }

    fn append_json<T: Serialize>(&self, entry: &T) -> Result<(), AuditLogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        Ok(())
    }
}

/// Handle to the lifecycle-event log (`process-log.jsonl`).
pub struct ProcessLog(AppendOnlyFile);

impl ProcessLog {
    pub fn open(dir: &Path) -> Result<Self, AuditLogError> {
        Ok(Self(AppendOnlyFile::open(&dir.join("process-log.jsonl"))?))
    }

    pub fn append(&self, entry: ProcessLogEntry) -> Result<(), AuditLogError> {
        self.0.append_json(&entry)
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }
}

/// Handle to the periodic liveness log (`runtime-services.jsonl`).
pub struct RuntimeServiceLog(AppendOnlyFile);

impl RuntimeServiceLog {
    pub fn open(dir: &Path) -> Result<Self, AuditLogError> {
        Ok(Self(AppendOnlyFile::open(&dir.join("runtime-services.jsonl"))?))
    }

    pub fn append(&self, snapshot: RuntimeServiceSnapshot) -> Result<(), AuditLogError> {
        self.0.append_json(&snapshot)
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_log_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProcessLog::open(dir.path()).unwrap();
        log.append(ProcessLogEntry::new("feed", "worker_started")).unwrap();
        log.append(ProcessLogEntry::new("feed", "cycle_begin").with_scope("BTC/1m").with_cycle("c1")).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("cycle_begin"));
    }

    #[test]
    fn runtime_service_log_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let log = RuntimeServiceLog::open(dir.path()).unwrap();
        log.append(RuntimeServiceSnapshot {
            ts: 0,
            worker: "score".into(),
            alive: true,
            last_cycle_id: Some("c1".into()),
            consecutive_failures: 0,
        })
        .unwrap();
        let contents = std::fs::read_to_string(log.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["worker"], "score");
    }
}
