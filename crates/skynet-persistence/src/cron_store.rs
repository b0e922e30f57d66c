use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skynet_core::types::{CronJob, RunRecord};
use tracing::instrument;

use crate::atomic::{read_json_opt, write_json_atomic};
use crate::error::Result;

const JOBS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JobsFile {
    version: u32,
    jobs: Vec<CronJob>,
}

/// Whole-catalog read/write for `cron/jobs.json`, and a bounded
/// append-only run-history log per job under `cron/runs/<jobId>.log`
/// on top of the same write-to-temp-then-rename discipline.
pub struct CronStore {
    jobs_path: PathBuf,
    runs_dir: PathBuf,
    run_history_len: usize,
}

impl CronStore {
    pub fn new(root: impl Into<PathBuf>, run_history_len: usize) -> Self {
        let root = root.into();
        Self {
            jobs_path: root.join("cron").join("jobs.json"),
            runs_dir: root.join("cron").join("runs"),
            run_history_len,
        }
    }

    /// Corruption of the cron store is FATAL at startup.
    #[instrument(skip(self))]
    pub fn load_jobs(&self) -> Result<HashMap<String, CronJob>> {
        let file: JobsFile = match read_json_opt(&self.jobs_path)? {
            Some(f) => f,
            None => return Ok(HashMap::new()),
        };
        Ok(file.jobs.into_iter().map(|j| (j.id.clone(), j)).collect())
    }

    #[instrument(skip(self, jobs))]
    pub fn save_jobs(&self, jobs: &HashMap<String, CronJob>) -> Result<()> {
        let file = JobsFile {
            version: JOBS_VERSION,
            jobs: jobs.values().cloned().collect(),
        };
        write_json_atomic(&self.jobs_path, &file)
    }

    fn runs_path(&self, job_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{job_id}.log"))
    }

    /// Append one `RunRecord`, trimming the log to the last
    /// `run_history_len` entries. Rewritten atomically — this is a small
    /// bounded file, not an append-only stream.
    #[instrument(skip(self, record), fields(job_id = %record.job_id))]
    pub fn append_run(&self, record: RunRecord) -> Result<()> {
        let path = self.runs_path(&record.job_id);
        let mut existing: Vec<RunRecord> = read_json_opt(&path)?.unwrap_or_default();
        existing.push(record);
        if existing.len() > self.run_history_len {
            let excess = existing.len() - self.run_history_len;
            existing.drain(0..excess);
        }
        write_json_atomic(&path, &existing)
    }

    #[instrument(skip(self))]
    pub fn load_runs(&self, job_id: &str) -> Result<Vec<RunRecord>> {
        Ok(read_json_opt(&self.runs_path(job_id))?.unwrap_or_default())
    }

    /// Delete a job's run-history log (called when a job is removed).
    pub fn remove_runs(&self, job_id: &str) -> Result<()> {
        let path = self.runs_path(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::{CronPayload, CronSchedule, JobState, JobTarget, RunAction, RunStatus, WakeMode};

    fn job(id: &str) -> CronJob {
        CronJob {
            id: id.to_string(),
            name: "test".to_string(),
            enabled: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            schedule: CronSchedule::At { at_ms: 1000 },
            target: JobTarget::Main,
            wake_mode: WakeMode::NextHeartbeat,
            payload: CronPayload::SystemEvent { text: "hi".to_string() },
            delete_after_run: false,
            state: JobState::default(),
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CronStore::new(dir.path(), 50);
        let mut jobs = HashMap::new();
        jobs.insert("j1".to_string(), job("j1"));
        store.save_jobs(&jobs).unwrap();

        let loaded = store.load_jobs().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("j1"));
    }

    #[test]
    fn run_history_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = CronStore::new(dir.path(), 3);
        for i in 0..5 {
            store
                .append_run(RunRecord {
                    job_id: "j1".to_string(),
                    action: RunAction::Finished,
                    status: Some(RunStatus::Ok),
                    ts_ms: i,
                    duration_ms: None,
                    summary: None,
                    error: None,
                })
                .unwrap();
        }
        let runs = store.load_runs("j1").unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].ts_ms, 2);
        assert_eq!(runs[2].ts_ms, 4);
    }
}
