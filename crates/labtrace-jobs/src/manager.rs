use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, instrument};

use labtrace_core::types::JobId;

use crate::types::{JobProgress, JobSnapshot, JobStatus};

struct JobState {
    status: JobStatus,
    progress: JobProgress,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

struct JobEntry {
    id: JobId,
    state: Mutex<JobState>,
}

/// In-process registry of background task descriptors. Lookup returns
/// `None` for unknown or TTL-expired ids, never an error — jobs are
/// advisory progress records, not a durable work queue.
pub struct JobManager {
    jobs: DashMap<JobId, Arc<JobEntry>>,
    ttl_secs: i64,
}

impl JobManager {
    pub fn new(ttl_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            jobs: DashMap::new(),
            ttl_secs: ttl_secs as i64,
        })
    }

    #[instrument(skip(self))]
    pub fn create(&self) -> JobId {
        let id = JobId::new();
        let now = Utc::now();
        self.jobs.insert(
            id,
            Arc::new(JobEntry {
                id,
                state: Mutex::new(JobState {
                    status: JobStatus::Pending,
                    progress: JobProgress::new(0, "queued"),
                    result: None,
                    error: None,
                    created_at: now,
                    updated_at: now,
                }),
            }),
        );
        id
    }

    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        let entry = self.jobs.get(&id)?;
        let state = entry.state.lock().expect("lock poisoned");
        Some(JobSnapshot {
            id: entry.id,
            status: state.status,
            progress: state.progress.clone(),
            result: state.result.clone(),
            error: state.error.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// Update progress. No-op if the job is already terminal or unknown.
    pub fn report_progress(&self, id: JobId, progress: JobProgress) {
        if let Some(entry) = self.jobs.get(&id) {
            let mut state = entry.state.lock().expect("lock poisoned");
            if state.status.is_terminal() {
                return;
            }
            state.status = JobStatus::Processing;
            state.progress = progress;
            state.updated_at = Utc::now();
        }
    }

    /// Transition to `Completed`. Ignored (guard) if the job is already
    /// terminal — prevents a late async completion from clobbering a
    /// failure recorded by a faster-failing concurrent path.
    #[instrument(skip(self, result))]
    pub fn complete(&self, id: JobId, result: serde_json::Value) {
        if let Some(entry) = self.jobs.get(&id) {
            let mut state = entry.state.lock().expect("lock poisoned");
            if state.status.is_terminal() {
                debug!(job_id = %id, "ignoring completion for already-terminal job");
                return;
            }
            state.status = JobStatus::Completed;
            state.progress = JobProgress::new(100, "completed");
            state.result = Some(result);
            state.updated_at = Utc::now();
        }
    }

    #[instrument(skip(self))]
    pub fn fail(&self, id: JobId, error: impl Into<String>) {
        if let Some(entry) = self.jobs.get(&id) {
            let mut state = entry.state.lock().expect("lock poisoned");
            if state.status.is_terminal() {
                debug!(job_id = %id, "ignoring failure for already-terminal job");
                return;
            }
            state.status = JobStatus::Failed;
            state.error = Some(error.into());
            state.updated_at = Utc::now();
        }
    }

    fn reap_expired(&self) {
        let now = Utc::now();
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|e| {
                let state = e.value().state.lock().expect("lock poisoned");
                state.status.is_terminal()
                    && (now - state.updated_at).num_seconds() >= self.ttl_secs
            })
            .map(|e| *e.key())
            .collect();

        for id in expired {
            self.jobs.remove(&id);
        }
    }

    pub fn spawn_reaper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                self.reap_expired();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_job_returns_none() {
        let mgr = JobManager::new(3600);
        assert!(mgr.snapshot(JobId::new()).is_none());
    }

    #[test]
    fn terminal_state_is_monotonic() {
        let mgr = JobManager::new(3600);
        let id = mgr.create();
        mgr.fail(id, "boom");
        mgr.complete(id, serde_json::json!({"ok": true}));

        let snap = mgr.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error.is_some());
        assert!(snap.result.is_none());
    }

    #[test]
    fn progress_reports_are_ignored_once_terminal() {
        let mgr = JobManager::new(3600);
        let id = mgr.create();
        mgr.complete(id, serde_json::json!({"ok": true}));
        mgr.report_progress(id, JobProgress::new(50, "still going?"));

        let snap = mgr.snapshot(id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress.percentage, 100);
    }
}
