use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::export::ResultLocator;

/// Lifecycle of the single scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Point-in-time copy of the job state, safe to hand to pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub log: Vec<String>,
    pub result: Option<ResultLocator>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct JobState {
    job_id: Option<String>,
    status: JobStatus,
    log: Vec<String>,
    result: Option<ResultLocator>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn idle() -> Self {
        Self {
            job_id: None,
            status: JobStatus::Idle,
            log: Vec::new(),
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn running(job_id: String) -> Self {
        Self {
            job_id: Some(job_id),
            status: JobStatus::Running,
            started_at: Some(Utc::now()),
            ..Self::idle()
        }
    }

    fn is_running(&self, job_id: &str) -> bool {
        self.status == JobStatus::Running && self.job_id.as_deref() == Some(job_id)
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            log: self.log.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Result of a submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { job_id: String },
    AlreadyRunning,
}

/// Receives the human-readable progress of a job and its final outcome
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn log(&self, line: String);
    async fn complete(&self, result: ResultLocator, line: String);
    async fn fail(&self, summary: String);
}

/// Owner of the one shared [`JobState`]. Every mutation takes the same lock
/// for the whole state-and-log update.
#[derive(Clone)]
pub struct JobManager {
    state: Arc<Mutex<JobState>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(JobState::idle())),
        }
    }

    /// Start `job` unless one is already running.
    ///
    /// The check and the transition to Running happen under one lock, so
    /// concurrent callers see exactly one `Accepted`. A watcher task marks
    /// the job Failed if the worker panics or returns without finishing.
    pub async fn submit<F, Fut>(&self, job: F) -> SubmitOutcome
    where
        F: FnOnce(JobTracker) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_id = {
            let mut state = self.state.lock().await;
            if state.status == JobStatus::Running {
                return SubmitOutcome::AlreadyRunning;
            }
            let job_id = Uuid::new_v4().to_string();
            *state = JobState::running(job_id.clone());
            job_id
        };

        info!("Job {} accepted", job_id);

        let tracker = JobTracker {
            state: self.state.clone(),
            job_id: job_id.clone(),
        };
        let watcher = tracker.clone();

        let worker = tokio::spawn(job(tracker));
        tokio::spawn(async move {
            let summary = match worker.await {
                Ok(()) => "Worker exited without reporting an outcome".to_string(),
                Err(e) if e.is_panic() => "Worker panicked".to_string(),
                Err(e) => format!("Worker aborted: {}", e),
            };
            watcher.fail_if_running(summary).await;
        });

        SubmitOutcome::Accepted { job_id }
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        self.state.lock().await.snapshot()
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Write handle given to one job's worker. Updates from a job that is no
/// longer the running one are dropped.
#[derive(Clone)]
pub struct JobTracker {
    state: Arc<Mutex<JobState>>,
    job_id: String,
}

impl JobTracker {
    async fn fail_if_running(&self, summary: String) {
        let mut state = self.state.lock().await;
        if state.is_running(&self.job_id) {
            error!("Job {} ended abnormally: {}", self.job_id, summary);
            state.log.push(format!("[!] Scraping failed: {}", summary));
            state.status = JobStatus::Failed;
            state.error = Some(summary);
            state.finished_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl ProgressSink for JobTracker {
    async fn log(&self, line: String) {
        let mut state = self.state.lock().await;
        if state.is_running(&self.job_id) {
            info!("{}", line);
            state.log.push(line);
        } else {
            warn!("Dropping log line from stale job {}", self.job_id);
        }
    }

    async fn complete(&self, result: ResultLocator, line: String) {
        let mut state = self.state.lock().await;
        if state.is_running(&self.job_id) {
            info!("{}", line);
            state.log.push(line);
            state.status = JobStatus::Completed;
            state.result = Some(result);
            state.finished_at = Some(Utc::now());
        }
    }

    async fn fail(&self, summary: String) {
        self.fail_if_running(summary).await;
    }
}
