//! Indexing job control plane
//!
//! A process-wide registry keyed by repository name. Each accepted start
//! spawns one background worker running the indexing pipeline and a
//! supervisor that records the terminal transition, including worker
//! panics. Live progress flows over a watch channel owned by the worker
//! and sampled on status reads.

use crate::error::{Error, Result};
use crate::indexer::Indexer;
use crate::providers::vector_store::VectorStore;
use crate::repo::sanitize_repo_name;
use crate::types::{Filter, Progress, Summary};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one repository's indexing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Indexing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Indexing)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Indexing => "indexing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of asking the registry to start a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    AlreadyRunning,
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub repo_name: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

struct Job {
    state: JobState,
    progress: watch::Receiver<Progress>,
    cancel: CancellationToken,
    summary: Option<Summary>,
}

pub struct JobRegistry {
    jobs: Arc<DashMap<String, Job>>,
    indexer: Arc<Indexer>,
    store: Arc<dyn VectorStore>,
}

impl JobRegistry {
    pub fn new(indexer: Arc<Indexer>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            indexer,
            store,
        }
    }

    /// Start indexing a repository; at most one non-terminal job may
    /// exist per name
    pub fn start(&self, url: &str, repo_name: &str) -> Result<StartOutcome> {
        if url.trim().is_empty() {
            return Err(Error::invalid_argument("repository url must not be blank"));
        }
        if repo_name.trim().is_empty() {
            return Err(Error::invalid_argument("repository name must not be blank"));
        }
        let name = sanitize_repo_name(repo_name.trim());

        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        let cancel = CancellationToken::new();
        let job = Job {
            state: JobState::Indexing,
            progress: progress_rx,
            cancel: cancel.clone(),
            summary: None,
        };

        match self.jobs.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if !entry.get().state.is_terminal() {
                    return Ok(StartOutcome::AlreadyRunning);
                }
                entry.insert(job);
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(job);
            }
        }
        self.spawn_worker(name, url.to_string(), progress_tx, cancel);
        Ok(StartOutcome::Accepted)
    }

    fn spawn_worker(
        &self,
        name: String,
        url: String,
        progress: watch::Sender<Progress>,
        cancel: CancellationToken,
    ) {
        let indexer = self.indexer.clone();
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let worker = {
                let indexer = indexer.clone();
                let name = name.clone();
                let url = url.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { indexer.index(&url, &name, &progress, &cancel).await })
            };

            let outcome = worker.await;
            let last_progress = jobs
                .get(&name)
                .map(|job| job.progress.borrow().clone())
                .unwrap_or_default();
            let (state, summary) = match outcome {
                Ok(Ok(summary)) => (JobState::Completed, summary),
                Ok(Err(Error::Cancelled)) => {
                    tracing::info!(repo = %name, "indexing cancelled");
                    (
                        JobState::Cancelled,
                        partial_summary(&last_progress, "cancelled"),
                    )
                }
                Ok(Err(e)) => {
                    tracing::error!(repo = %name, error = %e, "indexing failed");
                    (JobState::Failed, partial_summary(&last_progress, &e.to_string()))
                }
                Err(join_err) => {
                    tracing::error!(repo = %name, error = %join_err, "indexing worker fault");
                    (
                        JobState::Failed,
                        partial_summary(&last_progress, &format!("worker fault: {join_err}")),
                    )
                }
            };
            if let Some(mut job) = jobs.get_mut(&name) {
                job.state = state;
                job.summary = Some(summary);
            }
        });
    }

    /// Current state of a job; live progress only while indexing
    pub fn status(&self, repo_name: &str) -> Option<JobStatus> {
        let name = sanitize_repo_name(repo_name.trim());
        self.jobs.get(&name).map(|job| JobStatus {
            repo_name: name.clone(),
            state: job.state,
            progress: (job.state == JobState::Indexing).then(|| job.progress.borrow().clone()),
            summary: job.summary.clone(),
        })
    }

    /// Signal cancellation of a running job; idempotent once signaled
    pub fn cancel(&self, repo_name: &str) -> Result<()> {
        let name = sanitize_repo_name(repo_name.trim());
        match self.jobs.get(&name) {
            Some(job) if job.state == JobState::Indexing => {
                job.cancel.cancel();
                Ok(())
            }
            _ => Err(Error::not_found(format!("no running job for '{name}'"))),
        }
    }

    /// Remove a terminal job and purge its stored vectors
    pub async fn delete(&self, repo_name: &str) -> Result<()> {
        let name = sanitize_repo_name(repo_name.trim());
        let removed = self
            .jobs
            .remove_if(&name, |_, job| job.state.is_terminal());
        if removed.is_none() {
            return if self.jobs.contains_key(&name) {
                Err(Error::conflict(format!(
                    "repository '{name}' is being indexed"
                )))
            } else {
                Err(Error::not_found(format!("no job for '{name}'")))
            };
        }
        let filter = Filter::from([("repo_name".to_string(), name.clone())]);
        if let Err(e) = self.store.delete_by_filter(&filter).await {
            tracing::warn!(repo = %name, error = %e, "failed to purge stored vectors");
        }
        Ok(())
    }

    /// All known jobs
    pub fn list(&self) -> Vec<JobStatus> {
        let mut statuses: Vec<JobStatus> = self
            .jobs
            .iter()
            .map(|entry| {
                let job = entry.value();
                JobStatus {
                    repo_name: entry.key().clone(),
                    state: job.state,
                    progress: (job.state == JobState::Indexing)
                        .then(|| job.progress.borrow().clone()),
                    summary: job.summary.clone(),
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.repo_name.cmp(&b.repo_name));
        statuses
    }
}

fn partial_summary(progress: &Progress, error: &str) -> Summary {
    let mut errors = progress.errors.clone();
    errors.push(error.to_string());
    Summary {
        files_processed: progress.processed_files,
        chunks_indexed: 0,
        duration_ms: 0,
        errors,
    }
}
