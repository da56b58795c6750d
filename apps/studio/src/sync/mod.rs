//! Synchronization bridge between the in-memory workspace and the document
//! store.
//!
//! Writes are fire-and-forget from the caller's point of view: every
//! mutation enqueues a full-document upsert, and a single worker drains the
//! queue, keeps only the newest write per document and retries failures with
//! exponential backoff. Local state is never rolled back. A failed write ends
//! up in `SyncStatus::failures` and the error log, and its document stays
//! unsynced until a later write for it succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::StoryboardError;
use crate::models::project::Project;
use crate::retry::RetryPolicy;
use crate::storage::{Document, DocumentStore};
use crate::workspace::Workspace;

pub const PROJECTS: &str = "projects";

const MAX_RECORDED_FAILURES: usize = 20;

#[derive(Debug, Clone, PartialEq)]
enum SyncJob {
    Upsert {
        collection: String,
        id: String,
        record: Value,
    },
    Remove {
        collection: String,
        id: String,
    },
}

impl SyncJob {
    fn collection(&self) -> &str {
        match self {
            SyncJob::Upsert { collection, .. } | SyncJob::Remove { collection, .. } => collection,
        }
    }

    fn id(&self) -> &str {
        match self {
            SyncJob::Upsert { id, .. } | SyncJob::Remove { id, .. } => id,
        }
    }

    fn key(&self) -> String {
        pending_key(self.collection(), self.id())
    }

    async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoryboardError> {
        match self {
            SyncJob::Upsert {
                collection,
                id,
                record,
            } => store.upsert(collection, id, record).await,
            SyncJob::Remove { collection, id } => store.remove(collection, id).await,
        }
    }
}

fn pending_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedWrite {
    pub collection: String,
    pub id: String,
    pub attempts: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Snapshot of the write queue, served at `/api/v1/sync/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Enqueued writes not yet flushed, keyed by `collection/id`.
    pub pending: BTreeMap<String, usize>,
    pub completed: u64,
    /// Writes superseded by a newer write to the same document.
    pub coalesced: u64,
    /// Documents whose last write failed permanently. Remote snapshots do
    /// not overwrite them.
    pub unsynced: BTreeSet<String>,
    /// Most recent permanent failures, oldest first.
    pub failures: Vec<FailedWrite>,
}

impl SyncStatus {
    fn settle(&mut self, key: &str, count: usize) {
        if let Some(remaining) = self.pending.get_mut(key) {
            *remaining = remaining.saturating_sub(count);
            if *remaining == 0 {
                self.pending.remove(key);
            }
        }
    }

    fn record_failure(&mut self, failure: FailedWrite) {
        self.failures.push(failure);
        if self.failures.len() > MAX_RECORDED_FAILURES {
            let excess = self.failures.len() - MAX_RECORDED_FAILURES;
            self.failures.drain(..excess);
        }
    }
}

/// Handle to the write queue. Cheap to clone.
#[derive(Clone)]
pub struct SyncBridge {
    tx: mpsc::UnboundedSender<SyncJob>,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl SyncBridge {
    /// Starts the queue worker against `store`.
    pub fn spawn(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(SyncStatus::default());
        let status = Arc::new(status);

        let worker = tokio::spawn(run_worker(store, policy, rx, Arc::clone(&status)));
        info!(
            "Sync bridge started (max {} attempts, base backoff {:?})",
            policy.max_attempts, policy.base_delay
        );
        (Self { tx, status }, worker)
    }

    /// Enqueues a full overwrite of the project's document.
    pub fn push_project(&self, project: &Project) -> Result<(), StoryboardError> {
        let record = serde_json::to_value(project)
            .map_err(|e| StoryboardError::Sync(format!("cannot encode project: {e}")))?;
        self.enqueue(SyncJob::Upsert {
            collection: PROJECTS.to_string(),
            id: project.id.clone(),
            record,
        })
    }

    pub fn remove_project(&self, project_id: &str) -> Result<(), StoryboardError> {
        self.enqueue(SyncJob::Remove {
            collection: PROJECTS.to_string(),
            id: project_id.to_string(),
        })
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    #[cfg(test)]
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// True while a local write to this document is queued or has failed
    /// without a later success.
    pub fn has_local_writes(&self, collection: &str, id: &str) -> bool {
        let key = pending_key(collection, id);
        let status = self.status.borrow();
        status.pending.contains_key(&key) || status.unsynced.contains(&key)
    }

    fn enqueue(&self, job: SyncJob) -> Result<(), StoryboardError> {
        let key = job.key();
        self.status.send_modify(|s| *s.pending.entry(key.clone()).or_default() += 1);
        self.tx.send(job).map_err(|_| {
            self.status.send_modify(|s| s.settle(&key, 1));
            error!("Sync worker is gone; dropping write for {key}");
            StoryboardError::Sync("sync worker stopped".to_string())
        })
    }
}

/// Keeps the newest job per document, in order of last submission, with the
/// number of submissions each one stands for.
fn coalesce(batch: Vec<SyncJob>) -> Vec<(SyncJob, usize)> {
    let mut slots: Vec<(SyncJob, usize)> = Vec::new();
    for job in batch {
        match slots.iter().position(|(queued, _)| queued.key() == job.key()) {
            Some(pos) => {
                let (_, count) = slots.remove(pos);
                slots.push((job, count + 1));
            }
            None => slots.push((job, 1)),
        }
    }
    slots
}

async fn run_worker(
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<SyncJob>,
    status: Arc<watch::Sender<SyncStatus>>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(job) = rx.try_recv() {
            batch.push(job);
        }

        for (job, count) in coalesce(batch) {
            let key = job.key();
            if count > 1 {
                debug!("Coalesced {} writes for {key}", count - 1);
            }
            let outcome = write_with_retry(store.as_ref(), &policy, &job).await;
            status.send_modify(|s| {
                s.settle(&key, count);
                s.coalesced += (count - 1) as u64;
                match outcome {
                    Ok(()) => {
                        s.completed += 1;
                        s.unsynced.remove(&key);
                    }
                    Err(err) => {
                        s.unsynced.insert(key.clone());
                        s.record_failure(FailedWrite {
                            collection: job.collection().to_string(),
                            id: job.id().to_string(),
                            attempts: policy.max_attempts,
                            error: err.to_string(),
                            failed_at: Utc::now(),
                        });
                    }
                }
            });
        }
    }
    info!("Sync queue closed; worker exiting");
}

async fn write_with_retry(
    store: &dyn DocumentStore,
    policy: &RetryPolicy,
    job: &SyncJob,
) -> Result<(), StoryboardError> {
    let key = job.key();
    let mut last_error = StoryboardError::Sync("no attempt made".to_string());

    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            warn!(
                "Retrying write for {key} in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt + 1,
                policy.max_attempts
            );
            tokio::time::sleep(delay).await;
        }

        match job.apply(store).await {
            Ok(()) => {
                debug!("Flushed {key}");
                return Ok(());
            }
            Err(e) => {
                warn!("Write for {key} failed: {e}");
                last_error = e;
            }
        }
    }

    error!(
        "Giving up on {key} after {} attempts: {last_error}",
        policy.max_attempts
    );
    Err(last_error)
}

fn decode_projects(documents: Vec<Document>) -> Vec<Project> {
    documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value::<Project>(doc.data) {
            Ok(project) => Some(project),
            Err(e) => {
                warn!("Skipping unreadable project document {}: {e}", doc.id);
                None
            }
        })
        .collect()
}

/// Initial load of every project document.
pub async fn hydrate(store: &dyn DocumentStore) -> Result<Vec<Project>, StoryboardError> {
    let documents = store.load_all(PROJECTS).await?;
    let total = documents.len();
    let projects = decode_projects(documents);
    info!("Hydrated {}/{total} project(s)", projects.len());
    Ok(projects)
}

/// Applies remote snapshots of the project collection as they arrive.
/// Projects with unflushed or failed local writes keep their local copy.
pub async fn spawn_subscription(
    store: &dyn DocumentStore,
    workspace: Arc<Mutex<Workspace>>,
    bridge: SyncBridge,
) -> Result<JoinHandle<()>, StoryboardError> {
    let mut snapshots = store.subscribe(PROJECTS).await?;
    Ok(tokio::spawn(async move {
        while let Some(snapshot) = snapshots.recv().await {
            let projects = decode_projects(snapshot);
            let mut ws = workspace.lock().await;
            ws.merge_remote(projects, |id| bridge.has_local_writes(PROJECTS, id));
        }
        warn!("Project subscription ended");
    }))
}
