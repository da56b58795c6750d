//! In-memory collaborator doubles shared by unit and router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::StoryboardError;
use crate::generation::generator::{GenerationRequest, StoryboardGenerator};
use crate::retry::RetryPolicy;
use crate::state::AppState;
use crate::storage::{AssetStore, Document, DocumentStore};
use crate::sync::SyncBridge;
use crate::workspace::Workspace;

/// Document store backed by a map. `failing(n)` rejects the first `n`
/// writes.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<BTreeMap<(String, String), Value>>,
    subscribers: Mutex<Vec<(String, mpsc::Sender<Vec<Document>>)>>,
    failures_left: AtomicU32,
    attempts: AtomicU32,
}

impl MemoryDocumentStore {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            ..Self::default()
        }
    }

    /// Rejects the next `times` writes.
    pub fn fail_next(&self, times: u32) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect()
    }

    fn write_gate(&self) -> Result<(), StoryboardError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != u32::MAX {
                self.failures_left.store(left - 1, Ordering::SeqCst);
            }
            return Err(StoryboardError::Sync("store unavailable".into()));
        }
        Ok(())
    }

    fn publish(&self, collection: &str) {
        let snapshot = self.snapshot(collection);
        for (c, tx) in self.subscribers.lock().unwrap().iter() {
            if c == collection {
                let _ = tx.try_send(snapshot.clone());
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load_all(&self, collection: &str) -> Result<Vec<Document>, StoryboardError> {
        Ok(self.snapshot(collection))
    }

    async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<Vec<Document>>, StoryboardError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers
            .lock()
            .unwrap()
            .push((collection.to_string(), tx));
        Ok(rx)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        record: &Value,
    ) -> Result<(), StoryboardError> {
        self.write_gate()?;
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), record.clone());
        self.publish(collection);
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoryboardError> {
        self.write_gate()?;
        self.docs
            .lock()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()));
        self.publish(collection);
        Ok(())
    }
}

/// Records uploads and hands back `memory://` URLs.
#[derive(Default)]
pub struct MemoryAssetStore {
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    pub fail: bool,
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn upload(
        &self,
        bytes: Bytes,
        path: &str,
        content_type: &str,
    ) -> Result<String, StoryboardError> {
        if self.fail {
            return Err(StoryboardError::external("upload", "bucket unreachable"));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), content_type.to_string(), bytes.len()));
        Ok(format!("memory://{path}"))
    }
}

/// Returns a fixed payload, or fails when none is set.
pub struct CannedGenerator(pub Option<Value>);

#[async_trait]
impl StoryboardGenerator for CannedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Value, StoryboardError> {
        self.0
            .clone()
            .ok_or_else(|| StoryboardError::external("generate", "model overloaded"))
    }
}

pub fn test_state(
    assets: MemoryAssetStore,
    generator: CannedGenerator,
) -> (AppState, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::default());
    let (sync, _worker) = SyncBridge::spawn(store.clone(), RetryPolicy::default());
    let state = AppState {
        workspace: Arc::new(tokio::sync::Mutex::new(Workspace::default())),
        sync,
        assets: Arc::new(assets),
        generator: Arc::new(generator),
    };
    (state, store)
}
