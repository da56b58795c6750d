use std::sync::Arc;

use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::generation::generator::StoryboardGenerator;
use crate::models::project::Project;
use crate::storage::AssetStore;
use crate::sync::SyncBridge;
use crate::workspace::Workspace;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Mutex<Workspace>>,
    pub sync: SyncBridge,
    pub assets: Arc<dyn AssetStore>,
    /// Pluggable generator. Default: LlmStoryboardGenerator.
    pub generator: Arc<dyn StoryboardGenerator>,
}

impl AppState {
    /// Runs one edit against a project and queues the result for persistence.
    /// The write is queued before the workspace unlocks, so a remote snapshot
    /// never sees the edit without its pending write.
    pub async fn commit<T, E>(
        &self,
        project_id: &str,
        op: impl FnOnce(&mut Project) -> Result<T, E>,
    ) -> Result<(T, Project), AppError>
    where
        AppError: From<E>,
    {
        let mut ws = self.workspace.lock().await;
        let (value, snapshot) = ws.transact(project_id, op)?;
        self.sync.push_project(&snapshot)?;
        Ok((value, snapshot))
    }

    /// Runs an edit that may turn out to be a no-op; only real changes are
    /// persisted. Returns the project as it stands afterwards.
    pub async fn edit<E>(
        &self,
        project_id: &str,
        op: impl FnOnce(&mut Project) -> Result<bool, E>,
    ) -> Result<Project, AppError>
    where
        AppError: From<E>,
    {
        let mut ws = self.workspace.lock().await;
        match ws.edit(project_id, op)? {
            Some(snapshot) => {
                self.sync.push_project(&snapshot)?;
                Ok(snapshot)
            }
            None => Ok(ws.get(project_id)?.clone()),
        }
    }

    /// Clone of one project for read paths and generator requests.
    pub async fn snapshot(&self, project_id: &str) -> Result<Project, AppError> {
        Ok(self.workspace.lock().await.get(project_id)?.clone())
    }
}
