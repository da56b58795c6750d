//! In-memory, locally authoritative set of projects.
//!
//! Every edit runs against a clone of one project and replaces it only
//! when the operation succeeds, so a failed operation leaves nothing
//! half-applied.

pub mod handlers;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::project::Project;

#[derive(Debug, Default)]
pub struct Workspace {
    projects: BTreeMap<String, Project>,
}

/// What a remote snapshot changed locally.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoteMerge {
    pub replaced: usize,
    pub removed: usize,
    pub kept_local: usize,
}

impl Workspace {
    pub fn from_projects(projects: Vec<Project>) -> Self {
        Self {
            projects: projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn get(&self, project_id: &str) -> Result<&Project, AppError> {
        self.projects
            .get(project_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
    }

    pub fn insert(&mut self, project: Project) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn remove(&mut self, project_id: &str) -> Result<Project, AppError> {
        self.projects
            .remove(project_id)
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
    }

    /// Applies `op` to a scratch copy of the project and commits it on
    /// success. Returns the op's value and the committed snapshot.
    pub fn transact<T, E>(
        &mut self,
        project_id: &str,
        op: impl FnOnce(&mut Project) -> Result<T, E>,
    ) -> Result<(T, Project), AppError>
    where
        AppError: From<E>,
    {
        let mut scratch = self.get(project_id)?.clone();
        let value = op(&mut scratch)?;
        scratch.touch();
        self.projects.insert(project_id.to_string(), scratch.clone());
        Ok((value, scratch))
    }

    /// Like `transact`, for ops that report whether they changed anything.
    /// No-ops leave the stored project and its timestamp alone and return
    /// `None`.
    pub fn edit<E>(
        &mut self,
        project_id: &str,
        op: impl FnOnce(&mut Project) -> Result<bool, E>,
    ) -> Result<Option<Project>, AppError>
    where
        AppError: From<E>,
    {
        let mut scratch = self.get(project_id)?.clone();
        if !op(&mut scratch)? {
            return Ok(None);
        }
        scratch.touch();
        self.projects.insert(project_id.to_string(), scratch.clone());
        Ok(Some(scratch))
    }

    /// Applies a full-collection snapshot from the document store. Projects
    /// with unflushed local writes keep their local version.
    pub fn merge_remote(
        &mut self,
        snapshot: Vec<Project>,
        has_local_writes: impl Fn(&str) -> bool,
    ) -> RemoteMerge {
        let mut merge = RemoteMerge::default();
        let mut incoming: BTreeMap<String, Project> =
            snapshot.into_iter().map(|p| (p.id.clone(), p)).collect();

        let local_ids: Vec<String> = self.projects.keys().cloned().collect();
        for id in local_ids {
            if has_local_writes(&id) {
                incoming.remove(&id);
                merge.kept_local += 1;
                continue;
            }
            match incoming.remove(&id) {
                Some(remote) => {
                    self.projects.insert(id, remote);
                    merge.replaced += 1;
                }
                None => {
                    debug!("Project {id} no longer exists remotely");
                    self.projects.remove(&id);
                    merge.removed += 1;
                }
            }
        }
        for (id, remote) in incoming {
            if has_local_writes(&id) {
                merge.kept_local += 1;
                continue;
            }
            self.projects.insert(id, remote);
            merge.replaced += 1;
        }

        info!(
            "Merged remote snapshot: {} replaced, {} removed, {} kept local",
            merge.replaced, merge.removed, merge.kept_local
        );
        merge
    }
}
