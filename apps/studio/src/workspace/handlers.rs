//! Axum route handlers for projects, episodes and the entity registry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::entity::{Entity, EntityFields, EntityPatch, EntityType};
use crate::models::project::{Episode, Project, TextShot};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub folder_id: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub episode_count: usize,
}

impl From<&Project> for ProjectSummary {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.clone(),
            title: p.title.clone(),
            thumbnail: p.thumbnail.clone(),
            folder_id: p.folder_id.clone(),
            last_modified: p.last_modified,
            episode_count: p.episodes.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEpisodeRequest {
    pub title: String,
    #[serde(default)]
    pub script_content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateEpisodeRequest {
    pub title: Option<String>,
    pub script_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveEpisodeRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(flatten)]
    pub fields: EntityFields,
}

fn required_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    Ok(title.to_string())
}

fn episode_mut<'a>(project: &'a mut Project, episode_id: &str) -> Result<&'a mut Episode, AppError> {
    project
        .episode_mut(episode_id)
        .ok_or_else(|| AppError::NotFound(format!("Episode {episode_id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Projects
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/projects
pub async fn handle_list_projects(State(state): State<AppState>) -> Json<Vec<ProjectSummary>> {
    let ws = state.workspace.lock().await;
    let mut projects: Vec<ProjectSummary> = ws.projects().map(ProjectSummary::from).collect();
    projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Json(projects)
}

/// POST /api/v1/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let mut project = Project::new(required_title(&req.title)?);
    project.folder_id = req.folder_id;

    let mut ws = state.workspace.lock().await;
    ws.insert(project.clone());
    state.sync.push_project(&project)?;
    drop(ws);
    info!("Created project {} ({})", project.id, project.title);
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/projects/:project_id
pub async fn handle_get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.snapshot(&project_id).await?))
}

/// PATCH /api/v1/projects/:project_id
pub async fn handle_update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let (_, project) = state
        .commit(&project_id, |p| {
            if let Some(title) = &req.title {
                p.title = required_title(title)?;
            }
            if let Some(thumbnail) = req.thumbnail {
                p.thumbnail = thumbnail;
            }
            if let Some(folder_id) = req.folder_id {
                p.folder_id = Some(folder_id).filter(|f| !f.trim().is_empty());
            }
            Ok::<_, AppError>(())
        })
        .await?;
    Ok(Json(project))
}

/// DELETE /api/v1/projects/:project_id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut ws = state.workspace.lock().await;
    ws.remove(&project_id)?;
    state.sync.remove_project(&project_id)?;
    drop(ws);
    info!("Deleted project {project_id}");
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Episodes
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/projects/:project_id/episodes
pub async fn handle_add_episode(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateEpisodeRequest>,
) -> Result<(StatusCode, Json<Episode>), AppError> {
    let title = required_title(&req.title)?;
    let (episode, _) = state
        .commit(&project_id, |p| {
            Ok::<_, AppError>(p.add_episode(Episode::new(title, req.script_content)).clone())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(episode)))
}

/// PATCH /api/v1/projects/:project_id/episodes/:episode_id
pub async fn handle_update_episode(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<UpdateEpisodeRequest>,
) -> Result<Json<Episode>, AppError> {
    let (episode, _) = state
        .commit(&project_id, |p| {
            let episode = episode_mut(p, &episode_id)?;
            if let Some(title) = &req.title {
                episode.title = required_title(title)?;
            }
            if let Some(script) = req.script_content {
                episode.script_content = script;
            }
            Ok::<_, AppError>(episode.clone())
        })
        .await?;
    Ok(Json(episode))
}

/// PUT /api/v1/projects/:project_id/episodes/:episode_id/text-shots
pub async fn handle_replace_text_shots(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(text_shots): Json<Vec<TextShot>>,
) -> Result<Json<Episode>, AppError> {
    let (episode, _) = state
        .commit(&project_id, |p| {
            let episode = episode_mut(p, &episode_id)?;
            episode.text_shots = text_shots;
            Ok::<_, AppError>(episode.clone())
        })
        .await?;
    Ok(Json(episode))
}

/// DELETE /api/v1/projects/:project_id/episodes/:episode_id
pub async fn handle_remove_episode(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
) -> Result<Json<Project>, AppError> {
    let (_, project) = state
        .commit(&project_id, |p| {
            p.remove_episode(&episode_id)
                .ok_or_else(|| AppError::NotFound(format!("Episode {episode_id} not found")))
        })
        .await?;
    Ok(Json(project))
}

/// POST /api/v1/projects/:project_id/episodes/move
pub async fn handle_move_episode(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<MoveEpisodeRequest>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .edit(&project_id, |p| Ok::<_, AppError>(p.move_episode(req.from, req.to)))
        .await?;
    Ok(Json(project))
}

// ────────────────────────────────────────────────────────────────────────────
// Entities
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/projects/:project_id/entities
pub async fn handle_list_entities(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<Entity>>, AppError> {
    let project = state.snapshot(&project_id).await?;
    Ok(Json(project.entities.entities().to_vec()))
}

/// POST /api/v1/projects/:project_id/entities
pub async fn handle_create_entity(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateEntityRequest>,
) -> Result<(StatusCode, Json<Entity>), AppError> {
    let name = required_title(&req.fields.name)
        .map_err(|_| AppError::Validation("entity name must not be empty".into()))?;
    let fields = EntityFields { name, ..req.fields };
    let (entity, _) = state
        .commit(&project_id, |p| {
            Ok::<_, AppError>(p.entities.create(req.entity_type, fields).clone())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

/// PATCH /api/v1/projects/:project_id/entities/:entity_id
pub async fn handle_update_entity(
    State(state): State<AppState>,
    Path((project_id, entity_id)): Path<(String, String)>,
    Json(patch): Json<EntityPatch>,
) -> Result<Json<Entity>, AppError> {
    let (entity, _) = state
        .commit(&project_id, |p| {
            p.entities
                .update(&entity_id, patch)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Entity {entity_id} not found")))
        })
        .await?;
    Ok(Json(entity))
}

/// DELETE /api/v1/projects/:project_id/entities/:entity_id
///
/// Shots keep their reference and render it as the unknown placeholder.
pub async fn handle_delete_entity(
    State(state): State<AppState>,
    Path((project_id, entity_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .commit(&project_id, |p| {
            p.entities
                .delete(&entity_id)
                .ok_or_else(|| AppError::NotFound(format!("Entity {entity_id} not found")))
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
