//! Axum route handlers for one episode's timeline: shots, segments and
//! visual history.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::project::{Episode, Project};
use crate::models::shot::{ShotPatch, ShotSeed, VisualType};
use crate::state::AppState;
use crate::storage::assets::shot_visual_path;
use crate::timeline::segments::{Edge, ResizeAction, Segment};
use crate::timeline::{break_environments, timeline_view, TimelineView};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub i: usize,
    pub j: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub segment: Segment,
    pub edge: Edge,
    pub action: ResizeAction,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn episode_mut<'a>(project: &'a mut Project, episode_id: &str) -> Result<&'a mut Episode, AppError> {
    project
        .episode_mut(episode_id)
        .ok_or_else(|| AppError::NotFound(format!("Episode {episode_id} not found")))
}

fn view(project: &Project, episode_id: &str) -> Result<Json<TimelineView>, AppError> {
    let episode = project
        .episode(episode_id)
        .ok_or_else(|| AppError::NotFound(format!("Episode {episode_id} not found")))?;
    Ok(Json(timeline_view(project, episode)))
}

fn shot_not_found(shot_id: &str) -> AppError {
    AppError::NotFound(format!("Shot {shot_id} not found"))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/projects/:project_id/episodes/:episode_id/timeline
pub async fn handle_get_timeline(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state.snapshot(&project_id).await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots
pub async fn handle_append_shot(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    seed: Option<Json<ShotSeed>>,
) -> Result<Json<TimelineView>, AppError> {
    let seed = seed.map(|Json(s)| s).unwrap_or_default();
    let (_, project) = state
        .commit(&project_id, |p| {
            episode_mut(p, &episode_id)?.visual_shots.append(seed);
            Ok::<_, AppError>(())
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots/insert-after
pub async fn handle_insert_after(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            let shots = &mut episode_mut(p, &episode_id)?.visual_shots;
            Ok::<_, AppError>(shots.insert_after(req.index).is_some())
        })
        .await?;
    view(&project, &episode_id)
}

/// DELETE /api/v1/projects/:project_id/episodes/:episode_id/shots/:shot_id
pub async fn handle_remove_shot(
    State(state): State<AppState>,
    Path((project_id, episode_id, shot_id)): Path<(String, String, String)>,
) -> Result<Json<TimelineView>, AppError> {
    let (_, project) = state
        .commit(&project_id, |p| -> Result<_, AppError> {
            episode_mut(p, &episode_id)?
                .visual_shots
                .remove(&shot_id)
                .ok_or_else(|| shot_not_found(&shot_id))
        })
        .await?;
    view(&project, &episode_id)
}

/// PATCH /api/v1/projects/:project_id/episodes/:episode_id/shots/:shot_id
pub async fn handle_update_shot(
    State(state): State<AppState>,
    Path((project_id, episode_id, shot_id)): Path<(String, String, String)>,
    Json(patch): Json<ShotPatch>,
) -> Result<Json<TimelineView>, AppError> {
    let (_, project) = state
        .commit(&project_id, |p| -> Result<(), AppError> {
            if episode_mut(p, &episode_id)?.visual_shots.update(&shot_id, patch) {
                Ok(())
            } else {
                Err(shot_not_found(&shot_id))
            }
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots/swap
pub async fn handle_swap_shots(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<SwapRequest>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            Ok::<_, AppError>(episode_mut(p, &episode_id)?.visual_shots.swap(req.i, req.j))
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots/reorder
pub async fn handle_reorder_shots(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            Ok::<_, AppError>(
                episode_mut(p, &episode_id)?
                    .visual_shots
                    .reorder(req.from, req.to),
            )
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/segments/resize
pub async fn handle_resize_segment(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            Ok::<_, AppError>(
                episode_mut(p, &episode_id)?
                    .visual_shots
                    .resize_segment(&req.segment, req.edge, req.action),
            )
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/segments/break
pub async fn handle_insert_break(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            let [a, b] = break_environments(p);
            Ok::<_, AppError>(
                episode_mut(p, &episode_id)?
                    .visual_shots
                    .insert_break(req.index, [a.as_str(), b.as_str()]),
            )
        })
        .await?;
    view(&project, &episode_id)
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots/:shot_id/visuals
///
/// Multipart upload with a single `file` part. The upload runs before the
/// workspace is touched; a failed upload changes nothing.
pub async fn handle_upload_visual(
    State(state): State<AppState>,
    Path((project_id, episode_id, shot_id)): Path<(String, String, String)>,
    mut multipart: Multipart,
) -> Result<Json<TimelineView>, AppError> {
    let project = state.snapshot(&project_id).await?;
    project
        .episode(&episode_id)
        .and_then(|e| e.visual_shots.get(&shot_id))
        .ok_or_else(|| shot_not_found(&shot_id))?;

    let (bytes, content_type) = read_file_part(&mut multipart).await?;
    let visual_type = VisualType::from_mime(&content_type);
    let path = shot_visual_path(&project_id, &shot_id, Utc::now().timestamp_millis());
    let url = state.assets.upload(bytes, &path, &content_type).await?;

    // The shot may have been deleted while the upload was in flight.
    let (_, project) = state
        .commit(&project_id, |p| {
            let shot = episode_mut(p, &episode_id)?
                .visual_shots
                .get_mut(&shot_id)
                .ok_or_else(|| shot_not_found(&shot_id))?;
            shot.add_visual(url, visual_type);
            Ok::<_, AppError>(())
        })
        .await?;
    info!("Attached new {visual_type:?} visual to shot {shot_id}");
    view(&project, &episode_id)
}

async fn read_file_part(multipart: &mut Multipart) -> Result<(Bytes, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Unreadable file part: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        return Ok((bytes, content_type));
    }
    Err(AppError::Validation("Missing 'file' part".into()))
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/shots/:shot_id/visuals/:history_id/select
pub async fn handle_select_visual(
    State(state): State<AppState>,
    Path((project_id, episode_id, shot_id, history_id)): Path<(String, String, String, String)>,
) -> Result<Json<TimelineView>, AppError> {
    let project = state
        .edit(&project_id, |p| {
            let shot = episode_mut(p, &episode_id)?
                .visual_shots
                .get_mut(&shot_id)
                .ok_or_else(|| shot_not_found(&shot_id))?;
            Ok::<_, AppError>(shot.select_visual(&history_id))
        })
        .await?;
    view(&project, &episode_id)
}
