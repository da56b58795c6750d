//! Axum route handler for storyboard generation.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::generation::generator::GenerationRequest;
use crate::generation::import::{import_storyboard, ImportReport};
use crate::generation::schema::parse_generated;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateStoryboardRequest {
    pub style: Option<String>,
}

/// POST /api/v1/projects/:project_id/episodes/:episode_id/storyboard
///
/// The generator runs against a snapshot without holding the workspace lock.
/// Its output is merged in one step afterwards; if another import landed in
/// the meantime, the later one wins.
pub async fn handle_generate_storyboard(
    State(state): State<AppState>,
    Path((project_id, episode_id)): Path<(String, String)>,
    body: Option<Json<GenerateStoryboardRequest>>,
) -> Result<Json<ImportReport>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let project = state.snapshot(&project_id).await?;
    let episode = project
        .episode(&episode_id)
        .ok_or_else(|| AppError::NotFound(format!("Episode {episode_id} not found")))?;
    if episode.text_shots.is_empty() {
        return Err(AppError::Validation(
            "episode has no text shots to storyboard".into(),
        ));
    }

    let request = GenerationRequest::new(&project.entities, episode, req.style.as_deref());
    let raw = state.generator.generate(&request).await?;
    let generated = parse_generated(&raw)?;

    let (report, _) = state
        .commit(&project_id, |p| import_storyboard(p, &episode_id, generated))
        .await?;
    info!(
        "Storyboard for episode {episode_id}: {} shot(s), {} quarantined record(s)",
        report.shot_count,
        report.quarantined.len()
    );
    Ok(Json(report))
}
