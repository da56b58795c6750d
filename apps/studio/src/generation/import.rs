use serde::Serialize;
use tracing::info;

use crate::errors::StoryboardError;
use crate::generation::schema::{GeneratedStoryboard, Quarantined, RecordKind};
use crate::models::project::Project;
use crate::models::shot::{Shot, ShotSeed};
use crate::timeline::registry::BatchImport;
use crate::timeline::sequencer::ShotSequence;

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub episode_id: String,
    pub shot_count: usize,
    pub created_entities: Vec<String>,
    pub quarantined: Vec<Quarantined>,
}

/// Label from the generator to canonical id: batch labels first, then
/// whatever the registry resolves by id or name.
fn resolve_label(project: &Project, batch: &BatchImport, label: &str) -> Option<String> {
    batch
        .labels
        .get(label)
        .cloned()
        .or_else(|| project.entities.resolve_reference(label).map(String::from))
}

/// Merges validated generator output into one episode: entities are
/// batch-imported, then the episode's visual shots are replaced.
///
/// Runs against a scratch copy of the project; on error the caller drops it.
pub fn import_storyboard(
    project: &mut Project,
    episode_id: &str,
    generated: GeneratedStoryboard,
) -> Result<ImportReport, StoryboardError> {
    let text_dialogue: Vec<String> = project
        .episode(episode_id)
        .ok_or_else(|| StoryboardError::Validation(format!("unknown episode '{episode_id}'")))?
        .text_shots
        .iter()
        .map(|t| t.dialogue.clone())
        .collect();

    let GeneratedStoryboard {
        entities,
        shots: generated_shots,
        mut quarantined,
    } = generated;

    let batch = project.entities.batch_import(entities);

    let lookup: &Project = project;
    let mut shots = Vec::with_capacity(generated_shots.len());
    for generated in generated_shots {
        let index = generated.source_index;
        let mut resolve = |label: Option<String>| {
            let label = label?;
            let resolved = resolve_label(lookup, &batch, &label);
            if resolved.is_none() {
                quarantined.push(Quarantined {
                    kind: RecordKind::ShotReference,
                    index,
                    reason: format!("unresolved entity reference '{label}'"),
                });
            }
            resolved
        };
        let character_id = resolve(generated.character_label);
        let environment_id = resolve(generated.environment_label);

        let dialogue = generated
            .dialogue
            .or_else(|| text_dialogue.get(index).cloned())
            .unwrap_or_default();

        shots.push(Shot::from_seed(ShotSeed {
            character_id,
            environment_id,
            angle: generated.angle,
            dialogue,
            image_prompt: generated.image_prompt,
            video_prompt: generated.video_prompt,
            ..Default::default()
        }));
    }

    let visual_shots = ShotSequence::try_from(shots)?;
    let shot_count = visual_shots.len();

    let episode = project
        .episode_mut(episode_id)
        .ok_or_else(|| StoryboardError::Validation(format!("unknown episode '{episode_id}'")))?;
    episode.visual_shots = visual_shots;
    episode.has_storyboard = true;
    project.touch();

    info!(
        "Imported {shot_count} generated shot(s) into episode {episode_id} ({} new entities, {} quarantined)",
        batch.created.len(),
        quarantined.len()
    );

    Ok(ImportReport {
        episode_id: episode_id.to_string(),
        shot_count,
        created_entities: batch.created,
        quarantined,
    })
}
