// Storyboard timeline core.
// Everything here is synchronous and I/O free; callers own persistence.

pub mod handlers;
pub mod history;
pub mod registry;
pub mod segments;
pub mod sequencer;

use serde::Serialize;

use crate::models::entity::{EntityLabel, EntityType};
use crate::models::project::{Episode, Project};
use crate::models::shot::Shot;
use crate::timeline::segments::{Segment, DEFAULT_BREAK_ENVIRONMENTS};

#[derive(Debug, Clone, Serialize)]
pub struct ShotView {
    #[serde(flatten)]
    pub shot: Shot,
    pub character: EntityLabel,
    pub environment: EntityLabel,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentView {
    #[serde(flatten)]
    pub segment: Segment,
    pub environment: EntityLabel,
}

/// Read model for one episode's timeline with every reference resolved.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineView {
    pub episode_id: String,
    pub title: String,
    pub shots: Vec<ShotView>,
    pub segments: Vec<SegmentView>,
}

pub fn timeline_view(project: &Project, episode: &Episode) -> TimelineView {
    let registry = &project.entities;
    let shots = episode
        .visual_shots
        .shots()
        .iter()
        .map(|shot| ShotView {
            character: registry.label(shot.character_id.as_deref()),
            environment: registry.label(shot.environment_id.as_deref()),
            shot: shot.clone(),
        })
        .collect();
    let segments = episode
        .visual_shots
        .segments()
        .into_iter()
        .map(|segment| SegmentView {
            environment: registry.label(segment.environment_id.as_deref()),
            segment,
        })
        .collect();

    TimelineView {
        episode_id: episode.id.clone(),
        title: episode.title.clone(),
        shots,
        segments,
    }
}

/// The two environments `insert_break` alternates between: the project's
/// first two environments, or the defaults when it has fewer.
pub fn break_environments(project: &Project) -> [String; 2] {
    let mut envs = project.entities.of_type(EntityType::Environment);
    match (envs.next(), envs.next()) {
        (Some(a), Some(b)) => [a.id.clone(), b.id.clone()],
        _ => DEFAULT_BREAK_ENVIRONMENTS.map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::EntityFields;
    use crate::models::shot::ShotSeed;

    fn project_with_timeline() -> (Project, String) {
        let mut project = Project::new("云隐仙途");
        let mountain = project
            .entities
            .create(
                EntityType::Environment,
                EntityFields {
                    name: "云隐峰".into(),
                    ..Default::default()
                },
            )
            .id
            .clone();
        let mut episode = Episode::new("第一集", "");
        for env in [Some(mountain.clone()), Some(mountain.clone()), Some("e_gone".into())] {
            episode.visual_shots.append(ShotSeed {
                environment_id: env,
                ..Default::default()
            });
        }
        let episode_id = episode.id.clone();
        project.episodes.push(episode);
        (project, episode_id)
    }

    #[test]
    fn test_view_resolves_and_placeholders() {
        let (project, episode_id) = project_with_timeline();
        let view = timeline_view(&project, project.episode(&episode_id).unwrap());

        assert_eq!(view.shots.len(), 3);
        assert_eq!(view.segments.len(), 2);
        assert_eq!(view.segments[0].environment.name, "云隐峰");
        assert!(!view.segments[1].environment.known);
        assert!(!view.shots[0].character.known);
    }

    #[test]
    fn test_view_serializes_flat() {
        let (project, episode_id) = project_with_timeline();
        let view = timeline_view(&project, project.episode(&episode_id).unwrap());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["segments"][0]["count"], 2);
        assert_eq!(json["shots"][2]["sequence"], 3);
    }

    #[test]
    fn test_break_environments_fall_back_to_defaults() {
        let (project, _) = project_with_timeline();
        assert_eq!(break_environments(&project), ["e1".to_string(), "e2".to_string()]);
    }

    #[test]
    fn test_break_environments_use_project_entities() {
        let (mut project, _) = project_with_timeline();
        let palace = project
            .entities
            .create(EntityType::Environment, EntityFields::default())
            .id
            .clone();
        let pair = break_environments(&project);
        assert_eq!(pair[1], palace);
    }
}
