use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timeline::registry::EntityRegistry;
use crate::timeline::sequencer::{self, Sequenced, ShotSequence};

/// Script breakdown row produced while writing an episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextShot {
    pub id: String,
    pub time: String,
    pub location: String,
    pub action: String,
    pub angle: String,
    pub dialogue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub sequence: u32,
    pub title: String,
    #[serde(default)]
    pub script_content: String,
    #[serde(default)]
    pub text_shots: Vec<TextShot>,
    #[serde(default)]
    pub visual_shots: ShotSequence,
    #[serde(default)]
    pub has_storyboard: bool,
}

impl Episode {
    pub fn new(title: impl Into<String>, script_content: impl Into<String>) -> Self {
        Self {
            id: format!("ep_{}", Uuid::new_v4().simple()),
            sequence: 0,
            title: title.into(),
            script_content: script_content.into(),
            text_shots: Vec::new(),
            visual_shots: ShotSequence::default(),
            has_storyboard: false,
        }
    }
}

impl Sequenced for Episode {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }
}

/// The composed state one storyboard edit operates on, and the unit of
/// persistence (one document per project).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub entities: EntityRegistry,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: format!("p_{}", Uuid::new_v4().simple()),
            title: title.into(),
            thumbnail: String::new(),
            folder_id: None,
            last_modified: Utc::now(),
            episodes: Vec::new(),
            entities: EntityRegistry::default(),
        }
    }

    pub fn episode(&self, episode_id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id == episode_id)
    }

    pub fn episode_mut(&mut self, episode_id: &str) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|e| e.id == episode_id)
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// Appends an episode numbered after the current last one.
    pub fn add_episode(&mut self, episode: Episode) -> &Episode {
        self.episodes.push(episode);
        sequencer::resequence(&mut self.episodes);
        &self.episodes[self.episodes.len() - 1]
    }

    pub fn remove_episode(&mut self, episode_id: &str) -> Option<Episode> {
        let index = self.episodes.iter().position(|e| e.id == episode_id)?;
        let removed = self.episodes.remove(index);
        sequencer::resequence(&mut self.episodes);
        Some(removed)
    }

    pub fn move_episode(&mut self, from: usize, to: usize) -> bool {
        sequencer::reorder(&mut self.episodes, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequences(project: &Project) -> Vec<u32> {
        project.episodes.iter().map(|e| e.sequence).collect()
    }

    #[test]
    fn test_episode_add_remove_move_keep_contiguous_sequence() {
        let mut project = Project::new("云隐仙途");
        let first = project.add_episode(Episode::new("第一集", "")).id.clone();
        project.add_episode(Episode::new("第二集", ""));
        let third = project.add_episode(Episode::new("第三集", "")).id.clone();
        assert_eq!(sequences(&project), vec![1, 2, 3]);

        assert!(project.move_episode(2, 0));
        assert_eq!(project.episodes[0].id, third);
        assert_eq!(sequences(&project), vec![1, 2, 3]);

        assert_eq!(project.remove_episode(&first).map(|e| e.title), Some("第一集".into()));
        assert_eq!(sequences(&project), vec![1, 2]);
        assert!(project.remove_episode(&first).is_none());
    }

    #[test]
    fn test_move_episode_out_of_range_is_noop() {
        let mut project = Project::new("p");
        project.add_episode(Episode::new("only", ""));
        assert!(!project.move_episode(0, 3));
        assert_eq!(sequences(&project), vec![1]);
    }

    #[test]
    fn test_project_document_round_trips_through_json() {
        let mut project = Project::new("霓虹之夜");
        let mut episode = Episode::new("第一集", "INT. 酒吧 - 夜");
        episode.visual_shots.append(Default::default());
        project.add_episode(episode);

        let json = serde_json::to_value(&project).unwrap();
        let restored: Project = serde_json::from_value(json).unwrap();
        let shots = restored.episodes[0].visual_shots.shots();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].sequence, 1);
        assert_eq!(restored.episodes[0].script_content, "INT. 酒吧 - 夜");
    }
}
