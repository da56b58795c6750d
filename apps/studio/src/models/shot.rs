use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualType {
    #[default]
    Image,
    Video,
}

impl VisualType {
    /// Maps an upload MIME type onto the visual kind stored on a shot.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            VisualType::Video
        } else {
            VisualType::Image
        }
    }
}

/// One versioned visual artifact attached to a shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub visual_type: VisualType,
    /// Milliseconds since the Unix epoch. Strictly increasing within one shot.
    pub timestamp: i64,
}

/// One timeline unit. `sequence` is owned by the sequencer and `history`
/// by the visual history store; everything else is free for field updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    pub id: String,
    pub sequence: u32,
    #[serde(default)]
    pub current_visual: String,
    #[serde(default)]
    pub current_visual_type: VisualType,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub dialogue: String,
    #[serde(default)]
    pub image_prompt: String,
    #[serde(default)]
    pub video_prompt: String,
}

/// Field values a new shot starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotSeed {
    pub current_visual: String,
    pub current_visual_type: VisualType,
    pub character_id: Option<String>,
    pub environment_id: Option<String>,
    pub angle: String,
    pub dialogue: String,
    pub image_prompt: String,
    pub video_prompt: String,
}

/// Field-level update. `None` leaves a field alone; for the entity
/// references `Some(None)` clears the reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShotPatch {
    #[serde(with = "double_option")]
    pub character_id: Option<Option<String>>,
    #[serde(with = "double_option")]
    pub environment_id: Option<Option<String>>,
    pub angle: Option<String>,
    pub dialogue: Option<String>,
    pub image_prompt: Option<String>,
    pub video_prompt: Option<String>,
}

impl Shot {
    /// Builds a shot with a fresh id. Sequence is assigned by the sequencer.
    pub fn from_seed(seed: ShotSeed) -> Self {
        let mut shot = Shot {
            id: format!("s_{}", Uuid::new_v4().simple()),
            sequence: 0,
            current_visual: seed.current_visual,
            current_visual_type: seed.current_visual_type,
            history: Vec::new(),
            character_id: normalize_ref(seed.character_id),
            environment_id: normalize_ref(seed.environment_id),
            angle: seed.angle,
            dialogue: seed.dialogue,
            image_prompt: seed.image_prompt,
            video_prompt: seed.video_prompt,
        };
        shot.backfill_history();
        shot
    }

    /// Everything except identity and history, for insert-after cloning.
    pub fn to_seed(&self) -> ShotSeed {
        ShotSeed {
            current_visual: self.current_visual.clone(),
            current_visual_type: self.current_visual_type,
            character_id: self.character_id.clone(),
            environment_id: self.environment_id.clone(),
            angle: self.angle.clone(),
            dialogue: self.dialogue.clone(),
            image_prompt: self.image_prompt.clone(),
            video_prompt: self.video_prompt.clone(),
        }
    }

    pub fn apply_patch(&mut self, patch: ShotPatch) {
        if let Some(character_id) = patch.character_id {
            self.character_id = normalize_ref(character_id);
        }
        if let Some(environment_id) = patch.environment_id {
            self.environment_id = normalize_ref(environment_id);
        }
        if let Some(angle) = patch.angle {
            self.angle = angle;
        }
        if let Some(dialogue) = patch.dialogue {
            self.dialogue = dialogue;
        }
        if let Some(image_prompt) = patch.image_prompt {
            self.image_prompt = image_prompt;
        }
        if let Some(video_prompt) = patch.video_prompt {
            self.video_prompt = video_prompt;
        }
    }
}

/// Empty strings coming from clients mean "no reference".
pub fn normalize_ref(reference: Option<String>) -> Option<String> {
    reference.filter(|r| !r.trim().is_empty())
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}
