//! Schema boundary for generator output.
//!
//! The generator returns loosely shaped JSON. Each record is parsed on its
//! own into a typed struct; a record that does not fit is quarantined with
//! a reason instead of being coerced. Only the top-level shape is fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::StoryboardError;
use crate::models::entity::EntityType;
use crate::timeline::registry::EntityDraft;

/// Entity record as the generator emits it. `type` is a closed set, so an
/// unknown kind fails this record only.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEntity {
    #[serde(rename = "type")]
    entity_type: EntityType,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireShot {
    #[serde(default)]
    character_id: Option<String>,
    #[serde(default)]
    environment_id: Option<String>,
    angle: String,
    #[serde(default)]
    dialogue: Option<String>,
    image_prompt: String,
    video_prompt: String,
}

/// One generated shot after validation. Entity fields are still labels
/// (ids or names) and must go through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedShot {
    /// Position in the raw `visualShots` array, before quarantine.
    pub source_index: usize,
    pub character_label: Option<String>,
    pub environment_label: Option<String>,
    pub angle: String,
    pub dialogue: Option<String>,
    pub image_prompt: String,
    pub video_prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entity,
    Shot,
    ShotReference,
}

/// A rejected piece of generator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quarantined {
    pub kind: RecordKind,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedStoryboard {
    pub entities: Vec<EntityDraft>,
    pub shots: Vec<GeneratedShot>,
    pub quarantined: Vec<Quarantined>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn records<'a>(root: &'a Value, key: &str) -> Result<&'a [Value], StoryboardError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(StoryboardError::Validation(format!(
            "generator field '{key}' must be an array"
        ))),
    }
}

/// Parses raw generator output. Fails only when the payload is not an
/// object or a record list is not an array.
pub fn parse_generated(root: &Value) -> Result<GeneratedStoryboard, StoryboardError> {
    if !root.is_object() {
        return Err(StoryboardError::Validation(
            "generator output must be a JSON object".to_string(),
        ));
    }

    let mut out = GeneratedStoryboard::default();

    for (index, raw) in records(root, "newEntities")?.iter().enumerate() {
        match serde_json::from_value::<WireEntity>(raw.clone()) {
            Ok(entity) if !entity.name.trim().is_empty() => out.entities.push(EntityDraft {
                entity_type: entity.entity_type,
                name: entity.name.trim().to_string(),
                description: entity.description,
            }),
            Ok(_) => out.quarantined.push(Quarantined {
                kind: RecordKind::Entity,
                index,
                reason: "entity name is blank".to_string(),
            }),
            Err(e) => out.quarantined.push(Quarantined {
                kind: RecordKind::Entity,
                index,
                reason: e.to_string(),
            }),
        }
    }

    for (index, raw) in records(root, "visualShots")?.iter().enumerate() {
        match serde_json::from_value::<WireShot>(raw.clone()) {
            Ok(shot) => out.shots.push(GeneratedShot {
                source_index: index,
                character_label: non_blank(shot.character_id),
                environment_label: non_blank(shot.environment_id),
                angle: shot.angle,
                dialogue: non_blank(shot.dialogue),
                image_prompt: shot.image_prompt,
                video_prompt: shot.video_prompt,
            }),
            Err(e) => out.quarantined.push(Quarantined {
                kind: RecordKind::Shot,
                index,
                reason: e.to_string(),
            }),
        }
    }

    if !out.quarantined.is_empty() {
        warn!(
            "Quarantined {} malformed generator record(s)",
            out.quarantined.len()
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_well_formed_payload() {
        let payload = json!({
            "newEntities": [
                {"type": "character", "name": " 林青羽 ", "description": "少年"}
            ],
            "visualShots": [{
                "characterId": "林青羽",
                "environmentId": "e1",
                "angle": "大远景",
                "imagePrompt": "悬崖峭壁",
                "videoPrompt": "镜头拉远"
            }]
        });
        let parsed = parse_generated(&payload).unwrap();
        assert_eq!(parsed.entities[0].name, "林青羽");
        assert_eq!(parsed.shots[0].character_label.as_deref(), Some("林青羽"));
        assert_eq!(parsed.shots[0].dialogue, None);
        assert!(parsed.quarantined.is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            parse_generated(&json!([1, 2])),
            Err(StoryboardError::Validation(_))
        ));
        assert!(matches!(
            parse_generated(&json!({"visualShots": "oops"})),
            Err(StoryboardError::Validation(_))
        ));
    }

    #[test]
    fn test_quarantines_bad_records_individually() {
        let payload = json!({
            "newEntities": [
                {"type": "prop", "name": "Sword"},
                {"type": "environment", "name": "   "},
                {"type": "environment", "name": "剑冢", "mood": "dark"},
                {"type": "environment", "name": "天劫台"}
            ],
            "visualShots": [
                {"angle": "近景", "imagePrompt": 42, "videoPrompt": ""},
                {"angle": "近景", "imagePrompt": "雷雨", "videoPrompt": "", "environmentId": ""}
            ]
        });
        let parsed = parse_generated(&payload).unwrap();

        assert_eq!(parsed.entities.len(), 1);
        assert_eq!(parsed.entities[0].name, "天劫台");
        assert_eq!(parsed.shots.len(), 1);
        assert_eq!(parsed.shots[0].environment_label, None);

        let kinds: Vec<_> = parsed.quarantined.iter().map(|q| (q.kind, q.index)).collect();
        assert_eq!(
            kinds,
            vec![
                (RecordKind::Entity, 0),
                (RecordKind::Entity, 1),
                (RecordKind::Entity, 2),
                (RecordKind::Shot, 0)
            ]
        );
    }

    #[test]
    fn test_missing_lists_are_empty() {
        let parsed = parse_generated(&json!({})).unwrap();
        assert!(parsed.entities.is_empty());
        assert!(parsed.shots.is_empty());
    }
}
