use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Character,
    Environment,
}

impl EntityType {
    /// Prefix used when minting ids.
    pub fn tag(&self) -> char {
        match self {
            EntityType::Character => 'c',
            EntityType::Environment => 'e',
        }
    }
}

/// A character or environment referenced by shots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    /// Characters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// User-editable entity fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityFields {
    pub name: String,
    pub avatar: String,
    pub voice: Option<String>,
    pub description: String,
}

/// Partial update; id and type are not part of it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub voice: Option<String>,
    pub description: Option<String>,
}

/// Read-time view of a shot's entity reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityLabel {
    pub id: Option<String>,
    pub name: String,
    pub avatar: String,
    pub known: bool,
}

pub const UNKNOWN_ENTITY_NAME: &str = "Unknown entity";

impl EntityLabel {
    pub fn known(entity: &Entity) -> Self {
        Self {
            id: Some(entity.id.clone()),
            name: entity.name.clone(),
            avatar: entity.avatar.clone(),
            known: true,
        }
    }

    pub fn unknown(id: Option<&str>) -> Self {
        Self {
            id: id.map(String::from),
            name: UNKNOWN_ENTITY_NAME.to_string(),
            avatar: String::new(),
            known: false,
        }
    }
}
