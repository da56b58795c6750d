//! Entity registry: characters and environments of one project.
//!
//! Ids are never reused and deletes never cascade. A shot pointing at a
//! deleted entity keeps its id and renders as the unknown placeholder.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::entity::{Entity, EntityFields, EntityLabel, EntityPatch, EntityType};

/// A candidate entity from an untrusted batch (the storyboard generator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDraft {
    pub entity_type: EntityType,
    pub name: String,
    pub description: String,
}

/// Result of merging a batch of drafts into the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchImport {
    /// Ids minted for drafts that matched nothing.
    pub created: Vec<String>,
    /// Generator-provided label (the draft name) to canonical id.
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Entity>", into = "Vec<Entity>")]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    last_minted: i64,
}

impl From<Vec<Entity>> for EntityRegistry {
    fn from(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            last_minted: 0,
        }
    }
}

impl From<EntityRegistry> for Vec<Entity> {
    fn from(registry: EntityRegistry) -> Self {
        registry.entities
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl EntityRegistry {
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |e| e.entity_type == entity_type)
    }

    pub fn create(&mut self, entity_type: EntityType, fields: EntityFields) -> &Entity {
        let id = self.mint_id(entity_type);
        let voice = match entity_type {
            EntityType::Character => fields.voice,
            EntityType::Environment => None,
        };
        self.entities.push(Entity {
            id,
            entity_type,
            name: fields.name,
            avatar: fields.avatar,
            voice,
            description: fields.description,
        });
        &self.entities[self.entities.len() - 1]
    }

    pub fn update(&mut self, id: &str, patch: EntityPatch) -> Option<&Entity> {
        let entity = self.entities.iter_mut().find(|e| e.id == id)?;
        if let Some(name) = patch.name {
            entity.name = name;
        }
        if let Some(avatar) = patch.avatar {
            entity.avatar = avatar;
        }
        if let Some(description) = patch.description {
            entity.description = description;
        }
        if entity.entity_type == EntityType::Character {
            if let Some(voice) = patch.voice {
                entity.voice = Some(voice);
            }
        }
        Some(&*entity)
    }

    pub fn delete(&mut self, id: &str) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        Some(self.entities.remove(index))
    }

    /// Canonical id for a candidate that is either an id or a display name.
    /// Id matches win over name matches.
    pub fn resolve_reference(&self, candidate: &str) -> Option<&str> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }
        self.get(candidate)
            .or_else(|| self.entities.iter().find(|e| same_name(&e.name, candidate)))
            .map(|e| e.id.as_str())
    }

    /// Merges drafts, reusing any existing entity with the same name.
    pub fn batch_import(&mut self, drafts: Vec<EntityDraft>) -> BatchImport {
        let mut outcome = BatchImport::default();
        for draft in drafts {
            if let Some(existing) = self.resolve_reference(&draft.name) {
                debug!("Draft '{}' resolved to existing entity {existing}", draft.name);
                outcome.labels.insert(draft.name, existing.to_string());
                continue;
            }
            let id = self
                .create(
                    draft.entity_type,
                    EntityFields {
                        name: draft.name.clone(),
                        avatar: String::new(),
                        voice: None,
                        description: draft.description,
                    },
                )
                .id
                .clone();
            outcome.labels.insert(draft.name, id.clone());
            outcome.created.push(id);
        }
        if !outcome.created.is_empty() {
            info!("Batch import created {} entit(ies)", outcome.created.len());
        }
        outcome
    }

    /// Display data for a shot reference. Missing or dangling ids get the
    /// placeholder instead of an error.
    pub fn label(&self, id: Option<&str>) -> EntityLabel {
        match id.and_then(|id| self.get(id)) {
            Some(entity) => EntityLabel::known(entity),
            None => EntityLabel::unknown(id),
        }
    }

    /// Type tag plus a nanosecond timestamp, bumped past the last id this
    /// registry minted so two calls never collide.
    fn mint_id(&mut self, entity_type: EntityType) -> String {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let stamp = now.max(self.last_minted + 1);
        self.last_minted = stamp;
        let mut id = format!("{}{}", entity_type.tag(), stamp);
        while self.get(&id).is_some() {
            self.last_minted += 1;
            id = format!("{}{}", entity_type.tag(), self.last_minted);
        }
        id
    }
}
