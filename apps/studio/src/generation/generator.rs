//! Pluggable storyboard generator.
//!
//! `AppState` carries an `Arc<dyn StoryboardGenerator>`. The default backend
//! is `LlmStoryboardGenerator`; tests swap in canned doubles.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::StoryboardError;
use crate::generation::prompts::{DEFAULT_STYLE, STORYBOARD_PROMPT_TEMPLATE, STORYBOARD_SYSTEM};
use crate::llm_client::LlmClient;
use crate::models::project::{Episode, TextShot};
use crate::timeline::registry::EntityRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct EntityContext {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

/// Everything the generator sees. Built from a snapshot, so the call can
/// run without holding the workspace lock.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub style: String,
    pub existing_entities: Vec<EntityContext>,
    pub text_shots: Vec<TextShot>,
}

impl GenerationRequest {
    pub fn new(registry: &EntityRegistry, episode: &Episode, style: Option<&str>) -> Self {
        let existing_entities = registry
            .entities()
            .iter()
            .map(|e| EntityContext {
                id: e.id.clone(),
                name: e.name.clone(),
                entity_type: serde_json::to_value(e.entity_type)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            style: style
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_STYLE)
                .to_string(),
            existing_entities,
            text_shots: episode.text_shots.clone(),
        }
    }

    pub fn render_prompt(&self) -> String {
        let existing = if self.existing_entities.is_empty() {
            "None".to_string()
        } else {
            self.existing_entities
                .iter()
                .map(|e| format!("Name: {}, ID: {}, Type: {}", e.name, e.id, e.entity_type))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let text_shots =
            serde_json::to_string_pretty(&self.text_shots).unwrap_or_else(|_| "[]".to_string());

        STORYBOARD_PROMPT_TEMPLATE
            .replace("{style}", &self.style)
            .replace("{existing_entities}", &existing)
            .replace("{text_shots}", &text_shots)
    }
}

/// Implement this to swap generation backends without touching handlers.
/// Output is raw JSON; validation happens in `generation::schema`.
#[async_trait]
pub trait StoryboardGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, StoryboardError>;
}

pub struct LlmStoryboardGenerator {
    llm: LlmClient,
}

impl LlmStoryboardGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StoryboardGenerator for LlmStoryboardGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, StoryboardError> {
        info!(
            "Generating storyboard for {} text shot(s) with {} known entities",
            request.text_shots.len(),
            request.existing_entities.len()
        );
        self.llm
            .call_json(&request.render_prompt(), STORYBOARD_SYSTEM)
            .await
            .map_err(|e| StoryboardError::external("generate", e.to_string()))
    }
}
