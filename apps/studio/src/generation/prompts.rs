// Prompt constants for storyboard generation.

/// System prompt. Enforces JSON-only output.
pub const STORYBOARD_SYSTEM: &str =
    "You are a professional storyboard artist and art director for short-form video. \
    You turn a written shot breakdown into visual shot parameters. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Storyboard prompt template. Replace `{style}`, `{existing_entities}` and
/// `{text_shots}` before sending.
pub const STORYBOARD_PROMPT_TEMPLATE: &str = r#"Style: {style}

Tasks:
1. Read the text shots below and identify the main characters and environments.
2. Check the EXISTING ENTITIES list first. If an entity already exists (same or
   similar name), reference it by its ID. Do NOT create it again.
3. Only create a new entity for a genuinely new character or location.
4. Convert every text shot, in order, into one visual shot.
5. Write imagePrompt and videoPrompt as vivid, detailed prompts that include the
   style keywords. Keep names, descriptions, dialogue and prompts in the language
   of the script.

EXISTING ENTITIES:
{existing_entities}

TEXT SHOTS:
{text_shots}

Return a JSON object with this EXACT schema:
{
  "newEntities": [
    {"type": "character" | "environment", "name": "...", "description": "..."}
  ],
  "visualShots": [
    {
      "characterId": "id of an existing entity, or the name of a new one",
      "environmentId": "id of an existing entity, or the name of a new one",
      "angle": "...",
      "dialogue": "...",
      "imagePrompt": "...",
      "videoPrompt": "..."
    }
  ]
}"#;

/// Used when the request carries no style hint.
pub const DEFAULT_STYLE: &str = "Cinematic concept art, soft volumetric light";
