// Storyboard generation: prompt building, the pluggable generator, the
// schema boundary for its output and the import into an episode.
// All model calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod import;
pub mod prompts;
pub mod schema;
