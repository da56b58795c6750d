use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;
use crate::sync::SyncStatus;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "studio"
    }))
}

/// GET /api/v1/sync/status
pub async fn sync_status_handler(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}
