use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.resolver.registry();
    Json(serde_json::json!({
        "status": "ok",
        "experiments_loaded": registry.len(),
        "experiments_running": registry.running().count(),
        "quiz_dir": state.quizzes.dir().display().to_string(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
