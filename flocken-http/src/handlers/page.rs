use axum::{extract::Extension, http::Uri, Json};
use flocken::experiments::ExperimentContext;

/// Stands in for the page renderer: echoes the path and the experiment
/// context the assignment middleware resolved for it.
pub async fn page(
    uri: Uri,
    context: Option<Extension<ExperimentContext>>,
) -> Json<serde_json::Value> {
    let context = context.map(|Extension(ctx)| ctx).unwrap_or_default();
    Json(serde_json::json!({
        "path": uri.path(),
        "experiments": context,
    }))
}
