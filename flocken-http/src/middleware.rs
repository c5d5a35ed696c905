//! Experiment assignment for page requests.
//!
//! Runs before the page handler: reads the assignment cookie, assigns any
//! active experiment the visitor has not seen yet, emits one impression per
//! new assignment and hands the resulting [`ExperimentContext`] to the
//! handler through request extensions.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use flocken::experiments::ExperimentContext;
use std::sync::Arc;

use crate::handlers::AppState;

/// Framework assets, API routes and anything that looks like a file are
/// never assigned.
pub fn is_page_path(path: &str) -> bool {
    !(path.starts_with("/_next")
        || path.starts_with("/api")
        || path == "/health"
        || path.contains('.'))
}

pub async fn assign_experiments(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_page_path(&path) {
        return next.run(request).await;
    }

    let existing = state.assignments_from_headers(request.headers());
    let resolution = state
        .resolver
        .resolve(&path, existing, Utc::now(), &mut rand::thread_rng());
    state
        .tracker
        .impressions(state.resolver.registry(), &resolution.new_assignments);

    let set_cookie = resolution
        .needs_cookie_write()
        .then(|| state.cookie.set_cookie_header(&resolution.assignments));
    let context: ExperimentContext = state.resolver.context(&resolution.assignments);
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(path = %path, error = %e, "Dropping assignment cookie"),
        }
    }
    response
}
