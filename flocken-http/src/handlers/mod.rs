use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use flocken::experiments::cookie::assignments_from_cookie_header;
use flocken::experiments::tracking::TracingSink;
use flocken::experiments::{
    AssignmentResolver, Assignments, CookieSettings, ExperimentRegistry, Tracker,
};
use flocken::quiz::{BadgeThresholds, QuizStore};
use flocken::FlockenError;
use std::sync::Arc;

use crate::config::HttpConfig;

pub mod experiments;
pub mod health;
pub mod page;
pub mod quiz;

pub struct AppState {
    pub resolver: AssignmentResolver,
    pub tracker: Tracker,
    pub quizzes: QuizStore,
    pub thresholds: BadgeThresholds,
    pub cookie: CookieSettings,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(registry: ExperimentRegistry, quizzes: QuizStore, env_mode: &str) -> Self {
        Self {
            resolver: AssignmentResolver::new(Arc::new(registry)),
            tracker: Tracker::disabled(),
            quizzes,
            thresholds: BadgeThresholds::default(),
            cookie: CookieSettings::for_environment(env_mode),
            start_time: std::time::Instant::now(),
        }
    }

    /// Loads the registry (an unset file means no experiments) and routes
    /// tracking events to the log.
    pub fn from_config(config: &HttpConfig) -> Result<Self, FlockenError> {
        let registry = match &config.experiments_file {
            Some(path) => ExperimentRegistry::load(path)?,
            None => {
                tracing::info!("FLOCKEN_EXPERIMENTS_FILE not set, running without experiments");
                ExperimentRegistry::empty()
            }
        };
        let mut state = Self::new(registry, QuizStore::new(&config.quiz_dir), &config.env_mode);
        state.tracker = Tracker::disabled().with_sink(Arc::new(TracingSink));
        Ok(state)
    }

    /// Assignments carried by every `Cookie` header on the request.
    pub fn assignments_from_headers(&self, headers: &HeaderMap) -> Assignments {
        let cookies: Vec<&str> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assignments_from_cookie_header(&cookies.join("; "), &self.cookie.name)
    }
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

pub(crate) fn flocken_error_to_response(err: impl Into<FlockenError>) -> Response {
    let err = err.into();
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    error_response(status, err.to_string())
}

pub use experiments::{
    compare, daily_breakdown, experiment_context, experiment_report, list_experiments, sample_size,
};
pub use health::health;
pub use page::page;
pub use quiz::{get_quiz, list_quizzes, quiz_result};
