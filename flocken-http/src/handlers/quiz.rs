use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flocken::quiz::types::QuizSummary;
use flocken::quiz::{QuizHandoff, QuizResult};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_response, flocken_error_to_response, AppState};

pub async fn list_quizzes(State(state): State<Arc<AppState>>) -> Response {
    match state.quizzes.all() {
        Ok(quizzes) => {
            let summaries: Vec<QuizSummary> = quizzes.iter().map(QuizSummary::from).collect();
            Json(summaries).into_response()
        }
        Err(e) => flocken_error_to_response(e),
    }
}

pub async fn get_quiz(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    match state.quizzes.by_slug(&slug) {
        Ok(Some(quiz)) => Json(quiz).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("quiz not found: {slug}")),
        Err(e) => flocken_error_to_response(e),
    }
}

/// Query string of the results link: `score=<n>&answers=<i,i,-1,...>`.
#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub answers: Option<String>,
}

/// Rebuilds the results view from the hand-off parameters alone. Missing or
/// malformed parameters degrade to a zero score with nothing answered.
pub async fn quiz_result(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<ResultQuery>,
) -> Response {
    let quiz = match state.quizzes.require(&slug) {
        Ok(quiz) => quiz,
        Err(e) => return flocken_error_to_response(e),
    };
    let handoff = QuizHandoff::parse(
        query.score.as_deref(),
        query.answers.as_deref(),
        quiz.questions.len(),
    );
    Json(QuizResult::build(&quiz, &handoff, &state.thresholds)).into_response()
}
