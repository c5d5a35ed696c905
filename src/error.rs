use http::StatusCode;
use thiserror::Error;

use crate::experiments::aggregate::AggregateError;
use crate::experiments::config::ExperimentError;
use crate::quiz::QuizError;

#[derive(Error, Debug)]
pub enum FlockenError {
    #[error(transparent)]
    Experiment(#[from] ExperimentError),

    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FlockenError>;

impl From<std::io::Error> for FlockenError {
    fn from(e: std::io::Error) -> Self {
        FlockenError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for FlockenError {
    fn from(e: serde_json::Error) -> Self {
        FlockenError::Json(e.to_string())
    }
}

impl FlockenError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FlockenError::Experiment(ExperimentError::NotFound(_)) => StatusCode::NOT_FOUND,
            FlockenError::Experiment(ExperimentError::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
            FlockenError::Experiment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlockenError::Quiz(QuizError::NotFound(_)) => StatusCode::NOT_FOUND,
            FlockenError::Quiz(QuizError::Invalid { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            FlockenError::Quiz(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlockenError::Aggregate(_) => StatusCode::BAD_REQUEST,
            FlockenError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlockenError::Json(_) => StatusCode::BAD_REQUEST,
            FlockenError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
