pub mod handoff;
pub mod loader;
pub mod player;
pub mod schema;
pub mod score;
pub mod types;

pub use handoff::{QuizHandoff, QuizResult};
pub use loader::QuizStore;
pub use player::QuizAttempt;
pub use score::{calculate_score, BadgeThresholds, ResultMeta, ScoreBucket, ScoreTier};
pub use types::{QuizDefinition, QuizQuestion};

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("quiz not found: {0}")]
    NotFound(String),
    #[error("invalid quiz {slug}: {reason}")]
    Invalid { slug: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
