use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{QuizDefinition, QuizQuestion};
use super::QuizError;

pub const QUESTIONS_PER_QUIZ: usize = 10;
pub const MIN_OPTIONS: usize = 2;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("slug pattern is a valid regex"));

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Parses and validates one quiz definition.
pub fn parse_quiz_definition(raw: &str, source: &str) -> Result<QuizDefinition, QuizError> {
    let quiz: QuizDefinition = serde_json::from_str(raw).map_err(|e| QuizError::Invalid {
        slug: source.to_string(),
        reason: e.to_string(),
    })?;
    validate_quiz_definition(&quiz)?;
    Ok(quiz)
}

pub fn validate_quiz_definition(quiz: &QuizDefinition) -> Result<(), QuizError> {
    let invalid = |reason: String| QuizError::Invalid {
        slug: quiz.slug.clone(),
        reason,
    };

    if !is_valid_slug(&quiz.slug) {
        return Err(invalid(format!("slug {:?} must match [a-z0-9_-]+", quiz.slug)));
    }
    if quiz.title.trim().is_empty() {
        return Err(invalid("title must not be empty".to_string()));
    }
    if quiz.description.trim().is_empty() {
        return Err(invalid("description must not be empty".to_string()));
    }
    if quiz.questions.len() != QUESTIONS_PER_QUIZ {
        return Err(invalid(format!(
            "expected {} questions, got {}",
            QUESTIONS_PER_QUIZ,
            quiz.questions.len()
        )));
    }

    for question in &quiz.questions {
        let id = question.id();
        if id.trim().is_empty() {
            return Err(invalid("question id must not be empty".to_string()));
        }
        if question.question().trim().is_empty() {
            return Err(invalid(format!("question {id} has no text")));
        }
        let options = question.options();
        if options.len() < MIN_OPTIONS {
            return Err(invalid(format!(
                "question {id} needs at least {MIN_OPTIONS} options"
            )));
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(invalid(format!("question {id} has an empty option")));
        }

        if let QuizQuestion::Fact(fact) = question {
            if fact.correct_index >= options.len() {
                return Err(invalid(format!(
                    "question {id}: correctIndex ({}) is out of range",
                    fact.correct_index
                )));
            }
            if fact.explanation.trim().is_empty() {
                return Err(invalid(format!("question {id} has no explanation")));
            }
            if fact.sources.is_empty() || fact.sources.iter().any(|s| s.trim().is_empty()) {
                return Err(invalid(format!("question {id} needs non-empty sources")));
            }
            if fact.fact_id.trim().is_empty() {
                return Err(invalid(format!("question {id} has no factId")));
            }
        }
    }

    Ok(())
}

/// Quiz documents for tests in this crate and its dependents.
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures {
    use serde_json::{json, Value};

    pub fn fact(i: usize) -> Value {
        json!({
            "id": format!("q{i}"),
            "type": "fact",
            "question": format!("Fråga {i}?"),
            "options": ["A", "B", "C"],
            "correctIndex": i % 3,
            "explanation": "Förklaring.",
            "sources": ["https://example.org/hundfakta"],
            "factId": format!("fact_{i}")
        })
    }

    pub fn profile(i: usize) -> Value {
        json!({
            "id": format!("p{i}"),
            "type": "profile",
            "question": "Vilken hund har du?",
            "options": ["Liten", "Stor"]
        })
    }

    /// Nine fact questions and a trailing profile question.
    pub fn quiz_json(slug: &str) -> Value {
        let mut questions: Vec<Value> = (0..9).map(fact).collect();
        questions.push(profile(9));
        json!({
            "slug": slug,
            "title": "Hundraser",
            "description": "Hur väl känner du hundraserna?",
            "questions": questions
        })
    }
}
