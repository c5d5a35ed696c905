//! Score and answers passed from the quiz to its results view through the
//! URL: `score=<n>&answers=<i,i,-1,...>` where `-1` marks an unanswered
//! question. The results view rebuilds everything from these two values.

use serde::Serialize;

use super::score::{BadgeThresholds, ResultMeta};
use super::types::QuizDefinition;

const UNANSWERED: &str = "-1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizHandoff {
    pub score: usize,
    pub answers: Vec<Option<usize>>,
}

impl QuizHandoff {
    pub fn new(score: usize, answers: Vec<Option<usize>>) -> Self {
        Self { score, answers }
    }

    pub fn answers_param(&self) -> String {
        self.answers
            .iter()
            .map(|a| a.map_or_else(|| UNANSWERED.to_string(), |i| i.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_query(&self) -> String {
        format!("score={}&answers={}", self.score, self.answers_param())
    }

    pub fn result_path(&self, slug: &str) -> String {
        format!("/quiz/{}/result?{}", slug, self.to_query())
    }

    /// Lenient parse of the two query values. The score is clamped to
    /// `0..=question_count` and unparseable input reads as 0. Answers are
    /// padded or truncated to `question_count`; negative or unparseable
    /// entries read as unanswered.
    pub fn parse(score: Option<&str>, answers: Option<&str>, question_count: usize) -> Self {
        let score = score
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(|n| n.clamp(0, question_count as i64) as usize)
            .unwrap_or(0);

        let mut parsed: Vec<Option<usize>> = answers
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.split(',')
                    .map(|part| {
                        part.trim()
                            .parse::<i64>()
                            .ok()
                            .and_then(|n| usize::try_from(n).ok())
                    })
                    .collect()
            })
            .unwrap_or_default();
        parsed.resize(question_count, None);

        Self {
            score,
            answers: parsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReview {
    pub question_id: String,
    pub question: String,
    pub selected_index: Option<usize>,
    pub selected_option: Option<String>,
    /// `None` for profile questions.
    pub correct_index: Option<usize>,
    pub correct_option: Option<String>,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub slug: String,
    pub title: String,
    pub score: usize,
    pub question_count: usize,
    #[serde(flatten)]
    pub meta: ResultMeta,
    pub answers: Vec<AnswerReview>,
}

impl QuizResult {
    pub fn build(
        quiz: &QuizDefinition,
        handoff: &QuizHandoff,
        thresholds: &BadgeThresholds,
    ) -> Self {
        Self {
            slug: quiz.slug.clone(),
            title: quiz.title.clone(),
            score: handoff.score,
            question_count: quiz.questions.len(),
            meta: thresholds.result_meta(handoff.score),
            answers: review_answers(quiz, &handoff.answers),
        }
    }
}

/// A selection pointing past the option list is shown as unanswered.
pub fn review_answers(quiz: &QuizDefinition, answers: &[Option<usize>]) -> Vec<AnswerReview> {
    quiz.questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let options = question.options();
            let selected_index = answers
                .get(i)
                .copied()
                .flatten()
                .filter(|&a| a < options.len());
            let correct_index = question.correct_index();
            AnswerReview {
                question_id: question.id().to_string(),
                question: question.question().to_string(),
                selected_index,
                selected_option: selected_index.map(|a| options[a].clone()),
                correct_index,
                correct_option: correct_index.and_then(|c| options.get(c).cloned()),
                is_correct: question.is_correct(selected_index),
                explanation: question.explanation().map(str::to_string),
            }
        })
        .collect()
}
