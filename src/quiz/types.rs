use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<QuizImages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizImages {
    pub card_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_alt: Option<String>,
}

/// Fact questions have a right answer; profile questions only collect a
/// preference and never count toward the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuizQuestion {
    Fact(FactQuestion),
    Profile(ProfileQuestion),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    pub sources: Vec<String>,
    pub fact_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
}

impl QuizQuestion {
    pub fn id(&self) -> &str {
        match self {
            QuizQuestion::Fact(q) => &q.id,
            QuizQuestion::Profile(q) => &q.id,
        }
    }

    pub fn question(&self) -> &str {
        match self {
            QuizQuestion::Fact(q) => &q.question,
            QuizQuestion::Profile(q) => &q.question,
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            QuizQuestion::Fact(q) => &q.options,
            QuizQuestion::Profile(q) => &q.options,
        }
    }

    pub fn correct_index(&self) -> Option<usize> {
        match self {
            QuizQuestion::Fact(q) => Some(q.correct_index),
            QuizQuestion::Profile(_) => None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            QuizQuestion::Fact(q) => Some(&q.explanation),
            QuizQuestion::Profile(_) => None,
        }
    }

    pub fn is_correct(&self, answer: Option<usize>) -> bool {
        matches!((self.correct_index(), answer), (Some(c), Some(a)) if c == a)
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub question_count: usize,
}

impl From<&QuizDefinition> for QuizSummary {
    fn from(quiz: &QuizDefinition) -> Self {
        Self {
            slug: quiz.slug.clone(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            question_count: quiz.questions.len(),
        }
    }
}
