use serde::{Deserialize, Serialize};

use super::types::QuizDefinition;

/// Number of answered questions whose selection matches the right answer.
/// Unanswered and profile questions never count; answers beyond the
/// question list are ignored.
pub fn calculate_score(quiz: &QuizDefinition, answers: &[Option<usize>]) -> usize {
    quiz.questions
        .iter()
        .zip(answers.iter().copied())
        .filter(|(question, answer)| question.is_correct(*answer))
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    Bronze,
    Silver,
    Gold,
}

/// Coarse analytics bucket, independent of the badge thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBucket {
    Low,
    Med,
    High,
}

pub fn score_bucket(score: usize) -> ScoreBucket {
    match score {
        0..=4 => ScoreBucket::Low,
        5..=7 => ScoreBucket::Med,
        _ => ScoreBucket::High,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeta {
    pub badge: String,
    pub tier: ScoreTier,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCopy {
    pub badge: String,
    pub interpretation: String,
}

/// Score → tier step function. A score at or below `bronze_max` is bronze,
/// at or below `silver_max` silver, anything higher gold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeThresholds {
    pub bronze_max: usize,
    pub silver_max: usize,
    pub bronze: TierCopy,
    pub silver: TierCopy,
    pub gold: TierCopy,
}

impl Default for BadgeThresholds {
    fn default() -> Self {
        Self {
            bronze_max: 4,
            silver_max: 7,
            bronze: TierCopy {
                badge: "Nyfiken hundvän".to_string(),
                interpretation: "Du är på god väg! Kolla igenom svaren nedan och lär dig något nytt inför nästa försök.".to_string(),
            },
            silver: TierCopy {
                badge: "Skarp hundkännare".to_string(),
                interpretation: "Bra koll! Du har stenkoll på grunderna. Se vilka frågor som lurade dig nedan.".to_string(),
            },
            gold: TierCopy {
                badge: "Hundexpert".to_string(),
                interpretation: "Imponerande! Du kan dina hundfakta. Utmana en kompis och se om de kan slå dig.".to_string(),
            },
        }
    }
}

impl BadgeThresholds {
    pub fn tier(&self, score: usize) -> ScoreTier {
        if score <= self.bronze_max {
            ScoreTier::Bronze
        } else if score <= self.silver_max {
            ScoreTier::Silver
        } else {
            ScoreTier::Gold
        }
    }

    pub fn result_meta(&self, score: usize) -> ResultMeta {
        let tier = self.tier(score);
        let copy = match tier {
            ScoreTier::Bronze => &self.bronze,
            ScoreTier::Silver => &self.silver,
            ScoreTier::Gold => &self.gold,
        };
        ResultMeta {
            badge: copy.badge.clone(),
            tier,
            interpretation: copy.interpretation.clone(),
        }
    }
}
