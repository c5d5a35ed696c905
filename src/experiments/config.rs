use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ExperimentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub variants: Vec<Variant>,
    /// URL paths where the experiment runs, matched exactly.
    pub target_pages: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
}

impl ExperimentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentStatus::Draft => "draft",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Paused => "paused",
            ExperimentStatus::Completed => "completed",
        }
    }
}

/// One treatment arm. `weight` is relative: the selector normalises against
/// the sum of all weights in the experiment, so 50/50 and 1/1 behave the same.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub weight: f64,
    #[serde(default)]
    pub content: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("experiment not found: {0}")]
    NotFound(String),
    #[error("experiment already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_experiment_date(value: &str) -> Result<DateTime<Utc>, ExperimentError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ExperimentError::InvalidConfig(format!("unparseable date: {value}")))
}

impl Experiment {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.id.trim().is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "experiment id must not be empty".to_string(),
            ));
        }
        if self.variants.is_empty() {
            return Err(ExperimentError::InvalidConfig(format!(
                "experiment {} has no variants",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant.id.as_str()) {
                return Err(ExperimentError::InvalidConfig(format!(
                    "experiment {} has duplicate variant id {}",
                    self.id, variant.id
                )));
            }
            if !variant.weight.is_finite() || variant.weight < 0.0 {
                return Err(ExperimentError::InvalidConfig(format!(
                    "variant {}/{} has invalid weight {}",
                    self.id, variant.id, variant.weight
                )));
            }
        }
        let start = self.start_date.as_deref().map(parse_experiment_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_experiment_date).transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ExperimentError::InvalidConfig(format!(
                    "experiment {} ends before it starts",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// `status == running` and `now` inside the optional date window.
    /// An unparseable date counts as inactive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.status != ExperimentStatus::Running {
            return false;
        }
        if let Some(raw) = self.start_date.as_deref() {
            match parse_experiment_date(raw) {
                Ok(start) if start > now => return false,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        if let Some(raw) = self.end_date.as_deref() {
            match parse_experiment_date(raw) {
                Ok(end) if end < now => return false,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        true
    }

    pub fn targets(&self, path: &str) -> bool {
        self.target_pages.iter().any(|p| p == path)
    }

    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

impl Variant {
    /// Typed content lookup; falls back to `default` when the key is missing
    /// or holds a value of another shape.
    pub fn content_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.content
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }
}
