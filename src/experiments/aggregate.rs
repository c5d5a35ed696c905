//! Per-variant counts exported by the analytics pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::stats::ArmCounts;
use crate::error::Result;

pub const CONTROL_VARIANT_ID: &str = "control";

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("need at least two variants to compare, got {0}")]
    NotEnoughVariants(usize),
    #[error("variant listed twice: {0}")]
    DuplicateVariant(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAggregate {
    pub variant_id: String,
    /// Unique visitors that saw the variant.
    pub impressions: u64,
    /// Unique visitors that converted.
    pub conversions: u64,
}

impl VariantAggregate {
    pub fn counts(&self) -> ArmCounts {
        ArmCounts::new(self.impressions, self.conversions)
    }
}

/// One variant's counts for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    /// Export date as written by the pipeline, `YYYYMMDD` or `YYYY-MM-DD`.
    pub date: String,
    pub variant_id: String,
    pub impressions: u64,
    pub conversions: u64,
}

impl DailyAggregate {
    pub fn counts(&self) -> ArmCounts {
        ArmCounts::new(self.impressions, self.conversions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAggregate {
    pub experiment_id: String,
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub days_running: u32,
    pub variants: Vec<VariantAggregate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub daily: Vec<DailyAggregate>,
}

impl ExperimentAggregate {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let aggregate: Self = serde_json::from_str(&data)?;
        aggregate.validate()?;
        tracing::debug!(
            path = %path.display(),
            experiment = %aggregate.experiment_id,
            variants = aggregate.variants.len(),
            "Loaded experiment aggregate"
        );
        Ok(aggregate)
    }

    pub fn validate(&self) -> std::result::Result<(), AggregateError> {
        if self.variants.len() < 2 {
            return Err(AggregateError::NotEnoughVariants(self.variants.len()));
        }
        let mut seen = HashSet::new();
        for v in &self.variants {
            if !seen.insert(v.variant_id.as_str()) {
                return Err(AggregateError::DuplicateVariant(v.variant_id.clone()));
            }
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        self.experiment_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.experiment_id)
    }

    pub fn total_visitors(&self) -> u64 {
        self.variants
            .iter()
            .fold(0u64, |total, v| total.saturating_add(v.impressions))
    }

    /// Daily rows, newest date first and variants alphabetical within a day.
    pub fn daily_newest_first(&self) -> Vec<&DailyAggregate> {
        let mut rows: Vec<&DailyAggregate> = self.daily.iter().collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.variant_id.cmp(&b.variant_id))
        });
        rows
    }

    /// Control is the `control` row, or the first row when none is named so.
    /// The challenger is the first other row.
    pub fn control_and_challenger(
        &self,
    ) -> std::result::Result<(&VariantAggregate, &VariantAggregate), AggregateError> {
        if self.variants.len() < 2 {
            return Err(AggregateError::NotEnoughVariants(self.variants.len()));
        }
        let control_idx = self
            .variants
            .iter()
            .position(|v| v.variant_id == CONTROL_VARIANT_ID)
            .unwrap_or(0);
        let challenger_idx = (0..self.variants.len())
            .find(|&i| i != control_idx)
            .ok_or(AggregateError::NotEnoughVariants(self.variants.len()))?;
        Ok((&self.variants[control_idx], &self.variants[challenger_idx]))
    }
}
