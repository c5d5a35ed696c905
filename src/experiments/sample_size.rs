use serde::{Deserialize, Serialize};

use super::stats::{z_from_p, DEFAULT_SIGNIFICANCE_LEVEL};

pub const DEFAULT_POWER: f64 = 0.8;
pub const DEFAULT_DAILY_VISITORS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSizeParams {
    pub baseline_conversion_rate: f64,
    /// Relative lift to detect, e.g. 0.2 for +20%.
    pub minimum_detectable_effect: f64,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    #[serde(default = "default_daily_visitors")]
    pub daily_visitors: u64,
}

fn default_power() -> f64 {
    DEFAULT_POWER
}

fn default_significance_level() -> f64 {
    DEFAULT_SIGNIFICANCE_LEVEL
}

fn default_daily_visitors() -> u64 {
    DEFAULT_DAILY_VISITORS
}

impl SampleSizeParams {
    pub fn new(baseline_conversion_rate: f64, minimum_detectable_effect: f64) -> Self {
        Self {
            baseline_conversion_rate,
            minimum_detectable_effect,
            power: DEFAULT_POWER,
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            daily_visitors: DEFAULT_DAILY_VISITORS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSizeResult {
    pub sample_size_per_variant: u64,
    pub total_sample_size: u64,
    pub estimated_days_to_complete: u64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SampleSizeError {
    #[error("baseline conversion rate must be in (0, 1), got {0}")]
    BaselineOutOfRange(f64),
    #[error("minimum detectable effect must be non-zero and keep the target rate in (0, 1), got {0}")]
    EffectOutOfRange(f64),
    #[error("power must be in (0, 1), got {0}")]
    PowerOutOfRange(f64),
    #[error("significance level must be in (0, 1), got {0}")]
    SignificanceOutOfRange(f64),
    #[error("minimum detectable effect {0} is too small to ever reach significance")]
    EffectTooSmall(f64),
}

/// Largest per-variant n whose total still fits in a `u64`.
const MAX_PER_VARIANT: u64 = u64::MAX / 2;

/// Per-variant n for a two-sided two-proportion test:
///
/// n = (z(1-α/2)·√(2p̄(1-p̄)) + z(power)·√(p1(1-p1) + p2(1-p2)))² / (p2-p1)²
///
/// with p2 = p1·(1 + mde) and p̄ the mean of the two. Days assume one visitor
/// feeds one arm, so the total is divided by the daily traffic.
pub fn calculate_sample_size(
    params: &SampleSizeParams,
) -> Result<SampleSizeResult, SampleSizeError> {
    let p1 = params.baseline_conversion_rate;
    if !(p1.is_finite() && p1 > 0.0 && p1 < 1.0) {
        return Err(SampleSizeError::BaselineOutOfRange(p1));
    }
    let mde = params.minimum_detectable_effect;
    let p2 = p1 * (1.0 + mde);
    if !mde.is_finite() || mde == 0.0 || p2 <= 0.0 || p2 >= 1.0 {
        return Err(SampleSizeError::EffectOutOfRange(mde));
    }
    if !(params.power > 0.0 && params.power < 1.0) {
        return Err(SampleSizeError::PowerOutOfRange(params.power));
    }
    let alpha = params.significance_level;
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(SampleSizeError::SignificanceOutOfRange(alpha));
    }

    let z_alpha = z_from_p(1.0 - alpha / 2.0);
    let z_power = z_from_p(params.power);
    let p_bar = (p1 + p2) / 2.0;

    let numerator = (z_alpha * (2.0 * p_bar * (1.0 - p_bar)).sqrt()
        + z_power * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt())
    .powi(2);
    let n = (numerator / (p2 - p1).powi(2)).ceil();
    if !n.is_finite() || n >= MAX_PER_VARIANT as f64 {
        return Err(SampleSizeError::EffectTooSmall(mde));
    }
    let per_variant = n as u64;
    let total = per_variant * 2;
    let daily = params.daily_visitors.max(1);

    Ok(SampleSizeResult {
        sample_size_per_variant: per_variant,
        total_sample_size: total,
        estimated_days_to_complete: total.div_ceil(daily),
    })
}
