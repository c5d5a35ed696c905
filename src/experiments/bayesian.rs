//! Bayesian comparison of two conversion rates.
//!
//! Each arm gets a Beta(1 + conversions, 1 + failures) posterior. P(variant >
//! control) and the expected losses are estimated by Monte Carlo, drawing
//! Beta samples as ratios of Gamma draws (Marsaglia–Tsang).

use rand::Rng;
use serde::Serialize;
use std::fmt;

use super::stats::ArmCounts;

pub const DEFAULT_SIMULATIONS: usize = 100_000;

const PRIOR_ALPHA: f64 = 1.0;
const PRIOR_BETA: f64 = 1.0;

const CONFIDENT: f64 = 0.95;
const LEANING: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    VariantWins,
    ControlWins,
    VariantLeaning,
    ControlLeaning,
    Inconclusive,
}

impl Recommendation {
    pub fn from_probability(probability_variant_better: f64) -> Self {
        let probability_control_better = 1.0 - probability_variant_better;
        if probability_variant_better > CONFIDENT {
            Recommendation::VariantWins
        } else if probability_control_better > CONFIDENT {
            Recommendation::ControlWins
        } else if probability_variant_better > LEANING {
            Recommendation::VariantLeaning
        } else if probability_control_better > LEANING {
            Recommendation::ControlLeaning
        } else {
            Recommendation::Inconclusive
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Recommendation::VariantWins => {
                "The variant wins with high certainty. Roll out the variant."
            }
            Recommendation::ControlWins => "Control performs better. Keep the current version.",
            Recommendation::VariantLeaning => {
                "The variant looks promising but needs more data for a safe conclusion."
            }
            Recommendation::ControlLeaning => {
                "Control looks better but needs more data for a safe conclusion."
            }
            Recommendation::Inconclusive => "No clear winner yet. Keep collecting data.",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianResult {
    pub probability_variant_better: f64,
    /// Ties count toward control.
    pub probability_control_better: f64,
    /// Average rate given up by keeping control when the variant is better.
    pub expected_loss_control: f64,
    /// Average rate given up by shipping the variant when control is better.
    pub expected_loss_variant: f64,
    pub recommendation: Recommendation,
    pub simulations: usize,
}

pub fn bayesian_analysis<R: Rng>(
    control: ArmCounts,
    variant: ArmCounts,
    simulations: usize,
    rng: &mut R,
) -> BayesianResult {
    if simulations == 0 {
        return BayesianResult {
            probability_variant_better: 0.5,
            probability_control_better: 0.5,
            expected_loss_control: 0.0,
            expected_loss_variant: 0.0,
            recommendation: Recommendation::Inconclusive,
            simulations,
        };
    }

    let control_alpha = PRIOR_ALPHA + control.conversions() as f64;
    let control_beta = PRIOR_BETA + control.failures() as f64;
    let variant_alpha = PRIOR_ALPHA + variant.conversions() as f64;
    let variant_beta = PRIOR_BETA + variant.failures() as f64;

    let mut variant_wins = 0usize;
    let mut total_loss_control = 0.0;
    let mut total_loss_variant = 0.0;

    for _ in 0..simulations {
        let c = sample_beta(control_alpha, control_beta, rng);
        let v = sample_beta(variant_alpha, variant_beta, rng);
        if v > c {
            variant_wins += 1;
            total_loss_control += v - c;
        } else {
            total_loss_variant += c - v;
        }
    }

    let n = simulations as f64;
    let probability_variant_better = variant_wins as f64 / n;

    BayesianResult {
        probability_variant_better,
        probability_control_better: 1.0 - probability_variant_better,
        expected_loss_control: total_loss_control / n,
        expected_loss_variant: total_loss_variant / n,
        recommendation: Recommendation::from_probability(probability_variant_better),
        simulations,
    }
}

// ── Sampling ────────────────────────────────────────────────────────

fn sample_beta<R: Rng>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    let x = sample_gamma(alpha, rng);
    let y = sample_gamma(beta, rng);
    if x + y <= 0.0 {
        return 0.5;
    }
    x / (x + y)
}

/// Marsaglia–Tsang. Shapes below 1 are boosted by one and scaled back with
/// `u^(1/shape)`.
fn sample_gamma<R: Rng>(shape: f64, rng: &mut R) -> f64 {
    if shape < 1.0 {
        let u: f64 = rng.gen();
        return sample_gamma(shape + 1.0, rng) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    loop {
        let (x, v) = loop {
            let x = standard_normal(rng);
            let v = 1.0 + c * x;
            if v > 0.0 {
                break (x, v);
            }
        };
        let v = v * v * v;
        let u: f64 = rng.gen();

        if u < 1.0 - 0.0331 * (x * x) * (x * x) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Box–Muller.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // 1 - [0, 1) keeps u1 away from zero.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
