use serde::{Deserialize, Serialize};

// ── Inputs ──────────────────────────────────────────────────────────

/// Unique visitors and unique converting visitors for one arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmCounts {
    pub visitors: u64,
    pub conversions: u64,
}

impl ArmCounts {
    pub fn new(visitors: u64, conversions: u64) -> Self {
        Self {
            visitors,
            conversions,
        }
    }

    /// Conversions above the visitor count are capped at it.
    pub fn conversions(&self) -> u64 {
        self.conversions.min(self.visitors)
    }

    pub fn failures(&self) -> u64 {
        self.visitors - self.conversions()
    }

    /// 0.0 for an arm with no visitors.
    pub fn rate(&self) -> f64 {
        if self.visitors == 0 {
            return 0.0;
        }
        self.conversions() as f64 / self.visitors as f64
    }
}

// ── Result Structs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Control,
    Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZTestResult {
    pub control_rate: f64,
    pub variant_rate: f64,
    pub absolute_lift: f64,
    /// Fraction of the control rate; 0.0 when the control rate is 0.
    pub relative_lift: f64,
    pub z_score: f64,
    pub p_value: f64,
    /// `(1 - p) * 100`
    pub confidence_level: f64,
    pub significant: bool,
    pub winner: Option<Winner>,
    /// 95% interval on `absolute_lift`.
    pub confidence_interval: ConfidenceInterval,
}

pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

const CI_Z_CRITICAL: f64 = 1.96;

// ── Normal CDF (A&S 7.1.26) ─────────────────────────────────────────

/// Standard normal CDF through the A&S 7.1.26 erf approximation
/// (absolute error ≤ 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Inverse normal CDF (A&S 26.2.23). Returns z such that P(Z < z) = p.
pub fn z_from_p(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (tail, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * tail.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let z = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);
    sign * z
}

// ── Two-Proportion Z-Test ───────────────────────────────────────────

/// Pooled two-proportion z-test, two-tailed.
///
/// Degenerate inputs (an empty arm, identical 0% or 100% rates) give
/// `z = 0`, `p = 1`, no winner. The interval uses the unpooled standard
/// error of the difference.
pub fn z_test_for_proportions(
    control: ArmCounts,
    variant: ArmCounts,
    significance_level: f64,
) -> ZTestResult {
    let control_rate = control.rate();
    let variant_rate = variant.rate();
    let absolute_lift = variant_rate - control_rate;
    let relative_lift = if control_rate > 0.0 {
        absolute_lift / control_rate
    } else {
        0.0
    };

    let n_c = control.visitors as f64;
    let n_v = variant.visitors as f64;

    let standard_error = if control.visitors == 0 || variant.visitors == 0 {
        0.0
    } else {
        let pooled = (control.conversions() as f64 + variant.conversions() as f64) / (n_c + n_v);
        (pooled * (1.0 - pooled) * (1.0 / n_c + 1.0 / n_v))
            .max(0.0)
            .sqrt()
    };

    let z_score = if standard_error > 0.0 {
        absolute_lift / standard_error
    } else {
        0.0
    };
    let p_value = (2.0 * (1.0 - normal_cdf(z_score.abs()))).clamp(0.0, 1.0);
    let significant = p_value < significance_level;

    let winner = if !significant {
        None
    } else if variant_rate > control_rate {
        Some(Winner::Variant)
    } else {
        Some(Winner::Control)
    };

    let arm_variance = |rate: f64, n: f64| if n > 0.0 { rate * (1.0 - rate) / n } else { 0.0 };
    let se_diff = (arm_variance(control_rate, n_c) + arm_variance(variant_rate, n_v))
        .max(0.0)
        .sqrt();

    ZTestResult {
        control_rate,
        variant_rate,
        absolute_lift,
        relative_lift,
        z_score,
        p_value,
        confidence_level: (1.0 - p_value) * 100.0,
        significant,
        winner,
        confidence_interval: ConfidenceInterval {
            lower: absolute_lift - CI_Z_CRITICAL * se_diff,
            upper: absolute_lift + CI_Z_CRITICAL * se_diff,
        },
    }
}
