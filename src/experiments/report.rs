//! Markdown reports for chat-ops tooling and the CLI.

use rand::Rng;
use serde::Serialize;
use std::fmt::{self, Write as _};

use super::aggregate::{AggregateError, ExperimentAggregate};
use super::bayesian::{bayesian_analysis, BayesianResult, DEFAULT_SIMULATIONS};
use super::config::Experiment;
use super::sample_size::{SampleSizeParams, SampleSizeResult};
use super::stats::{
    z_test_for_proportions, ArmCounts, Winner, ZTestResult, DEFAULT_SIGNIFICANCE_LEVEL,
};

/// Below this many visitors in total the report asks for more traffic
/// instead of a more distinct variant.
const LOW_VOLUME_VISITORS: u64 = 1_000;
const MIN_VISITORS_PER_VARIANT: u64 = 500;
/// Daily tables stop after this many rows.
pub const MAX_DAILY_ROWS: usize = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentReport {
    pub experiment_id: String,
    pub experiment_name: String,
    pub days_running: u32,
    pub control_id: String,
    pub variant_id: String,
    pub control: ArmCounts,
    pub variant: ArmCounts,
    pub z_test: ZTestResult,
    pub bayesian: BayesianResult,
}

impl ExperimentReport {
    #[allow(clippy::too_many_arguments)]
    pub fn from_counts<R: Rng>(
        experiment_id: &str,
        experiment_name: &str,
        days_running: u32,
        control_id: &str,
        control: ArmCounts,
        variant_id: &str,
        variant: ArmCounts,
        rng: &mut R,
    ) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            experiment_name: experiment_name.to_string(),
            days_running,
            control_id: control_id.to_string(),
            variant_id: variant_id.to_string(),
            control,
            variant,
            z_test: z_test_for_proportions(control, variant, DEFAULT_SIGNIFICANCE_LEVEL),
            bayesian: bayesian_analysis(control, variant, DEFAULT_SIMULATIONS, rng),
        }
    }

    pub fn from_aggregate<R: Rng>(
        aggregate: &ExperimentAggregate,
        rng: &mut R,
    ) -> Result<Self, AggregateError> {
        let (control, challenger) = aggregate.control_and_challenger()?;
        Ok(Self::from_counts(
            &aggregate.experiment_id,
            aggregate.display_name(),
            aggregate.days_running,
            &control.variant_id,
            control.counts(),
            &challenger.variant_id,
            challenger.counts(),
            rng,
        ))
    }

    pub fn total_visitors(&self) -> u64 {
        self.control.visitors.saturating_add(self.variant.visitors)
    }

    pub fn to_markdown(&self) -> String {
        let z = &self.z_test;
        let confidence = format!("{:.1}%", z.confidence_level);
        let mut out = String::new();

        let _ = writeln!(out, "## A/B test report: {}\n", self.experiment_name);
        let _ = writeln!(out, "**Experiment ID:** {}", self.experiment_id);
        let _ = writeln!(out, "**Days running:** {}\n", self.days_running);

        out.push_str("### Results\n\n");
        out.push_str("| Variant | Visitors | Conversions | Conversion rate |\n");
        out.push_str("|---------|----------|-------------|-----------------|\n");
        for (label, counts, rate) in [
            (self.control_id.as_str(), self.control, z.control_rate),
            (self.variant_id.as_str(), self.variant, z.variant_rate),
        ] {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.2}% |",
                label,
                group_thousands(counts.visitors),
                group_thousands(counts.conversions()),
                rate * 100.0
            );
        }

        out.push_str("\n### Analysis\n\n");
        let _ = writeln!(out, "- **Relative change:** {:+.1}%", z.relative_lift * 100.0);
        let _ = writeln!(
            out,
            "- **Statistical significance:** {} {}",
            confidence,
            if z.significant { "✅" } else { "⏳" }
        );
        let _ = writeln!(out, "- **P-value:** {:.4}", z.p_value);
        let _ = writeln!(out, "- **Z-score:** {:.2}", z.z_score);
        let _ = writeln!(
            out,
            "- **95% CI (absolute difference):** {:+.2} to {:+.2} percentage points",
            z.confidence_interval.lower * 100.0,
            z.confidence_interval.upper * 100.0
        );
        let _ = writeln!(
            out,
            "- **Bayesian probability (variant better):** {:.1}%\n",
            self.bayesian.probability_variant_better * 100.0
        );

        out.push_str("### Recommendation\n\n");
        match z.winner {
            Some(Winner::Variant) => {
                let _ = writeln!(
                    out,
                    "🏆 **{} wins!** Statistically significant at {} confidence.\n",
                    self.variant_id, confidence
                );
                out.push_str("You can stop the test and roll the variant out permanently.\n");
            }
            Some(Winner::Control) => {
                let _ = writeln!(
                    out,
                    "📊 **{} performs better.** Statistically significant at {} confidence.\n",
                    self.control_id, confidence
                );
                out.push_str("Keep the current version.\n");
            }
            None => {
                let _ = writeln!(
                    out,
                    "⏳ **No winner yet.** {}\n",
                    self.bayesian.recommendation.message()
                );
                if self.total_visitors() < LOW_VOLUME_VISITORS {
                    let _ = writeln!(
                        out,
                        "Next step: keep the test running until each variant has at least {} visitors.",
                        MIN_VISITORS_PER_VARIANT
                    );
                } else {
                    out.push_str(
                        "Next step: keep collecting data or consider testing a more distinct variant.\n",
                    );
                }
            }
        }

        out
    }
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

pub fn format_sample_size_report(params: &SampleSizeParams, result: &SampleSizeResult) -> String {
    let target = params.baseline_conversion_rate * (1.0 + params.minimum_detectable_effect);
    let mut out = String::new();
    out.push_str("## Sample size estimate\n\n");
    let _ = writeln!(
        out,
        "- **Baseline conversion rate:** {:.2}%",
        params.baseline_conversion_rate * 100.0
    );
    let _ = writeln!(
        out,
        "- **Minimum detectable effect:** {:+.1}% (target rate {:.2}%)",
        params.minimum_detectable_effect * 100.0,
        target * 100.0
    );
    let _ = writeln!(out, "- **Power:** {:.0}%", params.power * 100.0);
    let _ = writeln!(
        out,
        "- **Significance level:** {:.0}%\n",
        params.significance_level * 100.0
    );
    let _ = writeln!(
        out,
        "You need **{}** visitors per variant ({} in total).",
        group_thousands(result.sample_size_per_variant),
        group_thousands(result.total_sample_size)
    );
    let _ = writeln!(
        out,
        "At {} visitors per day that takes about **{} days**.",
        group_thousands(params.daily_visitors),
        result.estimated_days_to_complete
    );
    out
}

/// Per-day, per-variant table for spotting trends, newest day first.
pub fn format_daily_breakdown(aggregate: &ExperimentAggregate) -> String {
    if aggregate.daily.is_empty() {
        return format!(
            "No daily data recorded for experiment \"{}\".\n",
            aggregate.experiment_id
        );
    }

    let mut out = String::new();
    let _ = writeln!(out, "## Daily breakdown: {}\n", aggregate.display_name());
    out.push_str("| Date | Variant | Impressions | Conversions | Conversion rate |\n");
    out.push_str("|------|---------|-------------|-------------|-----------------|\n");
    let rows = aggregate.daily_newest_first();
    for row in rows.iter().take(MAX_DAILY_ROWS) {
        let counts = row.counts();
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {:.2}% |",
            row.date,
            row.variant_id,
            group_thousands(counts.visitors),
            group_thousands(counts.conversions()),
            counts.rate() * 100.0
        );
    }
    if rows.len() > MAX_DAILY_ROWS {
        let _ = writeln!(out, "\n_{} older rows not shown._", rows.len() - MAX_DAILY_ROWS);
    }
    out
}

pub fn format_experiment_list(experiments: &[Experiment]) -> String {
    if experiments.is_empty() {
        return "No experiments configured.\n".to_string();
    }

    let mut out = String::from("## Experiments\n\n");
    for experiment in experiments {
        let variants: Vec<&str> = experiment.variants.iter().map(|v| v.id.as_str()).collect();
        let _ = writeln!(
            out,
            "- **{}** ({}): {} [{}] on {}",
            experiment.id,
            experiment.status.as_str(),
            experiment.name,
            variants.join(", "),
            experiment.target_pages.join(", ")
        );
    }
    out
}

/// `1234567` → `1,234,567`
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
