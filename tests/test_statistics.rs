use flocken::experiments::aggregate::ExperimentAggregate;
use flocken::experiments::bayesian::{bayesian_analysis, Recommendation, DEFAULT_SIMULATIONS};
use flocken::experiments::report::ExperimentReport;
use flocken::experiments::sample_size::{calculate_sample_size, SampleSizeParams};
use flocken::experiments::stats::{
    z_test_for_proportions, ArmCounts, Winner, DEFAULT_SIGNIFICANCE_LEVEL,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;

#[test]
fn five_vs_seven_and_a_half_percent_is_a_variant_win() {
    let r = z_test_for_proportions(
        ArmCounts::new(1000, 50),
        ArmCounts::new(1000, 75),
        DEFAULT_SIGNIFICANCE_LEVEL,
    );
    assert!((r.relative_lift - 0.5).abs() < 1e-9, "lift={}", r.relative_lift);
    assert!(r.p_value < 0.05, "p={}", r.p_value);
    assert!(r.significant);
    assert_eq!(r.winner, Some(Winner::Variant));
}

#[test]
fn empty_control_arm_never_yields_nan() {
    let r = z_test_for_proportions(
        ArmCounts::new(0, 0),
        ArmCounts::new(100, 10),
        DEFAULT_SIGNIFICANCE_LEVEL,
    );
    for value in [
        r.control_rate,
        r.variant_rate,
        r.absolute_lift,
        r.relative_lift,
        r.z_score,
        r.p_value,
        r.confidence_level,
        r.confidence_interval.lower,
        r.confidence_interval.upper,
    ] {
        assert!(value.is_finite(), "non-finite value in {r:?}");
    }
    assert_eq!(r.z_score, 0.0);
    assert_eq!(r.winner, None);
}

#[test]
fn bayesian_on_lopsided_data() {
    let mut rng = StdRng::seed_from_u64(2025);
    let r = bayesian_analysis(
        ArmCounts::new(10, 0),
        ArmCounts::new(10, 9),
        DEFAULT_SIMULATIONS,
        &mut rng,
    );
    assert!(r.probability_variant_better > 0.9);
    assert_eq!(r.recommendation, Recommendation::VariantWins);
}

#[test]
fn bayesian_full_run_is_fast_enough() {
    let mut rng = StdRng::seed_from_u64(1);
    let started = Instant::now();
    bayesian_analysis(
        ArmCounts::new(50_000, 2_500),
        ArmCounts::new(50_000, 2_600),
        DEFAULT_SIMULATIONS,
        &mut rng,
    );
    assert!(started.elapsed().as_secs_f64() < 5.0);
}

#[test]
fn bayesian_repeated_runs_land_close_together() {
    let control = ArmCounts::new(2000, 100);
    let variant = ArmCounts::new(2000, 140);
    let runs: Vec<f64> = (0..3)
        .map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            bayesian_analysis(control, variant, DEFAULT_SIMULATIONS, &mut rng)
                .probability_variant_better
        })
        .collect();
    let max = runs.iter().cloned().fold(f64::MIN, f64::max);
    let min = runs.iter().cloned().fold(f64::MAX, f64::min);
    assert!(max - min < 0.02, "runs={runs:?}");
}

#[test]
fn sample_size_matches_reference_calculator() {
    let r = calculate_sample_size(&SampleSizeParams::new(0.05, 0.2)).unwrap();
    assert!(
        (8_100..=8_220).contains(&r.sample_size_per_variant),
        "n={}",
        r.sample_size_per_variant
    );
    assert_eq!(r.total_sample_size, 2 * r.sample_size_per_variant);
    assert_eq!(r.estimated_days_to_complete, r.total_sample_size.div_ceil(100));
}

#[test]
fn report_from_exported_aggregate() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("valkommen_hero_v1.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "experimentId": "valkommen_hero_v1",
            "experimentName": "Välkommen hero",
            "daysRunning": 12,
            "variants": [
                {"variantId": "control", "impressions": 1000, "conversions": 50},
                {"variantId": "variant_c", "impressions": 1000, "conversions": 75}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let aggregate = ExperimentAggregate::load(&path).unwrap();
    let mut rng = StdRng::seed_from_u64(4);
    let report = ExperimentReport::from_aggregate(&aggregate, &mut rng).unwrap();
    let text = report.to_string();
    assert!(text.contains("Välkommen hero"));
    assert!(text.contains("**Days running:** 12"));
    assert!(text.contains("variant_c wins"));
    assert!(text.contains("**P-value:** 0.02"));
}
