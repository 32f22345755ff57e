//! The estimator recovers what the simulator injected.
//!
//! With zero noise, a user fixed-effects regression of an outcome on `post`
//! returns mean(curve over post months) − mean(curve over pre months).

use mindtheapp_core::{
    config::{CohortConfig, EffectCurves, MonthWindow, NormalParams, OutcomeConfig, SimConfig},
    estimator::{estimate, estimate_with, EstimatorSpec},
    simulator::generate,
    ErrorKind, PanelError,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn log_spend(window: MonthWindow, users: usize, curve: Vec<f64>, noise: f64) -> SimConfig {
    SimConfig {
        seed: 42,
        window,
        cohorts: vec![CohortConfig::new("X", users)],
        outcomes: vec![OutcomeConfig::additive("log_spend", NormalParams::new(5.0, 0.3), noise)],
        covariates: Vec::new(),
        curves: EffectCurves::new().with("X", "log_spend", curve),
    }
}

fn step(window: MonthWindow, effect: f64) -> Vec<f64> {
    window.months().map(|m| if m >= 0 { effect } else { 0.0 }).collect()
}

fn noiseless_test_config() -> SimConfig {
    let mut cfg = SimConfig::default_test();
    for outcome in &mut cfg.outcomes {
        outcome.noise_sd = 0.0;
    }
    // Whole-number fixed effects keep the count outcome free of rounding.
    cfg.outcomes[0].fixed_effect = NormalParams::fixed(2.0);
    cfg
}

// ── Zero-noise recovery ──────────────────────────────────────────────────────

#[test]
fn zero_noise_recovers_post_minus_pre_curve_average() {
    init_logger();
    let cfg = noiseless_test_config();
    let table = generate(&cfg).unwrap();

    for cohort in ["X", "N"] {
        for outcome in ["logins", "log_spend"] {
            let truth = cfg.injected_effect(cohort, outcome).unwrap();
            let r = estimate_with(&table, outcome, cohort, &EstimatorSpec::entity_only()).unwrap();
            assert!(
                (r.coefficient - truth).abs() < 1e-9,
                "{cohort}/{outcome}: estimated {} vs injected {truth}",
                r.coefficient
            );
        }
    }
}

#[test]
fn two_month_scenario_recovers_minus_0_116() {
    let window = MonthWindow::new(-1, 0);
    let cfg = log_spend(window, 100, vec![0.0, -0.116], 0.0);
    let table = generate(&cfg).unwrap();
    assert_eq!(table.len(), 200);

    let r = estimate_with(&table, "log_spend", "X", &EstimatorSpec::entity_only()).unwrap();
    assert!((r.coefficient - (-0.116)).abs() < 1e-9, "got {}", r.coefficient);
    assert_eq!(r.n_entities, 100);
    assert_eq!(r.n_clusters, 100);
    assert_eq!(r.regressor, "post");
}

#[test]
fn two_way_effects_recover_the_step_under_staggered_adoption() {
    let window = MonthWindow::new(-1, 0);
    let mut cfg = log_spend(window, 100, vec![0.0, -0.116], 0.0);
    cfg.cohorts[0] = CohortConfig::new("X", 100).with_install_spread(2);
    let table = generate(&cfg).unwrap();

    let r = estimate(&table, "log_spend", "X").unwrap();
    assert!((r.coefficient - (-0.116)).abs() < 1e-9, "got {}", r.coefficient);
    assert!(r.spec.time_effects && r.spec.entity_effects);
    assert_eq!(r.n_time_periods, 4, "calendar months −1..=2");
}

#[test]
fn two_way_effects_recover_a_longer_step() {
    let window = MonthWindow::new(-3, 4);
    let mut cfg = log_spend(window, 150, step(window, 0.25), 0.0);
    cfg.cohorts[0] = CohortConfig::new("X", 150).with_install_spread(4);
    let table = generate(&cfg).unwrap();

    let r = estimate(&table, "log_spend", "X").unwrap();
    assert!((r.coefficient - 0.25).abs() < 1e-9, "got {}", r.coefficient);
}

#[test]
fn two_month_window_without_pre_period_is_absorbed() {
    let cfg = log_spend(MonthWindow::new(0, 1), 100, vec![0.0, -0.116], 0.0);
    let table = generate(&cfg).unwrap();
    assert_eq!(table.len(), 200);

    for spec in [EstimatorSpec::default(), EstimatorSpec::entity_only()] {
        let err = estimate_with(&table, "log_spend", "X", &spec).unwrap_err();
        assert!(matches!(err, PanelError::Absorbed { .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::Absorption);
    }
}

#[test]
fn multiplicative_log_column_recovers_log_of_shock() {
    let cfg = SimConfig::mock_levels(0.0).with_users(40);
    let table = generate(&cfg).unwrap();

    for (cohort, shock) in [("X", -0.116_f64), ("N", -0.076_f64)] {
        let r = estimate_with(
            &table,
            "log_discretionary_spending",
            cohort,
            &EstimatorSpec::entity_only(),
        )
        .unwrap();
        let truth = (1.0 + shock).ln();
        assert!((r.coefficient - truth).abs() < 1e-9, "{cohort}: {} vs {truth}", r.coefficient);
        let injected = cfg.injected_effect(cohort, "log_discretionary_spending").unwrap();
        assert!((injected - truth).abs() < 1e-12);
    }
    assert_eq!(cfg.injected_effect("X", "discretionary_spending"), None);
}

// ── Noise robustness ─────────────────────────────────────────────────────────

#[test]
fn more_users_bring_the_estimate_closer_and_the_error_bars_tighter() {
    init_logger();
    let window = MonthWindow::new(-3, 3);
    let truth = -0.116;

    let fit = |users: usize| {
        let cfg = log_spend(window, users, step(window, truth), 0.1);
        let table = generate(&cfg).unwrap();
        estimate_with(&table, "log_spend", "X", &EstimatorSpec::entity_only()).unwrap()
    };
    let small = fit(50);
    let large = fit(5000);

    assert!(
        (large.coefficient - truth).abs() < 0.01,
        "5000 users: {} too far from {truth}",
        large.coefficient
    );
    assert!(
        large.std_error < small.std_error / 5.0,
        "clustered se should shrink: {} (50) vs {} (5000)",
        small.std_error,
        large.std_error
    );
    assert!(large.ci_lower <= truth && truth <= large.ci_upper, "95% CI misses the truth");
    assert!(large.p_value < 1e-6, "p = {}", large.p_value);
}

#[test]
fn cohorts_are_estimated_separately() {
    let cfg = noiseless_test_config();
    let table = generate(&cfg).unwrap();
    let x = estimate_with(&table, "log_spend", "X", &EstimatorSpec::entity_only()).unwrap();
    let n = estimate_with(&table, "log_spend", "N", &EstimatorSpec::entity_only()).unwrap();
    assert_eq!(x.n_entities, 12);
    assert_eq!(n.n_entities, 8);
    assert!((x.coefficient - n.coefficient).abs() > 0.01);
}
