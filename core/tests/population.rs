//! Shape of the generated panel: balance, treatment indicator, ordering,
//! value bounds.

use mindtheapp_core::{
    config::{CohortConfig, EffectCurves, MonthWindow, NormalParams, OutcomeConfig, SimConfig},
    outcome::OutcomeStrategy,
    simulator::generate,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn single_outcome(window: MonthWindow, users: usize, curve: Vec<f64>, noise: f64) -> SimConfig {
    SimConfig {
        seed: 42,
        window,
        cohorts: vec![CohortConfig::new("X", users)],
        outcomes: vec![OutcomeConfig::additive("log_spend", NormalParams::new(5.0, 0.3), noise)],
        covariates: Vec::new(),
        curves: EffectCurves::new().with("X", "log_spend", curve),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn every_user_observes_exactly_the_window() {
    let cfg = SimConfig::default_test();
    let table = generate(&cfg).unwrap();
    let expected: Vec<i32> = cfg.window.months().collect();

    let by_user = table.months_by_user();
    assert_eq!(by_user.len(), 20, "12 X users + 8 N users");
    for (user, months) in by_user {
        assert_eq!(months, expected, "user {user} observed {months:?}");
    }
    assert_eq!(table.len(), 20 * cfg.window.len());
}

#[test]
fn post_is_set_exactly_from_install_month_on() {
    let table = generate(&SimConfig::category_spending().with_users(25)).unwrap();
    for row in table.rows() {
        assert_eq!(
            row.post,
            row.event_month >= 0,
            "{} month {} has post={}",
            row.user_id,
            row.event_month,
            row.post
        );
    }
}

#[test]
fn two_month_scenario_has_two_hundred_rows() {
    let cfg = single_outcome(MonthWindow::new(0, 1), 100, vec![0.0, -0.116], 0.0);
    let table = generate(&cfg).unwrap();
    assert_eq!(table.len(), 200);
    assert_eq!(table.user_count(), 100);
}

#[test]
fn rows_are_ordered_by_cohort_user_month() {
    let cfg = SimConfig::default_test();
    let table = generate(&cfg).unwrap();
    let rows = table.rows();

    assert_eq!(rows[0].user_id, "X_0");
    assert_eq!(rows[0].event_month, cfg.window.start);
    assert_eq!(rows[rows.len() - 1].user_id, "N_7");
    assert_eq!(rows[rows.len() - 1].event_month, cfg.window.end);
    assert_eq!(table.cohorts(), vec!["X", "N"]);

    for pair in rows.windows(2) {
        if pair[0].user_id == pair[1].user_id {
            assert_eq!(pair[1].event_month, pair[0].event_month + 1);
        }
    }
}

#[test]
fn count_outcomes_are_never_negative() {
    // Base + fixed effect sits well below zero for most users.
    let cfg = SimConfig {
        seed: 3,
        window: MonthWindow::new(-2, 2),
        cohorts: vec![CohortConfig::new("X", 200)],
        outcomes: vec![OutcomeConfig::count("logins", NormalParams::new(-1.0, 2.0), 1.5)],
        covariates: Vec::new(),
        curves: EffectCurves::new().with("X", "logins", vec![0.0, 0.0, 1.0, 1.0, 1.0]),
    };
    let table = generate(&cfg).unwrap();
    let logins = table.column("logins").unwrap();

    assert!(logins.iter().all(|v| *v >= 0.0), "negative login count generated");
    assert!(logins.iter().all(|v| v.fract() == 0.0), "login counts must be whole numbers");
    assert!(logins.iter().any(|v| *v == 0.0), "expected some clipped zeros");
    assert!(logins.iter().any(|v| *v > 0.0), "expected some positive counts");
}

#[test]
fn fixed_effects_are_constant_per_user() {
    // Zero noise and a flat curve: every month repeats the user's level.
    let cfg = single_outcome(MonthWindow::new(-2, 2), 30, vec![0.0; 5], 0.0);
    let table = generate(&cfg).unwrap();
    let idx = table.column_index("log_spend").unwrap();

    for user in table.rows().chunks(5) {
        let first = user[0].values[idx];
        assert!(user.iter().all(|r| r.values[idx] == first), "{} varies", user[0].user_id);
    }
    let levels: Vec<f64> = table.rows().chunks(5).map(|u| u[0].values[idx]).collect();
    assert!(levels.windows(2).any(|w| w[0] != w[1]), "users should differ");
}

#[test]
fn multiplicative_outcome_emits_its_log_companion() {
    let cfg = SimConfig::mock_levels(0.05).with_users(30);
    let table = generate(&cfg).unwrap();
    let level = table.column_index("discretionary_spending").unwrap();
    let log = table.column_index("log_discretionary_spending").unwrap();

    for row in table.rows() {
        assert!(row.values[level] > 0.0);
        assert!((row.values[log] - row.values[level].ln()).abs() < 1e-12);
    }
}

#[test]
fn covariates_are_static_per_user() {
    let cfg = SimConfig::mock_levels(0.05).with_users(20);
    let table = generate(&cfg).unwrap();
    let income = table.column_index("base_income").unwrap();
    for user in table.rows().chunks(cfg.window.len()) {
        assert!(user.iter().all(|r| r.values[income] == user[0].values[income]));
    }
}

#[test]
fn non_positive_level_with_log_column_is_a_configuration_error() {
    let mut cfg = single_outcome(MonthWindow::new(-1, 0), 5, vec![0.0, 0.0], 0.0);
    cfg.outcomes[0] = OutcomeConfig::new(
        "spend",
        OutcomeStrategy::Multiplicative { log_column: Some("log_spend".into()) },
        NormalParams::fixed(-1.0),
        0.0,
    )
    .with_base(100.0);
    cfg.curves = EffectCurves::new().with("X", "spend", vec![0.0, 0.0]);

    let err = generate(&cfg).unwrap_err();
    assert_eq!(err.kind(), mindtheapp_core::ErrorKind::Configuration, "{err}");
}

#[test]
fn install_spread_staggers_calendar_months() {
    let mut cfg = single_outcome(MonthWindow::new(-1, 1), 60, vec![0.0, 0.0, 0.0], 0.0);
    cfg.cohorts[0] = CohortConfig::new("X", 60).with_install_spread(3);
    let table = generate(&cfg).unwrap();

    for row in table.rows() {
        let install = row.calendar_month - row.event_month;
        assert!((0..=3).contains(&install), "install month {install} outside 0..=3");
    }
    assert!(table.is_staggered());
    assert!(!generate(&SimConfig::default_test()).unwrap().is_staggered());
}

#[test]
fn noiseless_mock_counts_round_half_to_even() {
    let table = generate(&SimConfig::mock_levels(0.0).with_users(3)).unwrap();
    let logins = |month: i32| {
        let row = table
            .rows()
            .iter()
            .find(|r| r.user_id == "N_0" && r.event_month == month)
            .unwrap();
        table.value(row, "logins_total").unwrap()
    };
    // 4 + 2.5 and 4 + 6 + 2.5 sit exactly on a half.
    assert_eq!(logins(-1), 6.0);
    assert_eq!(logins(0), 12.0);
    assert_eq!(logins(1), 10.0);
}
