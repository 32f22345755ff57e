//! Built-in configurations reproducing the paper's reported coefficients.
//!
//! All presets share one schema and one noise convention: an absolute
//! standard deviation per outcome. Presets that scale noise by a global
//! level take that level as an argument and bake it in here.
//!
//! Cohort "X" is the sample with an exogenous install date; cohort "N" is
//! the noisier sample with an endogenous install decision. Curves run over
//! event-months −3..=12.

use crate::{
    config::{
        CohortConfig, CovariateConfig, EffectCurves, MonthWindow, NormalParams, OutcomeConfig,
        SimConfig, DEFAULT_SEED,
    },
    outcome::OutcomeStrategy,
};
use std::collections::BTreeMap;

pub const LOGIN_OUTCOMES: [&str; 2] = ["All_Logins", "PC_Logins"];

pub const SPENDING_CATEGORIES: [&str; 6] = [
    "Discretionary",
    "Clothing",
    "Entertainment",
    "Restaurants",
    "Travel",
    "Cash_Withdrawals",
];

// Absolute change in monthly logins.
const X_ALL_LOGINS: [f64; 16] = [
    0.0, -0.2, -0.1, 11.5, 12.0, 12.2, 12.3, 13.0, 12.4, 11.2, 12.2, 12.1, 12.0, 11.9, 13.2, 13.2,
];
const X_PC_LOGINS: [f64; 16] = [
    0.0, -0.2, -0.1, -0.1, 0.0, 0.6, 0.9, 1.1, 0.5, -0.2, -0.2, -0.3, -0.1, -0.3, -0.1, -0.1,
];
const N_ALL_LOGINS: [f64; 16] = [
    0.0, 0.2, 0.9, 8.0, 7.8, 6.5, 6.4, 6.2, 6.0, 5.9, 6.0, 5.7, 5.6, 5.5, 5.6, 5.8,
];
const N_PC_LOGINS: [f64; 16] = [
    0.0, 0.2, 0.9, 2.5, 1.8, 1.0, 0.9, 0.8, 0.7, 0.4, 0.4, 0.2, 0.1, 0.0, 0.0, 0.0,
];

// Log change in monthly spending, in SPENDING_CATEGORIES order.
const X_SPENDING: [[f64; 16]; 6] = [
    [0.00, 0.02, 0.01, -0.08, -0.11, -0.11, -0.17, -0.11, -0.11, -0.13, -0.13, -0.11, -0.12, -0.12, -0.12, -0.10],
    [0.00, -0.08, 0.08, -0.15, -0.12, -0.18, -0.22, -0.25, -0.21, -0.25, -0.28, -0.22, -0.20, -0.25, -0.18, -0.15],
    [0.00, 0.02, -0.01, -0.18, -0.14, -0.13, -0.12, -0.10, -0.18, -0.17, -0.20, -0.15, -0.14, -0.16, -0.19, -0.13],
    [0.00, 0.04, 0.01, -0.10, -0.11, -0.13, -0.10, -0.07, -0.15, -0.18, -0.14, -0.08, -0.09, -0.10, -0.15, -0.12],
    [0.00, 0.13, -0.05, -0.20, -0.21, -0.23, -0.20, -0.26, -0.29, -0.26, -0.24, -0.20, -0.24, -0.28, -0.22, -0.18],
    [0.00, -0.10, -0.05, -0.35, -0.25, -0.28, -0.30, -0.15, -0.42, -0.38, -0.30, -0.22, -0.18, -0.32, -0.34, -0.31],
];
const N_SPENDING: [[f64; 16]; 6] = [
    [0.00, -0.01, -0.03, -0.08, -0.10, -0.09, -0.10, -0.11, -0.11, -0.13, -0.13, -0.14, -0.13, -0.12, -0.13, -0.14],
    [0.00, -0.03, 0.03, -0.11, -0.11, -0.12, -0.14, -0.15, -0.12, -0.08, -0.14, -0.17, -0.19, -0.16, -0.14, -0.16],
    [0.00, 0.02, 0.01, -0.07, -0.09, -0.07, -0.09, -0.09, -0.15, -0.10, -0.09, -0.10, -0.09, -0.10, -0.10, -0.10],
    [0.00, -0.01, 0.01, -0.08, -0.11, -0.09, -0.11, -0.10, -0.11, -0.13, -0.13, -0.15, -0.16, -0.15, -0.14, -0.15],
    [0.00, -0.03, -0.01, -0.14, -0.16, -0.14, -0.17, -0.19, -0.20, -0.18, -0.15, -0.17, -0.16, -0.17, -0.20, -0.18],
    [0.00, -0.02, 0.02, -0.15, -0.22, -0.25, -0.23, -0.26, -0.29, -0.32, -0.28, -0.30, -0.33, -0.29, -0.27, -0.26],
];

/// Mock-levels preset: login effect after install and the N-cohort
/// anticipation peak at months −1 and 0.
const MOCK_LOGIN_EFFECT_X: f64 = 10.7;
const MOCK_LOGIN_EFFECT_N: f64 = 6.0;
const MOCK_PRE_TREND_N: f64 = 2.5;
const MOCK_SPEND_SHOCK_X: f64 = -0.116;
const MOCK_SPEND_SHOCK_N: f64 = -0.076;

/// Default global noise level of the mock-levels preset.
pub const MOCK_NOISE_LEVEL: f64 = 0.05;

/// Step curve: `pre` before install, `post` from month 0 on.
fn step_curve(window: MonthWindow, pre: f64, post: f64) -> Vec<f64> {
    window.months().map(|m| if m >= 0 { post } else { pre }).collect()
}

impl SimConfig {
    /// Two login outcomes and six log-spending categories per cohort,
    /// 1000 users per cohort. The default preset.
    pub fn category_spending() -> Self {
        let mut curves = EffectCurves::new();
        curves.insert("X", LOGIN_OUTCOMES[0], X_ALL_LOGINS.to_vec());
        curves.insert("X", LOGIN_OUTCOMES[1], X_PC_LOGINS.to_vec());
        curves.insert("N", LOGIN_OUTCOMES[0], N_ALL_LOGINS.to_vec());
        curves.insert("N", LOGIN_OUTCOMES[1], N_PC_LOGINS.to_vec());
        for (i, category) in SPENDING_CATEGORIES.iter().enumerate() {
            curves.insert("X", *category, X_SPENDING[i].to_vec());
            curves.insert("N", *category, N_SPENDING[i].to_vec());
        }

        let mut outcomes: Vec<OutcomeConfig> = LOGIN_OUTCOMES
            .iter()
            .map(|name| OutcomeConfig::additive(*name, NormalParams::new(5.0, 1.0), 0.1))
            .collect();
        outcomes.extend(
            SPENDING_CATEGORIES
                .iter()
                .map(|name| OutcomeConfig::additive(*name, NormalParams::new(5.0, 0.3), 0.05)),
        );

        Self {
            seed: DEFAULT_SEED,
            window: MonthWindow::default(),
            cohorts: vec![CohortConfig::new("X", 1000), CohortConfig::new("N", 1000)],
            outcomes,
            covariates: Vec::new(),
            curves,
        }
    }

    /// Six log-spending categories only, 500 users per cohort and a wider
    /// user fixed-effect spread.
    pub fn spending_categories() -> Self {
        let mut curves = EffectCurves::new();
        for (i, category) in SPENDING_CATEGORIES.iter().enumerate() {
            let mut x = X_SPENDING[i].to_vec();
            let mut n = N_SPENDING[i].to_vec();
            // This variant carried its own month −3 baselines.
            match *category {
                "Restaurants" => x[0] = 0.01,
                "Clothing" => n[0] = -0.01,
                _ => {}
            }
            curves.insert("X", *category, x);
            curves.insert("N", *category, n);
        }

        Self {
            seed: DEFAULT_SEED,
            window: MonthWindow::default(),
            cohorts: vec![CohortConfig::new("X", 500), CohortConfig::new("N", 500)],
            outcomes: SPENDING_CATEGORIES
                .iter()
                .map(|name| OutcomeConfig::additive(*name, NormalParams::new(5.0, 0.5), 0.05))
                .collect(),
            covariates: Vec::new(),
            curves,
        }
    }

    /// Levels rather than logs: integer login counts and dollar spending
    /// generated multiplicatively with a log companion column, plus a
    /// base-income covariate. Every spread scales with `noise_level`;
    /// zero gives a fully deterministic dataset.
    pub fn mock_levels(noise_level: f64) -> Self {
        let window = MonthWindow::default();

        let mut n_logins = step_curve(window, 0.0, MOCK_LOGIN_EFFECT_N);
        for month in [-1, 0] {
            if let Some(i) = window.index_of(month) {
                n_logins[i] += MOCK_PRE_TREND_N;
            }
        }

        let curves = EffectCurves::new()
            .with("X", "logins_total", step_curve(window, 0.0, MOCK_LOGIN_EFFECT_X))
            .with("N", "logins_total", n_logins)
            .with(
                "X",
                "discretionary_spending",
                step_curve(window, 0.0, MOCK_SPEND_SHOCK_X),
            )
            .with(
                "N",
                "discretionary_spending",
                step_curve(window, 0.0, MOCK_SPEND_SHOCK_N),
            );

        let spending = OutcomeConfig::new(
            "discretionary_spending",
            OutcomeStrategy::Multiplicative {
                log_column: Some("log_discretionary_spending".into()),
            },
            NormalParams::new(1.0, 0.1 * noise_level),
            0.05 * noise_level,
        )
        .with_base(3700.0);

        let income = CovariateConfig {
            name: "base_income".into(),
            by_cohort: BTreeMap::from([
                ("X".to_string(), NormalParams::new(16_900.0, 2000.0 * noise_level)),
                ("N".to_string(), NormalParams::new(14_300.0, 2000.0 * noise_level)),
            ]),
        };

        Self {
            seed: DEFAULT_SEED,
            window,
            cohorts: vec![
                CohortConfig::new("X", 750),
                CohortConfig::new("N", 1500).with_base("discretionary_spending", 2500.0),
            ],
            outcomes: vec![
                OutcomeConfig::count("logins_total", NormalParams::fixed(0.0), noise_level)
                    .with_base(4.0),
                spending,
            ],
            covariates: vec![income],
            curves,
        }
    }

    /// Look a preset up by its command-line name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "category" | "category_spending" => Some(Self::category_spending()),
            "spending" | "spending_categories" => Some(Self::spending_categories()),
            "mock" | "mock_levels" => Some(Self::mock_levels(MOCK_NOISE_LEVEL)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_validates() {
        for name in ["category", "spending", "mock"] {
            let cfg = SimConfig::preset(name).unwrap();
            cfg.validate().unwrap_or_else(|e| panic!("preset {name}: {e}"));
        }
        SimConfig::mock_levels(0.0).validate().unwrap();
    }

    #[test]
    fn mock_pre_trend_lands_on_months_minus_one_and_zero() {
        let cfg = SimConfig::mock_levels(MOCK_NOISE_LEVEL);
        let curve = cfg.curves.get("N", "logins_total").unwrap();
        assert_eq!(&curve[..5], &[0.0, 0.0, 2.5, 8.5, 6.0]);
    }

    #[test]
    fn spending_variant_overrides_baselines() {
        let cfg = SimConfig::spending_categories();
        assert_eq!(cfg.curves.get("X", "Restaurants").unwrap()[0], 0.01);
        assert_eq!(cfg.curves.get("N", "Clothing").unwrap()[0], -0.01);
        assert_eq!(cfg.curves.get("X", "Clothing").unwrap()[0], 0.0);
    }
}
