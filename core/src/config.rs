use crate::{
    error::{PanelError, PanelResult},
    outcome::OutcomeStrategy,
    types::{EventMonth, INDEX_COLUMNS},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const DEFAULT_SEED: u64 = 42;

fn default_seed() -> u64 {
    DEFAULT_SEED
}

// ── Month window ───────────────────────────────────────────────────

/// Inclusive range of event-months simulated for every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub start: EventMonth,
    pub end: EventMonth,
}

impl MonthWindow {
    pub const fn new(start: EventMonth, end: EventMonth) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn months(&self) -> impl Iterator<Item = EventMonth> {
        self.start..=self.end
    }

    /// Position of `month` in an effect curve, if it lies in the window.
    pub fn index_of(&self, month: EventMonth) -> Option<usize> {
        (self.start..=self.end)
            .contains(&month)
            .then(|| (month - self.start) as usize)
    }
}

impl Default for MonthWindow {
    /// Three months before install through twelve months after.
    fn default() -> Self {
        Self::new(-3, 12)
    }
}

// ── Distributions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalParams {
    pub mean: f64,
    pub sd: f64,
}

impl NormalParams {
    pub const fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    /// A degenerate distribution: every draw equals `value`.
    pub const fn fixed(value: f64) -> Self {
        Self { mean: value, sd: 0.0 }
    }

    fn check(&self, name: &str) -> PanelResult<()> {
        if !self.mean.is_finite() || !self.sd.is_finite() || self.sd < 0.0 {
            return Err(PanelError::InvalidDistribution {
                name: name.to_string(),
                mean: self.mean,
                sd: self.sd,
            });
        }
        Ok(())
    }
}

// ── Cohorts, outcomes, covariates ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortConfig {
    pub label: String,
    pub users: usize,
    /// Per-outcome base level overriding `OutcomeConfig::base` for this cohort.
    #[serde(default)]
    pub base_overrides: BTreeMap<String, f64>,
    /// Each user installs at a calendar month drawn uniformly from
    /// `0..=install_spread`. Zero means every user installs at month 0.
    #[serde(default)]
    pub install_spread: u32,
}

impl CohortConfig {
    pub fn new(label: impl Into<String>, users: usize) -> Self {
        Self {
            label: label.into(),
            users,
            base_overrides: BTreeMap::new(),
            install_spread: 0,
        }
    }

    pub fn with_base(mut self, outcome: impl Into<String>, base: f64) -> Self {
        self.base_overrides.insert(outcome.into(), base);
        self
    }

    pub fn with_install_spread(mut self, months: u32) -> Self {
        self.install_spread = months;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeConfig {
    pub name: String,
    pub strategy: OutcomeStrategy,
    #[serde(default)]
    pub base: f64,
    /// Per-user offset, drawn once and held for the user's whole series.
    pub fixed_effect: NormalParams,
    /// Absolute standard deviation of the per-row noise.
    pub noise_sd: f64,
}

impl OutcomeConfig {
    pub fn new(
        name: impl Into<String>,
        strategy: OutcomeStrategy,
        fixed_effect: NormalParams,
        noise_sd: f64,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            base: 0.0,
            fixed_effect,
            noise_sd,
        }
    }

    pub fn additive(name: impl Into<String>, fixed_effect: NormalParams, noise_sd: f64) -> Self {
        Self::new(name, OutcomeStrategy::Additive, fixed_effect, noise_sd)
    }

    pub fn count(name: impl Into<String>, fixed_effect: NormalParams, noise_sd: f64) -> Self {
        Self::new(name, OutcomeStrategy::Count, fixed_effect, noise_sd)
    }

    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }
}

/// A static per-user covariate, constant over the user's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateConfig {
    pub name: String,
    /// Cohort label → distribution. Every cohort must be present.
    pub by_cohort: BTreeMap<String, NormalParams>,
}

// ── Effect curves ──────────────────────────────────────────────────

/// Hand-coded ground truth: cohort → outcome → one magnitude per month.
///
/// Entry `i` of a curve belongs to event-month `window.start + i`.
/// Lengths are checked once, in `SimConfig::validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectCurves(BTreeMap<String, BTreeMap<String, Vec<f64>>>);

impl EffectCurves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cohort: impl Into<String>, outcome: impl Into<String>, curve: Vec<f64>) {
        self.0
            .entry(cohort.into())
            .or_default()
            .insert(outcome.into(), curve);
    }

    pub fn with(mut self, cohort: impl Into<String>, outcome: impl Into<String>, curve: Vec<f64>) -> Self {
        self.insert(cohort, outcome, curve);
        self
    }

    pub fn get(&self, cohort: &str, outcome: &str) -> Option<&[f64]> {
        self.0.get(cohort)?.get(outcome).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.0.iter().flat_map(|(cohort, outcomes)| {
            outcomes
                .iter()
                .map(move |(outcome, curve)| (cohort.as_str(), outcome.as_str(), curve.as_slice()))
        })
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub window: MonthWindow,
    pub cohorts: Vec<CohortConfig>,
    pub outcomes: Vec<OutcomeConfig>,
    #[serde(default)]
    pub covariates: Vec<CovariateConfig>,
    pub curves: EffectCurves,
}

impl SimConfig {
    /// Load a JSON configuration and validate it.
    /// In tests, use SimConfig::default_test().
    pub fn load(path: impl AsRef<Path>) -> PanelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!(
            "config: loaded {} ({} cohorts, {} outcomes)",
            path.display(),
            config.cohorts.len(),
            config.outcomes.len()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> PanelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the user count of every cohort.
    pub fn with_users(mut self, users: usize) -> Self {
        for cohort in &mut self.cohorts {
            cohort.users = users;
        }
        self
    }

    pub fn cohort(&self, label: &str) -> Option<&CohortConfig> {
        self.cohorts.iter().find(|c| c.label == label)
    }

    pub fn outcome(&self, name: &str) -> Option<&OutcomeConfig> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Base level of `outcome` for `cohort`, honouring cohort overrides.
    pub fn base_for(&self, cohort: &CohortConfig, outcome: &OutcomeConfig) -> f64 {
        cohort
            .base_overrides
            .get(&outcome.name)
            .copied()
            .unwrap_or(outcome.base)
    }

    /// Value column names in table order: covariates, then each outcome
    /// followed by its log companion if it has one.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.covariates.iter().map(|c| c.name.clone()).collect();
        for outcome in &self.outcomes {
            names.push(outcome.name.clone());
            if let Some(log_col) = outcome.strategy.log_column() {
                names.push(log_col.to_string());
            }
        }
        names
    }

    /// The post-minus-pre gap a user fixed-effects regression of `column`
    /// on `post` recovers for `cohort` when noise is zero.
    ///
    /// `None` for columns that are not linear in the effect curve
    /// (multiplicative levels, covariates) or windows lacking a pre or post
    /// period.
    pub fn injected_effect(&self, cohort: &str, column: &str) -> Option<f64> {
        let (outcome, on_log) = self.outcomes.iter().find_map(|o| {
            if o.name == column {
                Some((o, false))
            } else if o.strategy.log_column() == Some(column) {
                Some((o, true))
            } else {
                None
            }
        })?;
        let curve = self.curves.get(cohort, &outcome.name)?;

        let mut pre = (0.0, 0usize);
        let mut post = (0.0, 0usize);
        for (month, &effect) in self.window.months().zip(curve) {
            let value = outcome.strategy.linear_effect(effect, on_log)?;
            let bucket = if month >= 0 { &mut post } else { &mut pre };
            bucket.0 += value;
            bucket.1 += 1;
        }
        if pre.1 == 0 || post.1 == 0 {
            return None;
        }
        Some(post.0 / post.1 as f64 - pre.0 / pre.1 as f64)
    }

    /// The single validation point. Everything downstream assumes a
    /// validated configuration.
    pub fn validate(&self) -> PanelResult<()> {
        if self.window.is_empty() {
            return Err(PanelError::InvalidWindow {
                start: self.window.start,
                end: self.window.end,
            });
        }
        if self.cohorts.is_empty() {
            return Err(PanelError::NoCohorts);
        }
        if self.outcomes.is_empty() {
            return Err(PanelError::NoOutcomes);
        }

        let mut cohort_labels = BTreeSet::new();
        for cohort in &self.cohorts {
            if cohort.users == 0 {
                return Err(PanelError::EmptyCohort {
                    cohort: cohort.label.clone(),
                });
            }
            if !cohort_labels.insert(cohort.label.as_str()) {
                return Err(PanelError::DuplicateName {
                    name: cohort.label.clone(),
                });
            }
            for (outcome, base) in &cohort.base_overrides {
                if self.outcome(outcome).is_none() {
                    return Err(PanelError::UnknownCurveKey {
                        what: "outcome",
                        name: outcome.clone(),
                    });
                }
                NormalParams::fixed(*base).check(outcome)?;
            }
        }

        let mut columns = BTreeSet::new();
        for name in self.column_names() {
            if INDEX_COLUMNS.contains(&name.as_str()) {
                return Err(PanelError::ReservedName { name });
            }
            if !columns.insert(name.clone()) {
                return Err(PanelError::DuplicateName { name });
            }
        }

        for outcome in &self.outcomes {
            if !outcome.noise_sd.is_finite() || outcome.noise_sd < 0.0 {
                return Err(PanelError::InvalidNoise {
                    outcome: outcome.name.clone(),
                    sd: outcome.noise_sd,
                });
            }
            outcome.fixed_effect.check(&outcome.name)?;
            NormalParams::fixed(outcome.base).check(&outcome.name)?;
        }

        for covariate in &self.covariates {
            for label in covariate.by_cohort.keys() {
                if !cohort_labels.contains(label.as_str()) {
                    return Err(PanelError::UnknownCurveKey {
                        what: "cohort",
                        name: label.clone(),
                    });
                }
            }
            for cohort in &self.cohorts {
                let dist = covariate.by_cohort.get(&cohort.label).ok_or_else(|| {
                    PanelError::MissingCovariate {
                        cohort: cohort.label.clone(),
                        covariate: covariate.name.clone(),
                    }
                })?;
                dist.check(&covariate.name)?;
            }
        }

        self.validate_curves(&cohort_labels)
    }

    fn validate_curves(&self, cohort_labels: &BTreeSet<&str>) -> PanelResult<()> {
        for (cohort, outcome, _) in self.curves.iter() {
            if !cohort_labels.contains(cohort) {
                return Err(PanelError::UnknownCurveKey {
                    what: "cohort",
                    name: cohort.to_string(),
                });
            }
            if self.outcome(outcome).is_none() {
                return Err(PanelError::UnknownCurveKey {
                    what: "outcome",
                    name: outcome.to_string(),
                });
            }
        }

        let expected = self.window.len();
        for cohort in &self.cohorts {
            for outcome in &self.outcomes {
                let curve = self.curves.get(&cohort.label, &outcome.name).ok_or_else(|| {
                    PanelError::MissingCurve {
                        cohort: cohort.label.clone(),
                        outcome: outcome.name.clone(),
                    }
                })?;
                if curve.len() != expected {
                    return Err(PanelError::CurveLengthMismatch {
                        cohort: cohort.label.clone(),
                        outcome: outcome.name.clone(),
                        expected,
                        actual: curve.len(),
                    });
                }
                if curve.iter().any(|v| !v.is_finite()) {
                    return Err(PanelError::NonFiniteCurve {
                        cohort: cohort.label.clone(),
                        outcome: outcome.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    ///
    /// Two cohorts over a six-month window (−2..=3): a login count and an
    /// additive log-spending outcome.
    pub fn default_test() -> Self {
        let curves = EffectCurves::new()
            .with("X", "logins", vec![0.0, 0.0, 4.0, 5.0, 5.0, 6.0])
            .with("X", "log_spend", vec![0.0, 0.01, -0.10, -0.12, -0.11, -0.13])
            .with("N", "logins", vec![0.0, 1.0, 3.0, 3.0, 3.0, 3.0])
            .with("N", "log_spend", vec![0.0, -0.01, -0.05, -0.06, -0.07, -0.08]);

        Self {
            seed: 7,
            window: MonthWindow::new(-2, 3),
            cohorts: vec![CohortConfig::new("X", 12), CohortConfig::new("N", 8)],
            outcomes: vec![
                OutcomeConfig::count("logins", NormalParams::new(2.0, 1.0), 0.5).with_base(3.0),
                OutcomeConfig::additive("log_spend", NormalParams::new(5.0, 0.3), 0.05),
            ],
            covariates: Vec::new(),
            curves,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_indexing() {
        let w = MonthWindow::default();
        assert_eq!(w.len(), 16);
        assert_eq!(w.index_of(-3), Some(0));
        assert_eq!(w.index_of(12), Some(15));
        assert_eq!(w.index_of(13), None);
        assert!(MonthWindow::new(2, 1).is_empty());
    }

    #[test]
    fn default_test_config_is_valid() {
        SimConfig::default_test().validate().unwrap();
    }

    #[test]
    fn column_names_follow_outcome_order() {
        let cfg = SimConfig::default_test();
        assert_eq!(cfg.column_names(), vec!["logins".to_string(), "log_spend".to_string()]);
    }
}
