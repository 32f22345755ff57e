//! The effect estimator: two-way fixed-effects regression of an outcome on
//! `post`, run one cohort at a time, with standard errors clustered by user.
//!
//! Steps, in order:
//!   1. Check the input columns and restrict to the cohort.
//!   2. Index rows by (user, time) and reject singleton categories.
//!   3. Absorb the requested fixed effects from `post` and the outcome.
//!   4. Refuse to fit when `post` has no variation left.
//!   5. OLS on the residuals, CR1 standard errors by user.

use crate::{
    absorb::FixedEffects,
    error::{PanelError, PanelResult},
    ols::{fit_absorbed, AbsorbedDof},
    panel::{PanelRow, PanelTable},
    types::COL_POST,
};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

pub const REGRESSOR: &str = COL_POST;

/// Residual variation of `post` below this share of its raw variation
/// counts as absorbed.
const ABSORPTION_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeIndex {
    EventMonth,
    /// Equals the event month when every user installed at month 0.
    CalendarMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorSpec {
    pub entity_effects: bool,
    pub time_effects: bool,
    pub time_index: TimeIndex,
}

impl Default for EstimatorSpec {
    fn default() -> Self {
        Self {
            entity_effects: true,
            time_effects: true,
            time_index: TimeIndex::CalendarMonth,
        }
    }
}

impl EstimatorSpec {
    /// User fixed effects only.
    pub fn entity_only() -> Self {
        Self { time_effects: false, ..Self::default() }
    }

    pub fn with_time_effects(mut self, on: bool) -> Self {
        self.time_effects = on;
        self
    }

    pub fn with_time_index(mut self, index: TimeIndex) -> Self {
        self.time_index = index;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub cohort: String,
    pub outcome: String,
    pub regressor: String,
    pub coefficient: f64,
    /// Cluster-robust (CR1) standard error, clustered by user.
    pub std_error: f64,
    pub std_error_ols: f64,
    pub t_stat: f64,
    /// Two-sided, Student-t with `n_clusters − 1` degrees of freedom.
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub r_squared_within: f64,
    pub n_obs: usize,
    pub n_entities: usize,
    pub n_time_periods: usize,
    pub n_clusters: usize,
    pub absorbed_dof: usize,
    pub spec: EstimatorSpec,
}

impl fmt::Display for EstimationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {} = {:.6} (se {:.6}, t {:.2}, p {:.4}, 95% CI [{:.6}, {:.6}]) \
             n={} users={} periods={} R²within={:.4}",
            self.cohort,
            self.outcome,
            self.regressor,
            self.coefficient,
            self.std_error,
            self.t_stat,
            self.p_value,
            self.ci_lower,
            self.ci_upper,
            self.n_obs,
            self.n_entities,
            self.n_time_periods,
            self.r_squared_within,
        )
    }
}

/// Two-way fixed-effects estimate of the `post` coefficient for `cohort`.
pub fn estimate(table: &PanelTable, outcome: &str, cohort: &str) -> PanelResult<EstimationResult> {
    estimate_with(table, outcome, cohort, &EstimatorSpec::default())
}

pub fn estimate_with(
    table: &PanelTable,
    outcome: &str,
    cohort: &str,
    spec: &EstimatorSpec,
) -> PanelResult<EstimationResult> {
    let sel = Selection::new(table, outcome, cohort, spec.time_index)?;
    if spec.entity_effects {
        sel.reject_singletons("user", &sel.entity, &sel.users)?;
    }
    if spec.time_effects {
        sel.reject_singletons("time", &sel.time, &sel.periods)?;
    }

    let fe = FixedEffects::new(&sel.entity, &sel.time, spec.entity_effects, spec.time_effects)?;

    let post: Vec<f64> = sel.rows.iter().map(|r| if r.post { 1.0 } else { 0.0 }).collect();
    let post_r = fe.partial_out(&post);
    check_identified(&post, &post_r, spec)?;

    let y_r = fe.partial_out(&sel.y);
    let absorbed = AbsorbedDof {
        total: fe.absorbed_dof(),
        outside_clusters: fe.dof_outside_clusters(),
    };
    let fit = fit_absorbed(&[post_r], &y_r, &sel.entity, absorbed)?;

    let coefficient = fit.coefficients[0];
    let std_error = fit.se_cluster[0];
    let inf = t_inference(coefficient, std_error, fit.n_clusters)?;

    let result = EstimationResult {
        cohort: cohort.to_string(),
        outcome: outcome.to_string(),
        regressor: REGRESSOR.to_string(),
        coefficient,
        std_error,
        std_error_ols: fit.se_ols[0],
        t_stat: inf.t_stat,
        p_value: inf.p_value,
        ci_lower: inf.ci_lower,
        ci_upper: inf.ci_upper,
        r_squared_within: fit.r_squared(),
        n_obs: fit.n_obs,
        n_entities: sel.users.len(),
        n_time_periods: sel.periods.len(),
        n_clusters: fit.n_clusters,
        absorbed_dof: absorbed.total,
        spec: *spec,
    };
    log::debug!("estimator: {result}");
    Ok(result)
}

fn check_identified(raw: &[f64], residual: &[f64], spec: &EstimatorSpec) -> PanelResult<()> {
    let mean = raw.iter().sum::<f64>() / raw.len() as f64;
    let raw_sxx = raw.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    if raw_sxx == 0.0 {
        let which = if mean > 0.0 { "post" } else { "pre" };
        return Err(PanelError::Absorbed {
            regressor: REGRESSOR.to_string(),
            reason: format!("every selected row is {which}-install"),
        });
    }
    let sxx = residual.iter().map(|v| v * v).sum::<f64>();
    if sxx <= ABSORPTION_TOL * raw_sxx {
        let reason = match (spec.entity_effects, spec.time_effects) {
            (true, true) => "no variation left within user and time period",
            (true, false) => "no variation left within user",
            (false, true) => "no variation left within time period",
            (false, false) => "no variation left",
        };
        return Err(PanelError::Absorbed {
            regressor: REGRESSOR.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(())
}

// ── Shared with the event study ────────────────────────────────────

/// One cohort's rows with dense user and time indices.
pub(crate) struct Selection<'t> {
    pub rows: Vec<&'t PanelRow>,
    pub y: Vec<f64>,
    /// Dense user index per row, first-seen order.
    pub entity: Vec<usize>,
    /// Dense time index per row, ascending by period.
    pub time: Vec<usize>,
    pub users: Vec<&'t str>,
    pub periods: Vec<i32>,
}

impl<'t> Selection<'t> {
    pub fn new(
        table: &'t PanelTable,
        outcome: &str,
        cohort: &str,
        time_index: TimeIndex,
    ) -> PanelResult<Self> {
        if !table.has_column(outcome) {
            return Err(PanelError::MissingColumn { column: outcome.to_string() });
        }

        let rows: Vec<&PanelRow> = table.rows().iter().filter(|r| r.group == cohort).collect();
        if rows.is_empty() {
            return Err(PanelError::EmptySelection { cohort: cohort.to_string() });
        }

        let y = rows
            .iter()
            .map(|&r| table.value(r, outcome))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| PanelError::MissingColumn { column: outcome.to_string() })?;
        if let Some((r, &value)) = rows.iter().zip(&y).find(|(_, v)| !v.is_finite()) {
            return Err(PanelError::NonFiniteValue {
                column: outcome.to_string(),
                user_id: r.user_id.clone(),
                event_month: r.event_month,
                value,
            });
        }

        let mut user_ids: HashMap<&str, usize> = HashMap::new();
        let mut users: Vec<&str> = Vec::new();
        let mut entity = Vec::with_capacity(rows.len());
        let mut observed = HashSet::with_capacity(rows.len());
        for &r in &rows {
            let id = *user_ids.entry(r.user_id.as_str()).or_insert_with(|| {
                users.push(r.user_id.as_str());
                users.len() - 1
            });
            if !observed.insert((id, r.event_month)) {
                return Err(PanelError::DuplicateObservation {
                    user_id: r.user_id.clone(),
                    event_month: r.event_month,
                });
            }
            entity.push(id);
        }

        let period_of = |r: &PanelRow| match time_index {
            TimeIndex::EventMonth => r.event_month,
            TimeIndex::CalendarMonth => r.calendar_month,
        };
        let periods: Vec<i32> = rows
            .iter()
            .map(|&r| period_of(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let period_ids: HashMap<i32, usize> =
            periods.iter().enumerate().map(|(i, &p)| (p, i)).collect();
        let time = rows.iter().map(|&r| period_ids[&period_of(r)]).collect();

        Ok(Self { rows, y, entity, time, users, periods })
    }

    /// A fixed-effect level with one observation leaves no within variation.
    pub fn reject_singletons<L: fmt::Display>(
        &self,
        dimension: &'static str,
        index: &[usize],
        labels: &[L],
    ) -> PanelResult<()> {
        let mut counts = vec![0usize; labels.len()];
        for &i in index {
            counts[i] += 1;
        }
        match counts.iter().position(|&c| c == 1) {
            Some(level) => Err(PanelError::SingletonCategory {
                dimension,
                level: labels[level].to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn event_months(&self) -> Vec<i32> {
        self.rows.iter().map(|r| r.event_month).collect()
    }
}

#[derive(Debug)]
pub(crate) struct Inference {
    pub t_stat: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// t statistic, two-sided p-value and 95 % interval with `n_clusters − 1`
/// degrees of freedom (at least one).
pub(crate) fn t_inference(coef: f64, se: f64, n_clusters: usize) -> PanelResult<Inference> {
    if !coef.is_finite() || !se.is_finite() {
        return Err(PanelError::NonFiniteEstimate { coefficient: coef, std_error: se });
    }
    let df = n_clusters.saturating_sub(1).max(1) as f64;
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| anyhow::anyhow!("t distribution with {df} df: {e}"))?;

    let t_stat = if se > 0.0 {
        coef / se
    } else if coef == 0.0 {
        0.0
    } else {
        coef.signum() * f64::INFINITY
    };
    let p_value = if t_stat.is_infinite() {
        0.0
    } else {
        (2.0 * (1.0 - dist.cdf(t_stat.abs()))).clamp(0.0, 1.0)
    };
    let crit = dist.inverse_cdf(0.975);
    Ok(Inference {
        t_stat,
        p_value,
        ci_lower: coef - crit * se,
        ci_upper: coef + crit * se,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::ColumnSpec;

    fn row(user: &str, month: i32, install: i32, y: f64) -> PanelRow {
        PanelRow {
            user_id: user.into(),
            group: "X".into(),
            event_month: month,
            calendar_month: install + month,
            post: month >= 0,
            values: vec![y],
        }
    }

    fn table(rows: Vec<PanelRow>) -> PanelTable {
        let mut t = PanelTable::new(vec![ColumnSpec::float("y")]);
        for r in rows {
            t.push(r).unwrap();
        }
        t
    }

    #[test]
    fn entity_only_recovers_post_minus_pre() {
        let t = table(vec![
            row("a", -1, 0, 1.0),
            row("a", 0, 0, 3.0),
            row("b", -1, 0, 10.0),
            row("b", 0, 0, 12.0),
        ]);
        let r = estimate_with(&t, "y", "X", &EstimatorSpec::entity_only()).unwrap();
        assert!((r.coefficient - 2.0).abs() < 1e-12);
        assert_eq!(r.n_entities, 2);
        assert_eq!(r.n_obs, 4);
    }

    #[test]
    fn common_install_with_time_effects_is_absorbed() {
        let t = table(vec![
            row("a", -1, 0, 1.0),
            row("a", 0, 0, 3.0),
            row("b", -1, 0, 10.0),
            row("b", 0, 0, 12.0),
        ]);
        let err = estimate(&t, "y", "X").unwrap_err();
        assert!(matches!(err, PanelError::Absorbed { .. }), "{err}");
    }

    #[test]
    fn t_inference_handles_zero_standard_error() {
        let inf = t_inference(-0.116, 0.0, 100).unwrap();
        assert!(inf.t_stat.is_infinite());
        assert_eq!(inf.p_value, 0.0);
        assert_eq!(inf.ci_lower, -0.116);

        let zero = t_inference(0.0, 0.0, 100).unwrap();
        assert_eq!(zero.t_stat, 0.0);
        assert_eq!(zero.p_value, 1.0);
    }

    #[test]
    fn t_inference_refuses_non_finite_input() {
        for (coef, se) in [(f64::NAN, 0.1), (0.5, f64::NAN), (f64::INFINITY, 0.1)] {
            let err = t_inference(coef, se, 50).unwrap_err();
            assert!(matches!(err, PanelError::NonFiniteEstimate { .. }), "{err}");
        }
    }

    #[test]
    fn t_inference_matches_normal_for_many_clusters() {
        let inf = t_inference(1.96, 1.0, 100_000).unwrap();
        assert!((inf.p_value - 0.05).abs() < 1e-3, "p={}", inf.p_value);
    }
}
