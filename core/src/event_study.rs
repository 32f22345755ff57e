//! Dynamic treatment effects: one coefficient per event-month, measured
//! against a reference month, with user fixed effects and standard errors
//! clustered by user.
//!
//! With zero noise the coefficient for month `k` equals
//! `curve[k] − curve[reference]` exactly.

use crate::{
    absorb::FixedEffects,
    error::{PanelError, PanelResult},
    estimator::{t_inference, Selection, TimeIndex},
    ols::{fit_absorbed, AbsorbedDof},
    panel::PanelTable,
    types::EventMonth,
};
use serde::{Deserialize, Serialize};

/// The month before install, the conventional reference.
pub const DEFAULT_REFERENCE: EventMonth = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStudyPoint {
    pub event_month: EventMonth,
    pub coefficient: f64,
    pub std_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStudy {
    pub cohort: String,
    pub outcome: String,
    pub reference: EventMonth,
    /// Every observed event-month in ascending order, the reference
    /// included with a zero coefficient.
    pub points: Vec<EventStudyPoint>,
    pub n_obs: usize,
    pub n_clusters: usize,
}

impl EventStudy {
    pub fn get(&self, month: EventMonth) -> Option<&EventStudyPoint> {
        self.points.iter().find(|p| p.event_month == month)
    }
}

pub fn event_study(
    table: &PanelTable,
    outcome: &str,
    cohort: &str,
    reference: EventMonth,
) -> PanelResult<EventStudy> {
    let sel = Selection::new(table, outcome, cohort, TimeIndex::EventMonth)?;
    if !sel.periods.contains(&reference) {
        return Err(PanelError::UnknownReferenceMonth {
            cohort: cohort.to_string(),
            month: reference,
        });
    }
    sel.reject_singletons("user", &sel.entity, &sel.users)?;

    let fe = FixedEffects::new(&sel.entity, &sel.time, true, false)?;
    let months = sel.event_months();
    let leads_lags: Vec<EventMonth> =
        sel.periods.iter().copied().filter(|&m| m != reference).collect();
    if leads_lags.is_empty() {
        return Err(PanelError::Absorbed {
            regressor: format!("event_month != {reference}"),
            reason: "only the reference month is observed".into(),
        });
    }

    let columns: Vec<Vec<f64>> = leads_lags
        .iter()
        .map(|&k| {
            let dummy: Vec<f64> = months.iter().map(|&m| if m == k { 1.0 } else { 0.0 }).collect();
            fe.partial_out(&dummy)
        })
        .collect();
    let y_r = fe.partial_out(&sel.y);

    let absorbed = AbsorbedDof {
        total: fe.absorbed_dof(),
        outside_clusters: fe.dof_outside_clusters(),
    };
    let fit = fit_absorbed(&columns, &y_r, &sel.entity, absorbed)?;

    let mut points = Vec::with_capacity(sel.periods.len());
    for &month in &sel.periods {
        let point = match leads_lags.iter().position(|&k| k == month) {
            Some(j) => {
                let inf = t_inference(fit.coefficients[j], fit.se_cluster[j], fit.n_clusters)?;
                EventStudyPoint {
                    event_month: month,
                    coefficient: fit.coefficients[j],
                    std_error: fit.se_cluster[j],
                    ci_lower: inf.ci_lower,
                    ci_upper: inf.ci_upper,
                }
            }
            None => EventStudyPoint {
                event_month: month,
                coefficient: 0.0,
                std_error: 0.0,
                ci_lower: 0.0,
                ci_upper: 0.0,
            },
        };
        points.push(point);
    }

    log::debug!(
        "event_study: {cohort}/{outcome} ref={reference} months={} n={}",
        points.len(),
        fit.n_obs
    );
    Ok(EventStudy {
        cohort: cohort.to_string(),
        outcome: outcome.to_string(),
        reference,
        points,
        n_obs: fit.n_obs,
        n_clusters: fit.n_clusters,
    })
}
