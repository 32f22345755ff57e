//! Absorption of user and time fixed effects.
//!
//! User effects are removed by within-user demeaning, exact for balanced
//! and unbalanced panels alike. Time effects are removed by projecting out
//! the within-demeaned time dummies through an orthonormal basis built by
//! Gram–Schmidt. Dummies that are already spanned (the dropped reference
//! level, or any period fully explained by the user effects) fall out of
//! the basis on their own and do not count towards the absorbed degrees of
//! freedom.
//!
//! Event-month panels have a short time dimension, so the basis stays small.
//!
//! # References
//!
//! - Wooldridge, *Econometric Analysis of Cross Section and Panel Data*, Ch. 10.
//! - Frisch–Waugh–Lovell: regressing residualised y on residualised X gives
//!   the coefficients of the full dummy-variable regression.

use crate::error::{PanelError, PanelResult};

/// Relative norm below which a residualised time dummy counts as spanned.
const RANK_TOL: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct FixedEffects {
    n: usize,
    /// Row indices per entity, when user effects are absorbed.
    entity_rows: Option<Vec<Vec<usize>>>,
    /// Orthonormal basis of the residualised time dummies.
    time_basis: Vec<Vec<f64>>,
    n_entities: usize,
    n_times: usize,
}

impl FixedEffects {
    /// `entity` and `time` map each observation to a dense 0-based level.
    ///
    /// Without entity effects a global mean is removed instead, which
    /// absorbs the regression constant.
    pub fn new(
        entity: &[usize],
        time: &[usize],
        entity_effects: bool,
        time_effects: bool,
    ) -> PanelResult<Self> {
        let n = entity.len();
        if n == 0 {
            return Err(PanelError::SingularDesign("no observations to absorb".into()));
        }
        if time.len() != n {
            return Err(PanelError::RowWidthMismatch { expected: n, actual: time.len() });
        }

        let n_entities = entity.iter().copied().max().map_or(0, |m| m + 1);
        let n_times = time.iter().copied().max().map_or(0, |m| m + 1);

        let entity_rows = entity_effects.then(|| {
            let mut rows: Vec<Vec<usize>> = vec![Vec::new(); n_entities];
            for (i, &e) in entity.iter().enumerate() {
                rows[e].push(i);
            }
            rows
        });

        let mut fe = Self {
            n,
            entity_rows,
            time_basis: Vec::new(),
            n_entities,
            n_times,
        };

        if time_effects {
            let mut counts = vec![0usize; n_times];
            for &t in time {
                counts[t] += 1;
            }
            for level in 0..n_times {
                if counts[level] == 0 {
                    continue;
                }
                let mut col: Vec<f64> =
                    time.iter().map(|&t| if t == level { 1.0 } else { 0.0 }).collect();
                fe.demean_first(&mut col);
                // Two passes keep the basis orthogonal to working precision.
                for _ in 0..2 {
                    for q in &fe.time_basis {
                        subtract_projection(&mut col, q);
                    }
                }
                let norm = dot(&col, &col).sqrt();
                if norm > RANK_TOL * (counts[level] as f64).sqrt() {
                    col.iter_mut().for_each(|v| *v /= norm);
                    fe.time_basis.push(col);
                }
            }
        }

        log::debug!(
            "absorb: n={n} entities={} times={} time_rank={}",
            fe.n_entities,
            fe.n_times,
            fe.time_basis.len()
        );
        Ok(fe)
    }

    pub fn n_obs(&self) -> usize {
        self.n
    }

    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    pub fn n_times(&self) -> usize {
        self.n_times
    }

    pub fn has_entity_effects(&self) -> bool {
        self.entity_rows.is_some()
    }

    /// Residual of `v` after removing every absorbed effect.
    pub fn partial_out(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.n);
        let mut w = v.to_vec();
        self.demean_first(&mut w);
        for q in &self.time_basis {
            subtract_projection(&mut w, q);
        }
        w
    }

    /// Degrees of freedom consumed by the absorbed effects, constant
    /// included.
    pub fn absorbed_dof(&self) -> usize {
        let first = if self.entity_rows.is_some() { self.n_entities } else { 1 };
        first + self.time_basis.len()
    }

    /// Absorbed degrees of freedom that are not nested within user clusters.
    /// User effects are nested and excluded from the cluster correction.
    pub fn dof_outside_clusters(&self) -> usize {
        let first = if self.entity_rows.is_some() { 0 } else { 1 };
        first + self.time_basis.len()
    }

    fn demean_first(&self, v: &mut [f64]) {
        match &self.entity_rows {
            Some(groups) => {
                for rows in groups {
                    if rows.is_empty() {
                        continue;
                    }
                    let mean = rows.iter().map(|&i| v[i]).sum::<f64>() / rows.len() as f64;
                    for &i in rows {
                        v[i] -= mean;
                    }
                }
            }
            None => {
                let mean = v.iter().sum::<f64>() / v.len() as f64;
                v.iter_mut().for_each(|x| *x -= mean);
            }
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `v -= (q·v) q` for unit-length `q`.
fn subtract_projection(v: &mut [f64], q: &[f64]) {
    let d = dot(q, v);
    for (vi, qi) in v.iter_mut().zip(q) {
        *vi -= d * qi;
    }
}
