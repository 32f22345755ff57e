//! OLS on residualised columns with Liang–Zeger cluster-robust standard
//! errors.
//!
//! Inputs are already purged of the absorbed fixed effects (see
//! `absorb`), so the regression carries no intercept and no dummies.

use crate::error::{PanelError, PanelResult};
use nalgebra::{DMatrix, DVector};

/// Degrees of freedom the absorbed effects consumed, split by whether they
/// are nested within the clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsorbedDof {
    pub total: usize,
    pub outside_clusters: usize,
}

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    /// Homoskedastic standard errors.
    pub se_ols: Vec<f64>,
    /// CR1 cluster-robust standard errors.
    pub se_cluster: Vec<f64>,
    pub residuals: Vec<f64>,
    pub rss: f64,
    /// Total sum of squares of the residualised outcome.
    pub tss: f64,
    pub n_obs: usize,
    pub n_clusters: usize,
}

impl OlsFit {
    pub fn r_squared(&self) -> f64 {
        if self.tss > 0.0 {
            1.0 - self.rss / self.tss
        } else {
            0.0
        }
    }
}

/// Regress `y` on `columns` (each of length n). `clusters` maps each
/// observation to a dense 0-based cluster id.
pub fn fit_absorbed(
    columns: &[Vec<f64>],
    y: &[f64],
    clusters: &[usize],
    absorbed: AbsorbedDof,
) -> PanelResult<OlsFit> {
    let n = y.len();
    let p = columns.len();
    if p == 0 {
        return Err(PanelError::SingularDesign("no regressors".into()));
    }
    if let Some(bad) = columns.iter().find(|c| c.len() != n) {
        return Err(PanelError::RowWidthMismatch { expected: n, actual: bad.len() });
    }
    if clusters.len() != n {
        return Err(PanelError::RowWidthMismatch { expected: n, actual: clusters.len() });
    }

    let x = DMatrix::from_fn(n, p, |i, j| columns[j][i]);
    let y_vec = DVector::from_column_slice(y);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y_vec;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| PanelError::SingularDesign("X'X is singular after absorption".into()))?;

    let beta = &xtx_inv * &xty;
    let resid = &y_vec - &x * &beta;
    let rss = resid.iter().map(|r| r * r).sum::<f64>();
    let tss = y.iter().map(|v| v * v).sum::<f64>();

    let dof = n as f64 - absorbed.total as f64 - p as f64;
    let sigma2 = if dof > 0.0 { rss / dof } else { f64::NAN };
    let se_ols = (0..p).map(|j| std_error(sigma2 * xtx_inv[(j, j)])).collect();

    let k = p + absorbed.outside_clusters;
    let (se_cluster, n_clusters) = cluster_robust_se(&x, &resid, &xtx_inv, clusters, k);

    Ok(OlsFit {
        coefficients: beta.iter().copied().collect(),
        se_ols,
        se_cluster,
        residuals: resid.iter().copied().collect(),
        rss,
        tss,
        n_obs: n,
        n_clusters,
    })
}

/// Square root of a variance, clipping round-off below zero. NaN passes through.
fn std_error(variance: f64) -> f64 {
    if variance.is_nan() {
        variance
    } else {
        variance.max(0.0).sqrt()
    }
}

/// Sandwich `(X'X)⁻¹ B (X'X)⁻¹` with `B = Σ_g X_g' e_g e_g' X_g`, scaled by
/// the CR1 factor `G/(G−1) · (N−1)/(N−K)`.
///
/// Returns the standard errors and the number of clusters.
pub fn cluster_robust_se(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    clusters: &[usize],
    k: usize,
) -> (Vec<f64>, usize) {
    let n = x.nrows();
    let p = x.ncols();
    let n_groups = clusters.iter().copied().max().map_or(0, |m| m + 1);

    // Per-cluster scores s_g = X_g' e_g
    let mut scores = DMatrix::<f64>::zeros(n_groups, p);
    let mut seen = vec![false; n_groups];
    for (i, &g) in clusters.iter().enumerate() {
        seen[g] = true;
        let e = residuals[i];
        for j in 0..p {
            scores[(g, j)] += x[(i, j)] * e;
        }
    }
    let g = seen.iter().filter(|&&s| s).count();
    let meat = scores.transpose() * &scores;

    let g_f = g as f64;
    let n_f = n as f64;
    let k_f = k as f64;
    let correction = if g > 1 && n_f > k_f {
        (g_f / (g_f - 1.0)) * ((n_f - 1.0) / (n_f - k_f))
    } else {
        1.0
    };

    let vcr = (xtx_inv * meat) * xtx_inv * correction;
    let se = (0..p).map(|j| std_error(vcr[(j, j)])).collect();
    (se, g)
}
