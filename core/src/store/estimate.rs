use super::PanelStore;
use crate::{
    error::{PanelError, PanelResult},
    estimator::EstimationResult,
};
use rusqlite::params;

/// SQLite turns NaN into NULL; read it back as NaN.
fn real(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

impl PanelStore {
    // ── Estimates ──────────────────────────────────────────────

    /// Returns the row id of the stored estimate.
    pub fn insert_estimate(&self, run_id: &str, r: &EstimationResult) -> PanelResult<i64> {
        self.require_run(run_id)?;
        self.conn.execute(
            "INSERT INTO estimate (
                run_id, cohort, outcome, regressor, coefficient, std_error, std_error_ols,
                t_stat, p_value, ci_lower, ci_upper, r_squared_within,
                n_obs, n_entities, n_time_periods, n_clusters, absorbed_dof, spec_json
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            params![
                run_id,
                r.cohort,
                r.outcome,
                r.regressor,
                r.coefficient,
                r.std_error,
                r.std_error_ols,
                r.t_stat,
                r.p_value,
                r.ci_lower,
                r.ci_upper,
                r.r_squared_within,
                r.n_obs as i64,
                r.n_entities as i64,
                r.n_time_periods as i64,
                r.n_clusters as i64,
                r.absorbed_dof as i64,
                serde_json::to_string(&r.spec)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Estimates of a run in insertion order.
    pub fn estimates_for_run(&self, run_id: &str) -> PanelResult<Vec<EstimationResult>> {
        self.require_run(run_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT cohort, outcome, regressor, coefficient, std_error, std_error_ols,
                    t_stat, p_value, ci_lower, ci_upper, r_squared_within,
                    n_obs, n_entities, n_time_periods, n_clusters, absorbed_dof, spec_json
             FROM estimate WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    EstimationResult {
                        cohort: row.get(0)?,
                        outcome: row.get(1)?,
                        regressor: row.get(2)?,
                        coefficient: real(row, 3)?,
                        std_error: real(row, 4)?,
                        std_error_ols: real(row, 5)?,
                        t_stat: real(row, 6)?,
                        p_value: real(row, 7)?,
                        ci_lower: real(row, 8)?,
                        ci_upper: real(row, 9)?,
                        r_squared_within: real(row, 10)?,
                        n_obs: row.get::<_, i64>(11)? as usize,
                        n_entities: row.get::<_, i64>(12)? as usize,
                        n_time_periods: row.get::<_, i64>(13)? as usize,
                        n_clusters: row.get::<_, i64>(14)? as usize,
                        absorbed_dof: row.get::<_, i64>(15)? as usize,
                        spec: Default::default(),
                    },
                    row.get::<_, String>(16)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(mut r, spec_json)| {
                r.spec = serde_json::from_str(&spec_json)?;
                Ok::<_, PanelError>(r)
            })
            .collect()
    }
}
