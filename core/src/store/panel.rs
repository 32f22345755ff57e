use super::PanelStore;
use crate::{
    error::{PanelError, PanelResult},
    panel::{ColumnSpec, PanelRow, PanelTable, ValueKind},
};
use rusqlite::params;

impl PanelStore {
    // ── Panel ──────────────────────────────────────────────────

    /// Store `table` under `run_id` in a single transaction.
    pub fn insert_panel(&self, run_id: &str, table: &PanelTable) -> PanelResult<()> {
        self.require_run(run_id)?;
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut col_stmt = tx.prepare(
                "INSERT INTO panel_column (run_id, position, name, kind) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (pos, col) in table.columns().iter().enumerate() {
                col_stmt.execute(params![run_id, pos as i64, col.name, col.kind.as_str()])?;
            }

            let mut row_stmt = tx.prepare(
                "INSERT INTO panel_row (
                    run_id, row_index, user_id, cohort, event_month, calendar_month, post,
                    value_bytes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (i, row) in table.rows().iter().enumerate() {
                row_stmt.execute(params![
                    run_id,
                    i as i64,
                    row.user_id,
                    row.group,
                    row.event_month,
                    row.calendar_month,
                    row.post,
                    pack_values(&row.values),
                ])?;
            }
        }
        tx.commit()?;
        log::info!("store: run {run_id} stored {} panel rows", table.len());
        Ok(())
    }

    pub fn load_panel(&self, run_id: &str) -> PanelResult<PanelTable> {
        self.require_run(run_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT name, kind FROM panel_column WHERE run_id = ?1 ORDER BY position ASC",
        )?;
        let raw_columns = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let columns = raw_columns
            .into_iter()
            .map(|(name, kind)| match ValueKind::parse(&kind) {
                Some(kind) => Ok(ColumnSpec { name, kind }),
                None => Err(PanelError::MalformedValue { column: name, row: 0, value: kind }),
            })
            .collect::<PanelResult<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT user_id, cohort, event_month, calendar_month, post, value_bytes
             FROM panel_row WHERE run_id = ?1 ORDER BY row_index ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(PanelRow {
                    user_id: row.get(0)?,
                    group: row.get(1)?,
                    event_month: row.get(2)?,
                    calendar_month: row.get(3)?,
                    post: row.get(4)?,
                    values: unpack_values(&row.get::<_, Vec<u8>>(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = PanelTable::with_capacity(columns, rows.len());
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    pub fn panel_row_count(&self, run_id: &str) -> PanelResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM panel_row WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn pack_values(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn unpack_values(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_is_bit_exact() {
        let values = vec![0.1, -0.116, 3700.0, f64::MIN_POSITIVE, 1e300];
        let back = unpack_values(&pack_values(&values));
        assert_eq!(back.len(), values.len());
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
