//! CSV persistence of panel tables.
//!
//! Written files carry the index columns first (`user_id, group,
//! event_month, calendar_month, post`) and then the value columns in table
//! order. `post` is written as 0/1 and integer columns without a decimal
//! point. Floats use the shortest representation that parses back to the
//! same bits.
//!
//! The reader only needs `user_id`, `group`, `event_month` and `post`, in any
//! order. A missing `calendar_month` defaults to the event month. A column in
//! which no cell is numeric is skipped. Every other column is a value column,
//! typed integer when all of its values are whole numbers written without a
//! decimal point.

use crate::{
    error::{PanelError, PanelResult},
    panel::{ColumnSpec, PanelRow, PanelTable, ValueKind},
    types::{COL_CALENDAR_MONTH, COL_EVENT_MONTH, COL_GROUP, COL_POST, COL_USER_ID, INDEX_COLUMNS},
};
use std::io;
use std::path::Path;

pub fn write_csv(table: &PanelTable, path: impl AsRef<Path>) -> PanelResult<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("Cannot create {}: {e}", path.display()))?;
    write_csv_to(table, file)?;
    log::info!("table_io: wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn write_csv_to<W: io::Write>(table: &PanelTable, writer: W) -> PanelResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = INDEX_COLUMNS.to_vec();
    header.extend(table.columns().iter().map(|c| c.name.as_str()));
    wtr.write_record(&header)?;

    let mut record: Vec<String> = Vec::with_capacity(header.len());
    for row in table.rows() {
        record.clear();
        record.push(row.user_id.clone());
        record.push(row.group.clone());
        record.push(row.event_month.to_string());
        record.push(row.calendar_month.to_string());
        record.push(if row.post { "1" } else { "0" }.to_string());
        for (spec, v) in table.columns().iter().zip(&row.values) {
            record.push(format_value(spec.kind, *v));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn format_value(kind: ValueKind, v: f64) -> String {
    match kind {
        ValueKind::Integer if v.is_finite() => format!("{}", v as i64),
        // Debug keeps the ".0", so float columns stay float on re-read.
        _ => format!("{v:?}"),
    }
}

pub fn read_csv(path: impl AsRef<Path>) -> PanelResult<PanelTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
    let table = read_csv_from(file)?;
    log::info!(
        "table_io: read {} rows, {} value columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

pub fn read_csv_from<R: io::Read>(reader: R) -> PanelResult<PanelTable> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let require = |name: &str| {
        find(name).ok_or_else(|| PanelError::MissingColumn { column: name.to_string() })
    };
    let user_col = require(COL_USER_ID)?;
    let group_col = require(COL_GROUP)?;
    let month_col = require(COL_EVENT_MONTH)?;
    let post_col = require(COL_POST)?;
    let calendar_col = find(COL_CALENDAR_MONTH);

    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

    // A column where no cell parses as a number is free text and is dropped.
    let (value_cols, text_cols): (Vec<usize>, Vec<usize>) = (0..headers.len())
        .filter(|&j| !INDEX_COLUMNS.contains(&headers[j].as_str()))
        .partition(|&j| {
            records.is_empty()
                || records
                    .iter()
                    .any(|r| r.get(j).is_some_and(|v| v.trim().parse::<f64>().is_ok()))
        });
    for &j in &text_cols {
        log::debug!("table_io: skipping non-numeric column '{}'", headers[j]);
    }
    let mut integer_like = vec![true; value_cols.len()];

    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        // Data rows are numbered from 1, after the header.
        let line = i + 1;
        let field = |j: usize| record.get(j).unwrap_or("").trim();

        let event_month = parse_month(field(month_col), COL_EVENT_MONTH, line)?;
        let calendar_month = match calendar_col {
            Some(j) => parse_month(field(j), COL_CALENDAR_MONTH, line)?,
            None => event_month,
        };
        let post = parse_post(field(post_col), line)?;

        let mut values = Vec::with_capacity(value_cols.len());
        for (k, &j) in value_cols.iter().enumerate() {
            let raw = field(j);
            let v: f64 = raw.parse().map_err(|_| malformed(&headers[j], line, raw))?;
            if raw.contains(['.', 'e', 'E']) || !v.is_finite() {
                integer_like[k] = false;
            }
            values.push(v);
        }

        rows.push(PanelRow {
            user_id: field(user_col).to_string(),
            group: field(group_col).to_string(),
            event_month,
            calendar_month,
            post,
            values,
        });
    }

    let columns = value_cols
        .iter()
        .zip(&integer_like)
        .map(|(&j, &int)| {
            if int && !rows.is_empty() {
                ColumnSpec::integer(&headers[j])
            } else {
                ColumnSpec::float(&headers[j])
            }
        })
        .collect();

    let mut table = PanelTable::with_capacity(columns, rows.len());
    for row in rows {
        table.push(row)?;
    }
    Ok(table)
}

fn malformed(column: &str, row: usize, value: &str) -> PanelError {
    PanelError::MalformedValue {
        column: column.to_string(),
        row,
        value: value.to_string(),
    }
}

/// Whole numbers, also accepted when written as `3.0`.
fn parse_month(raw: &str, column: &str, row: usize) -> PanelResult<i32> {
    if let Ok(m) = raw.parse::<i32>() {
        return Ok(m);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() <= i32::MAX as f64 => Ok(v as i32),
        _ => Err(malformed(column, row, raw)),
    }
}

fn parse_post(raw: &str, row: usize) -> PanelResult<bool> {
    match raw {
        "1" | "1.0" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "0.0" | "false" | "False" | "FALSE" => Ok(false),
        _ => Err(malformed(COL_POST, row, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_parsing_accepts_float_notation() {
        assert_eq!(parse_month("-3", "m", 1).unwrap(), -3);
        assert_eq!(parse_month("2.0", "m", 1).unwrap(), 2);
        assert!(parse_month("2.5", "m", 1).is_err());
    }

    #[test]
    fn post_accepts_dataframe_booleans() {
        assert!(parse_post("True", 1).unwrap());
        assert!(!parse_post("0", 1).unwrap());
        assert!(matches!(parse_post("yes", 4), Err(PanelError::MalformedValue { row: 4, .. })));
    }
}
