//! The long-format panel table: one row per (user, event-month).

use crate::{
    error::{PanelError, PanelResult},
    types::{
        CalendarMonth, EventMonth, UserId, COL_CALENDAR_MONTH, COL_EVENT_MONTH, COL_POST,
        INDEX_COLUMNS,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Float,
    Integer,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "float" => Some(Self::Float),
            "integer" => Some(Self::Integer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ValueKind,
}

impl ColumnSpec {
    pub fn float(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ValueKind::Float }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ValueKind::Integer }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub user_id: UserId,
    pub group: String,
    pub event_month: EventMonth,
    pub calendar_month: CalendarMonth,
    pub post: bool,
    /// One value per table column, in `PanelTable::columns` order.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelTable {
    columns: Vec<ColumnSpec>,
    rows: Vec<PanelRow>,
}

impl PanelTable {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn with_capacity(columns: Vec<ColumnSpec>, rows: usize) -> Self {
        Self { columns, rows: Vec::with_capacity(rows) }
    }

    pub fn push(&mut self, row: PanelRow) -> PanelResult<()> {
        if row.values.len() != self.columns.len() {
            return Err(PanelError::RowWidthMismatch {
                expected: self.columns.len(),
                actual: row.values.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// True for index columns and value columns alike.
    pub fn has_column(&self, name: &str) -> bool {
        INDEX_COLUMNS.contains(&name) || self.column_index(name).is_some()
    }

    /// Numeric value of `name` on `row`. Index columns `event_month`,
    /// `calendar_month` and `post` are readable too.
    pub fn value(&self, row: &PanelRow, name: &str) -> Option<f64> {
        match name {
            COL_EVENT_MONTH => Some(row.event_month as f64),
            COL_CALENDAR_MONTH => Some(row.calendar_month as f64),
            COL_POST => Some(if row.post { 1.0 } else { 0.0 }),
            _ => self.column_index(name).map(|i| row.values[i]),
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if !self.has_column(name) {
            return None;
        }
        self.rows.iter().map(|r| self.value(r, name)).collect()
    }

    /// Cohort labels in first-seen order.
    pub fn cohorts(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.group.as_str()) {
                seen.push(&row.group);
            }
        }
        seen
    }

    /// Rows belonging to `cohort`, same columns.
    pub fn filter_cohort(&self, cohort: &str) -> PanelTable {
        PanelTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| r.group == cohort).cloned().collect(),
        }
    }

    /// Event-months observed per user, in row order.
    pub fn months_by_user(&self) -> BTreeMap<&str, Vec<EventMonth>> {
        let mut map: BTreeMap<&str, Vec<EventMonth>> = BTreeMap::new();
        for row in &self.rows {
            map.entry(row.user_id.as_str()).or_default().push(row.event_month);
        }
        map
    }

    pub fn user_count(&self) -> usize {
        self.months_by_user().len()
    }

    /// Whether users installed at different calendar months.
    pub fn is_staggered(&self) -> bool {
        let mut installs = self.rows.iter().map(|r| r.calendar_month - r.event_month);
        match installs.next() {
            Some(first) => installs.any(|m| m != first),
            None => false,
        }
    }
}
