//! Descriptive summaries printed after generation: per-cohort means before
//! and after install, and per-month means of one column.

use crate::{
    error::{PanelError, PanelResult},
    panel::PanelTable,
    types::EventMonth,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMean {
    pub cohort: String,
    pub post: bool,
    pub column: String,
    pub mean: f64,
    pub n: usize,
}

/// Mean of each column by (cohort, post), cohorts in first-seen order,
/// pre before post.
pub fn group_means(table: &PanelTable, columns: &[&str]) -> PanelResult<Vec<GroupMean>> {
    for &column in columns {
        if !table.has_column(column) {
            return Err(PanelError::MissingColumn { column: column.to_string() });
        }
    }

    let mut out = Vec::new();
    for cohort in table.cohorts() {
        for post in [false, true] {
            for &column in columns {
                let mut sum = 0.0;
                let mut n = 0usize;
                for row in table.rows().iter().filter(|r| r.group == cohort && r.post == post) {
                    if let Some(v) = table.value(row, column) {
                        sum += v;
                        n += 1;
                    }
                }
                if n > 0 {
                    out.push(GroupMean {
                        cohort: cohort.to_string(),
                        post,
                        column: column.to_string(),
                        mean: sum / n as f64,
                        n,
                    });
                }
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMeans {
    pub cohort: String,
    pub column: String,
    /// Ascending by event-month.
    pub months: Vec<(EventMonth, f64)>,
}

impl MonthlyMeans {
    pub fn get(&self, month: EventMonth) -> Option<f64> {
        self.months.iter().find(|(m, _)| *m == month).map(|(_, v)| *v)
    }

    /// Every month's mean minus the mean at `month`.
    pub fn relative_to(&self, month: EventMonth) -> Option<MonthlyMeans> {
        let base = self.get(month)?;
        Some(MonthlyMeans {
            cohort: self.cohort.clone(),
            column: self.column.clone(),
            months: self.months.iter().map(|&(m, v)| (m, v - base)).collect(),
        })
    }
}

pub fn monthly_means(table: &PanelTable, column: &str, cohort: &str) -> PanelResult<MonthlyMeans> {
    if !table.has_column(column) {
        return Err(PanelError::MissingColumn { column: column.to_string() });
    }
    let mut acc: BTreeMap<EventMonth, (f64, usize)> = BTreeMap::new();
    for row in table.rows().iter().filter(|r| r.group == cohort) {
        if let Some(v) = table.value(row, column) {
            let e = acc.entry(row.event_month).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }
    if acc.is_empty() {
        return Err(PanelError::EmptySelection { cohort: cohort.to_string() });
    }
    Ok(MonthlyMeans {
        cohort: cohort.to_string(),
        column: column.to_string(),
        months: acc.into_iter().map(|(m, (s, n))| (m, s / n as f64)).collect(),
    })
}
