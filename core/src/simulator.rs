//! The panel simulator.
//!
//! ORDER OF DRAWS (fixed, never reordered):
//!   1. Users, cohort by cohort in configuration order. Per user:
//!      fixed effects (population stream, one per outcome), covariates
//!      (covariate stream), install month (adoption stream, only when the
//!      cohort has an install spread).
//!   2. Rows in (cohort, user, month) order. Per row: one noise draw per
//!      outcome (noise stream), in outcome order.
//!
//! RULES:
//!   - Every user observes every month of the window exactly once.
//!   - `post` is derived from the event-month, never drawn.
//!   - The simulator performs no I/O.

use crate::{
    config::{CohortConfig, SimConfig},
    error::{PanelError, PanelResult},
    panel::{ColumnSpec, PanelRow, PanelTable},
    rng::{RngBank, SimRng, StreamSlot},
    types::{CalendarMonth, UserId},
};

/// A user drawn once per run and never mutated afterwards.
#[derive(Debug, Clone)]
struct SimUser {
    user_id: UserId,
    cohort: usize,
    /// One per outcome, in `SimConfig::outcomes` order.
    fixed_effects: Vec<f64>,
    /// One per covariate, in `SimConfig::covariates` order.
    covariates: Vec<f64>,
    install_month: CalendarMonth,
}

pub struct PanelSimulator<'a> {
    config: &'a SimConfig,
    columns: Vec<ColumnSpec>,
}

impl<'a> PanelSimulator<'a> {
    /// Validate `config` and prepare the table schema.
    pub fn new(config: &'a SimConfig) -> PanelResult<Self> {
        config.validate()?;

        let mut columns: Vec<ColumnSpec> =
            config.covariates.iter().map(|c| ColumnSpec::float(&c.name)).collect();
        for outcome in &config.outcomes {
            columns.push(if outcome.strategy.is_integer() {
                ColumnSpec::integer(&outcome.name)
            } else {
                ColumnSpec::float(&outcome.name)
            });
            if let Some(log_col) = outcome.strategy.log_column() {
                columns.push(ColumnSpec::float(log_col));
            }
        }
        Ok(Self { config, columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Generate the full panel from the streams in `bank`.
    ///
    /// Streams are created fresh from the bank, so the same bank (or a bank
    /// with the same seed) always yields the same table.
    pub fn generate(&self, bank: &RngBank) -> PanelResult<PanelTable> {
        let mut population = bank.stream(StreamSlot::Population);
        let mut covariate = bank.stream(StreamSlot::Covariate);
        let mut adoption = bank.stream(StreamSlot::Adoption);
        let mut noise = bank.stream(StreamSlot::Noise);

        let users = self.draw_users(&mut population, &mut covariate, &mut adoption);

        let window = self.config.window;
        let mut table = PanelTable::with_capacity(self.columns.clone(), users.len() * window.len());

        for user in &users {
            let cohort = &self.config.cohorts[user.cohort];
            for (m_idx, month) in window.months().enumerate() {
                let mut values = Vec::with_capacity(self.columns.len());
                values.extend_from_slice(&user.covariates);

                for (o_idx, outcome) in self.config.outcomes.iter().enumerate() {
                    // Validated: every (cohort, outcome) curve spans the window.
                    let effect = self
                        .config
                        .curves
                        .get(&cohort.label, &outcome.name)
                        .map_or(0.0, |curve| curve[m_idx]);
                    let shock = outcome.noise_sd * noise.standard_normal();
                    let base = self.config.base_for(cohort, outcome);
                    let value =
                        outcome.strategy.combine(base, user.fixed_effects[o_idx], effect, shock);
                    values.push(value);

                    if outcome.strategy.log_column().is_some() {
                        if value <= 0.0 {
                            return Err(PanelError::NonPositiveLevel {
                                outcome: outcome.name.clone(),
                                user_id: user.user_id.clone(),
                                event_month: month,
                                value,
                            });
                        }
                        values.push(value.ln());
                    }
                }

                table.push(PanelRow {
                    user_id: user.user_id.clone(),
                    group: cohort.label.clone(),
                    event_month: month,
                    calendar_month: user.install_month + month,
                    post: month >= 0,
                    values,
                })?;
            }
        }

        log::info!(
            "simulator: seed={} users={} months={} rows={}",
            bank.seed(),
            users.len(),
            window.len(),
            table.len()
        );
        Ok(table)
    }

    fn draw_users(
        &self,
        population: &mut SimRng,
        covariate: &mut SimRng,
        adoption: &mut SimRng,
    ) -> Vec<SimUser> {
        let total: usize = self.config.cohorts.iter().map(|c| c.users).sum();
        let mut users = Vec::with_capacity(total);

        for (c_idx, cohort) in self.config.cohorts.iter().enumerate() {
            for i in 0..cohort.users {
                users.push(self.draw_user(c_idx, cohort, i, population, covariate, adoption));
            }
            log::debug!(
                "simulator: cohort={} drew {} users (install spread {})",
                cohort.label,
                cohort.users,
                cohort.install_spread
            );
        }
        users
    }

    fn draw_user(
        &self,
        c_idx: usize,
        cohort: &CohortConfig,
        i: usize,
        population: &mut SimRng,
        covariate: &mut SimRng,
        adoption: &mut SimRng,
    ) -> SimUser {
        let fixed_effects = self
            .config
            .outcomes
            .iter()
            .map(|o| population.normal(o.fixed_effect.mean, o.fixed_effect.sd))
            .collect();

        let covariates = self
            .config
            .covariates
            .iter()
            .map(|c| {
                // Validated: every covariate covers every cohort.
                let dist = c.by_cohort[&cohort.label];
                covariate.normal(dist.mean, dist.sd)
            })
            .collect();

        let install_month = if cohort.install_spread > 0 {
            adoption.next_u64_below(u64::from(cohort.install_spread) + 1) as CalendarMonth
        } else {
            0
        };

        SimUser {
            user_id: format!("{}_{i}", cohort.label),
            cohort: c_idx,
            fixed_effects,
            covariates,
            install_month,
        }
    }
}

/// Generate the panel for `config` from a fresh bank seeded with
/// `config.seed`.
pub fn generate(config: &SimConfig) -> PanelResult<PanelTable> {
    let bank = RngBank::new(config.seed);
    PanelSimulator::new(config)?.generate(&bank)
}
