use crate::types::EventMonth;
use thiserror::Error;

/// Coarse classification of every failure the toolkit can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or inconsistent simulation configuration.
    Configuration,
    /// The coefficient of interest is not identified under the fixed effects.
    Absorption,
    /// The table handed to an estimator cannot be used as-is.
    EstimationInput,
    /// Files, CSV, JSON or SQLite.
    Storage,
}

#[derive(Error, Debug)]
pub enum PanelError {
    // ── Configuration ──────────────────────────────
    #[error("Invalid month window: start {start} is after end {end}")]
    InvalidWindow { start: EventMonth, end: EventMonth },

    #[error("No cohorts configured")]
    NoCohorts,

    #[error("No outcomes configured")]
    NoOutcomes,

    #[error("Cohort '{cohort}' has no users")]
    EmptyCohort { cohort: String },

    #[error("Name '{name}' is used more than once")]
    DuplicateName { name: String },

    #[error("Name '{name}' is reserved for an index column")]
    ReservedName { name: String },

    #[error(
        "Effect curve for cohort '{cohort}', outcome '{outcome}' has {actual} entries; \
         the month window needs {expected}"
    )]
    CurveLengthMismatch {
        cohort: String,
        outcome: String,
        expected: usize,
        actual: usize,
    },

    #[error("No effect curve for cohort '{cohort}', outcome '{outcome}'")]
    MissingCurve { cohort: String, outcome: String },

    #[error("Covariate '{covariate}' has no distribution for cohort '{cohort}'")]
    MissingCovariate { cohort: String, covariate: String },

    #[error("Configuration references unknown {what} '{name}'")]
    UnknownCurveKey { what: &'static str, name: String },

    #[error("Effect curve for cohort '{cohort}', outcome '{outcome}' has a non-finite entry")]
    NonFiniteCurve { cohort: String, outcome: String },

    #[error("Noise standard deviation for '{outcome}' must be finite and >= 0, got {sd}")]
    InvalidNoise { outcome: String, sd: f64 },

    #[error("Distribution for '{name}' needs a finite mean and a finite sd >= 0, got N({mean}, {sd})")]
    InvalidDistribution { name: String, mean: f64, sd: f64 },

    #[error(
        "Multiplicative outcome '{outcome}' reached level {value} for {user_id} at month \
         {event_month}; its log is undefined"
    )]
    NonPositiveLevel {
        outcome: String,
        user_id: String,
        event_month: EventMonth,
        value: f64,
    },

    // ── Absorption ─────────────────────────────────
    #[error("'{regressor}' is absorbed by the fixed effects: {reason}")]
    Absorbed { regressor: String, reason: String },

    #[error("{dimension} fixed-effect category '{level}' has a single observation")]
    SingletonCategory { dimension: &'static str, level: String },

    #[error("Design matrix is singular: {0}")]
    SingularDesign(String),

    #[error("Estimate is not finite: coefficient {coefficient}, standard error {std_error}")]
    NonFiniteEstimate { coefficient: f64, std_error: f64 },

    // ── Estimation input ───────────────────────────
    #[error("Panel table is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Cohort filter '{cohort}' selects no rows")]
    EmptySelection { cohort: String },

    #[error("Malformed value '{value}' in column '{column}' at data row {row}")]
    MalformedValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Column '{column}' holds {value} for {user_id} at month {event_month}")]
    NonFiniteValue {
        column: String,
        user_id: String,
        event_month: EventMonth,
        value: f64,
    },

    #[error("{user_id} is observed more than once at month {event_month}")]
    DuplicateObservation { user_id: String, event_month: EventMonth },

    #[error("Row has {actual} values, table has {expected} value columns")]
    RowWidthMismatch { expected: usize, actual: usize },

    #[error("Reference month {month} is not observed for cohort '{cohort}'")]
    UnknownReferenceMonth { cohort: String, month: EventMonth },

    // ── Storage ────────────────────────────────────
    #[error("Run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWindow { .. }
            | Self::NoCohorts
            | Self::NoOutcomes
            | Self::EmptyCohort { .. }
            | Self::DuplicateName { .. }
            | Self::ReservedName { .. }
            | Self::CurveLengthMismatch { .. }
            | Self::MissingCurve { .. }
            | Self::MissingCovariate { .. }
            | Self::UnknownCurveKey { .. }
            | Self::NonFiniteCurve { .. }
            | Self::InvalidNoise { .. }
            | Self::InvalidDistribution { .. }
            | Self::NonPositiveLevel { .. } => ErrorKind::Configuration,

            Self::Absorbed { .. }
            | Self::SingletonCategory { .. }
            | Self::SingularDesign(_)
            | Self::NonFiniteEstimate { .. } => ErrorKind::Absorption,

            Self::MissingColumn { .. }
            | Self::EmptySelection { .. }
            | Self::MalformedValue { .. }
            | Self::NonFiniteValue { .. }
            | Self::DuplicateObservation { .. }
            | Self::RowWidthMismatch { .. }
            | Self::UnknownReferenceMonth { .. } => ErrorKind::EstimationInput,

            Self::RunNotFound { .. }
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Csv(_)
            | Self::Io(_)
            | Self::Other(_) => ErrorKind::Storage,
        }
    }
}

pub type PanelResult<T> = Result<T, PanelError>;
