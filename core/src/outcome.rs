//! Outcome generation strategies.
//!
//! Every outcome column is produced by exactly one strategy, picked per
//! outcome in the configuration. All strategies consume one noise draw per
//! row so that switching strategy never shifts the noise stream.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStrategy {
    /// `base + fe + effect + noise`, a continuous level or an already
    /// log-scaled value.
    Additive,
    /// The additive formula clipped at zero and rounded to a whole count,
    /// ties to even.
    Count,
    /// `base × fe × (1 + effect) × (1 + noise)`, the effect read as a
    /// proportional shock. Optionally emits `ln(level)` as a companion column.
    Multiplicative {
        #[serde(default)]
        log_column: Option<String>,
    },
}

impl OutcomeStrategy {
    /// Combine the pieces of one observation into its value.
    ///
    /// `shock` is the already-scaled noise draw (`sd × z`).
    pub fn combine(&self, base: f64, fixed_effect: f64, effect: f64, shock: f64) -> f64 {
        match self {
            Self::Additive => base + fixed_effect + effect + shock,
            Self::Count => (base + fixed_effect + effect + shock).max(0.0).round_ties_even(),
            Self::Multiplicative { .. } => base * fixed_effect * (1.0 + effect) * (1.0 + shock),
        }
    }

    /// Whether generated values are whole numbers.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Count)
    }

    pub fn log_column(&self) -> Option<&str> {
        match self {
            Self::Multiplicative { log_column } => log_column.as_deref(),
            _ => None,
        }
    }

    /// Map an effect-curve entry onto the scale a linear panel regression of
    /// `column` recovers. `None` when the column is not linear in the effect.
    pub fn linear_effect(&self, effect: f64, on_log_column: bool) -> Option<f64> {
        match (self, on_log_column) {
            (Self::Additive | Self::Count, false) => Some(effect),
            (Self::Multiplicative { .. }, true) => Some((1.0 + effect).ln()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_clipped_and_rounded() {
        let s = OutcomeStrategy::Count;
        assert_eq!(s.combine(1.0, -3.0, 0.5, 0.0), 0.0);
        assert_eq!(s.combine(4.0, 0.0, 10.7, 0.0), 15.0);
        assert_eq!(s.combine(4.0, 0.0, 0.2, 0.1), 4.0);
    }

    #[test]
    fn count_ties_round_to_even() {
        let s = OutcomeStrategy::Count;
        assert_eq!(s.combine(4.0, 0.0, 2.5, 0.0), 6.0);
        assert_eq!(s.combine(4.0, 0.0, 8.5, 0.0), 12.0);
        assert_eq!(s.combine(4.0, 0.0, -0.5, 0.0), 4.0);
    }

    #[test]
    fn multiplicative_applies_shock_proportionally() {
        let s = OutcomeStrategy::Multiplicative { log_column: None };
        let v = s.combine(3700.0, 1.0, -0.116, 0.0);
        assert!((v - 3700.0 * 0.884).abs() < 1e-9, "v={v}");
    }

    #[test]
    fn linear_effect_uses_log_scale_for_companion() {
        let s = OutcomeStrategy::Multiplicative { log_column: Some("log_spend".into()) };
        assert_eq!(s.linear_effect(-0.1, false), None);
        let e = s.linear_effect(-0.1, true).unwrap();
        assert!((e - 0.9f64.ln()).abs() < 1e-15);
        assert_eq!(OutcomeStrategy::Additive.linear_effect(0.3, false), Some(0.3));
    }
}
