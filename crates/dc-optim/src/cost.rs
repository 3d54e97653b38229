//! Annualized operating plus capital cost of a solved column.

use crate::error::{OptimError, OptimResult};
use dc_column::ColumnState;

/// Linear cost model in currency per unit time.
///
/// `total = condenser_cost * |Q_c| + reboiler_cost * |Q_r| + capital_coefficient * N * (1 + R)`
///
/// The capital term stands in for column diameter, which scales with the
/// internal vapor traffic `(1 + R) D`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Cost per W of condenser duty.
    pub condenser_cost: f64,
    /// Cost per W of reboiler duty.
    pub reboiler_cost: f64,
    /// Cost per stage per unit of `(1 + R)`.
    pub capital_coefficient: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            condenser_cost: 1e-7,
            reboiler_cost: 3e-7,
            capital_coefficient: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub condenser: f64,
    pub reboiler: f64,
    pub capital: f64,
    pub total: f64,
}

impl CostModel {
    pub fn validate(&self) -> OptimResult<()> {
        let coefficients = [
            ("condenser_cost", self.condenser_cost),
            ("reboiler_cost", self.reboiler_cost),
            ("capital_coefficient", self.capital_coefficient),
        ];
        for (name, value) in coefficients {
            if !value.is_finite() || value < 0.0 {
                return Err(OptimError::setup(format!(
                    "cost coefficient {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, state: &ColumnState) -> CostBreakdown {
        let condenser = self.condenser_cost * state.condenser_duty.value.abs();
        let reboiler = self.reboiler_cost * state.reboiler_duty.value.abs();
        let capital =
            self.capital_coefficient * state.stage_count() as f64 * (1.0 + state.reflux_ratio);
        CostBreakdown {
            condenser,
            reboiler,
            capital,
            total: condenser + reboiler + capital,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_valid() {
        assert!(CostModel::default().validate().is_ok());
    }

    #[test]
    fn negative_or_nan_coefficients_rejected() {
        let model = CostModel {
            reboiler_cost: -1.0,
            ..CostModel::default()
        };
        assert!(model.validate().is_err());
        let model = CostModel {
            capital_coefficient: f64::NAN,
            ..CostModel::default()
        };
        assert!(model.validate().is_err());
    }
}
