//! Mole-fraction vectors.

use crate::error::{ThermoError, ThermoResult};
use crate::table::PropertyTable;
use dc_core::numeric::max_abs_diff;

/// Tolerance on the sum of checked mole fractions.
pub const COMPOSITION_EPSILON: f64 = 1e-6;

/// Mole fractions indexed like the property table.
///
/// Always non-negative and normalized to sum 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    fractions: Vec<f64>,
}

impl Composition {
    /// Checked constructor: rejects fractions whose sum is off by more than
    /// [`COMPOSITION_EPSILON`], then removes the residual drift.
    pub fn new(fractions: Vec<f64>) -> ThermoResult<Self> {
        let sum = check_entries(&fractions)?;
        if (sum - 1.0).abs() > COMPOSITION_EPSILON {
            return Err(ThermoError::invalid_input(format!(
                "mole fractions sum to {sum}, not 1"
            )));
        }
        Ok(Self::scaled(fractions, sum))
    }

    /// Normalize component amounts (moles or molar flows) to fractions.
    pub fn from_amounts(amounts: Vec<f64>) -> ThermoResult<Self> {
        let sum = check_entries(&amounts)?;
        if sum <= 0.0 {
            return Err(ThermoError::invalid_input("amounts sum to zero"));
        }
        Ok(Self::scaled(amounts, sum))
    }

    pub fn pure(len: usize, index: usize) -> ThermoResult<Self> {
        if index >= len {
            return Err(ThermoError::invalid_input(format!(
                "pure component index {index} out of range for {len} components"
            )));
        }
        let mut fractions = vec![0.0; len];
        fractions[index] = 1.0;
        Ok(Self { fractions })
    }

    pub fn uniform(len: usize) -> ThermoResult<Self> {
        Self::from_amounts(vec![1.0; len])
    }

    fn scaled(mut values: Vec<f64>, sum: f64) -> Self {
        for v in values.iter_mut() {
            *v /= sum;
        }
        Self { fractions: values }
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    /// Mole fraction at `index` (0.0 if out of range).
    pub fn get(&self, index: usize) -> f64 {
        self.fractions.get(index).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.fractions.iter().copied()
    }

    /// Deviation of the stored sum from 1.
    pub fn sum_residual(&self) -> f64 {
        (self.fractions.iter().sum::<f64>() - 1.0).abs()
    }

    pub fn max_abs_diff(&self, other: &Composition) -> f64 {
        max_abs_diff(&self.fractions, &other.fractions)
    }

    /// Mean molecular weight, g/mol.
    pub fn molecular_weight(&self, table: &PropertyTable) -> f64 {
        self.fractions
            .iter()
            .zip(table.components())
            .map(|(x, c)| x * c.molecular_weight)
            .sum()
    }
}

fn check_entries(values: &[f64]) -> ThermoResult<f64> {
    if values.is_empty() {
        return Err(ThermoError::invalid_input("empty composition"));
    }
    let mut sum = 0.0;
    for v in values {
        if !v.is_finite() {
            return Err(ThermoError::invalid_input("non-finite mole fraction"));
        }
        if *v < 0.0 {
            return Err(ThermoError::invalid_input("negative mole fraction"));
        }
        sum += v;
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_core::numeric::{Tolerances, nearly_equal};

    #[test]
    fn checked_constructor_accepts_small_drift() {
        let c = Composition::new(vec![0.5, 0.5 + 5e-7]).unwrap();
        assert!(c.sum_residual() < 1e-15);
    }

    #[test]
    fn checked_constructor_rejects_bad_sum() {
        let err = Composition::new(vec![0.5, 0.4]).unwrap_err();
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn amounts_normalize() {
        let c = Composition::from_amounts(vec![2.0, 8.0]).unwrap();
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-12,
        };
        assert!(nearly_equal(c.get(0), 0.2, tol));
        assert!(nearly_equal(c.get(1), 0.8, tol));
    }

    #[test]
    fn invalid_entries() {
        assert!(Composition::new(vec![]).is_err());
        assert!(Composition::new(vec![-0.5, 1.5]).is_err());
        assert!(Composition::from_amounts(vec![0.0, 0.0]).is_err());
        assert!(Composition::from_amounts(vec![f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn pure_and_uniform() {
        let c = Composition::pure(3, 2).unwrap();
        assert_eq!(c.fractions(), &[0.0, 0.0, 1.0]);
        assert!(Composition::pure(3, 3).is_err());
        let u = Composition::uniform(4).unwrap();
        assert!(u.iter().all(|x| (x - 0.25).abs() < 1e-15));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalized_sum_is_one(amounts in prop::collection::vec(0.0_f64..10.0_f64, 1..6)) {
            if let Ok(c) = Composition::from_amounts(amounts) {
                prop_assert!(c.sum_residual() < 1e-12);
                prop_assert!(c.iter().all(|x| (0.0..=1.0).contains(&x)));
            }
        }
    }
}
