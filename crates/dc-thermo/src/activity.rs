//! Liquid-phase activity coefficient models.

use crate::error::{ThermoError, ThermoResult};
use nalgebra::DMatrix;
use std::fmt;

/// Liquid non-ideality. Implementations are pure functions of `(x, T)`.
pub trait ActivityModel: fmt::Debug + Send + Sync {
    /// Model name for diagnostics.
    fn name(&self) -> &'static str;

    /// Number of components the parameters cover, if fixed by the model.
    fn component_count(&self) -> Option<usize>;

    /// Natural log of the activity coefficients at liquid composition `x`.
    fn ln_gamma(&self, x: &[f64], t_k: f64) -> ThermoResult<Vec<f64>>;

    /// True when `ln_gamma` is identically zero, letting callers skip
    /// composition iterations and stability tests.
    fn is_ideal(&self) -> bool {
        false
    }
}

/// Ideal solution (Raoult's law).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealSolution;

impl ActivityModel for IdealSolution {
    fn name(&self) -> &'static str {
        "ideal"
    }

    fn component_count(&self) -> Option<usize> {
        None
    }

    fn ln_gamma(&self, x: &[f64], _t_k: f64) -> ThermoResult<Vec<f64>> {
        Ok(vec![0.0; x.len()])
    }

    fn is_ideal(&self) -> bool {
        true
    }
}

/// Non-random two-liquid model with `tau_ij = a_ij + b_ij / T` and
/// `G_ij = exp(-alpha_ij * tau_ij)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Nrtl {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    alpha: DMatrix<f64>,
}

impl Nrtl {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, alpha: DMatrix<f64>) -> ThermoResult<Self> {
        let n = a.nrows();
        let same_shape = |m: &DMatrix<f64>| m.nrows() == n && m.ncols() == n;
        if n == 0 || !same_shape(&a) || !same_shape(&b) || !same_shape(&alpha) {
            return Err(ThermoError::InvalidTable {
                what: "NRTL matrices must be square and of equal size".to_string(),
            });
        }
        if a.iter().chain(b.iter()).chain(alpha.iter()).any(|v| !v.is_finite()) {
            return Err(ThermoError::InvalidTable {
                what: "NRTL parameters must be finite".to_string(),
            });
        }
        for i in 0..n {
            if a[(i, i)] != 0.0 || b[(i, i)] != 0.0 {
                return Err(ThermoError::InvalidTable {
                    what: format!("NRTL diagonal entry {i} must be zero"),
                });
            }
        }
        if alpha.iter().any(|v| *v < 0.0) {
            return Err(ThermoError::InvalidTable {
                what: "NRTL non-randomness factors must be non-negative".to_string(),
            });
        }
        Ok(Self { a, b, alpha })
    }

    /// Binary parameter set; `a12`/`b12` build `tau_12`.
    pub fn binary(a12: f64, a21: f64, b12: f64, b21: f64, alpha: f64) -> ThermoResult<Self> {
        Self::new(
            DMatrix::from_row_slice(2, 2, &[0.0, a12, a21, 0.0]),
            DMatrix::from_row_slice(2, 2, &[0.0, b12, b21, 0.0]),
            DMatrix::from_row_slice(2, 2, &[0.0, alpha, alpha, 0.0]),
        )
    }

    pub fn dimension(&self) -> usize {
        self.a.nrows()
    }

    fn tau_and_g(&self, t_k: f64) -> (DMatrix<f64>, DMatrix<f64>) {
        let tau = &self.a + &self.b / t_k;
        let g = tau.zip_map(&self.alpha, |t, al| (-al * t).exp());
        (tau, g)
    }
}

impl ActivityModel for Nrtl {
    fn name(&self) -> &'static str {
        "NRTL"
    }

    fn component_count(&self) -> Option<usize> {
        Some(self.dimension())
    }

    fn ln_gamma(&self, x: &[f64], t_k: f64) -> ThermoResult<Vec<f64>> {
        let n = self.dimension();
        if x.len() != n {
            return Err(ThermoError::invalid_input(format!(
                "NRTL expects {n} mole fractions, got {}",
                x.len()
            )));
        }
        if !(t_k.is_finite() && t_k > 0.0) {
            return Err(ThermoError::invalid_input(format!(
                "NRTL temperature must be positive ({t_k})"
            )));
        }

        let (tau, g) = self.tau_and_g(t_k);

        // Column sums over the mixing partner k.
        let mut s = vec![0.0; n];
        let mut c = vec![0.0; n];
        for j in 0..n {
            for k in 0..n {
                s[j] += x[k] * g[(k, j)];
                c[j] += x[k] * tau[(k, j)] * g[(k, j)];
            }
        }

        let mut ln_gamma = vec![0.0; n];
        for i in 0..n {
            let mut sum = c[i] / s[i];
            for j in 0..n {
                sum += x[j] * g[(i, j)] / s[j] * (tau[(i, j)] - c[j] / s[j]);
            }
            if !sum.is_finite() {
                return Err(ThermoError::Numeric {
                    what: format!("non-finite NRTL ln(gamma) for component {i}"),
                });
            }
            ln_gamma[i] = sum;
        }
        Ok(ln_gamma)
    }
}
