//! Damped Newton iteration for small dense systems.

use crate::error::{ThermoError, ThermoResult};
use nalgebra::{DMatrix, DVector};

/// Newton solver configuration.
#[derive(Debug, Clone)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm
    pub rel_tol: f64,
    /// Largest allowed change of any unknown per iteration
    pub max_step: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-12,
            rel_tol: 1e-12,
            max_step: 1.0,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

/// Newton iteration result.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    /// Solution vector
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Converged flag
    pub converged: bool,
}

/// Newton solver with step limiting and backtracking line search.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> ThermoResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> ThermoResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> ThermoResult<DMatrix<f64>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
                converged: true,
            });
        }

        let jac = jacobian_fn(&x)?;

        // Solve J * dx = -r
        let mut dx = jac.lu().solve(&(-&r)).ok_or_else(|| ThermoError::Numeric {
            what: "Jacobian solve failed".to_string(),
        })?;
        let largest = dx.amax();
        if largest > config.max_step {
            dx *= config.max_step / largest;
        }

        let mut alpha = 1.0;
        let mut x_new = &x + alpha * &dx;
        let mut r_new = residual_fn(&x_new)?;
        let mut r_new_norm = r_new.norm();

        for _ in 0..config.max_line_search_iters {
            if r_new_norm.is_finite() && r_new_norm < r_norm {
                break;
            }
            alpha *= config.line_search_beta;
            x_new = &x + alpha * &dx;
            r_new = residual_fn(&x_new)?;
            r_new_norm = r_new.norm();
        }

        x = x_new;
        r = r_new;
        r_norm = r_new_norm;

        if alpha < 1e-10 {
            return Err(ThermoError::Numeric {
                what: format!("Newton line search stagnated at iteration {iter}"),
            });
        }
    }

    if r_norm < config.abs_tol {
        return Ok(NewtonResult {
            x,
            residual_norm: r_norm,
            iterations: config.max_iterations,
            converged: true,
        });
    }

    Err(ThermoError::ConvergenceFailed {
        what: "Newton iteration",
        iterations: config.max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::finite_difference_jacobian;

    #[test]
    fn simple_quadratic() {
        // Solve x^2 - 4 = 0 from x = 3
        let residual = |x: &DVector<f64>| -> ThermoResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        };
        let jacobian = |x: &DVector<f64>| -> ThermoResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let x0 = DVector::from_element(1, 3.0);
        let result = newton_solve(x0, residual, jacobian, &NewtonConfig::default()).unwrap();

        assert!(result.converged);
        assert!((result.x[0] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn coupled_system_with_numeric_jacobian() {
        // x + y = 3, x * y = 2  ->  (1, 2) from (0.5, 2.5)
        let residual = |v: &DVector<f64>| -> ThermoResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![v[0] + v[1] - 3.0, v[0] * v[1] - 2.0]))
        };
        let jacobian = |v: &DVector<f64>| finite_difference_jacobian(v, residual, 1e-7);
        let config = NewtonConfig {
            abs_tol: 1e-10,
            ..NewtonConfig::default()
        };

        let result =
            newton_solve(DVector::from_vec(vec![0.5, 2.5]), residual, jacobian, &config).unwrap();
        assert!(result.converged);
        assert!((result.x[0] - 1.0).abs() < 1e-8);
        assert!((result.x[1] - 2.0).abs() < 1e-8);
    }
}
