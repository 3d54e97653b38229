//! Bracketed scalar root finding (Illinois variant of regula falsi).
//!
//! Used by every 1-D temperature and phase-fraction search in the workspace.
//! The bracket `[lo, hi]` must change sign; the iterate never leaves it.

use crate::numeric::ensure_finite;
use crate::DcError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootOptions {
    /// Bracket width at which the search stops, relative to `1 + |x|`
    pub x_tol: f64,
    /// Absolute residual accepted as a root
    pub f_tol: f64,
    /// Maximum function evaluations after the two bracket ends
    pub max_iterations: usize,
    /// Weight of the secant step. 1.0 is plain Illinois; smaller values
    /// blend the update toward bisection.
    pub damping: f64,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            x_tol: 1e-12,
            f_tol: 1e-12,
            max_iterations: 100,
            damping: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootResult {
    pub x: f64,
    pub fx: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Find `x` in `[lo, hi]` with `f(x) = 0`.
///
/// Errors from `f` propagate unchanged. An unbracketed interval or a
/// non-finite evaluation is reported as [`DcError`] converted into `E`.
/// Running out of iterations is not an error: the best point seen is
/// returned with `converged = false`.
pub fn find_root<F, E>(
    mut f: F,
    lo: f64,
    hi: f64,
    what: &'static str,
    options: &RootOptions,
) -> Result<RootResult, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<DcError>,
{
    if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
        return Err(DcError::InvalidArg { what }.into());
    }

    let (mut a, mut b) = (lo, hi);
    let mut fa = ensure_finite(f(a)?, what)?;
    let mut fb = ensure_finite(f(b)?, what)?;

    if fa.abs() <= options.f_tol {
        return Ok(RootResult {
            x: a,
            fx: fa,
            iterations: 0,
            converged: true,
        });
    }
    if fb.abs() <= options.f_tol {
        return Ok(RootResult {
            x: b,
            fx: fb,
            iterations: 0,
            converged: true,
        });
    }
    if fa.signum() == fb.signum() {
        return Err(DcError::NotBracketed {
            what,
            lo,
            hi,
            f_lo: fa,
            f_hi: fb,
        }
        .into());
    }

    let weight = options.damping.clamp(0.0, 1.0);
    let mut best = if fa.abs() < fb.abs() { (a, fa) } else { (b, fb) };
    // -1: last update moved `b`, +1: last update moved `a`
    let mut side = 0_i8;

    for iter in 1..=options.max_iterations {
        let mid = 0.5 * (a + b);
        let secant = (a * fb - b * fa) / (fb - fa);
        let mut c = weight * secant + (1.0 - weight) * mid;
        if !(c > a && c < b) {
            c = mid;
        }

        let fc = ensure_finite(f(c)?, what)?;
        if fc.abs() < best.1.abs() {
            best = (c, fc);
        }
        if fc.abs() <= options.f_tol {
            return Ok(RootResult {
                x: c,
                fx: fc,
                iterations: iter,
                converged: true,
            });
        }

        if fc.signum() == fb.signum() {
            b = c;
            fb = fc;
            if side == -1 {
                fa *= 0.5;
            }
            side = -1;
        } else {
            a = c;
            fa = fc;
            if side == 1 {
                fb *= 0.5;
            }
            side = 1;
        }

        if b - a <= options.x_tol * (1.0 + b.abs()) {
            return Ok(RootResult {
                x: best.0,
                fx: best.1,
                iterations: iter,
                converged: true,
            });
        }
    }

    Ok(RootResult {
        x: best.0,
        fx: best.1,
        iterations: options.max_iterations,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_minus_two(x: f64) -> Result<f64, DcError> {
        Ok(x * x - 2.0)
    }

    #[test]
    fn finds_sqrt_two() {
        let r = find_root(square_minus_two, 0.0, 2.0, "sqrt", &RootOptions::default()).unwrap();
        assert!(r.converged);
        assert!((r.x - 2.0_f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn damped_update_still_converges() {
        let options = RootOptions {
            damping: 0.5,
            ..RootOptions::default()
        };
        let r = find_root(square_minus_two, 0.0, 2.0, "sqrt", &options).unwrap();
        assert!(r.converged);
        assert!((r.x - 2.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn steep_exponential_converges() {
        let f = |x: f64| -> Result<f64, DcError> { Ok((20.0 * x).exp() - 1.0e4) };
        let r = find_root(f, 0.0, 1.0, "exp", &RootOptions::default()).unwrap();
        assert!(r.converged);
        assert!((r.x - 1.0e4_f64.ln() / 20.0).abs() < 1e-9);
    }

    #[test]
    fn unbracketed_interval_is_rejected() {
        let err = find_root(square_minus_two, 2.0, 3.0, "sqrt", &RootOptions::default())
            .unwrap_err();
        assert!(matches!(err, DcError::NotBracketed { .. }));
    }

    #[test]
    fn iteration_cap_reports_best_estimate() {
        let options = RootOptions {
            max_iterations: 2,
            f_tol: 0.0,
            x_tol: 0.0,
            ..RootOptions::default()
        };
        let r = find_root(square_minus_two, 0.0, 2.0, "sqrt", &options).unwrap();
        assert!(!r.converged);
        assert_eq!(r.iterations, 2);
        assert!(r.fx.abs() < 2.0);
    }

    #[test]
    fn caller_errors_propagate() {
        let f = |_x: f64| -> Result<f64, DcError> { Err(DcError::InvalidArg { what: "failing" }) };
        let err = find_root(f, 0.0, 1.0, "failing", &RootOptions::default()).unwrap_err();
        assert_eq!(err, DcError::InvalidArg { what: "failing" });
    }

    proptest::proptest! {
        #[test]
        fn root_stays_inside_bracket(root in -9.0f64..9.0) {
            let f = |x: f64| -> Result<f64, DcError> {
                let d = x - root;
                Ok(d * d * d + d)
            };
            let r = find_root(f, -10.0, 10.0, "cubic", &RootOptions::default()).unwrap();
            proptest::prop_assert!(r.converged);
            proptest::prop_assert!((-10.0..=10.0).contains(&r.x));
            proptest::prop_assert!((r.x - root).abs() < 1e-6);
        }
    }
}
