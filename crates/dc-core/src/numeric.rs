use crate::DcError;

/// Floating point type used throughout system
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, DcError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(DcError::NonFinite { what, value: v })
    }
}

/// Scale `values` in place so they sum to one.
pub fn normalize(values: &mut [Real], what: &'static str) -> Result<(), DcError> {
    let sum: Real = values.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return Err(DcError::NonFinite { what, value: sum });
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
    Ok(())
}

/// Largest element-wise absolute difference; slices must have equal length.
pub fn max_abs_diff(a: &[Real], b: &[Real]) -> Real {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, Real::max)
}

/// Natural log that maps zero to a large negative finite number.
#[inline]
pub fn ln_floor(v: Real) -> Real {
    v.max(Real::MIN_POSITIVE).ln()
}
