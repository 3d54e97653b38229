//! One-dimensional search strategies over the reflux ratio.
//!
//! Strategies only decide where to evaluate. Every evaluation is recorded
//! in a [`CandidateLog`] and the optimizer picks the result from the log,
//! so a strategy never has to track the best feasible point itself.

use crate::candidate::{Candidate, Evaluator};
use crate::error::OptimResult;
use crate::optimizer::RefluxBounds;
use crate::sweep::linspace;
use std::collections::BTreeMap;
use std::fmt;

/// Inverse golden ratio, `(sqrt(5) - 1) / 2`.
const INV_PHI: f64 = 0.618_033_988_749_894_8;
/// `1 - INV_PHI`.
const CGOLD: f64 = 0.381_966_011_250_105_1;

/// Every candidate evaluated during one search, keyed by reflux ratio.
#[derive(Debug, Default)]
pub struct CandidateLog {
    candidates: BTreeMap<u64, Candidate>,
}

fn key(reflux_ratio: f64) -> u64 {
    reflux_ratio.to_bits()
}

impl CandidateLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Objective at `reflux_ratio`, evaluated at most once.
    pub fn objective(&mut self, evaluator: &Evaluator<'_>, reflux_ratio: f64) -> OptimResult<f64> {
        if let Some(c) = self.candidates.get(&key(reflux_ratio)) {
            return Ok(c.objective);
        }
        let candidate = evaluator.evaluate(reflux_ratio)?;
        let objective = candidate.objective;
        self.candidates.insert(key(reflux_ratio), candidate);
        Ok(objective)
    }

    /// Evaluate the points not yet in the log in parallel; returns the
    /// objectives in the order of `ratios`.
    pub fn objectives(
        &mut self,
        evaluator: &Evaluator<'_>,
        ratios: &[f64],
    ) -> OptimResult<Vec<f64>> {
        let mut missing: Vec<f64> = ratios
            .iter()
            .copied()
            .filter(|r| !self.candidates.contains_key(&key(*r)))
            .collect();
        missing.sort_by(f64::total_cmp);
        missing.dedup_by_key(|r| key(*r));
        for candidate in evaluator.evaluate_batch(&missing)? {
            self.candidates.insert(key(candidate.reflux_ratio), candidate);
        }
        Ok(ratios
            .iter()
            .map(|r| self.candidates.get(&key(*r)).map_or(f64::INFINITY, |c| c.objective))
            .collect())
    }

    /// Candidates sorted by increasing reflux ratio.
    pub fn into_sorted(self) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self.candidates.into_values().collect();
        out.sort_by(|a, b| a.reflux_ratio.total_cmp(&b.reflux_ratio));
        out
    }
}

pub trait SearchStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn search(
        &self,
        evaluator: &Evaluator<'_>,
        bounds: RefluxBounds,
        log: &mut CandidateLog,
    ) -> OptimResult<()>;
}

/// Index of the lowest objective; the first one wins a tie.
fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Golden-section minimization of `f` on `[a, b]`.
///
/// Stops when the bracket is narrower than `tolerance * (1 + |midpoint|)`.
pub fn golden_section<F>(
    mut f: F,
    a: f64,
    b: f64,
    tolerance: f64,
    max_iterations: usize,
) -> OptimResult<f64>
where
    F: FnMut(f64) -> OptimResult<f64>,
{
    let (mut a, mut b) = (a.min(b), a.max(b));
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c)?;
    let mut fd = f(d)?;
    for _ in 0..max_iterations {
        if b - a <= tolerance * (1.0 + (0.5 * (a + b)).abs()) {
            break;
        }
        if fc <= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d)?;
        }
    }
    Ok(if fc <= fd { c } else { d })
}

/// Brent's minimization: parabolic steps with a golden-section fallback.
pub fn brent_minimize<F>(
    mut f: F,
    a: f64,
    b: f64,
    tolerance: f64,
    max_iterations: usize,
) -> OptimResult<f64>
where
    F: FnMut(f64) -> OptimResult<f64>,
{
    let (mut a, mut b) = (a.min(b), a.max(b));
    let mut x = a + CGOLD * (b - a);
    let (mut w, mut v) = (x, x);
    let mut fx = f(x)?;
    let (mut fw, mut fv) = (fx, fx);
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;

    for _ in 0..max_iterations {
        let xm = 0.5 * (a + b);
        let tol1 = tolerance * x.abs() + 1e-10;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }

        let mut golden = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            e = d;
            let acceptable = p.abs() < (0.5 * q * e_prev).abs()
                && p > q * (a - x)
                && p < q * (b - x);
            if acceptable {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
                golden = false;
            }
        }
        if golden {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u)?;
        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            (v, fv) = (w, fw);
            (w, fw) = (x, fx);
            (x, fx) = (u, fu);
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                (v, fv) = (w, fw);
                (w, fw) = (u, fu);
            } else if fu <= fv || v == x || v == w {
                (v, fv) = (u, fu);
            }
        }
    }
    Ok(x)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridScan {
    pub points: usize,
}

impl Default for GridScan {
    fn default() -> Self {
        Self { points: 17 }
    }
}

impl SearchStrategy for GridScan {
    fn name(&self) -> &'static str {
        "grid_scan"
    }

    fn search(
        &self,
        evaluator: &Evaluator<'_>,
        bounds: RefluxBounds,
        log: &mut CandidateLog,
    ) -> OptimResult<()> {
        log.objectives(evaluator, &linspace(bounds.min, bounds.max, self.points.max(2)))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldenSection {
    /// Relative bracket width at which the search stops.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for GoldenSection {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

impl SearchStrategy for GoldenSection {
    fn name(&self) -> &'static str {
        "golden_section"
    }

    fn search(
        &self,
        evaluator: &Evaluator<'_>,
        bounds: RefluxBounds,
        log: &mut CandidateLog,
    ) -> OptimResult<()> {
        golden_section(
            |r| log.objective(evaluator, r),
            bounds.min,
            bounds.max,
            self.tolerance,
            self.max_iterations,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brent {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for Brent {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

impl SearchStrategy for Brent {
    fn name(&self) -> &'static str {
        "brent"
    }

    fn search(
        &self,
        evaluator: &Evaluator<'_>,
        bounds: RefluxBounds,
        log: &mut CandidateLog,
    ) -> OptimResult<()> {
        brent_minimize(
            |r| log.objective(evaluator, r),
            bounds.min,
            bounds.max,
            self.tolerance,
            self.max_iterations,
        )?;
        Ok(())
    }
}

/// Coarse parallel grid, then golden-section refinement between the
/// neighbours of the best grid point.
///
/// The grid localizes the feasibility boundary even when the objective is
/// only unimodal piecewise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketThenRefine {
    pub grid_points: usize,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BracketThenRefine {
    fn default() -> Self {
        Self {
            grid_points: 9,
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

impl SearchStrategy for BracketThenRefine {
    fn name(&self) -> &'static str {
        "bracket_then_refine"
    }

    fn search(
        &self,
        evaluator: &Evaluator<'_>,
        bounds: RefluxBounds,
        log: &mut CandidateLog,
    ) -> OptimResult<()> {
        let grid = linspace(bounds.min, bounds.max, self.grid_points.max(3));
        let objectives = log.objectives(evaluator, &grid)?;
        let Some(best) = argmin(&objectives) else {
            return Ok(());
        };
        let lo = grid[best.saturating_sub(1)];
        let hi = grid[(best + 1).min(grid.len() - 1)];
        golden_section(
            |r| log.objective(evaluator, r),
            lo,
            hi,
            self.tolerance,
            self.max_iterations,
        )?;
        Ok(())
    }
}
