//! Liquid-liquid stability (tangent plane distance) and two-liquid split.

use crate::activity::ActivityModel;
use crate::composition::Composition;
use crate::error::{ThermoError, ThermoResult};
use crate::flash::rachford_rice;
use crate::jacobian::finite_difference_jacobian;
use crate::newton::{NewtonConfig, newton_solve};
use dc_core::numeric::{ln_floor, max_abs_diff};
use nalgebra::DVector;
use tracing::debug;

/// Mole fraction of the dominating component in the trial phases.
pub const X_DOMINANT: f64 = 0.99;
/// Tangent plane distances below this value indicate instability.
pub const ZERO_TPD: f64 = -1e-8;

const TRIAL_MAX_ITERATIONS: usize = 200;
const TRIAL_TOLERANCE: f64 = 1e-10;
const TRIVIAL_DISTANCE: f64 = 1e-5;
const SPLIT_MAX_ITERATIONS: usize = 500;
const SPLIT_TOLERANCE: f64 = 1e-10;
const MIN_PHASE_FRACTION: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct StabilityResult {
    pub stable: bool,
    /// Smallest modified tangent plane distance found over all trials.
    pub min_tpd: f64,
    /// Trial composition that produced `min_tpd`, if non-trivial.
    pub trial: Option<Vec<f64>>,
}

/// Two coexisting liquid phases.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidSplit {
    /// Majority phase
    pub phase1: Composition,
    pub phase2: Composition,
    /// Share of the overall liquid moles in `phase2`, in (0, 0.5].
    pub phase2_fraction: f64,
}

/// Tangent plane stability test of liquid `x` against liquid trial phases.
///
/// One trial per component, each dominated by that component, iterated by
/// successive substitution on `ln W_i = d_i - ln gamma_i(w)`.
pub fn liquid_stability(
    activity: &dyn ActivityModel,
    x: &[f64],
    t_k: f64,
) -> ThermoResult<StabilityResult> {
    let n = x.len();
    let mut result = StabilityResult {
        stable: true,
        min_tpd: 0.0,
        trial: None,
    };
    if n < 2 || activity.is_ideal() {
        return Ok(result);
    }

    let ln_gamma = activity.ln_gamma(x, t_k)?;
    let d: Vec<f64> = x
        .iter()
        .zip(&ln_gamma)
        .map(|(xi, lg)| ln_floor(*xi) + lg)
        .collect();

    for dominant in 0..n {
        let mut w = vec![(1.0 - X_DOMINANT) / (n - 1) as f64; n];
        w[dominant] = X_DOMINANT;

        let mut big_w_sum = 0.0;
        for _ in 0..TRIAL_MAX_ITERATIONS {
            let ln_gamma_w = activity.ln_gamma(&w, t_k)?;
            let big_w: Vec<f64> = d
                .iter()
                .zip(&ln_gamma_w)
                .map(|(di, lg)| (di - lg).exp())
                .collect();
            big_w_sum = big_w.iter().sum();
            if !(big_w_sum.is_finite() && big_w_sum > 0.0) {
                return Err(ThermoError::Numeric {
                    what: "stability trial phase diverged".to_string(),
                });
            }
            let next: Vec<f64> = big_w.iter().map(|v| v / big_w_sum).collect();
            let change = max_abs_diff(&next, &w);
            w = next;
            if change < TRIAL_TOLERANCE || max_abs_diff(&w, x) < TRIVIAL_DISTANCE {
                break;
            }
        }

        if max_abs_diff(&w, x) < TRIVIAL_DISTANCE {
            continue;
        }
        let tpd = 1.0 - big_w_sum;
        if tpd < result.min_tpd {
            result.min_tpd = tpd;
            result.trial = Some(w);
        }
    }

    result.stable = result.min_tpd >= ZERO_TPD;
    if result.stable {
        result.trial = None;
    }
    Ok(result)
}

/// Split liquid `x` into two liquid phases when it is unstable.
///
/// Successive substitution on the liquid-liquid distribution ratios with a
/// Rachford-Rice phase balance, then a Newton polish on `ln K`.
/// Returns `None` for stable liquids and for splits that collapse.
pub fn find_liquid_split(
    activity: &dyn ActivityModel,
    x: &[f64],
    t_k: f64,
) -> ThermoResult<Option<LiquidSplit>> {
    let stability = liquid_stability(activity, x, t_k)?;
    let Some(trial) = stability.trial else {
        return Ok(None);
    };

    let ln_gamma_x = activity.ln_gamma(x, t_k)?;
    let ln_gamma_trial = activity.ln_gamma(&trial, t_k)?;
    let mut ln_k: Vec<f64> = ln_gamma_x
        .iter()
        .zip(&ln_gamma_trial)
        .map(|(a, b)| a - b)
        .collect();

    let mut converged = false;
    for _ in 0..SPLIT_MAX_ITERATIONS {
        let next = distribution_update(activity, x, t_k, &ln_k)?;
        let Some(next) = next else {
            return Ok(None);
        };
        let change = max_abs_diff(&next, &ln_k);
        ln_k = next;
        if change < SPLIT_TOLERANCE {
            converged = true;
            break;
        }
    }

    let residual = |v: &DVector<f64>| -> ThermoResult<DVector<f64>> {
        let current: Vec<f64> = v.iter().copied().collect();
        let next = distribution_update(activity, x, t_k, &current)?.unwrap_or(current.clone());
        Ok(DVector::from_iterator(
            current.len(),
            current.iter().zip(&next).map(|(a, b)| a - b),
        ))
    };
    let jacobian = |v: &DVector<f64>| finite_difference_jacobian(v, residual, 1e-7);
    match newton_solve(
        DVector::from_vec(ln_k.clone()),
        residual,
        jacobian,
        &NewtonConfig::default(),
    ) {
        Ok(polished) if polished.converged => {
            ln_k = polished.x.iter().copied().collect();
        }
        Ok(_) | Err(_) if converged => {}
        Ok(_) => {
            return Err(ThermoError::ConvergenceFailed {
                what: "liquid-liquid split",
                iterations: SPLIT_MAX_ITERATIONS,
            });
        }
        Err(err) => {
            debug!(%err, "liquid split polish failed");
            return Err(ThermoError::ConvergenceFailed {
                what: "liquid-liquid split",
                iterations: SPLIT_MAX_ITERATIONS,
            });
        }
    }

    let k_values: Vec<f64> = ln_k.iter().map(|v| v.exp()).collect();
    let split = rachford_rice(x, &k_values)?;
    let phi = split.vapor_fraction;
    if phi < MIN_PHASE_FRACTION
        || phi > 1.0 - MIN_PHASE_FRACTION
        || max_abs_diff(&split.liquid, &split.vapor) < 1e-6
    {
        return Ok(None);
    }

    let (phase1, phase2, phase2_fraction) = if phi <= 0.5 {
        (split.liquid, split.vapor, phi)
    } else {
        (split.vapor, split.liquid, 1.0 - phi)
    };
    Ok(Some(LiquidSplit {
        phase1: Composition::from_amounts(phase1)?,
        phase2: Composition::from_amounts(phase2)?,
        phase2_fraction,
    }))
}

/// One substitution step `ln K <- ln gamma(x1) - ln gamma(x2)`; `None` when
/// the phase balance leaves the two-phase region.
fn distribution_update(
    activity: &dyn ActivityModel,
    x: &[f64],
    t_k: f64,
    ln_k: &[f64],
) -> ThermoResult<Option<Vec<f64>>> {
    let k_values: Vec<f64> = ln_k.iter().map(|v| v.exp()).collect();
    let split = rachford_rice(x, &k_values)?;
    if split.vapor_fraction <= 0.0 || split.vapor_fraction >= 1.0 {
        return Ok(None);
    }
    let ln_gamma_1 = activity.ln_gamma(&split.liquid, t_k)?;
    let ln_gamma_2 = activity.ln_gamma(&split.vapor, t_k)?;
    Ok(Some(
        ln_gamma_1
            .iter()
            .zip(&ln_gamma_2)
            .map(|(a, b)| a - b)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{IdealSolution, Nrtl};

    fn immiscible() -> Nrtl {
        Nrtl::binary(3.0, 3.0, 0.0, 0.0, 0.2).unwrap()
    }

    #[test]
    fn ideal_liquid_is_stable() {
        let r = liquid_stability(&IdealSolution, &[0.5, 0.5], 300.0).unwrap();
        assert!(r.stable);
        assert!(find_liquid_split(&IdealSolution, &[0.5, 0.5], 300.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn weakly_non_ideal_liquid_is_stable() {
        let model = Nrtl::binary(0.5, 0.5, 0.0, 0.0, 0.2).unwrap();
        let r = liquid_stability(&model, &[0.5, 0.5], 300.0).unwrap();
        assert!(r.stable, "tpd = {}", r.min_tpd);
    }

    #[test]
    fn strongly_non_ideal_liquid_splits() {
        let model = immiscible();
        let r = liquid_stability(&model, &[0.3, 0.7], 300.0).unwrap();
        assert!(!r.stable);
        assert!(r.min_tpd < ZERO_TPD);

        let split = find_liquid_split(&model, &[0.3, 0.7], 300.0)
            .unwrap()
            .expect("liquid should split");
        // symmetric parameters give mirrored phases
        assert!((split.phase1.get(0) - 0.010_888).abs() < 1e-4);
        assert!((split.phase2.get(0) - 0.989_112).abs() < 1e-4);
        assert!((split.phase2_fraction - 0.295_548).abs() < 1e-4);

        // iso-activity between the phases
        let g1 = model.ln_gamma(split.phase1.fractions(), 300.0).unwrap();
        let g2 = model.ln_gamma(split.phase2.fractions(), 300.0).unwrap();
        for i in 0..2 {
            let a1 = split.phase1.get(i).ln() + g1[i];
            let a2 = split.phase2.get(i).ln() + g2[i];
            assert!((a1 - a2).abs() < 1e-8);
        }
    }
}
