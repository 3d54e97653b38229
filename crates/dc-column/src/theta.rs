//! Theta correction of stage compositions (Holland's method).
//!
//! After a sweep the product component flows `d_i`, `b_i` generally miss
//! the overall component balance at the specified distillate rate. A single
//! multiplier `theta` on `b_i / d_i` restores it:
//!
//! `sum_i (F z_i - s_i) / (1 + theta b_i / d_i) = D`
//!
//! Stage liquid fractions are then scaled by `b'_i / b_i`, vapor fractions
//! by `d'_i / d_i`, and renormalized.
//!
//! The rescaled compositions are only in equilibrium when the K-values do
//! not depend on the liquid, so the correction is applied to ideal
//! packages alone. With activity coefficients, and above all across a
//! liquid split, it pulls stages off their equilibrium and the sweeps
//! oscillate.

use crate::column::StageRecord;
use crate::config::ColumnConfig;
use crate::error::ColumnResult;
use dc_core::{DcError, RootOptions, find_root};
use dc_thermo::{Composition, MixtureState};

/// Search range for `ln theta`.
const LN_THETA_BOUND: f64 = 23.0;

/// Apply the correction in place. Returns the multiplier, or `None` when
/// the package is non-ideal or the products cannot support a correction
/// (an empty product or a component absent from one of them).
pub(crate) fn theta_correction(
    config: &ColumnConfig,
    stages: &mut [StageRecord],
) -> ColumnResult<Option<f64>> {
    let n = stages.len();
    let nc = config.package.component_count();
    let d_target = config.distillate_rate();
    if d_target <= 0.0 || n < 2 || !config.package.is_ideal() {
        return Ok(None);
    }

    let product_flows = |s: &StageRecord| -> Vec<f64> {
        (0..nc)
            .map(|i| {
                s.liquid_draw * s.liquid.composition().get(i)
                    + s.vapor_draw * s.vapor.composition().get(i)
            })
            .collect()
    };
    let d = product_flows(&stages[0]);
    let b = product_flows(&stages[n - 1]);

    let mut available: Vec<f64> = config
        .feed
        .composition
        .iter()
        .map(|z| z * config.feed.flow)
        .collect();
    for stage in &stages[1..n - 1] {
        for (a, s) in available.iter_mut().zip(product_flows(stage)) {
            *a -= s;
        }
    }

    let usable = |v: &[f64]| v.iter().all(|x| x.is_finite() && *x > 0.0);
    if !(usable(&d) && usable(&b) && usable(&available)) {
        return Ok(None);
    }
    let total_available: f64 = available.iter().sum();
    if total_available <= d_target {
        return Ok(None);
    }

    let distillate_at = |ln_theta: f64| -> Vec<f64> {
        let theta = ln_theta.exp();
        available
            .iter()
            .zip(d.iter().zip(&b))
            .map(|(a, (di, bi))| a / (1.0 + theta * bi / di))
            .collect()
    };
    let balance = |ln_theta: f64| -> Result<f64, DcError> {
        Ok(distillate_at(ln_theta).iter().sum::<f64>() - d_target)
    };
    let options = RootOptions {
        x_tol: 1e-14,
        f_tol: 1e-13 * d_target,
        max_iterations: 200,
        damping: 1.0,
    };
    let Ok(root) = find_root(balance, -LN_THETA_BOUND, LN_THETA_BOUND, "theta", &options) else {
        return Ok(None);
    };

    let d_new = distillate_at(root.x);
    let vapor_ratio: Vec<f64> = d_new.iter().zip(&d).map(|(dn, di)| dn / di).collect();
    let liquid_ratio: Vec<f64> = available
        .iter()
        .zip(&d_new)
        .zip(&b)
        .map(|((a, dn), bi)| (a - dn) / bi)
        .collect();

    for stage in stages.iter_mut() {
        stage.liquid = rescale(&stage.liquid, &liquid_ratio)?;
        stage.liquid_phases = stage
            .liquid_phases
            .iter()
            .map(|p| rescale(p, &liquid_ratio))
            .collect::<ColumnResult<_>>()?;
        stage.vapor = rescale(&stage.vapor, &vapor_ratio)?;
    }
    Ok(Some(root.x.exp()))
}

fn rescale(stream: &MixtureState, ratio: &[f64]) -> ColumnResult<MixtureState> {
    let amounts = stream
        .composition()
        .iter()
        .zip(ratio)
        .map(|(x, r)| x * r)
        .collect();
    Ok(stream.with_composition(Composition::from_amounts(amounts)?)?)
}
