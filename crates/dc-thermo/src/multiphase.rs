//! Vapor-liquid-liquid flash at fixed temperature and pressure.
//!
//! Each phase is described by fugacity coefficients against the ideal gas,
//! `ln phi_i = ln gamma_i(x) + ln(P_sat,i / P)` for a liquid and zero for
//! the vapor. For fixed coefficients the phase amounts minimize
//!
//! `Q(beta) = sum_j beta_j - sum_i z_i ln E_i`, `E_i = sum_j beta_j / phi_ij`
//!
//! over `beta >= 0` (Michelsen), and the compositions follow as
//! `x_ij = z_i / (E_i phi_ij)`. Absent phases keep the composition they
//! would have at incipience. Successive substitution then updates the
//! liquid coefficients from the new compositions.
//!
//! A liquid-liquid stability test on the converged liquid decides whether
//! a second liquid phase is worth trying; among candidate phase sets the
//! one with the lowest Gibbs energy wins.

use crate::error::{ThermoError, ThermoResult};
use crate::flash::rachford_rice;
use crate::package::PropertyPackage;
use crate::stability::{X_DOMINANT, liquid_stability};
use dc_core::numeric::{ln_floor, max_abs_diff};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

const PHASE_MAX_ITERATIONS: usize = 200;
const PHASE_TOLERANCE: f64 = 1e-12;
const AMOUNT_MAX_ITERATIONS: usize = 50;
const AMOUNT_TOLERANCE: f64 = 1e-13;
/// Liquids closer than this are one phase.
const DISTINCT_LIQUIDS: f64 = 1e-6;

/// One phase of a multiphase flash.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAmount {
    /// Moles of this phase per mole of feed; zero for an absent phase.
    pub amount: f64,
    /// Equilibrium composition; for an absent phase, the incipient one.
    pub composition: Vec<f64>,
}

/// Result of [`multiphase_flash`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEquilibrium {
    /// One entry, or two when the liquid splits (majority phase first).
    pub liquids: Vec<PhaseAmount>,
    pub vapor: PhaseAmount,
    /// Successive substitution steps summed over all phase sets tried.
    pub iterations: usize,
    /// `false` when the winning phase set stopped at the iteration cap.
    pub converged: bool,
}

impl PhaseEquilibrium {
    pub fn liquid_amount(&self) -> f64 {
        self.liquids.iter().map(|p| p.amount).sum()
    }

    /// Mole-weighted composition of all liquid present; the incipient
    /// liquid when none is.
    pub fn overall_liquid(&self) -> Vec<f64> {
        let total = self.liquid_amount();
        if total <= 0.0 {
            return self.liquids[0].composition.clone();
        }
        let n = self.vapor.composition.len();
        (0..n)
            .map(|i| {
                self.liquids
                    .iter()
                    .map(|p| p.amount * p.composition[i])
                    .sum::<f64>()
                    / total
            })
            .collect()
    }
}

/// Phase set on the way to convergence: liquids first, vapor last.
#[derive(Debug)]
struct PhaseSet {
    ln_phi: Vec<Vec<f64>>,
    amounts: Vec<f64>,
    compositions: Vec<Vec<f64>>,
    iterations: usize,
    converged: bool,
}

impl PhaseSet {
    fn has_liquid(&self) -> bool {
        self.amounts[..self.amounts.len() - 1].iter().any(|a| *a > 0.0)
    }

    /// `sum_j beta_j sum_i x_ij (ln x_ij + ln phi_ij)`
    fn gibbs(&self) -> f64 {
        self.amounts
            .iter()
            .zip(&self.compositions)
            .zip(&self.ln_phi)
            .filter(|((a, _), _)| **a > 0.0)
            .map(|((a, x), ln_phi)| {
                a * x
                    .iter()
                    .zip(ln_phi)
                    .map(|(xi, lp)| xi * (ln_floor(*xi) + lp))
                    .sum::<f64>()
            })
            .sum()
    }
}

/// Flash `z` at `t_k` and `pressure_pa` into vapor and up to two liquids.
///
/// `start` seeds the first liquid; the feed is used otherwise. The
/// result may be reported unconverged; it is never an error to hit the
/// iteration cap.
pub fn multiphase_flash(
    package: &PropertyPackage,
    z: &[f64],
    t_k: f64,
    pressure_pa: f64,
    start: Option<&[f64]>,
) -> ThermoResult<PhaseEquilibrium> {
    let n = z.len();
    let ln_p_ratio: Vec<f64> = package
        .table()
        .vapor_pressures(t_k)?
        .iter()
        .map(|ps| (ps / pressure_pa).ln())
        .collect();
    let converge = |liquids: Vec<Vec<f64>>| converge_phases(package, &ln_p_ratio, z, t_k, liquids);

    let mut best = converge(vec![start.unwrap_or(z).to_vec()])?;
    let mut iterations = best.iterations;

    if !best.has_liquid() && n > 1 {
        // a superheated first answer may hide a liquid reached from a
        // different start
        for dominant in 0..n {
            let candidate = converge(vec![dominated(n, dominant)])?;
            iterations += candidate.iterations;
            if candidate.gibbs() < best.gibbs() {
                best = candidate;
            }
        }
    }

    if best.has_liquid() && !package.is_ideal() {
        let stability = liquid_stability(package.activity(), &best.compositions[0], t_k)?;
        if let Some(trial) = stability.trial {
            let candidate = converge(vec![best.compositions[0].clone(), trial])?;
            iterations += candidate.iterations;
            if candidate.gibbs() < best.gibbs() {
                best = candidate;
            }
        }
    }

    trace!(
        t_k,
        phases = best.amounts.iter().filter(|a| **a > 0.0).count(),
        iterations,
        converged = best.converged,
        "multiphase flash"
    );
    Ok(summarize(best, iterations))
}

fn dominated(n: usize, dominant: usize) -> Vec<f64> {
    let mut w = vec![(1.0 - X_DOMINANT) / (n - 1) as f64; n];
    w[dominant] = X_DOMINANT;
    w
}

fn ln_phi_liquid(
    package: &PropertyPackage,
    ln_p_ratio: &[f64],
    x: &[f64],
    t_k: f64,
) -> ThermoResult<Vec<f64>> {
    Ok(package
        .activity()
        .ln_gamma(x, t_k)?
        .iter()
        .zip(ln_p_ratio)
        .map(|(lg, lr)| lg + lr)
        .collect())
}

fn converge_phases(
    package: &PropertyPackage,
    ln_p_ratio: &[f64],
    z: &[f64],
    t_k: f64,
    liquids: Vec<Vec<f64>>,
) -> ThermoResult<PhaseSet> {
    let n = z.len();
    let coefficients = |liquids: &[Vec<f64>]| -> ThermoResult<Vec<Vec<f64>>> {
        let mut ln_phi = liquids
            .iter()
            .map(|x| ln_phi_liquid(package, ln_p_ratio, x, t_k))
            .collect::<ThermoResult<Vec<_>>>()?;
        ln_phi.push(vec![0.0; n]);
        Ok(ln_phi)
    };

    let mut ln_phi = coefficients(&liquids)?;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < PHASE_MAX_ITERATIONS {
        iterations += 1;
        let (_, compositions) = phase_amounts(z, &ln_phi)?;
        let next = coefficients(&compositions[..compositions.len() - 1])?;
        let change = next
            .iter()
            .zip(&ln_phi)
            .map(|(a, b)| max_abs_diff(a, b))
            .fold(0.0, f64::max);
        ln_phi = next;
        if package.is_ideal() || change < PHASE_TOLERANCE {
            converged = true;
            break;
        }
    }

    let (amounts, compositions) = phase_amounts(z, &ln_phi)?;
    Ok(PhaseSet {
        ln_phi,
        amounts,
        compositions,
        iterations,
        converged,
    })
}

/// Phase amounts minimizing `Q` for fixed coefficients, with the phase
/// compositions they imply. Every single phase and every pair is tried;
/// with three or more components an all-phase interior point is tried too.
fn phase_amounts(z: &[f64], ln_phi: &[Vec<f64>]) -> ThermoResult<(Vec<f64>, Vec<Vec<f64>>)> {
    let m = ln_phi.len();
    let inv: Vec<Vec<f64>> = ln_phi
        .iter()
        .map(|phase| phase.iter().map(|v| (-v).exp()).collect())
        .collect();
    if inv.iter().flatten().any(|v| !(v.is_finite() && *v > 0.0)) {
        return Err(ThermoError::Numeric {
            what: "fugacity coefficients out of range in multiphase flash".to_string(),
        });
    }

    let mut best: Option<(f64, Vec<f64>)> = None;
    let mut consider = |amounts: Vec<f64>| {
        let q = objective(z, &inv, &amounts);
        if q.is_finite() && best.as_ref().is_none_or(|(b, _)| q < *b) {
            best = Some((q, amounts));
        }
    };

    for j in 0..m {
        let mut amounts = vec![0.0; m];
        amounts[j] = 1.0;
        consider(amounts);
    }
    for j in 0..m {
        for k in j + 1..m {
            let ratios: Vec<f64> = inv[k].iter().zip(&inv[j]).map(|(a, b)| a / b).collect();
            let split = rachford_rice(z, &ratios)?;
            if split.vapor_fraction > 0.0 && split.vapor_fraction < 1.0 {
                let mut amounts = vec![0.0; m];
                amounts[j] = 1.0 - split.vapor_fraction;
                amounts[k] = split.vapor_fraction;
                consider(amounts);
            }
        }
    }
    if m >= 3 && z.len() >= 3 {
        if let Some(amounts) = interior_amounts(z, &inv) {
            consider(amounts);
        }
    }

    let Some((_, amounts)) = best else {
        return Err(ThermoError::Numeric {
            what: "no admissible phase amounts in multiphase flash".to_string(),
        });
    };
    let e = phase_sums(&inv, &amounts);
    let compositions = inv
        .iter()
        .map(|phase| {
            let raw: Vec<f64> = z
                .iter()
                .zip(phase)
                .zip(&e)
                .map(|((zi, v), ei)| zi * v / ei)
                .collect();
            let sum: f64 = raw.iter().sum();
            raw.iter().map(|v| v / sum).collect()
        })
        .collect();
    Ok((amounts, compositions))
}

fn phase_sums(inv: &[Vec<f64>], amounts: &[f64]) -> Vec<f64> {
    (0..inv[0].len())
        .map(|i| inv.iter().zip(amounts).map(|(phase, a)| a * phase[i]).sum())
        .collect()
}

fn objective(z: &[f64], inv: &[Vec<f64>], amounts: &[f64]) -> f64 {
    let e = phase_sums(inv, amounts);
    if e.iter().zip(z).any(|(ei, zi)| *zi > 0.0 && *ei <= 0.0) {
        return f64::INFINITY;
    }
    let total: f64 = amounts.iter().sum();
    total
        - z.iter()
            .zip(&e)
            .filter(|(zi, _)| **zi > 0.0)
            .map(|(zi, ei)| zi * ei.ln())
            .sum::<f64>()
}

/// Newton search for a stationary point of `Q` with every phase present.
/// `None` when a phase amount is driven to zero.
fn interior_amounts(z: &[f64], inv: &[Vec<f64>]) -> Option<Vec<f64>> {
    let m = inv.len();
    let mut amounts = DVector::from_element(m, 1.0 / m as f64);
    for _ in 0..AMOUNT_MAX_ITERATIONS {
        let current: Vec<f64> = amounts.iter().copied().collect();
        let e = phase_sums(inv, &current);
        let gradient = DVector::from_fn(m, |j, _| {
            1.0 - (0..z.len()).map(|i| z[i] * inv[j][i] / e[i]).sum::<f64>()
        });
        if gradient.amax() < AMOUNT_TOLERANCE {
            return Some(current);
        }
        let hessian = DMatrix::from_fn(m, m, |j, k| {
            (0..z.len())
                .map(|i| z[i] * inv[j][i] * inv[k][i] / (e[i] * e[i]))
                .sum()
        });
        let step = hessian.lu().solve(&(-&gradient))?;
        let q0 = objective(z, inv, &current);
        let mut scale = 1.0;
        loop {
            let trial = &amounts + &step * scale;
            let trial_vec: Vec<f64> = trial.iter().copied().collect();
            if trial.iter().all(|a| *a > 0.0) && objective(z, inv, &trial_vec) <= q0 {
                amounts = trial;
                break;
            }
            scale *= 0.5;
            if scale < 1e-10 {
                return None;
            }
        }
    }
    None
}

fn summarize(set: PhaseSet, iterations: usize) -> PhaseEquilibrium {
    let m = set.amounts.len();
    let total: f64 = set.amounts.iter().sum();
    let amount = |a: f64| if total > 0.0 { a / total } else { a };

    let mut liquids: Vec<PhaseAmount> = set.amounts[..m - 1]
        .iter()
        .zip(&set.compositions)
        .filter(|(a, _)| **a > 0.0)
        .map(|(a, x)| PhaseAmount {
            amount: amount(*a),
            composition: x.clone(),
        })
        .collect();
    liquids.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    if liquids.len() == 2
        && max_abs_diff(&liquids[0].composition, &liquids[1].composition) < DISTINCT_LIQUIDS
    {
        let merged = liquids[0].amount + liquids[1].amount;
        liquids.truncate(1);
        liquids[0].amount = merged;
    }
    if liquids.is_empty() {
        liquids.push(PhaseAmount {
            amount: 0.0,
            composition: set.compositions[0].clone(),
        });
    }

    PhaseEquilibrium {
        liquids,
        vapor: PhaseAmount {
            amount: amount(set.amounts[m - 1]),
            composition: set.compositions[m - 1].clone(),
        },
        iterations,
        converged: set.converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Nrtl;
    use crate::component::{Component, LiquidDensity, VaporPressure};
    use crate::table::PropertyTable;
    use std::sync::Arc;

    fn water_organic(a: f64) -> PropertyPackage {
        let comp = |name: &str, p_ref: f64, cp_liquid: f64, cp_vapor: f64| Component {
            name: name.into(),
            molecular_weight: 50.0,
            heat_of_vaporization: 32_000.0,
            vapor_pressure: VaporPressure::ClausiusClapeyron {
                p_ref_pa: p_ref,
                t_ref_k: 350.0,
            },
            t_min_k: 250.0,
            t_max_k: 500.0,
            liquid_density: LiquidDensity::Constant { kg_per_m3: 900.0 },
            cp_liquid,
            cp_vapor,
        };
        let table = Arc::new(
            PropertyTable::new(vec![
                comp("water", 80_000.0, 75.0, 34.0),
                comp("organic", 120_000.0, 200.0, 150.0),
            ])
            .unwrap(),
        );
        PropertyPackage::new(table, Arc::new(Nrtl::binary(a, a, 0.0, 0.0, 0.2).unwrap())).unwrap()
    }

    fn recombined(eq: &PhaseEquilibrium, i: usize) -> f64 {
        eq.liquids
            .iter()
            .chain(std::iter::once(&eq.vapor))
            .map(|p| p.amount * p.composition[i])
            .sum()
    }

    #[test]
    fn cold_immiscible_feed_splits_into_two_liquids() {
        let package = water_organic(3.0);
        let z = [0.3, 0.7];
        let eq = multiphase_flash(&package, &z, 325.0, 101_325.0, None).unwrap();
        assert!(eq.converged);
        assert_eq!(eq.liquids.len(), 2);
        assert_eq!(eq.vapor.amount, 0.0);

        let (major, minor) = (&eq.liquids[0], &eq.liquids[1]);
        assert!((major.composition[0] - 0.010_888).abs() < 1e-4);
        assert!((minor.composition[0] - 0.989_112).abs() < 1e-4);
        assert!((minor.amount - 0.2955).abs() < 1e-3);
        for (i, zi) in z.iter().enumerate() {
            assert!((recombined(&eq, i) - zi).abs() < 1e-10);
        }
    }

    #[test]
    fn above_three_phase_temperature_one_liquid_boils() {
        let package = water_organic(3.0);
        let z = [0.3, 0.7];
        let eq = multiphase_flash(&package, &z, 331.0, 101_325.0, None).unwrap();
        assert!(eq.converged);
        assert_eq!(eq.liquids.len(), 1);
        assert!((eq.vapor.amount - 0.793_064).abs() < 1e-4);
        assert!((eq.liquids[0].composition[0] - 0.0097).abs() < 1e-4);
        for (i, zi) in z.iter().enumerate() {
            assert!((recombined(&eq, i) - zi).abs() < 1e-10);
        }
    }

    #[test]
    fn miscible_liquid_never_reports_a_second_phase() {
        let package = water_organic(0.5);
        for t_k in [320.0, 335.0, 345.0, 360.0] {
            let eq = multiphase_flash(&package, &[0.3, 0.7], t_k, 101_325.0, None).unwrap();
            assert_eq!(eq.liquids.len(), 1, "at {t_k} K");
            assert!(eq.converged);
        }
    }
}
