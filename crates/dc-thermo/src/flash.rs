//! Rachford-Rice phase split and isothermal flash.
//!
//! The vapor-liquid-liquid machinery lives in [`crate::multiphase`]; this
//! module wraps it into the K-value view the column solver works with.

use crate::composition::Composition;
use crate::equilibrium::{
    EquilibriumResult, checked_vapor_pressures, equilibrate, equilibrate_single_liquid, finish,
};
use crate::error::{ThermoError, ThermoResult};
use crate::multiphase::multiphase_flash;
use crate::package::PropertyPackage;
use crate::stability::LiquidSplit;
use dc_core::numeric::max_abs_diff;
use dc_core::units::{Pressure, Temperature, k};

const RR_MAX_ITERATIONS: usize = 100;
const RR_TOLERANCE: f64 = 1e-14;
const FLASH_MAX_ITERATIONS: usize = 200;
const FLASH_TOLERANCE: f64 = 1e-11;

/// Phase split of a feed `z` for fixed distribution ratios `K`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashSplit {
    /// Fraction of the feed leaving in the "vapor" (second) phase, in [0, 1].
    pub vapor_fraction: f64,
    pub liquid: Vec<f64>,
    pub vapor: Vec<f64>,
}

/// Rachford-Rice function `sum z_i (K_i - 1) / (1 + beta (K_i - 1))`.
pub fn rachford_rice_residual(z: &[f64], k_values: &[f64], beta: f64) -> f64 {
    z.iter()
        .zip(k_values)
        .map(|(zi, ki)| zi * (ki - 1.0) / (1.0 + beta * (ki - 1.0)))
        .sum()
}

/// Phase compositions at a given split, normalized.
pub fn split_at(z: &[f64], k_values: &[f64], beta: f64) -> (Vec<f64>, Vec<f64>) {
    let mut x: Vec<f64> = z
        .iter()
        .zip(k_values)
        .map(|(zi, ki)| zi / (1.0 + beta * (ki - 1.0)))
        .collect();
    let mut y: Vec<f64> = x.iter().zip(k_values).map(|(xi, ki)| ki * xi).collect();
    let sx: f64 = x.iter().sum();
    let sy: f64 = y.iter().sum();
    if sx > 0.0 {
        x.iter_mut().for_each(|v| *v /= sx);
    }
    if sy > 0.0 {
        y.iter_mut().for_each(|v| *v /= sy);
    }
    (x, y)
}

/// Solve Rachford-Rice for the vapor fraction, clamped to the physical
/// interval. Subcooled feeds return 0, superheated feeds return 1.
///
/// Newton steps are safeguarded by bisection inside the shrinking bracket.
pub fn rachford_rice(z: &[f64], k_values: &[f64]) -> ThermoResult<FlashSplit> {
    if z.len() != k_values.len() {
        return Err(ThermoError::invalid_input(
            "feed and K-value vectors differ in length",
        ));
    }
    if k_values.iter().any(|ki| !(ki.is_finite() && *ki > 0.0)) {
        return Err(ThermoError::Numeric {
            what: "K-values must be positive and finite".to_string(),
        });
    }

    if rachford_rice_residual(z, k_values, 0.0) <= 0.0 {
        let (x, y) = split_at(z, k_values, 0.0);
        return Ok(FlashSplit {
            vapor_fraction: 0.0,
            liquid: x,
            vapor: y,
        });
    }
    if rachford_rice_residual(z, k_values, 1.0) >= 0.0 {
        let (x, y) = split_at(z, k_values, 1.0);
        return Ok(FlashSplit {
            vapor_fraction: 1.0,
            liquid: x,
            vapor: y,
        });
    }

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut beta = 0.5;
    for _ in 0..RR_MAX_ITERATIONS {
        let mut f = 0.0;
        let mut df = 0.0;
        for (zi, ki) in z.iter().zip(k_values) {
            let d = 1.0 + beta * (ki - 1.0);
            f += zi * (ki - 1.0) / d;
            df -= zi * (ki - 1.0) * (ki - 1.0) / (d * d);
        }
        // f decreases with beta
        if f > 0.0 {
            lo = beta;
        } else {
            hi = beta;
        }
        let mut next = if df < 0.0 { beta - f / df } else { 0.5 * (lo + hi) };
        if !(next > lo && next < hi) {
            next = 0.5 * (lo + hi);
        }
        let step = (next - beta).abs();
        beta = next;
        if step < RR_TOLERANCE || hi - lo < RR_TOLERANCE {
            break;
        }
    }

    let (x, y) = split_at(z, k_values, beta);
    Ok(FlashSplit {
        vapor_fraction: beta,
        liquid: x,
        vapor: y,
    })
}

/// Isothermal vapor-liquid flash.
#[derive(Debug, Clone)]
pub struct FlashOutcome {
    pub vapor_fraction: f64,
    /// Overall liquid; both phases combined when the liquid splits.
    pub liquid: Composition,
    pub vapor: Composition,
    /// K-values against the overall liquid, with the liquid split if any.
    pub equilibrium: EquilibriumResult,
    pub iterations: usize,
    pub converged: bool,
}

/// Flash feed `z` at fixed `(T, P)`.
///
/// For an ideal package one Rachford-Rice solve suffices. Otherwise the
/// multiphase flash decides between vapor, one liquid and two liquids.
pub fn isothermal_flash(
    package: &PropertyPackage,
    z: &Composition,
    temperature: Temperature,
    pressure: Pressure,
) -> ThermoResult<FlashOutcome> {
    isothermal_flash_from(package, z, temperature, pressure, None)
}

/// [`isothermal_flash`] seeded with a liquid composition, typically the
/// liquid of a nearby previous flash.
pub fn isothermal_flash_from(
    package: &PropertyPackage,
    z: &Composition,
    temperature: Temperature,
    pressure: Pressure,
    start: Option<&Composition>,
) -> ThermoResult<FlashOutcome> {
    if package.is_ideal() {
        let equilibrium = equilibrate(package, z, temperature, pressure)?;
        let split = rachford_rice(z.fractions(), &equilibrium.k_values)?;
        return Ok(FlashOutcome {
            vapor_fraction: split.vapor_fraction,
            liquid: Composition::from_amounts(split.liquid)?,
            vapor: Composition::from_amounts(split.vapor)?,
            equilibrium,
            iterations: 1,
            converged: true,
        });
    }

    let psat = checked_vapor_pressures(package, z, temperature, pressure)?;
    let phases = multiphase_flash(
        package,
        z.fractions(),
        temperature.value,
        pressure.value,
        start.map(|c| c.fractions()),
    )?;

    let x = phases.overall_liquid();
    let y = &phases.vapor.composition;
    let gamma: Vec<f64> = package
        .activity()
        .ln_gamma(&x, temperature.value)?
        .iter()
        .map(|v| v.exp())
        .collect();
    let p = pressure.value;
    let k_values = (0..x.len())
        .map(|i| {
            let k = y[i] / x[i];
            if x[i] > 0.0 && k.is_finite() && k > 0.0 {
                k
            } else {
                gamma[i] * psat[i] / p
            }
        })
        .collect();
    let liquid_split = match phases.liquids.as_slice() {
        [major, minor] => Some(LiquidSplit {
            phase1: Composition::from_amounts(major.composition.clone())?,
            phase2: Composition::from_amounts(minor.composition.clone())?,
            phase2_fraction: minor.amount / (major.amount + minor.amount),
        }),
        _ => None,
    };
    let equilibrium = finish(package, k_values, temperature, pressure, gamma, liquid_split)?;

    Ok(FlashOutcome {
        vapor_fraction: phases.vapor.amount.clamp(0.0, 1.0),
        liquid: Composition::from_amounts(x)?,
        vapor: Composition::from_amounts(y.clone())?,
        equilibrium,
        iterations: phases.iterations,
        converged: phases.converged,
    })
}

/// Phase compositions and Rachford-Rice residual at a trial temperature
/// with the vapor fraction held fixed.
#[derive(Debug, Clone)]
pub struct FixedFractionFlash {
    pub residual: f64,
    pub liquid: Vec<f64>,
    pub vapor: Vec<f64>,
    pub equilibrium: EquilibriumResult,
    /// `false` when the liquid iteration stopped at its cap.
    pub converged: bool,
}

/// Temperature searches at fixed `beta` call this at each trial point.
/// Non-ideal packages iterate the liquid composition to self-consistency,
/// treating it as one liquid phase.
pub fn fixed_fraction_flash(
    package: &PropertyPackage,
    z: &Composition,
    t_k: f64,
    pressure: Pressure,
    beta: f64,
) -> ThermoResult<FixedFractionFlash> {
    let temperature = k(t_k);
    let mut liquid = z.clone();
    let mut iterations = 0;
    loop {
        iterations += 1;
        let equilibrium = equilibrate_single_liquid(package, &liquid, temperature, pressure)?;
        let (x, y) = split_at(z.fractions(), &equilibrium.k_values, beta);
        let change = max_abs_diff(&x, liquid.fractions());
        let converged = package.is_ideal() || change < FLASH_TOLERANCE;
        if converged || iterations >= FLASH_MAX_ITERATIONS {
            let residual = rachford_rice_residual(z.fractions(), &equilibrium.k_values, beta);
            return Ok(FixedFractionFlash {
                residual,
                liquid: x,
                vapor: y,
                equilibrium,
                converged,
            });
        }
        liquid = Composition::from_amounts(x)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityModel;
    use crate::component::{Component, LiquidDensity, VaporPressure};
    use crate::table::PropertyTable;
    use dc_core::units::pa;
    use std::sync::Arc;

    /// `ln gamma_0 = s (x_0 - x_1)`: the liquid pushes its own K-values
    /// further the richer it gets, so substitution swings between extremes.
    #[derive(Debug)]
    struct SelfReinforcing(f64);

    impl ActivityModel for SelfReinforcing {
        fn name(&self) -> &'static str {
            "self-reinforcing"
        }

        fn component_count(&self) -> Option<usize> {
            Some(2)
        }

        fn ln_gamma(&self, x: &[f64], _t_k: f64) -> ThermoResult<Vec<f64>> {
            Ok(vec![self.0 * (x[0] - x[1]), self.0 * (x[1] - x[0])])
        }
    }

    fn two_component_table() -> Arc<PropertyTable> {
        let comp = |name: &str, p_ref: f64| Component {
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
            cp_liquid: 100.0,
            cp_vapor: 60.0,
        };
        Arc::new(PropertyTable::new(vec![comp("a", 80_000.0), comp("b", 120_000.0)]).unwrap())
    }

    #[test]
    fn two_phase_split_satisfies_balance() {
        let z = [0.5, 0.3, 0.2];
        let k_values = [2.0, 0.9, 0.3];
        let split = rachford_rice(&z, &k_values).unwrap();
        assert!(split.vapor_fraction > 0.0 && split.vapor_fraction < 1.0);
        assert!(rachford_rice_residual(&z, &k_values, split.vapor_fraction).abs() < 1e-12);
        for i in 0..3 {
            let recombined = (1.0 - split.vapor_fraction) * split.liquid[i]
                + split.vapor_fraction * split.vapor[i];
            assert!((recombined - z[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn subcooled_and_superheated_clamp() {
        let z = [0.5, 0.5];
        let cold = rachford_rice(&z, &[0.5, 0.2]).unwrap();
        assert_eq!(cold.vapor_fraction, 0.0);
        assert_eq!(cold.liquid, vec![0.5, 0.5]);

        let hot = rachford_rice(&z, &[5.0, 3.0]).unwrap();
        assert_eq!(hot.vapor_fraction, 1.0);
        assert!((hot.vapor[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn non_positive_k_rejected() {
        assert!(rachford_rice(&[0.5, 0.5], &[0.0, 2.0]).is_err());
        assert!(rachford_rice(&[0.5, 0.5], &[f64::INFINITY, 2.0]).is_err());
        assert!(rachford_rice(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn fixed_fraction_flash_flags_a_runaway_liquid_iteration() {
        let table = two_component_table();
        let z = Composition::new(vec![0.5, 0.5]).unwrap();

        let ideal = PropertyPackage::ideal(Arc::clone(&table));
        let settled = fixed_fraction_flash(&ideal, &z, 340.0, pa(101_325.0), 0.5).unwrap();
        assert!(settled.converged);

        let swinging = PropertyPackage::new(table, Arc::new(SelfReinforcing(5.0))).unwrap();
        let capped = fixed_fraction_flash(&swinging, &z, 340.0, pa(101_325.0), 0.5).unwrap();
        assert!(!capped.converged);
        assert!(capped.residual.is_finite());
    }

    #[test]
    fn ideal_isothermal_flash_matches_rachford_rice() {
        let package = PropertyPackage::ideal(two_component_table());
        let z = Composition::new(vec![0.3, 0.7]).unwrap();
        let t = k(348.5);
        let flash = isothermal_flash(&package, &z, t, pa(101_325.0)).unwrap();
        let eq = equilibrate(&package, &z, t, pa(101_325.0)).unwrap();
        let split = rachford_rice(z.fractions(), &eq.k_values).unwrap();
        assert!(flash.converged);
        assert_eq!(flash.vapor_fraction, split.vapor_fraction);
        assert!(flash.vapor_fraction > 0.0 && flash.vapor_fraction < 1.0);
    }
}
