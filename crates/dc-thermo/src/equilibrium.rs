//! Phase equilibrium at fixed temperature, pressure and liquid composition.

use crate::composition::{COMPOSITION_EPSILON, Composition};
use crate::error::{ThermoError, ThermoResult};
use crate::package::PropertyPackage;
use crate::stability::{LiquidSplit, find_liquid_split};
use dc_core::units::{Pressure, Temperature};

/// K-values and liquid structure at one `(x, T, P)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumResult {
    /// `y_i / x_i` against the overall liquid; positive and finite.
    pub k_values: Vec<f64>,
    pub temperature: Temperature,
    pub pressure: Pressure,
    /// Activity coefficients of the overall liquid (1.0 for ideal packages).
    pub activity_coefficients: Vec<f64>,
    /// Present when the liquid splits into two phases (VLLE).
    pub liquid_split: Option<LiquidSplit>,
}

impl EquilibriumResult {
    pub fn is_vlle(&self) -> bool {
        self.liquid_split.is_some()
    }

    /// Vapor in equilibrium with `liquid`, unnormalized (`K_i x_i`).
    pub fn incipient_vapor(&self, liquid: &Composition) -> Vec<f64> {
        self.k_values
            .iter()
            .zip(liquid.iter())
            .map(|(k, x)| k * x)
            .collect()
    }
}

/// Equilibrium ratios for liquid `liquid` at `(temperature, pressure)`.
///
/// `K_i = gamma_i P_sat,i / P`. Non-ideal liquids are first tested for
/// liquid-liquid stability; when they split, the vapor follows from the
/// majority liquid phase and the K-values are reported against the
/// overall liquid.
///
/// Pure function of its inputs.
pub fn equilibrate(
    package: &PropertyPackage,
    liquid: &Composition,
    temperature: Temperature,
    pressure: Pressure,
) -> ThermoResult<EquilibriumResult> {
    let psat = checked_vapor_pressures(package, liquid, temperature, pressure)?;
    let p = pressure.value;
    let t = temperature.value;
    let x = liquid.fractions();

    let (k_values, gamma, liquid_split) = if package.is_ideal() {
        let k: Vec<f64> = psat.iter().map(|ps| ps / p).collect();
        (k, vec![1.0; x.len()], None)
    } else {
        let activity = package.activity();
        let gamma: Vec<f64> = activity.ln_gamma(x, t)?.iter().map(|v| v.exp()).collect();
        match find_liquid_split(activity, x, t)? {
            Some(split) => {
                let gamma_1: Vec<f64> = activity
                    .ln_gamma(split.phase1.fractions(), t)?
                    .iter()
                    .map(|v| v.exp())
                    .collect();
                let k: Vec<f64> = (0..x.len())
                    .map(|i| {
                        if x[i] > 0.0 {
                            split.phase1.get(i) * gamma_1[i] * psat[i] / (p * x[i])
                        } else {
                            gamma[i] * psat[i] / p
                        }
                    })
                    .collect();
                (k, gamma, Some(split))
            }
            None => {
                let k: Vec<f64> = gamma.iter().zip(&psat).map(|(g, ps)| g * ps / p).collect();
                (k, gamma, None)
            }
        }
    };

    finish(package, k_values, temperature, pressure, gamma, liquid_split)
}

/// Equilibrium ratios with `liquid` taken as a single phase, skipping the
/// stability test. Used where the liquid is a trial drop rather than a
/// phase that could split, as in the dew point iteration.
pub fn equilibrate_single_liquid(
    package: &PropertyPackage,
    liquid: &Composition,
    temperature: Temperature,
    pressure: Pressure,
) -> ThermoResult<EquilibriumResult> {
    let psat = checked_vapor_pressures(package, liquid, temperature, pressure)?;
    let p = pressure.value;
    let gamma = if package.is_ideal() {
        vec![1.0; liquid.len()]
    } else {
        package
            .activity()
            .ln_gamma(liquid.fractions(), temperature.value)?
            .iter()
            .map(|v| v.exp())
            .collect()
    };
    let k_values = gamma.iter().zip(&psat).map(|(g, ps)| g * ps / p).collect();
    finish(package, k_values, temperature, pressure, gamma, None)
}

/// Validate the state and return the pure-component vapor pressures, Pa.
pub(crate) fn checked_vapor_pressures(
    package: &PropertyPackage,
    liquid: &Composition,
    temperature: Temperature,
    pressure: Pressure,
) -> ThermoResult<Vec<f64>> {
    let table = package.table();
    let p = pressure.value;
    if !(p.is_finite() && p > 0.0) {
        return Err(ThermoError::invalid_input(format!(
            "pressure must be positive ({p} Pa)"
        )));
    }
    if liquid.len() != table.len() {
        return Err(ThermoError::invalid_input(format!(
            "composition has {} entries, property table has {}",
            liquid.len(),
            table.len()
        )));
    }
    if liquid.sum_residual() > COMPOSITION_EPSILON {
        return Err(ThermoError::invalid_input(
            "composition does not sum to 1",
        ));
    }
    table.vapor_pressures(temperature.value)
}

pub(crate) fn finish(
    package: &PropertyPackage,
    k_values: Vec<f64>,
    temperature: Temperature,
    pressure: Pressure,
    activity_coefficients: Vec<f64>,
    liquid_split: Option<LiquidSplit>,
) -> ThermoResult<EquilibriumResult> {
    if let Some(i) = k_values.iter().position(|k| !(k.is_finite() && *k > 0.0)) {
        return Err(ThermoError::Numeric {
            what: format!(
                "K-value for '{}' is {} at {:.3} K",
                package.table().components()[i].name,
                k_values[i],
                temperature.value
            ),
        });
    }

    Ok(EquilibriumResult {
        k_values,
        temperature,
        pressure,
        activity_coefficients,
        liquid_split,
    })
}
