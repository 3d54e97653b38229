//! Bubble and dew point temperatures at fixed pressure.

use crate::composition::Composition;
use crate::equilibrium::{EquilibriumResult, equilibrate, equilibrate_single_liquid};
use crate::error::{ThermoError, ThermoResult};
use crate::package::PropertyPackage;
use dc_core::numeric::max_abs_diff;
use dc_core::units::{Pressure, Temperature, k};
use dc_core::{DcError, RootOptions, find_root};

const DEW_INNER_ITERATIONS: usize = 100;
const DEW_INNER_TOLERANCE: f64 = 1e-12;

fn saturation_root_options() -> RootOptions {
    RootOptions {
        x_tol: 1e-13,
        f_tol: 1e-13,
        max_iterations: 200,
        damping: 1.0,
    }
}

/// Saturation temperature plus the incipient phase.
#[derive(Debug, Clone)]
pub struct SaturationPoint {
    pub temperature: Temperature,
    /// Composition of the first bubble (bubble point) or first drop (dew point).
    pub incipient: Composition,
    pub equilibrium: EquilibriumResult,
    pub iterations: usize,
}

/// Temperature at which `liquid` starts to boil: `sum K_i x_i = 1`.
pub fn bubble_point(
    package: &PropertyPackage,
    liquid: &Composition,
    pressure: Pressure,
) -> ThermoResult<SaturationPoint> {
    let (lo, hi) = package.table().temperature_window();
    let residual = |t: f64| -> ThermoResult<f64> {
        let eq = equilibrate(package, liquid, k(t), pressure)?;
        Ok(eq.incipient_vapor(liquid).iter().sum::<f64>().ln())
    };

    let root = find_root(residual, lo, hi, "bubble point", &saturation_root_options())
        .map_err(|err| out_of_window(err, "bubble", lo, hi, pressure))?;
    if !root.converged {
        return Err(ThermoError::ConvergenceFailed {
            what: "bubble point",
            iterations: root.iterations,
        });
    }

    let temperature = k(root.x);
    let equilibrium = equilibrate(package, liquid, temperature, pressure)?;
    let incipient = Composition::from_amounts(equilibrium.incipient_vapor(liquid))?;
    Ok(SaturationPoint {
        temperature,
        incipient,
        equilibrium,
        iterations: root.iterations,
    })
}

/// Temperature at which `vapor` starts to condense: `sum y_i / K_i = 1`.
///
/// K-values depend on the unknown liquid for non-ideal packages, so each
/// trial temperature iterates the incipient liquid to self-consistency.
/// The first drop is a single liquid phase; no stability test is run on it.
pub fn dew_point(
    package: &PropertyPackage,
    vapor: &Composition,
    pressure: Pressure,
) -> ThermoResult<SaturationPoint> {
    let (lo, hi) = package.table().temperature_window();
    let mut liquid_guess = vapor.clone();

    let mut residual = |t: f64| -> ThermoResult<f64> {
        let (sum, liquid, _) = dew_sum(package, vapor, &liquid_guess, k(t), pressure)?;
        liquid_guess = liquid;
        Ok(-sum.ln())
    };

    let root = find_root(&mut residual, lo, hi, "dew point", &saturation_root_options())
        .map_err(|err| out_of_window(err, "dew", lo, hi, pressure))?;
    if !root.converged {
        return Err(ThermoError::ConvergenceFailed {
            what: "dew point",
            iterations: root.iterations,
        });
    }

    let temperature = k(root.x);
    let (_, incipient, equilibrium) =
        dew_sum(package, vapor, &liquid_guess, temperature, pressure)?;
    Ok(SaturationPoint {
        temperature,
        incipient,
        equilibrium,
        iterations: root.iterations,
    })
}

/// `sum y_i / K_i` with the normalized liquid it implies.
fn dew_sum(
    package: &PropertyPackage,
    vapor: &Composition,
    guess: &Composition,
    temperature: Temperature,
    pressure: Pressure,
) -> ThermoResult<(f64, Composition, EquilibriumResult)> {
    let mut liquid = guess.clone();
    let mut iterations = 0;
    loop {
        iterations += 1;
        let equilibrium = equilibrate_single_liquid(package, &liquid, temperature, pressure)?;
        let drops: Vec<f64> = vapor
            .iter()
            .zip(&equilibrium.k_values)
            .map(|(y, k)| y / k)
            .collect();
        let sum: f64 = drops.iter().sum();
        let next = Composition::from_amounts(drops)?;
        let change = max_abs_diff(next.fractions(), liquid.fractions());
        if package.is_ideal() || change < DEW_INNER_TOLERANCE || iterations >= DEW_INNER_ITERATIONS
        {
            return Ok((sum, next, equilibrium));
        }
        liquid = next;
    }
}

fn out_of_window(
    err: ThermoError,
    kind: &'static str,
    lo: f64,
    hi: f64,
    pressure: Pressure,
) -> ThermoError {
    match err {
        ThermoError::Core(DcError::NotBracketed { .. }) => ThermoError::invalid_input(format!(
            "{kind} point at {:.1} Pa lies outside the correlation range {lo} K .. {hi} K",
            pressure.value
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Nrtl;
    use crate::catalog;
    use crate::component::{Component, LiquidDensity, VaporPressure};
    use crate::table::PropertyTable;
    use dc_core::units::pa;
    use std::sync::Arc;

    fn btx() -> PropertyPackage {
        PropertyPackage::ideal(Arc::new(catalog::benzene_toluene_xylene().unwrap()))
    }

    #[test]
    fn pure_component_bubble_equals_dew() {
        let pkg = btx();
        let pure = Composition::pure(3, 1).unwrap();
        let b = bubble_point(&pkg, &pure, pa(101_325.0)).unwrap();
        let d = dew_point(&pkg, &pure, pa(101_325.0)).unwrap();
        assert!((b.temperature.value - 383.775).abs() < 0.01);
        assert!((b.temperature.value - d.temperature.value).abs() < 1e-8);
    }

    #[test]
    fn mixture_has_glide() {
        let pkg = btx();
        let z = Composition::new(vec![0.5, 0.3, 0.2]).unwrap();
        let b = bubble_point(&pkg, &z, pa(101_325.0)).unwrap();
        let d = dew_point(&pkg, &z, pa(101_325.0)).unwrap();
        assert!(d.temperature.value > b.temperature.value + 5.0);
        // first bubble is richer in benzene, first drop richer in xylene
        assert!(b.incipient.get(0) > z.get(0));
        assert!(d.incipient.get(2) > z.get(2));
        let sum_kx: f64 = b.equilibrium.incipient_vapor(&z).iter().sum();
        assert!((sum_kx - 1.0).abs() < 1e-10);
    }

    #[test]
    fn pressure_outside_range_is_invalid_input() {
        let pkg = btx();
        let z = Composition::new(vec![0.5, 0.3, 0.2]).unwrap();
        let err = bubble_point(&pkg, &z, pa(1.0e9)).unwrap_err();
        assert!(matches!(err, ThermoError::PhysicallyInvalidInput { .. }));
    }

    #[test]
    fn non_ideal_dew_point_is_self_consistent() {
        let comp = |name: &str, p_ref: f64| Component {
            name: name.into(),
            molecular_weight: 60.0,
            heat_of_vaporization: 35_000.0,
            vapor_pressure: VaporPressure::ClausiusClapeyron {
                p_ref_pa: p_ref,
                t_ref_k: 350.0,
            },
            t_min_k: 250.0,
            t_max_k: 500.0,
            liquid_density: LiquidDensity::Constant { kg_per_m3: 800.0 },
            cp_liquid: 120.0,
            cp_vapor: 80.0,
        };
        let table =
            Arc::new(PropertyTable::new(vec![comp("a", 150_000.0), comp("b", 60_000.0)]).unwrap());
        let nrtl = Arc::new(Nrtl::binary(0.6, 0.4, 0.0, 0.0, 0.3).unwrap());
        let pkg = PropertyPackage::new(table, nrtl).unwrap();

        let y = Composition::new(vec![0.4, 0.6]).unwrap();
        let d = dew_point(&pkg, &y, pa(101_325.0)).unwrap();
        let sum: f64 = y
            .iter()
            .zip(&d.equilibrium.k_values)
            .map(|(yi, ki)| yi / ki)
            .sum();
        assert!((sum - 1.0).abs() < 1e-8);
        // activity raises K-values, so the dew point drops below the ideal one
        let ideal = PropertyPackage::ideal(pkg.shared_table());
        let d_ideal = dew_point(&ideal, &y, pa(101_325.0)).unwrap();
        assert!(d.temperature.value < d_ideal.temperature.value);
    }
}
