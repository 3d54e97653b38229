//! Ideal-mixture molar enthalpies relative to liquid at 298.15 K.
//!
//! `h_L = sum x_i cp_L,i (T - T_ref)`
//! `h_V = sum y_i (dH_vap,i + cp_V,i (T - T_ref))`

use crate::table::PropertyTable;
use dc_core::units::MolarEnthalpy;
use dc_core::units::constants::T_REF_K;

pub fn liquid_enthalpy(table: &PropertyTable, x: &[f64], t_k: f64) -> MolarEnthalpy {
    liquid_heat_capacity(table, x) * (t_k - T_REF_K)
}

pub fn vapor_enthalpy(table: &PropertyTable, y: &[f64], t_k: f64) -> MolarEnthalpy {
    y.iter()
        .zip(table.components())
        .map(|(yi, c)| yi * (c.heat_of_vaporization + c.cp_vapor * (t_k - T_REF_K)))
        .sum()
}

/// J/(mol K)
pub fn liquid_heat_capacity(table: &PropertyTable, x: &[f64]) -> f64 {
    x.iter()
        .zip(table.components())
        .map(|(xi, c)| xi * c.cp_liquid)
        .sum()
}

/// J/(mol K)
pub fn vapor_heat_capacity(table: &PropertyTable, y: &[f64]) -> f64 {
    y.iter()
        .zip(table.components())
        .map(|(yi, c)| yi * c.cp_vapor)
        .sum()
}

/// Temperature of a single-phase liquid with molar enthalpy `h`.
pub fn liquid_temperature(table: &PropertyTable, x: &[f64], h: MolarEnthalpy) -> f64 {
    T_REF_K + h / liquid_heat_capacity(table, x)
}

/// Temperature of a single-phase vapor with molar enthalpy `h`.
pub fn vapor_temperature(table: &PropertyTable, y: &[f64], h: MolarEnthalpy) -> f64 {
    let latent: f64 = y
        .iter()
        .zip(table.components())
        .map(|(yi, c)| yi * c.heat_of_vaporization)
        .sum();
    T_REF_K + (h - latent) / vapor_heat_capacity(table, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn reference_state_is_zero_liquid() {
        let table = catalog::benzene_toluene_xylene().unwrap();
        assert_eq!(liquid_enthalpy(&table, &[0.2, 0.3, 0.5], T_REF_K), 0.0);
        let hv = vapor_enthalpy(&table, &[1.0, 0.0, 0.0], T_REF_K);
        assert!((hv - 33_830.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_temperatures_round_trip() {
        let table = catalog::benzene_toluene_xylene().unwrap();
        let z = [0.4, 0.4, 0.2];
        let hl = liquid_enthalpy(&table, &z, 350.0);
        assert!((liquid_temperature(&table, &z, hl) - 350.0).abs() < 1e-9);
        let hv = vapor_enthalpy(&table, &z, 420.0);
        assert!((vapor_temperature(&table, &z, hv) - 420.0).abs() < 1e-9);
    }
}
