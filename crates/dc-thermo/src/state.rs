//! Immutable stream snapshots.

use crate::composition::Composition;
use crate::enthalpy::{liquid_enthalpy, vapor_enthalpy};
use crate::error::{ThermoError, ThermoResult};
use crate::table::PropertyTable;
use dc_core::units::{MolarEnthalpy, MolarFlow, Pressure, Temperature};

/// Phase tag of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Vapor,
    Liquid,
    /// Second liquid phase of a VLLE stage.
    Liquid2,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Vapor => "vapor",
            Phase::Liquid => "liquid",
            Phase::Liquid2 => "liquid-2",
        }
    }

    pub fn is_liquid(&self) -> bool {
        !matches!(self, Phase::Vapor)
    }
}

/// Composition, temperature, pressure and molar flow of one stream.
///
/// Snapshots are never mutated; every solver iteration builds new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureState {
    composition: Composition,
    temperature: Temperature,
    pressure: Pressure,
    flow: MolarFlow,
    phase: Phase,
}

impl MixtureState {
    pub fn new(
        composition: Composition,
        temperature: Temperature,
        pressure: Pressure,
        flow: MolarFlow,
        phase: Phase,
    ) -> ThermoResult<Self> {
        if !(temperature.value.is_finite() && temperature.value > 0.0) {
            return Err(ThermoError::invalid_input(format!(
                "stream temperature must be positive ({} K)",
                temperature.value
            )));
        }
        if !(pressure.value.is_finite() && pressure.value > 0.0) {
            return Err(ThermoError::invalid_input(format!(
                "stream pressure must be positive ({} Pa)",
                pressure.value
            )));
        }
        if !(flow.is_finite() && flow >= 0.0) {
            return Err(ThermoError::invalid_input(format!(
                "stream flow must be non-negative ({flow} mol/s)"
            )));
        }
        Ok(Self {
            composition,
            temperature,
            pressure,
            flow,
            phase,
        })
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature.value
    }

    pub fn pressure(&self) -> Pressure {
        self.pressure
    }

    pub fn pressure_pa(&self) -> f64 {
        self.pressure.value
    }

    /// mol/s
    pub fn flow(&self) -> MolarFlow {
        self.flow
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Same stream at a different flow; small negative round-off clamps to zero.
    pub fn with_flow(&self, flow: MolarFlow) -> ThermoResult<Self> {
        let flow = if flow < 0.0 && flow > -1e-9 * self.flow.max(1.0) {
            0.0
        } else {
            flow
        };
        Self::new(
            self.composition.clone(),
            self.temperature,
            self.pressure,
            flow,
            self.phase,
        )
    }

    pub fn with_composition(&self, composition: Composition) -> ThermoResult<Self> {
        if composition.len() != self.composition.len() {
            return Err(ThermoError::invalid_input(
                "replacement composition has a different component count",
            ));
        }
        Ok(Self {
            composition,
            ..self.clone()
        })
    }

    /// mol/s per component
    pub fn component_flows(&self) -> Vec<f64> {
        self.composition.iter().map(|x| x * self.flow).collect()
    }

    /// J/mol, evaluated for the stream's phase.
    pub fn molar_enthalpy(&self, table: &PropertyTable) -> MolarEnthalpy {
        let t = self.temperature.value;
        match self.phase {
            Phase::Vapor => vapor_enthalpy(table, self.composition.fractions(), t),
            Phase::Liquid | Phase::Liquid2 => {
                liquid_enthalpy(table, self.composition.fractions(), t)
            }
        }
    }

    /// Enthalpy flow, W.
    pub fn enthalpy_rate(&self, table: &PropertyTable) -> f64 {
        self.flow * self.molar_enthalpy(table)
    }

    /// kg/s
    pub fn mass_flow(&self, table: &PropertyTable) -> f64 {
        self.flow * self.composition.molecular_weight(table) * 1e-3
    }

    /// Liquid volumetric flow assuming ideal mixing, m3/s. `None` for vapor.
    pub fn liquid_volume_flow(&self, table: &PropertyTable) -> Option<f64> {
        if !self.phase.is_liquid() {
            return None;
        }
        let t = self.temperature.value;
        let specific_volume: f64 = self
            .composition
            .iter()
            .zip(table.components())
            .map(|(x, c)| x * c.molecular_weight * 1e-3 / c.liquid_density_kg_m3(t))
            .sum();
        Some(self.flow * specific_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use dc_core::units::{k, pa};

    fn feed() -> MixtureState {
        MixtureState::new(
            Composition::new(vec![0.5, 0.3, 0.2]).unwrap(),
            k(350.0),
            pa(101_325.0),
            10.0,
            Phase::Liquid,
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_physical_values() {
        let c = Composition::uniform(3).unwrap();
        assert!(MixtureState::new(c.clone(), k(-1.0), pa(1e5), 1.0, Phase::Liquid).is_err());
        assert!(MixtureState::new(c.clone(), k(300.0), pa(0.0), 1.0, Phase::Liquid).is_err());
        assert!(MixtureState::new(c, k(300.0), pa(1e5), -1.0, Phase::Vapor).is_err());
    }

    #[test]
    fn component_flows_sum_to_total() {
        let s = feed();
        let total: f64 = s.component_flows().iter().sum();
        assert!((total - 10.0).abs() < 1e-12);
    }

    #[test]
    fn with_flow_leaves_original_untouched() {
        let s = feed();
        let half = s.with_flow(5.0).unwrap();
        assert_eq!(s.flow(), 10.0);
        assert_eq!(half.flow(), 5.0);
        assert_eq!(half.with_flow(-1e-12).unwrap().flow(), 0.0);
    }

    #[test]
    fn liquid_volume_flow_uses_densities() {
        let table = catalog::benzene_toluene_xylene().unwrap();
        let s = feed();
        let q = s.liquid_volume_flow(&table).unwrap();
        let mass = s.mass_flow(&table);
        // density of the blend lies between the pure values
        let rho = mass / q;
        assert!(rho > 866.0 && rho < 881.0, "rho = {rho}");
    }
}
