//! Ordered, validated component property table.

use crate::component::Component;
use crate::error::{ThermoError, ThermoResult};
use dc_core::ComponentId;
use std::collections::HashSet;

/// Read-only list of components addressed by position.
///
/// Built once, then shared behind `Arc` by every equilibrium call.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyTable {
    components: Vec<Component>,
    t_low_k: f64,
    t_high_k: f64,
}

impl PropertyTable {
    pub fn new(components: Vec<Component>) -> ThermoResult<Self> {
        if components.is_empty() {
            return Err(ThermoError::InvalidTable {
                what: "no components".to_string(),
            });
        }

        let mut names = HashSet::new();
        for component in &components {
            component.validate()?;
            if !names.insert(component.name.as_str()) {
                return Err(ThermoError::InvalidTable {
                    what: format!("duplicate component '{}'", component.name),
                });
            }
        }

        let t_low_k = components
            .iter()
            .map(|c| c.t_min_k)
            .fold(f64::NEG_INFINITY, f64::max);
        let t_high_k = components
            .iter()
            .map(|c| c.t_max_k)
            .fold(f64::INFINITY, f64::min);
        if t_low_k >= t_high_k {
            return Err(ThermoError::InvalidTable {
                what: format!(
                    "component validity ranges do not overlap ({t_low_k} K .. {t_high_k} K)"
                ),
            });
        }

        Ok(Self {
            components,
            t_low_k,
            t_high_k,
        })
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.idx())
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> + '_ {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId::from_index(i as u32), c))
    }

    pub fn index_of(&self, name: &str) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|c| c.name == name)
            .map(|i| ComponentId::from_index(i as u32))
    }

    pub fn names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }

    /// Temperature interval where every correlation is valid, K.
    pub fn temperature_window(&self) -> (f64, f64) {
        (self.t_low_k, self.t_high_k)
    }

    pub fn check_temperature(&self, t_k: f64) -> ThermoResult<()> {
        if !t_k.is_finite() {
            return Err(ThermoError::invalid_input(format!(
                "temperature is not finite ({t_k})"
            )));
        }
        if let Some(c) = self.components.iter().find(|c| !c.in_range(t_k)) {
            return Err(ThermoError::invalid_input(format!(
                "temperature {t_k:.3} K outside correlation range of '{}' ({} K .. {} K)",
                c.name, c.t_min_k, c.t_max_k
            )));
        }
        Ok(())
    }

    /// Saturation pressures in Pa, after checking every validity range.
    pub fn vapor_pressures(&self, t_k: f64) -> ThermoResult<Vec<f64>> {
        self.check_temperature(t_k)?;
        Ok(self
            .components
            .iter()
            .map(|c| c.vapor_pressure_pa(t_k))
            .collect())
    }
}
