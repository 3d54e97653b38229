//! Product purity and recovery constraints.

use crate::error::{OptimError, OptimResult};
use dc_column::{ColumnConfig, ColumnState};
use dc_core::ComponentId;
use std::fmt;

/// One lower bound on a product quality measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeparationSpec {
    /// Mole fraction of `component` in the distillate.
    DistillatePurity { component: ComponentId, minimum: f64 },
    /// Mole fraction of `component` in the bottoms.
    BottomsPurity { component: ComponentId, minimum: f64 },
    /// Fraction of the fed `component` leaving in the distillate.
    DistillateRecovery { component: ComponentId, minimum: f64 },
    /// Fraction of the fed `component` leaving in the bottoms.
    BottomsRecovery { component: ComponentId, minimum: f64 },
}

impl SeparationSpec {
    pub fn component(&self) -> ComponentId {
        match *self {
            SeparationSpec::DistillatePurity { component, .. }
            | SeparationSpec::BottomsPurity { component, .. }
            | SeparationSpec::DistillateRecovery { component, .. }
            | SeparationSpec::BottomsRecovery { component, .. } => component,
        }
    }

    pub fn minimum(&self) -> f64 {
        match *self {
            SeparationSpec::DistillatePurity { minimum, .. }
            | SeparationSpec::BottomsPurity { minimum, .. }
            | SeparationSpec::DistillateRecovery { minimum, .. }
            | SeparationSpec::BottomsRecovery { minimum, .. } => minimum,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            SeparationSpec::DistillatePurity { .. } => "distillate_purity",
            SeparationSpec::BottomsPurity { .. } => "bottoms_purity",
            SeparationSpec::DistillateRecovery { .. } => "distillate_recovery",
            SeparationSpec::BottomsRecovery { .. } => "bottoms_recovery",
        }
    }

    /// Value of the measure in a solved column.
    pub fn achieved(&self, config: &ColumnConfig, state: &ColumnState) -> f64 {
        let i = self.component().idx();
        let fed = config.feed.flow * config.feed.composition.get(i);
        let recovered = |flow: f64| if fed > 0.0 { flow / fed } else { 0.0 };
        match self {
            SeparationSpec::DistillatePurity { .. } => state.distillate.composition().get(i),
            SeparationSpec::BottomsPurity { .. } => state.bottoms.composition().get(i),
            SeparationSpec::DistillateRecovery { .. } => {
                recovered(state.distillate.component_flows()[i])
            }
            SeparationSpec::BottomsRecovery { .. } => {
                recovered(state.bottoms.component_flows()[i])
            }
        }
    }

    /// How far the measure falls short of its minimum; zero when met.
    pub fn shortfall(&self, config: &ColumnConfig, state: &ColumnState) -> f64 {
        (self.minimum() - self.achieved(config, state)).max(0.0)
    }
}

impl fmt::Display for SeparationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of component {} >= {}",
            self.kind_str(),
            self.component().ordinal(),
            self.minimum()
        )
    }
}

/// All specs must hold for a candidate to be feasible.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeparationConstraint {
    pub specs: Vec<SeparationSpec>,
}

impl SeparationConstraint {
    pub fn new(specs: Vec<SeparationSpec>) -> Self {
        Self { specs }
    }

    pub fn distillate_purity(component: ComponentId, minimum: f64) -> Self {
        Self::new(vec![SeparationSpec::DistillatePurity { component, minimum }])
    }

    pub fn validate(&self, component_count: usize) -> OptimResult<()> {
        if self.specs.is_empty() {
            return Err(OptimError::setup("separation constraint has no specs"));
        }
        for spec in &self.specs {
            if spec.component().idx() >= component_count {
                return Err(OptimError::setup(format!(
                    "{spec}: the mixture has {component_count} components"
                )));
            }
            let minimum = spec.minimum();
            if !(0.0..=1.0).contains(&minimum) {
                return Err(OptimError::setup(format!(
                    "{spec}: minimum must lie in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Largest shortfall over all specs.
    pub fn shortfall(&self, config: &ColumnConfig, state: &ColumnState) -> f64 {
        self.specs
            .iter()
            .map(|spec| spec.shortfall(config, state))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_unknown_component_and_bad_minimum() {
        let c = SeparationConstraint::distillate_purity(ComponentId::from_index(2), 0.9);
        assert!(c.validate(2).is_err());
        assert!(c.validate(3).is_ok());

        let c = SeparationConstraint::distillate_purity(ComponentId::from_index(0), 1.5);
        assert!(c.validate(2).is_err());

        assert!(SeparationConstraint::default().validate(2).is_err());
    }

    #[test]
    fn display_names_the_measure() {
        let spec = SeparationSpec::BottomsRecovery {
            component: ComponentId::from_index(1),
            minimum: 0.99,
        };
        assert_eq!(spec.to_string(), "bottoms_recovery of component 2 >= 0.99");
    }
}
