//! Column configuration and solver options.

use crate::error::{ColumnError, ColumnResult};
use crate::initialization::InitializationStrategy;
use dc_core::StageId;
use dc_core::units::{MolarFlow, Power, Pressure, Temperature, watts};
use dc_thermo::{Composition, Phase, PropertyPackage};

/// Top stage behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondenserKind {
    /// All overhead vapor condenses; distillate is a liquid draw.
    Total,
    /// Distillate leaves as vapor in equilibrium with the reflux.
    Partial,
}

impl CondenserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CondenserKind::Total => "total",
            CondenserKind::Partial => "partial",
        }
    }
}

/// Thermal condition of the feed at the feed stage pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedCondition {
    SaturatedLiquid,
    SaturatedVapor,
    /// Molar vapor fraction in [0, 1].
    VaporFraction(f64),
    /// Fixed temperature; the vapor fraction follows from an isothermal flash.
    Temperature(Temperature),
}

#[derive(Debug, Clone)]
pub struct FeedSpec {
    pub stage: StageId,
    /// mol/s
    pub flow: MolarFlow,
    pub composition: Composition,
    pub condition: FeedCondition,
    /// Extra heat supplied at the feed stage. Only valid on interior stages.
    pub duty: Option<Power>,
}

/// How the overall product split is specified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductSpec {
    /// mol/s
    DistillateRate(MolarFlow),
    /// D / F
    DistillateToFeed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressureProfile {
    Uniform(Pressure),
    /// Linear from the condenser to the reboiler.
    Linear { top: Pressure, bottom: Pressure },
    /// One entry per stage, condenser first.
    PerStage(Vec<Pressure>),
}

impl PressureProfile {
    /// Pressure of stage `index` (0-based) in an `n`-stage column, Pa.
    pub fn pressure_at(&self, index: usize, n: usize) -> f64 {
        match self {
            PressureProfile::Uniform(p) => p.value,
            PressureProfile::Linear { top, bottom } => {
                if n <= 1 {
                    top.value
                } else {
                    let frac = index as f64 / (n - 1) as f64;
                    top.value + (bottom.value - top.value) * frac
                }
            }
            PressureProfile::PerStage(values) => values
                .get(index)
                .or(values.last())
                .map(|p| p.value)
                .unwrap_or(0.0),
        }
    }

    fn validate(&self, n: usize) -> ColumnResult<()> {
        let check = |p: &Pressure, what: &str| -> ColumnResult<()> {
            if p.value.is_finite() && p.value > 0.0 {
                Ok(())
            } else {
                Err(ColumnError::invalid(format!(
                    "{what} pressure must be positive ({} Pa)",
                    p.value
                )))
            }
        };
        match self {
            PressureProfile::Uniform(p) => check(p, "column"),
            PressureProfile::Linear { top, bottom } => {
                check(top, "top")?;
                check(bottom, "bottom")
            }
            PressureProfile::PerStage(values) => {
                if values.len() != n {
                    return Err(ColumnError::invalid(format!(
                        "pressure profile has {} entries for {} stages",
                        values.len(),
                        n
                    )));
                }
                values.iter().try_for_each(|p| check(p, "stage"))
            }
        }
    }
}

/// Product withdrawn from an interior stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideDraw {
    pub stage: StageId,
    /// `Phase::Vapor` draws from the stage vapor, anything else from the liquid.
    pub phase: Phase,
    /// mol/s, capped at the available stream.
    pub flow: MolarFlow,
}

/// Options for a single stage solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageOptions {
    /// Temperature updates per stage solve (`M_stage`).
    pub max_iterations: usize,
    /// Energy residual relative to the stage's latent heat scale (`δ_E`).
    pub energy_tolerance: f64,
    /// Composition-sum residual (`δ_X`).
    pub composition_tolerance: f64,
    /// Weight of the secant temperature step; below 1.0 under-relaxes it.
    pub relaxation: f64,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            energy_tolerance: 1e-9,
            composition_tolerance: 1e-9,
            relaxation: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnOptions {
    /// Sweep cap (`M_column`).
    pub max_sweeps: usize,
    /// Column residual accepted as converged (`δ_column`).
    pub tolerance: f64,
    /// Consecutive failed sweeps before the column is declared divergent.
    pub max_stage_failures: usize,
    /// Relaxation used when a stage is retried.
    pub retry_relaxation: f64,
    /// Holland theta correction after each sweep; ideal packages only.
    pub theta_correction: bool,
    pub initialization: InitializationStrategy,
    pub stage: StageOptions,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            max_sweeps: 1000,
            tolerance: 1e-9,
            max_stage_failures: 3,
            retry_relaxation: 0.5,
            theta_correction: true,
            initialization: InitializationStrategy::default(),
            stage: StageOptions::default(),
        }
    }
}

/// Everything needed to solve one column.
///
/// Stage 1 is the condenser, stage `stages` the reboiler.
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub package: PropertyPackage,
    pub stages: usize,
    pub feed: FeedSpec,
    pub reflux_ratio: f64,
    pub product: ProductSpec,
    pub condenser: CondenserKind,
    pub pressure: PressureProfile,
    pub side_draws: Vec<SideDraw>,
    pub options: ColumnOptions,
}

impl ColumnConfig {
    /// Same column at a different reflux ratio.
    pub fn with_reflux_ratio(&self, reflux_ratio: f64) -> Self {
        Self {
            reflux_ratio,
            ..self.clone()
        }
    }

    /// mol/s
    pub fn distillate_rate(&self) -> MolarFlow {
        match self.product {
            ProductSpec::DistillateRate(d) => d,
            ProductSpec::DistillateToFeed(ratio) => ratio * self.feed.flow,
        }
    }

    /// Requested side draw total, mol/s.
    pub fn side_draw_total(&self) -> MolarFlow {
        self.side_draws.iter().map(|s| s.flow).sum()
    }

    /// Bottoms target `F - D - sum(draws)`, mol/s.
    pub fn bottoms_rate(&self) -> MolarFlow {
        (self.feed.flow - self.distillate_rate() - self.side_draw_total()).max(0.0)
    }

    pub fn feed_duty_w(&self) -> f64 {
        self.feed.duty.unwrap_or_else(|| watts(0.0)).value
    }

    pub fn stage_pressure(&self, index: usize) -> Pressure {
        dc_core::units::pa(self.pressure.pressure_at(index, self.stages))
    }

    pub fn validate(&self) -> ColumnResult<()> {
        let n = self.stages;
        if n < 2 {
            return Err(ColumnError::invalid(format!(
                "a column needs a condenser and a reboiler ({n} stages given)"
            )));
        }
        let nc = self.package.component_count();
        if self.feed.composition.len() != nc {
            return Err(ColumnError::invalid(format!(
                "feed composition has {} entries, property package has {}",
                self.feed.composition.len(),
                nc
            )));
        }
        let feed_index = self.feed.stage.idx();
        if feed_index >= n {
            return Err(ColumnError::invalid(format!(
                "feed stage {} outside 1..={n}",
                self.feed.stage.ordinal()
            )));
        }
        if !(self.feed.flow.is_finite() && self.feed.flow >= 0.0) {
            return Err(ColumnError::invalid("feed flow must be non-negative"));
        }
        match self.feed.condition {
            FeedCondition::VaporFraction(q) if !(0.0..=1.0).contains(&q) => {
                return Err(ColumnError::invalid(format!(
                    "feed vapor fraction {q} outside [0, 1]"
                )));
            }
            FeedCondition::Temperature(t) if !(t.value.is_finite() && t.value > 0.0) => {
                return Err(ColumnError::invalid("feed temperature must be positive"));
            }
            _ => {}
        }
        if let Some(duty) = self.feed.duty {
            if !duty.value.is_finite() {
                return Err(ColumnError::invalid("feed duty must be finite"));
            }
            if duty.value != 0.0 && (feed_index == 0 || feed_index == n - 1) {
                return Err(ColumnError::invalid(
                    "feed duty requires an interior feed stage",
                ));
            }
        }
        if !(self.reflux_ratio.is_finite() && self.reflux_ratio >= 0.0) {
            return Err(ColumnError::invalid(format!(
                "reflux ratio must be non-negative ({})",
                self.reflux_ratio
            )));
        }
        self.pressure.validate(n)?;

        for draw in &self.side_draws {
            let j = draw.stage.idx();
            if j == 0 || j >= n - 1 {
                return Err(ColumnError::invalid(format!(
                    "side draw at stage {} must be on an interior stage",
                    draw.stage.ordinal()
                )));
            }
            if !(draw.flow.is_finite() && draw.flow >= 0.0) {
                return Err(ColumnError::invalid("side draw flow must be non-negative"));
            }
        }

        let d = self.distillate_rate();
        let available = self.feed.flow - self.side_draw_total();
        if !(d.is_finite() && d >= 0.0) {
            return Err(ColumnError::invalid(format!(
                "distillate rate must be non-negative ({d})"
            )));
        }
        if d > available + 1e-12 * self.feed.flow.max(1.0) {
            return Err(ColumnError::invalid(format!(
                "distillate {d} mol/s exceeds feed less side draws ({available} mol/s)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_core::units::pa;
    use dc_thermo::catalog;
    use std::sync::Arc;

    fn config() -> ColumnConfig {
        let table = Arc::new(catalog::benzene_toluene_xylene().unwrap());
        ColumnConfig {
            package: PropertyPackage::ideal(table),
            stages: 8,
            feed: FeedSpec {
                stage: StageId::from_index(3),
                flow: 10.0,
                composition: Composition::new(vec![0.4, 0.4, 0.2]).unwrap(),
                condition: FeedCondition::SaturatedLiquid,
                duty: None,
            },
            reflux_ratio: 2.0,
            product: ProductSpec::DistillateToFeed(0.4),
            condenser: CondenserKind::Total,
            pressure: PressureProfile::Uniform(pa(101_325.0)),
            side_draws: Vec::new(),
            options: ColumnOptions::default(),
        }
    }

    #[test]
    fn product_rates() {
        let mut c = config();
        assert!((c.distillate_rate() - 4.0).abs() < 1e-12);
        assert!((c.bottoms_rate() - 6.0).abs() < 1e-12);
        c.side_draws.push(SideDraw {
            stage: StageId::from_index(5),
            phase: Phase::Liquid,
            flow: 1.0,
        });
        assert!((c.bottoms_rate() - 5.0).abs() < 1e-12);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn linear_pressure_profile() {
        let p = PressureProfile::Linear {
            top: pa(100_000.0),
            bottom: pa(120_000.0),
        };
        assert_eq!(p.pressure_at(0, 5), 100_000.0);
        assert_eq!(p.pressure_at(4, 5), 120_000.0);
        assert!((p.pressure_at(2, 5) - 110_000.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_inconsistent_configs() {
        let mut c = config();
        c.product = ProductSpec::DistillateRate(11.0);
        assert!(c.validate().unwrap_err().is_invalid_input());

        let mut c = config();
        c.reflux_ratio = -1.0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.feed.stage = StageId::from_index(8);
        assert!(c.validate().is_err());

        let mut c = config();
        c.side_draws.push(SideDraw {
            stage: StageId::from_index(0),
            phase: Phase::Liquid,
            flow: 1.0,
        });
        assert!(c.validate().is_err());

        let mut c = config();
        c.pressure = PressureProfile::PerStage(vec![pa(1e5); 3]);
        assert!(c.validate().is_err());

        let mut c = config();
        c.feed.stage = StageId::from_index(0);
        c.feed.duty = Some(watts(1000.0));
        assert!(c.validate().is_err());
    }
}
