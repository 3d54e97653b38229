//! Feed split into the liquid and vapor portions entering the feed stage.

use crate::config::{ColumnConfig, FeedCondition};
use crate::error::ColumnResult;
use crate::stage::{InletStreams, split_at_vapor_fraction};
use dc_core::units::{MolarFlow, k};
use dc_thermo::{MixtureState, Phase, bubble_point, dew_point, isothermal_flash};

#[derive(Debug, Clone, Default)]
pub struct FeedPortions {
    pub liquid: Option<MixtureState>,
    pub vapor: Option<MixtureState>,
}

impl FeedPortions {
    /// Resolve the feed condition once at the feed stage pressure.
    pub fn resolve(config: &ColumnConfig) -> ColumnResult<Self> {
        let feed = &config.feed;
        if feed.flow <= 0.0 {
            return Ok(Self::default());
        }
        let package = &config.package;
        let z = &feed.composition;
        let pressure = config.stage_pressure(feed.stage.idx());

        let (t_k, beta, x, y) = match feed.condition {
            FeedCondition::SaturatedLiquid => {
                let b = bubble_point(package, z, pressure)?;
                (b.temperature.value, 0.0, z.clone(), b.incipient)
            }
            FeedCondition::SaturatedVapor => {
                let d = dew_point(package, z, pressure)?;
                (d.temperature.value, 1.0, d.incipient, z.clone())
            }
            FeedCondition::VaporFraction(q) if q <= 0.0 => {
                let b = bubble_point(package, z, pressure)?;
                (b.temperature.value, 0.0, z.clone(), b.incipient)
            }
            FeedCondition::VaporFraction(q) if q >= 1.0 => {
                let d = dew_point(package, z, pressure)?;
                (d.temperature.value, 1.0, d.incipient, z.clone())
            }
            FeedCondition::VaporFraction(q) => {
                let (t, x, y) =
                    split_at_vapor_fraction(package, z, pressure, q, &config.options.stage)?;
                (t, q, x, y)
            }
            FeedCondition::Temperature(t) => {
                let flash = isothermal_flash(package, z, t, pressure)?;
                (t.value, flash.vapor_fraction, flash.liquid, flash.vapor)
            }
        };

        let temperature = k(t_k);
        let liquid_flow = (1.0 - beta) * feed.flow;
        let vapor_flow = beta * feed.flow;
        let liquid = (liquid_flow > 0.0)
            .then(|| MixtureState::new(x, temperature, pressure, liquid_flow, Phase::Liquid))
            .transpose()?;
        let vapor = (vapor_flow > 0.0)
            .then(|| MixtureState::new(y, temperature, pressure, vapor_flow, Phase::Vapor))
            .transpose()?;
        Ok(Self { liquid, vapor })
    }

    pub fn liquid_flow(&self) -> MolarFlow {
        self.liquid.as_ref().map_or(0.0, |s| s.flow())
    }

    pub fn vapor_flow(&self) -> MolarFlow {
        self.vapor.as_ref().map_or(0.0, |s| s.flow())
    }

    /// Liquid fraction of the feed (`q`), 1.0 for an empty feed.
    pub fn quality(&self) -> f64 {
        let total = self.liquid_flow() + self.vapor_flow();
        if total > 0.0 {
            self.liquid_flow() / total
        } else {
            1.0
        }
    }

    pub fn add_to(&self, inlets: &mut InletStreams) {
        if let Some(l) = &self.liquid {
            inlets.push(l.clone());
        }
        if let Some(v) = &self.vapor {
            inlets.push(v.clone());
        }
    }
}
