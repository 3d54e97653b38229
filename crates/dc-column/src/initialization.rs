//! Starting profiles for the column sweep.
//!
//! Temperatures come from saturation points of the feed; flows from
//! constant molar overflow. Every stage starts at the feed composition.

use crate::column::{StageKind, StageRecord};
use crate::config::{ColumnConfig, CondenserKind};
use crate::convergence::ConvergenceRecord;
use crate::error::ColumnResult;
use crate::feed::FeedPortions;
use dc_core::StageId;
use dc_core::units::{k, watts};
use dc_thermo::{Composition, MixtureState, Phase, bubble_point, dew_point};

/// How the first temperature profile is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationStrategy {
    /// Linear between an estimated top and bottom temperature.
    ///
    /// Top: bubble point of the vapor in equilibrium with the feed.
    /// Bottom: bubble point of the liquid in equilibrium with the feed at
    /// its dew point.
    #[default]
    Linear,
    /// Feed bubble point on every stage.
    Flat,
}

impl InitializationStrategy {
    /// Convert strategy to human-readable name for diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            InitializationStrategy::Linear => "Linear",
            InitializationStrategy::Flat => "Flat",
        }
    }
}

/// Temperatures (K) for every stage, condenser first.
pub fn temperature_profile(config: &ColumnConfig) -> ColumnResult<Vec<f64>> {
    let n = config.stages;
    let package = &config.package;
    let z = &config.feed.composition;
    let p_feed = config.stage_pressure(config.feed.stage.idx());
    let feed_bubble = bubble_point(package, z, p_feed)?;

    match config.options.initialization {
        InitializationStrategy::Flat => Ok(vec![feed_bubble.temperature.value; n]),
        InitializationStrategy::Linear => {
            let top = bubble_point(package, &feed_bubble.incipient, config.stage_pressure(0))?;
            let feed_dew = dew_point(package, z, p_feed)?;
            let bottom = bubble_point(package, &feed_dew.incipient, config.stage_pressure(n - 1))?;
            let (t_top, t_bottom) = (top.temperature.value, bottom.temperature.value);
            Ok((0..n)
                .map(|j| {
                    let frac = if n > 1 { j as f64 / (n - 1) as f64 } else { 0.0 };
                    t_top + (t_bottom - t_top) * frac
                })
                .collect())
        }
    }
}

/// Build the starting stage arena.
pub(crate) fn initial_stages(
    config: &ColumnConfig,
    feed: &FeedPortions,
) -> ColumnResult<Vec<StageRecord>> {
    let n = config.stages;
    let temperatures = temperature_profile(config)?;
    let z: &Composition = &config.feed.composition;

    let d = config.distillate_rate();
    let b = config.bottoms_rate();
    let r = config.reflux_ratio;
    let f_liquid = feed.liquid_flow();
    let f_vapor = feed.vapor_flow();

    let l_rect = r * d;
    let v_rect = (r + 1.0) * d;
    let l_strip = l_rect + f_liquid;
    let v_strip = (v_rect - f_vapor).max(0.0);
    let feed_index = config.feed.stage.idx();

    let mut stages = Vec::with_capacity(n);
    for (j, &t) in temperatures.iter().enumerate() {
        let (kind, liquid_flow, vapor_flow, liquid_draw, vapor_draw) = if j == 0 {
            match config.condenser {
                CondenserKind::Total => (
                    StageKind::Condenser(config.condenser),
                    l_rect + d,
                    0.0,
                    d,
                    0.0,
                ),
                CondenserKind::Partial => {
                    (StageKind::Condenser(config.condenser), l_rect, d, 0.0, d)
                }
            }
        } else if j == n - 1 {
            (StageKind::Reboiler, b, v_strip, b, 0.0)
        } else if j < feed_index {
            (StageKind::Equilibrium, l_rect, v_rect, 0.0, 0.0)
        } else if j == feed_index {
            (StageKind::Feed, l_strip, v_rect, 0.0, 0.0)
        } else {
            (StageKind::Equilibrium, l_strip, v_strip, 0.0, 0.0)
        };

        let pressure = config.stage_pressure(j);
        let temperature = k(t);
        let liquid = MixtureState::new(z.clone(), temperature, pressure, liquid_flow, Phase::Liquid)?;
        let vapor = MixtureState::new(z.clone(), temperature, pressure, vapor_flow, Phase::Vapor)?;
        stages.push(StageRecord {
            id: StageId::from_index(j as u32),
            kind,
            temperature,
            pressure,
            liquid_phases: vec![liquid.clone()],
            liquid,
            vapor,
            liquid_draw,
            vapor_draw,
            duty: watts(0.0),
            k_values: Vec::new(),
            vlle: false,
            convergence: ConvergenceRecord::unconverged(0, 0.0),
        });
    }
    Ok(stages)
}
