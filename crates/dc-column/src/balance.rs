//! Mass and energy balance audit of a column state.

use crate::column::{ColumnState, stage_inlets};
use crate::config::ColumnConfig;
use crate::error::{ColumnError, ColumnResult};
use crate::feed::FeedPortions;

/// Imbalance of one stage: inlets + duty against outlets (draws included).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageBalance {
    pub stage: u32,
    /// mol/s
    pub total_residual: f64,
    /// Largest per-component imbalance, mol/s.
    pub component_residual: f64,
    /// W
    pub energy_residual: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceAudit {
    pub stages: Vec<StageBalance>,
    /// Feed less all products, mol/s.
    pub overall_mass_residual: f64,
    /// Feed enthalpy plus all duties less product enthalpy, W.
    pub overall_energy_residual: f64,
    /// Sum of stage duties, W.
    pub total_duty: f64,
    /// Enthalpy of all products less feed enthalpy, W.
    pub net_stream_enthalpy_change: f64,
}

impl BalanceAudit {
    pub fn max_total_residual(&self) -> f64 {
        self.stages
            .iter()
            .map(|s| s.total_residual.abs())
            .fold(0.0, f64::max)
    }

    pub fn max_component_residual(&self) -> f64 {
        self.stages
            .iter()
            .map(|s| s.component_residual)
            .fold(0.0, f64::max)
    }

    pub fn max_energy_residual(&self) -> f64 {
        self.stages
            .iter()
            .map(|s| s.energy_residual.abs())
            .fold(0.0, f64::max)
    }

    /// Overall energy residual relative to the larger duty magnitude.
    pub fn relative_energy_residual(&self, state: &ColumnState) -> f64 {
        let scale = state
            .condenser_duty
            .value
            .abs()
            .max(state.reboiler_duty.value.abs())
            .max(1.0);
        self.overall_energy_residual.abs() / scale
    }
}

/// Recompute every stage balance from the records of `state`.
pub fn audit_balances(config: &ColumnConfig, state: &ColumnState) -> ColumnResult<BalanceAudit> {
    if state.stages.len() != config.stages {
        return Err(ColumnError::invalid(format!(
            "state has {} stages, configuration has {}",
            state.stages.len(),
            config.stages
        )));
    }
    let package = &config.package;
    let table = package.table();
    let nc = package.component_count();
    let feed = FeedPortions::resolve(config)?;

    let mut stages = Vec::with_capacity(state.stages.len());
    for (j, record) in state.stages.iter().enumerate() {
        let inlets = stage_inlets(config, &feed, &state.stages, j)?;
        let flows_in = inlets.component_flows(nc);
        let liquid_out = record.liquid.component_flows();
        let vapor_out = record.vapor.component_flows();
        let component_residual = (0..nc)
            .map(|i| (flows_in[i] - liquid_out[i] - vapor_out[i]).abs())
            .fold(0.0, f64::max);
        let total_residual = inlets.total_flow() - record.liquid.flow() - record.vapor.flow();
        let energy_residual = inlets.enthalpy_rate(package) + record.duty.value
            - record.liquid.enthalpy_rate(table)
            - record.vapor.enthalpy_rate(table);
        stages.push(StageBalance {
            stage: record.ordinal(),
            total_residual,
            component_residual,
            energy_residual,
        });
    }

    let feed_enthalpy: f64 = [&feed.liquid, &feed.vapor]
        .into_iter()
        .flatten()
        .map(|s| s.enthalpy_rate(table))
        .sum();
    let products = std::iter::once(&state.distillate)
        .chain(std::iter::once(&state.bottoms))
        .chain(&state.side_products);
    let (product_flow, product_enthalpy) = products.fold((0.0, 0.0), |(f, h), s| {
        (f + s.flow(), h + s.enthalpy_rate(table))
    });
    let total_duty: f64 = state.stages.iter().map(|s| s.duty.value).sum();
    let net_stream_enthalpy_change = product_enthalpy - feed_enthalpy;

    Ok(BalanceAudit {
        stages,
        overall_mass_residual: config.feed.flow - product_flow,
        overall_energy_residual: total_duty - net_stream_enthalpy_change,
        total_duty,
        net_stream_enthalpy_change,
    })
}
