//! Column solver: alternating directional sweeps over the stage arena.
//!
//! Stages live in a `Vec<StageRecord>` indexed from the condenser (0) to the
//! reboiler (N - 1). Each sweep solves every stage top to bottom, then
//! bottom to top, each time from the current records of its neighbours.
//! Records are replaced, never edited, so a failed sweep leaves the
//! previous snapshot intact until the new one is complete.

use crate::config::{ColumnConfig, CondenserKind};
use crate::convergence::ConvergenceRecord;
use crate::error::{ColumnError, ColumnResult};
use crate::feed::FeedPortions;
use crate::initialization::initial_stages;
use crate::progress::ColumnProgressEvent;
use crate::stage::{InletStreams, StageConfig, StageGuess, StageSpec, solve_stage_with_retry};
use crate::theta::theta_correction;
use dc_core::units::{MolarFlow, Power, Pressure, Temperature};
use dc_core::{ComponentId, StageId};
use dc_thermo::{MixtureState, Phase};
use tracing::{debug, warn};

/// K per unit of residual in the temperature part of the column residual.
const TEMPERATURE_SCALE_K: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Condenser(CondenserKind),
    Equilibrium,
    Feed,
    Reboiler,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Condenser(CondenserKind::Total) => "total condenser",
            StageKind::Condenser(CondenserKind::Partial) => "partial condenser",
            StageKind::Equilibrium => "equilibrium",
            StageKind::Feed => "feed",
            StageKind::Reboiler => "reboiler",
        }
    }
}

/// Converged (or latest) state of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub id: StageId,
    pub kind: StageKind,
    pub temperature: Temperature,
    pub pressure: Pressure,
    /// Overall liquid leaving the stage, draws included.
    pub liquid: MixtureState,
    /// Liquid phases making up `liquid`; two on a VLLE stage.
    pub liquid_phases: Vec<MixtureState>,
    /// Vapor leaving the stage, draws included.
    pub vapor: MixtureState,
    /// Product taken from the liquid (distillate, bottoms or side draw), mol/s.
    pub liquid_draw: MolarFlow,
    /// Product taken from the vapor, mol/s.
    pub vapor_draw: MolarFlow,
    pub duty: Power,
    pub k_values: Vec<f64>,
    pub vlle: bool,
    pub convergence: ConvergenceRecord,
}

impl StageRecord {
    /// 1-based stage number, condenser = 1.
    pub fn ordinal(&self) -> u32 {
        self.id.ordinal()
    }

    /// Liquid flowing to the stage below, mol/s.
    pub fn liquid_down(&self) -> MolarFlow {
        (self.liquid.flow() - self.liquid_draw).max(0.0)
    }

    /// Vapor flowing to the stage above, mol/s.
    pub fn vapor_up(&self) -> MolarFlow {
        (self.vapor.flow() - self.vapor_draw).max(0.0)
    }

    fn guess(&self) -> StageGuess {
        StageGuess {
            temperature: self.temperature,
            liquid: self.liquid.composition().clone(),
            vapor: self.vapor.composition().clone(),
        }
    }
}

/// Stage arena plus the products of a column solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnState {
    pub stages: Vec<StageRecord>,
    pub distillate: MixtureState,
    pub bottoms: MixtureState,
    /// One entry per configured side draw, in configuration order.
    pub side_products: Vec<MixtureState>,
    pub condenser_duty: Power,
    pub reboiler_duty: Power,
    pub reflux_ratio: f64,
    pub sweeps: usize,
}

impl ColumnState {
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, id: StageId) -> Option<&StageRecord> {
        self.stages.get(id.idx())
    }

    /// Stage temperatures, K, condenser first.
    pub fn temperature_profile(&self) -> Vec<f64> {
        self.stages.iter().map(|s| s.temperature.value).collect()
    }

    pub fn distillate_fraction(&self, component: ComponentId) -> f64 {
        self.distillate.composition().get(component.idx())
    }

    pub fn bottoms_fraction(&self, component: ComponentId) -> f64 {
        self.bottoms.composition().get(component.idx())
    }

    pub fn has_vlle(&self) -> bool {
        self.stages.iter().any(|s| s.vlle)
    }

    fn from_stages(
        config: &ColumnConfig,
        stages: Vec<StageRecord>,
        sweeps: usize,
    ) -> ColumnResult<Self> {
        let top = &stages[0];
        let bottom = &stages[stages.len() - 1];
        let distillate = match config.condenser {
            CondenserKind::Total => top.liquid.with_flow(top.liquid_draw)?,
            CondenserKind::Partial => top.vapor.with_flow(top.vapor_draw)?,
        };
        let bottoms = bottom.liquid.with_flow(bottom.liquid_draw)?;
        let side_products = side_products(config, &stages)?;
        Ok(Self {
            distillate,
            bottoms,
            side_products,
            condenser_duty: top.duty,
            reboiler_duty: bottom.duty,
            reflux_ratio: config.reflux_ratio,
            sweeps,
            stages,
        })
    }
}

/// Solve the column from a generated starting profile.
pub fn solve_column(config: &ColumnConfig) -> ColumnResult<(ColumnState, ConvergenceRecord)> {
    solve_column_with_progress(config, None, None)
}

/// Solve the column starting from a previous state (warm start).
pub fn solve_column_from(
    config: &ColumnConfig,
    initial: &ColumnState,
) -> ColumnResult<(ColumnState, ConvergenceRecord)> {
    solve_column_with_progress(config, Some(initial), None)
}

/// Solve the column, reporting each sweep to `progress`.
///
/// Reaching `max_sweeps` is not an error: the latest state is returned
/// with `converged = false`. `ColumnDivergence` is raised after
/// `max_stage_failures` consecutive sweeps with a failing stage, or when
/// the residual stops being finite.
pub fn solve_column_with_progress(
    config: &ColumnConfig,
    initial: Option<&ColumnState>,
    mut progress: Option<&mut dyn FnMut(ColumnProgressEvent)>,
) -> ColumnResult<(ColumnState, ConvergenceRecord)> {
    config.validate()?;
    let options = &config.options;
    let n = config.stages;
    let feed = FeedPortions::resolve(config)?;

    let mut stages = match initial {
        Some(state) => warm_start(config, state)?,
        None => initial_stages(config, &feed)?,
    };
    let flow_scale = if config.feed.flow > 0.0 { config.feed.flow } else { 1.0 };

    let mut emit = |event: ColumnProgressEvent| {
        if let Some(cb) = progress.as_mut() {
            cb(event);
        }
    };

    let mut consecutive_failures = 0;
    let mut residual = f64::INFINITY;

    for sweep in 1..=options.max_sweeps {
        emit(ColumnProgressEvent::SweepStarted {
            sweep,
            max_sweeps: options.max_sweeps,
        });
        let previous = stages.clone();
        let mut failed_stages = 0;

        let order = (0..n).chain((0..n).rev());
        for j in order {
            match solve_stage_at(config, &feed, &stages, j) {
                Ok(record) => stages[j] = record,
                Err(StageFailure::Recovered(record)) => {
                    failed_stages += 1;
                    emit(ColumnProgressEvent::StageFailed {
                        sweep,
                        stage: record.ordinal(),
                    });
                    stages[j] = *record;
                }
                Err(StageFailure::Fatal(err)) if err.is_invalid_input() => return Err(err),
                Err(StageFailure::Fatal(err)) => {
                    warn!(sweep, stage = j + 1, error = %err, "column diverged");
                    return Err(ColumnError::ColumnDivergence {
                        sweeps: sweep,
                        residual,
                        reason: err.to_string(),
                        partial: Box::new(ColumnState::from_stages(config, previous, sweep)?),
                    });
                }
            }
        }

        if options.theta_correction
            && let Some(theta) = theta_correction(config, &mut stages)?
        {
            debug!(sweep, theta, "theta correction applied");
        }

        residual = profile_change(&previous, &stages, flow_scale)
            + stages
                .iter()
                .filter(|s| !s.convergence.converged)
                .map(|s| s.convergence.residual)
                .sum::<f64>();
        debug!(sweep, residual, failed_stages, "column sweep");
        emit(ColumnProgressEvent::SweepCompleted {
            sweep,
            residual,
            failed_stages,
        });

        if !residual.is_finite() {
            warn!(sweep, "column residual is not finite");
            return Err(ColumnError::ColumnDivergence {
                sweeps: sweep,
                residual,
                reason: "non-finite column residual".to_string(),
                partial: Box::new(ColumnState::from_stages(config, stages, sweep)?),
            });
        }

        if failed_stages > 0 {
            consecutive_failures += 1;
            if consecutive_failures >= options.max_stage_failures {
                warn!(
                    sweep,
                    consecutive_failures, "stage failures exhausted, column diverged"
                );
                return Err(ColumnError::ColumnDivergence {
                    sweeps: sweep,
                    residual,
                    reason: format!(
                        "{consecutive_failures} consecutive sweeps with non-converged stages"
                    ),
                    partial: Box::new(ColumnState::from_stages(config, stages, sweep)?),
                });
            }
            continue;
        }
        consecutive_failures = 0;

        if residual < options.tolerance {
            emit(ColumnProgressEvent::Converged {
                sweeps: sweep,
                residual,
            });
            let state = ColumnState::from_stages(config, stages, sweep)?;
            return Ok((state, ConvergenceRecord::converged(sweep, residual)));
        }
    }

    warn!(
        max_sweeps = options.max_sweeps,
        residual, "column sweep cap reached"
    );
    let state = ColumnState::from_stages(config, stages, options.max_sweeps)?;
    Ok((
        state,
        ConvergenceRecord::unconverged(options.max_sweeps, residual),
    ))
}

enum StageFailure {
    /// Stage failed its retry; the record holds the best estimate.
    Recovered(Box<StageRecord>),
    Fatal(ColumnError),
}

impl From<ColumnError> for StageFailure {
    fn from(err: ColumnError) -> Self {
        StageFailure::Fatal(err)
    }
}

fn solve_stage_at(
    config: &ColumnConfig,
    feed: &FeedPortions,
    stages: &[StageRecord],
    j: usize,
) -> Result<StageRecord, StageFailure> {
    let n = stages.len();
    let inlets = stage_inlets(config, feed, stages, j)?;
    let spec = stage_spec(config, &inlets, j);

    let stage_config = StageConfig {
        package: &config.package,
        ordinal: stages[j].ordinal(),
        pressure: stages[j].pressure,
        spec,
        guess: stages[j].guess(),
        options: config.options.stage,
    };

    let (outlets, convergence, failed) =
        match solve_stage_with_retry(&stage_config, &inlets, config.options.retry_relaxation) {
            Ok((outlets, record)) => (outlets, record, false),
            Err(ColumnError::StageNonConvergence { best, .. }) => {
                let (outlets, record) = *best;
                (outlets, record, true)
            }
            Err(err) => return Err(StageFailure::Fatal(err)),
        };

    let (liquid_draw, vapor_draw) = if j == 0 {
        match config.condenser {
            CondenserKind::Total => (
                outlets.liquid.flow() / (config.reflux_ratio + 1.0),
                outlets.vapor.flow(),
            ),
            CondenserKind::Partial => (0.0, outlets.vapor.flow()),
        }
    } else if j == n - 1 {
        (outlets.liquid.flow(), 0.0)
    } else {
        side_draw_flows(config, j, outlets.liquid.flow(), outlets.vapor.flow())
    };

    let record = StageRecord {
        id: stages[j].id,
        kind: stages[j].kind,
        temperature: outlets.temperature,
        pressure: stages[j].pressure,
        liquid: outlets.liquid,
        liquid_phases: outlets.liquid_phases,
        vapor: outlets.vapor,
        liquid_draw,
        vapor_draw,
        duty: outlets.duty,
        k_values: outlets.k_values,
        vlle: outlets.vlle,
        convergence,
    };
    if failed {
        Err(StageFailure::Recovered(Box::new(record)))
    } else {
        Ok(record)
    }
}

fn stage_spec(config: &ColumnConfig, inlets: &InletStreams, j: usize) -> StageSpec {
    let n = config.stages;
    let r = config.reflux_ratio;
    if j == 0 {
        match config.condenser {
            CondenserKind::Total => StageSpec::VaporFraction(0.0),
            CondenserKind::Partial => StageSpec::VaporFraction(1.0 / (r + 1.0)),
        }
    } else if j == n - 1 {
        let total = inlets.total_flow();
        let beta = if total > 0.0 {
            ((total - config.bottoms_rate()) / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        StageSpec::VaporFraction(beta)
    } else if j == config.feed.stage.idx() {
        StageSpec::Duty(config.feed_duty_w())
    } else {
        StageSpec::Duty(0.0)
    }
}

/// Streams entering stage `j` given the current records of its neighbours.
///
/// A VLLE stage sends both liquid phases down in the proportion they leave.
pub(crate) fn stage_inlets(
    config: &ColumnConfig,
    feed: &FeedPortions,
    stages: &[StageRecord],
    j: usize,
) -> ColumnResult<InletStreams> {
    let mut inlets = InletStreams::new();
    if j > 0 {
        let above = &stages[j - 1];
        let total = above.liquid.flow();
        if total > 0.0 {
            let factor = above.liquid_down() / total;
            for phase in &above.liquid_phases {
                inlets.push(phase.with_flow(phase.flow() * factor)?);
            }
        }
    }
    if let Some(below) = stages.get(j + 1) {
        inlets.push(below.vapor.with_flow(below.vapor_up())?);
    }
    if j == config.feed.stage.idx() {
        feed.add_to(&mut inlets);
    }
    Ok(inlets)
}

/// Side draws on stage `j` capped at the available streams.
fn side_draw_flows(
    config: &ColumnConfig,
    j: usize,
    liquid: MolarFlow,
    vapor: MolarFlow,
) -> (MolarFlow, MolarFlow) {
    let (mut l_draw, mut v_draw) = (0.0, 0.0);
    for draw in config.side_draws.iter().filter(|d| d.stage.idx() == j) {
        if draw.phase == Phase::Vapor {
            v_draw = (v_draw + draw.flow).min(vapor);
        } else {
            l_draw = (l_draw + draw.flow).min(liquid);
        }
    }
    (l_draw, v_draw)
}

fn side_products(
    config: &ColumnConfig,
    stages: &[StageRecord],
) -> ColumnResult<Vec<MixtureState>> {
    let mut taken = vec![(0.0_f64, 0.0_f64); stages.len()];
    let mut products = Vec::with_capacity(config.side_draws.len());
    for draw in &config.side_draws {
        let j = draw.stage.idx();
        let stage = &stages[j];
        let product = if draw.phase == Phase::Vapor {
            let flow = draw.flow.min(stage.vapor_draw - taken[j].1).max(0.0);
            taken[j].1 += flow;
            stage.vapor.with_flow(flow)?
        } else {
            let flow = draw.flow.min(stage.liquid_draw - taken[j].0).max(0.0);
            taken[j].0 += flow;
            stage.liquid.with_flow(flow)?
        };
        products.push(product);
    }
    Ok(products)
}

fn warm_start(config: &ColumnConfig, state: &ColumnState) -> ColumnResult<Vec<StageRecord>> {
    if state.stages.len() != config.stages {
        return Err(ColumnError::invalid(format!(
            "initial state has {} stages, configuration has {}",
            state.stages.len(),
            config.stages
        )));
    }
    let nc = config.package.component_count();
    if state
        .stages
        .iter()
        .any(|s| s.liquid.composition().len() != nc || s.vapor.composition().len() != nc)
    {
        return Err(ColumnError::invalid(
            "initial state component count does not match the property package",
        ));
    }
    Ok(state.stages.clone())
}

/// Scaled change between two stage arenas.
fn profile_change(old: &[StageRecord], new: &[StageRecord], flow_scale: f64) -> f64 {
    old.iter()
        .zip(new)
        .map(|(a, b)| {
            let dt = (a.temperature.value - b.temperature.value).abs() / TEMPERATURE_SCALE_K;
            let dx: f64 = a
                .liquid
                .composition()
                .iter()
                .zip(b.liquid.composition().iter())
                .map(|(p, q)| (p - q).abs())
                .sum();
            let dy: f64 = a
                .vapor
                .composition()
                .iter()
                .zip(b.vapor.composition().iter())
                .map(|(p, q)| (p - q).abs())
                .sum();
            let dl = (a.liquid.flow() - b.liquid.flow()).abs() / flow_scale;
            let dv = (a.vapor.flow() - b.vapor.flow()).abs() / flow_scale;
            dt + dx + dy + dl + dv
        })
        .sum()
}
