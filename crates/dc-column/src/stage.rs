//! Single stage mass and energy balance.
//!
//! A stage mixes its inlets, fixes either its heat duty or its vapor
//! fraction, and finds the equilibrium temperature with the bracketed root
//! finder from `dc-core`. Each trial temperature runs a flash through the
//! equilibrium engine in `dc-thermo`.

use crate::config::StageOptions;
use crate::convergence::ConvergenceRecord;
use crate::error::{ColumnError, ColumnResult};
use dc_core::units::{MolarFlow, Power, Pressure, Temperature, k, watts};
use dc_core::{RootOptions, find_root};
use dc_thermo::enthalpy::{liquid_enthalpy, liquid_temperature, vapor_enthalpy, vapor_temperature};
use dc_thermo::{
    Composition, EquilibriumResult, FlashOutcome, LiquidSplit, MixtureState, Phase,
    PropertyPackage, PropertyTable, SaturationPoint, ThermoResult, bubble_point, dew_point,
    find_liquid_split, fixed_fraction_flash, isothermal_flash_from,
};
use nalgebra::{DMatrix, DVector};
use tracing::{trace, warn};

/// Inlet total below which a stage is treated as empty, mol/s.
pub const ZERO_FLOW: MolarFlow = 1e-12;

/// Saturation interval narrower than this is treated as a pure component, K.
const PURE_COMPONENT_SPAN: f64 = 1e-9;

/// Largest vapor fraction mismatch still accepted as on target.
const VAPOR_FRACTION_TOLERANCE: f64 = 1e-6;

/// Balance residual allowed in a three-phase closure.
const THREE_PHASE_BALANCE: f64 = 1e-9;

/// Residual charged for an attempt that produced no solution at all.
const FAILED_ATTEMPT_RESIDUAL: f64 = 1.0;

/// What fixes the stage temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageSpec {
    /// Heat added to the stage, W. Zero for adiabatic trays.
    Duty(f64),
    /// Molar fraction of the stage outflow leaving as vapor.
    VaporFraction(f64),
}

/// Starting point and fallback values for a stage solve.
#[derive(Debug, Clone)]
pub struct StageGuess {
    pub temperature: Temperature,
    pub liquid: Composition,
    pub vapor: Composition,
}

#[derive(Debug, Clone)]
pub struct StageConfig<'a> {
    pub package: &'a PropertyPackage,
    /// 1-based position, used in diagnostics.
    pub ordinal: u32,
    pub pressure: Pressure,
    pub spec: StageSpec,
    pub guess: StageGuess,
    pub options: StageOptions,
}

/// All streams entering a stage.
#[derive(Debug, Clone, Default)]
pub struct InletStreams {
    pub streams: Vec<MixtureState>,
}

impl InletStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stream: MixtureState) {
        if stream.flow() > 0.0 {
            self.streams.push(stream);
        }
    }

    pub fn total_flow(&self) -> MolarFlow {
        self.streams.iter().map(|s| s.flow()).sum()
    }

    pub fn component_flows(&self, n: usize) -> Vec<f64> {
        let mut flows = vec![0.0; n];
        for s in &self.streams {
            for (f, x) in flows.iter_mut().zip(s.composition().iter()) {
                *f += x * s.flow();
            }
        }
        flows
    }

    /// W
    pub fn enthalpy_rate(&self, package: &PropertyPackage) -> f64 {
        self.streams
            .iter()
            .map(|s| s.enthalpy_rate(package.table()))
            .sum()
    }
}

/// Streams leaving a stage at its equilibrium temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct OutletStreams {
    pub temperature: Temperature,
    /// Overall liquid.
    pub liquid: MixtureState,
    /// One entry, or two for a VLLE stage (majority phase first).
    pub liquid_phases: Vec<MixtureState>,
    pub vapor: MixtureState,
    pub duty: Power,
    /// Empty when the stage is single phase and no equilibrium was evaluated.
    pub k_values: Vec<f64>,
    pub vlle: bool,
}

impl OutletStreams {
    pub fn total_flow(&self) -> MolarFlow {
        self.liquid.flow() + self.vapor.flow()
    }
}

/// Phase split found at the stage temperature.
struct StageSplit {
    t_k: f64,
    beta: f64,
    liquid: Vec<f64>,
    vapor: Vec<f64>,
    equilibrium: Option<EquilibriumResult>,
}

impl StageSplit {
    fn from_flash(t_k: f64, flash: FlashOutcome) -> Self {
        Self {
            t_k,
            beta: flash.vapor_fraction,
            liquid: flash.liquid.fractions().to_vec(),
            vapor: flash.vapor.fractions().to_vec(),
            equilibrium: Some(flash.equilibrium),
        }
    }

    /// Molar enthalpy of the combined outflow, J/mol.
    fn enthalpy(&self, table: &PropertyTable) -> f64 {
        (1.0 - self.beta) * liquid_enthalpy(table, &self.liquid, self.t_k)
            + self.beta * vapor_enthalpy(table, &self.vapor, self.t_k)
    }
}

/// Flashes at successive trial temperatures, each seeded with the liquid
/// found at the previous one.
struct WarmFlash<'a> {
    package: &'a PropertyPackage,
    z: &'a Composition,
    pressure: Pressure,
    liquid: Composition,
}

impl WarmFlash<'_> {
    fn at(&mut self, t_k: f64) -> ThermoResult<FlashOutcome> {
        let flash =
            isothermal_flash_from(self.package, self.z, k(t_k), self.pressure, Some(&self.liquid))?;
        if flash.vapor_fraction < 1.0 {
            self.liquid = flash.liquid.clone();
        }
        Ok(flash)
    }
}

/// Condition closing a three-phase balance.
#[derive(Debug, Clone, Copy)]
enum ThreePhaseClosure {
    /// Molar enthalpy of the outflow, J/mol.
    Enthalpy(f64),
    VaporFraction(f64),
}

/// Solve one stage from its inlets.
///
/// Returns the best estimate with `converged = false` when the temperature
/// iteration runs out; the caller decides whether that is fatal.
pub fn solve_stage(
    config: &StageConfig<'_>,
    inlets: &InletStreams,
) -> ColumnResult<(OutletStreams, ConvergenceRecord)> {
    let package = config.package;
    let table = package.table();
    let n = table.len();
    let total = inlets.total_flow();

    if total <= ZERO_FLOW {
        return empty_stage(config);
    }

    let z = Composition::from_amounts(inlets.component_flows(n))?;
    let h_in = inlets.enthalpy_rate(package);
    let root_options = RootOptions {
        x_tol: 1e-12,
        f_tol: 0.0,
        max_iterations: config.options.max_iterations,
        damping: config.options.relaxation,
    };

    let (split, iterations, split_converged, split_residual) = match config.spec {
        StageSpec::Duty(q) => {
            let h = (h_in + q) / total;
            let (bubble, dew) = saturation_bounds(package, &z, config.pressure)?;
            duty_split(package, &z, config.pressure, &bubble, &dew, h, config, root_options)?
        }
        StageSpec::VaporFraction(beta) => vapor_fraction_split(
            package,
            &z,
            config.pressure,
            beta.clamp(0.0, 1.0),
            RootOptions {
                f_tol: config.options.composition_tolerance,
                ..root_options
            },
            &config.guess.liquid,
        )?,
    };

    let temperature = k(split.t_k);
    let liquid_flow = (1.0 - split.beta) * total;
    let vapor_flow = split.beta * total;
    let liquid_comp = Composition::from_amounts(split.liquid)?;
    let vapor_comp = Composition::from_amounts(split.vapor)?;
    let composition_residual = liquid_comp.sum_residual().max(vapor_comp.sum_residual());

    let liquid = MixtureState::new(
        liquid_comp,
        temperature,
        config.pressure,
        liquid_flow,
        Phase::Liquid,
    )?;
    let vapor = MixtureState::new(vapor_comp, temperature, config.pressure, vapor_flow, Phase::Vapor)?;

    let (liquid_phases, vlle) = match split.equilibrium.as_ref().and_then(|e| e.liquid_split.as_ref()) {
        Some(ls) if liquid_flow > 0.0 => (
            vec![
                MixtureState::new(
                    ls.phase1.clone(),
                    temperature,
                    config.pressure,
                    liquid_flow * (1.0 - ls.phase2_fraction),
                    Phase::Liquid,
                )?,
                MixtureState::new(
                    ls.phase2.clone(),
                    temperature,
                    config.pressure,
                    liquid_flow * ls.phase2_fraction,
                    Phase::Liquid2,
                )?,
            ],
            true,
        ),
        _ => (vec![liquid.clone()], false),
    };

    let h_out = liquid.enthalpy_rate(table) + vapor.enthalpy_rate(table);
    let duty = match config.spec {
        StageSpec::Duty(q) => q,
        StageSpec::VaporFraction(_) => h_out - h_in,
    };

    let residual = split_residual.max(composition_residual);
    let converged = split_converged && composition_residual <= config.options.composition_tolerance;
    trace!(
        stage = config.ordinal,
        t_k = split.t_k,
        beta = split.beta,
        iterations,
        residual,
        converged,
        "stage solved"
    );

    let outlets = OutletStreams {
        temperature,
        liquid,
        liquid_phases,
        vapor,
        duty: watts(duty),
        k_values: split.equilibrium.map(|e| e.k_values).unwrap_or_default(),
        vlle,
    };
    let record = ConvergenceRecord {
        iterations,
        residual,
        converged,
    };
    Ok((outlets, record))
}

/// Solve a stage, retrying once with an under-relaxed temperature update.
///
/// Only physically invalid input is returned as an error. Any other
/// failure inside an attempt counts as an unconverged attempt, and a
/// stage that fails twice is reported as `StageNonConvergence` carrying
/// the better of the two estimates.
pub fn solve_stage_with_retry(
    config: &StageConfig<'_>,
    inlets: &InletStreams,
    retry_relaxation: f64,
) -> ColumnResult<(OutletStreams, ConvergenceRecord)> {
    let first = attempt_stage(config, inlets)?;
    if first.1.converged {
        return Ok(first);
    }
    warn!(
        stage = config.ordinal,
        iterations = first.1.iterations,
        residual = first.1.residual,
        "stage did not converge, retrying with damped update"
    );

    let mut damped = config.clone();
    damped.options.relaxation = retry_relaxation;
    let second = attempt_stage(&damped, inlets)?;
    if second.1.converged {
        return Ok(second);
    }

    let best = if second.1.residual <= first.1.residual {
        second
    } else {
        first
    };
    Err(ColumnError::StageNonConvergence {
        stage: config.ordinal,
        iterations: best.1.iterations,
        residual: best.1.residual,
        best: Box::new(best),
    })
}

fn attempt_stage(
    config: &StageConfig<'_>,
    inlets: &InletStreams,
) -> ColumnResult<(OutletStreams, ConvergenceRecord)> {
    match solve_stage(config, inlets) {
        Err(err) if !err.is_invalid_input() => {
            warn!(stage = config.ordinal, %err, "stage solve failed");
            guess_estimate(config, inlets)
        }
        other => other,
    }
}

/// Outlets at the guessed state that keep the inlet liquid and vapor
/// flows (or the specified vapor fraction), marked unconverged.
fn guess_estimate(
    config: &StageConfig<'_>,
    inlets: &InletStreams,
) -> ColumnResult<(OutletStreams, ConvergenceRecord)> {
    let guess = &config.guess;
    let total = inlets.total_flow();
    let vapor_flow = match config.spec {
        StageSpec::VaporFraction(beta) => beta.clamp(0.0, 1.0) * total,
        StageSpec::Duty(_) => inlets
            .streams
            .iter()
            .filter(|s| !s.phase().is_liquid())
            .map(|s| s.flow())
            .sum(),
    };
    let liquid = MixtureState::new(
        guess.liquid.clone(),
        guess.temperature,
        config.pressure,
        total - vapor_flow,
        Phase::Liquid,
    )?;
    let vapor = MixtureState::new(
        guess.vapor.clone(),
        guess.temperature,
        config.pressure,
        vapor_flow,
        Phase::Vapor,
    )?;
    let table = config.package.table();
    let duty = match config.spec {
        StageSpec::Duty(q) => q,
        StageSpec::VaporFraction(_) => {
            liquid.enthalpy_rate(table) + vapor.enthalpy_rate(table)
                - inlets.enthalpy_rate(config.package)
        }
    };
    let outlets = OutletStreams {
        temperature: guess.temperature,
        liquid_phases: vec![liquid.clone()],
        liquid,
        vapor,
        duty: watts(duty),
        k_values: Vec::new(),
        vlle: false,
    };
    Ok((outlets, ConvergenceRecord::unconverged(0, FAILED_ATTEMPT_RESIDUAL)))
}

fn empty_stage(config: &StageConfig<'_>) -> ColumnResult<(OutletStreams, ConvergenceRecord)> {
    let guess = &config.guess;
    let liquid = MixtureState::new(
        guess.liquid.clone(),
        guess.temperature,
        config.pressure,
        0.0,
        Phase::Liquid,
    )?;
    let vapor = MixtureState::new(
        guess.vapor.clone(),
        guess.temperature,
        config.pressure,
        0.0,
        Phase::Vapor,
    )?;
    let outlets = OutletStreams {
        temperature: guess.temperature,
        liquid_phases: vec![liquid.clone()],
        liquid,
        vapor,
        duty: watts(0.0),
        k_values: Vec::new(),
        vlle: false,
    };
    Ok((outlets, ConvergenceRecord::converged(0, 0.0)))
}

fn saturation_bounds(
    package: &PropertyPackage,
    z: &Composition,
    pressure: Pressure,
) -> ThermoResult<(SaturationPoint, SaturationPoint)> {
    Ok((
        bubble_point(package, z, pressure)?,
        dew_point(package, z, pressure)?,
    ))
}

/// Duty-specified stage: classify the mixed inlet, then root-find the
/// temperature where the outlet enthalpy matches.
///
/// Returns the split, root iterations, whether everything converged and
/// the energy residual relative to the saturation enthalpy span.
#[allow(clippy::too_many_arguments)]
fn duty_split(
    package: &PropertyPackage,
    z: &Composition,
    pressure: Pressure,
    bubble: &SaturationPoint,
    dew: &SaturationPoint,
    h: f64,
    config: &StageConfig<'_>,
    root_options: RootOptions,
) -> ColumnResult<(StageSplit, usize, bool, f64)> {
    let table = package.table();
    let zf = z.fractions();
    let t_b = bubble.temperature.value;
    let t_d = dew.temperature.value;
    let h_b = liquid_enthalpy(table, zf, t_b);
    let h_d = vapor_enthalpy(table, zf, t_d);
    let scale = (h_d - h_b).abs().max(1.0);
    let tol = config.options.energy_tolerance * scale;

    if h <= h_b + tol {
        if h >= h_b - tol {
            return Ok((saturated_liquid(z, bubble), 0, true, (h - h_b).abs() / scale));
        }
        let split = StageSplit {
            t_k: liquid_temperature(table, zf, h),
            beta: 0.0,
            liquid: zf.to_vec(),
            vapor: bubble.incipient.fractions().to_vec(),
            equilibrium: None,
        };
        return Ok((split, 0, true, 0.0));
    }
    if h >= h_d - tol {
        if h <= h_d + tol {
            return Ok((saturated_vapor(z, dew), 0, true, (h - h_d).abs() / scale));
        }
        let split = StageSplit {
            t_k: vapor_temperature(table, zf, h),
            beta: 1.0,
            liquid: dew.incipient.fractions().to_vec(),
            vapor: zf.to_vec(),
            equilibrium: None,
        };
        return Ok((split, 0, true, 0.0));
    }

    if t_d - t_b < PURE_COMPONENT_SPAN {
        let split = StageSplit {
            t_k: t_b,
            beta: (h - h_b) / (h_d - h_b),
            liquid: zf.to_vec(),
            vapor: zf.to_vec(),
            equilibrium: Some(bubble.equilibrium.clone()),
        };
        return Ok((split, 0, true, 0.0));
    }

    // single-phase enthalpy outside the saturation interval keeps the
    // endpoints bracketed whatever the flash reports there
    let mut warm = WarmFlash {
        package,
        z,
        pressure,
        liquid: config.guess.liquid.clone(),
    };
    let energy = |t: f64| -> ThermoResult<f64> {
        if t <= t_b {
            return Ok(liquid_enthalpy(table, zf, t) - h);
        }
        if t >= t_d {
            return Ok(vapor_enthalpy(table, zf, t) - h);
        }
        Ok(StageSplit::from_flash(t, warm.at(t)?).enthalpy(table) - h)
    };
    let options = RootOptions {
        f_tol: tol,
        ..root_options
    };
    let root = find_root(energy, t_b, t_d, "stage energy balance", &options)?;

    let flash = warm.at(root.x)?;
    let flash_converged = flash.converged;
    let mut split = StageSplit::from_flash(root.x, flash);
    let mut residual = (split.enthalpy(table) - h).abs();
    if residual > tol
        && let Some(blend) =
            three_phase_split(package, zf, root.x, pressure, ThreePhaseClosure::Enthalpy(h))?
    {
        let blended = (blend.enthalpy(table) - h).abs();
        if blended < residual {
            split = blend;
            residual = blended;
        }
    }
    let converged = root.converged && flash_converged && residual <= tol;
    Ok((split, root.iterations, converged, residual / scale))
}

fn saturated_liquid(z: &Composition, bubble: &SaturationPoint) -> StageSplit {
    StageSplit {
        t_k: bubble.temperature.value,
        beta: 0.0,
        liquid: z.fractions().to_vec(),
        vapor: bubble.incipient.fractions().to_vec(),
        equilibrium: Some(bubble.equilibrium.clone()),
    }
}

fn saturated_vapor(z: &Composition, dew: &SaturationPoint) -> StageSplit {
    StageSplit {
        t_k: dew.temperature.value,
        beta: 1.0,
        liquid: dew.incipient.fractions().to_vec(),
        vapor: z.fractions().to_vec(),
        equilibrium: Some(dew.equilibrium.clone()),
    }
}

/// Vapor-fraction-specified stage: root-find the temperature where the
/// flash vapor fraction matches `beta`.
///
/// Saturated ends need only the bubble or the dew point. Ideal packages
/// use the Rachford-Rice function at fixed `beta` directly. The last entry
/// of the result is the vapor fraction mismatch.
fn vapor_fraction_split(
    package: &PropertyPackage,
    z: &Composition,
    pressure: Pressure,
    beta: f64,
    options: RootOptions,
    start: &Composition,
) -> ColumnResult<(StageSplit, usize, bool, f64)> {
    if beta <= 0.0 {
        let bubble = bubble_point(package, z, pressure)?;
        return Ok((saturated_liquid(z, &bubble), 0, true, 0.0));
    }
    if beta >= 1.0 {
        let dew = dew_point(package, z, pressure)?;
        return Ok((saturated_vapor(z, &dew), 0, true, 0.0));
    }

    let (bubble, dew) = saturation_bounds(package, z, pressure)?;
    let t_b = bubble.temperature.value;
    let t_d = dew.temperature.value;
    let zf = z.fractions();
    if t_d - t_b < PURE_COMPONENT_SPAN {
        let split = StageSplit {
            t_k: t_b,
            beta,
            liquid: zf.to_vec(),
            vapor: zf.to_vec(),
            equilibrium: Some(bubble.equilibrium),
        };
        return Ok((split, 0, true, 0.0));
    }

    if package.is_ideal() {
        let residual = |t: f64| -> ThermoResult<f64> {
            Ok(fixed_fraction_flash(package, z, t, pressure, beta)?.residual)
        };
        let root = find_root(residual, t_b, t_d, "stage vapor fraction", &options)?;
        let flash = fixed_fraction_flash(package, z, root.x, pressure, beta)?;
        let split = StageSplit {
            t_k: root.x,
            beta,
            liquid: flash.liquid,
            vapor: flash.vapor,
            equilibrium: Some(flash.equilibrium),
        };
        return Ok((split, root.iterations, root.converged && flash.converged, 0.0));
    }

    let mut warm = WarmFlash {
        package,
        z,
        pressure,
        liquid: start.clone(),
    };
    let mismatch = |t: f64| -> ThermoResult<f64> {
        if t <= t_b {
            return Ok(-beta);
        }
        if t >= t_d {
            return Ok(1.0 - beta);
        }
        Ok(warm.at(t)?.vapor_fraction - beta)
    };
    let root = find_root(mismatch, t_b, t_d, "stage vapor fraction", &options)?;

    let flash = warm.at(root.x)?;
    let flash_converged = flash.converged;
    let mut split = StageSplit::from_flash(root.x, flash);
    if (split.beta - beta).abs() > options.f_tol
        && let Some(blend) =
            three_phase_split(package, zf, root.x, pressure, ThreePhaseClosure::VaporFraction(beta))?
    {
        split = blend;
    }

    let gap = (split.beta - beta).abs();
    let on_target = gap <= VAPOR_FRACTION_TOLERANCE;
    if on_target {
        // hold the outflow at exactly `beta`, absorbing the mismatch
        // in the liquid
        let liquid: Vec<f64> = zf
            .iter()
            .zip(&split.vapor)
            .map(|(zi, yi)| (zi - beta * yi) / (1.0 - beta))
            .collect();
        if liquid.iter().all(|v| *v >= 0.0) {
            split.liquid = liquid;
            split.beta = beta;
        }
    }
    let converged = root.converged && flash_converged && on_target;
    Ok((split, root.iterations, converged, gap))
}

/// Amounts of two liquids and a vapor coexisting at `t_k` that reproduce
/// `z` and the closing condition. `None` when `z` does not split at `t_k`
/// or no non-negative amounts satisfy the balance.
///
/// A binary has one three-phase temperature, where the flash cannot tell
/// how much of each phase is present; the stage spec supplies the missing
/// condition.
fn three_phase_split(
    package: &PropertyPackage,
    z: &[f64],
    t_k: f64,
    pressure: Pressure,
    closure: ThreePhaseClosure,
) -> ColumnResult<Option<StageSplit>> {
    if package.is_ideal() {
        return Ok(None);
    }
    let activity = package.activity();
    let Some(liquids) = find_liquid_split(activity, z, t_k)? else {
        return Ok(None);
    };
    let table = package.table();
    let n = z.len();
    let p = pressure.value;
    let psat = table.vapor_pressures(t_k)?;
    let x1 = liquids.phase1.fractions();
    let x2 = liquids.phase2.fractions();
    let ln_gamma_1 = activity.ln_gamma(x1, t_k)?;
    let vapor = Composition::from_amounts(
        (0..n)
            .map(|i| x1[i] * ln_gamma_1[i].exp() * psat[i] / p)
            .collect(),
    )?;
    let y = vapor.fractions();

    let mut a = DMatrix::<f64>::zeros(n + 1, 3);
    let mut b = DVector::<f64>::zeros(n + 1);
    for i in 0..n {
        a[(i, 0)] = x1[i];
        a[(i, 1)] = x2[i];
        a[(i, 2)] = y[i];
        b[i] = z[i];
    }
    match closure {
        ThreePhaseClosure::Enthalpy(h) => {
            let scale = h.abs().max(1.0);
            a[(n, 0)] = liquid_enthalpy(table, x1, t_k) / scale;
            a[(n, 1)] = liquid_enthalpy(table, x2, t_k) / scale;
            a[(n, 2)] = vapor_enthalpy(table, y, t_k) / scale;
            b[n] = h / scale;
        }
        ThreePhaseClosure::VaporFraction(beta) => {
            a[(n, 2)] = 1.0;
            b[n] = beta;
        }
    }
    let Ok(amounts) = a.clone().svd(true, true).solve(&b, 1e-14) else {
        return Ok(None);
    };
    if (&a * &amounts - &b).amax() > THREE_PHASE_BALANCE
        || amounts.iter().any(|v| *v < -THREE_PHASE_BALANCE)
    {
        return Ok(None);
    }

    let (a1, a2) = (amounts[0].max(0.0), amounts[1].max(0.0));
    let beta = amounts[2].clamp(0.0, 1.0);
    let liquid_total = a1 + a2;
    let liquid: Vec<f64> = if liquid_total > 0.0 {
        (0..n)
            .map(|i| (a1 * x1[i] + a2 * x2[i]) / liquid_total)
            .collect()
    } else {
        x1.to_vec()
    };
    let liquid_split = (a1 > 0.0 && a2 > 0.0).then(|| {
        if a1 >= a2 {
            LiquidSplit {
                phase1: liquids.phase1.clone(),
                phase2: liquids.phase2.clone(),
                phase2_fraction: a2 / liquid_total,
            }
        } else {
            LiquidSplit {
                phase1: liquids.phase2.clone(),
                phase2: liquids.phase1.clone(),
                phase2_fraction: a1 / liquid_total,
            }
        }
    });

    let gamma: Vec<f64> = activity
        .ln_gamma(&liquid, t_k)?
        .iter()
        .map(|v| v.exp())
        .collect();
    let k_values = (0..n)
        .map(|i| {
            let ratio = y[i] / liquid[i];
            if liquid[i] > 0.0 && ratio.is_finite() && ratio > 0.0 {
                ratio
            } else {
                gamma[i] * psat[i] / p
            }
        })
        .collect();
    trace!(t_k, a1, a2, beta, "three-phase closure");

    Ok(Some(StageSplit {
        t_k,
        beta,
        liquid,
        vapor: y.to_vec(),
        equilibrium: Some(EquilibriumResult {
            k_values,
            temperature: k(t_k),
            pressure,
            activity_coefficients: gamma,
            liquid_split,
        }),
    }))
}

/// Temperature and phase compositions of `z` split at vapor fraction
/// `beta`, used to resolve partially vaporized feeds.
pub(crate) fn split_at_vapor_fraction(
    package: &PropertyPackage,
    z: &Composition,
    pressure: Pressure,
    beta: f64,
    options: &StageOptions,
) -> ColumnResult<(f64, Composition, Composition)> {
    let root_options = RootOptions {
        x_tol: 1e-12,
        f_tol: options.composition_tolerance,
        max_iterations: options.max_iterations,
        damping: 1.0,
    };
    let (split, _, _, _) = vapor_fraction_split(package, z, pressure, beta, root_options, z)?;
    Ok((
        split.t_k,
        Composition::from_amounts(split.liquid)?,
        Composition::from_amounts(split.vapor)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_core::units::pa;
    use dc_thermo::{ActivityModel, ThermoError, catalog};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Raoult's law behind a non-ideal model whose first `failures` calls
    /// fail.
    #[derive(Debug)]
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl ActivityModel for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn component_count(&self) -> Option<usize> {
            None
        }

        fn ln_gamma(&self, x: &[f64], _t_k: f64) -> ThermoResult<Vec<f64>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(ThermoError::Numeric {
                    what: "activity model unavailable".to_string(),
                });
            }
            Ok(vec![0.0; x.len()])
        }
    }

    fn flaky_package(failures: usize) -> PropertyPackage {
        let table = Arc::new(catalog::table_from_names(&["benzene", "toluene"]).unwrap());
        let model = Flaky {
            failures,
            calls: AtomicUsize::new(0),
        };
        PropertyPackage::new(table, Arc::new(model)).unwrap()
    }

    fn package() -> PropertyPackage {
        let table = Arc::new(catalog::table_from_names(&["benzene", "toluene"]).unwrap());
        PropertyPackage::ideal(table)
    }

    fn stream(x: &[f64], t: f64, flow: f64, phase: Phase) -> MixtureState {
        MixtureState::new(
            Composition::new(x.to_vec()).unwrap(),
            k(t),
            pa(101_325.0),
            flow,
            phase,
        )
        .unwrap()
    }

    fn stage_config(package: &PropertyPackage, spec: StageSpec) -> StageConfig<'_> {
        StageConfig {
            package,
            ordinal: 2,
            pressure: pa(101_325.0),
            spec,
            guess: StageGuess {
                temperature: k(360.0),
                liquid: Composition::uniform(2).unwrap(),
                vapor: Composition::uniform(2).unwrap(),
            },
            options: StageOptions::default(),
        }
    }

    #[test]
    fn adiabatic_stage_conserves_mass_and_energy() {
        let package = package();
        let mut inlets = InletStreams::new();
        inlets.push(stream(&[0.6, 0.4], 358.0, 8.0, Phase::Liquid));
        inlets.push(stream(&[0.4, 0.6], 370.0, 10.0, Phase::Vapor));

        let config = stage_config(&package, StageSpec::Duty(0.0));
        let (out, record) = solve_stage(&config, &inlets).unwrap();
        assert!(record.converged);
        assert!(record.residual < 1e-9);
        assert!((out.total_flow() - 18.0).abs() < 1e-9);

        let table = package.table();
        let h_out = out.liquid.enthalpy_rate(table) + out.vapor.enthalpy_rate(table);
        let h_in = inlets.enthalpy_rate(&package);
        assert!((h_out - h_in).abs() < 1e-6 * h_in.abs());

        let flows_in = inlets.component_flows(2);
        for (i, f) in flows_in.iter().enumerate() {
            let out_i = out.liquid.component_flows()[i] + out.vapor.component_flows()[i];
            assert!((out_i - f).abs() < 1e-9);
        }
        // equilibrium between the outlets
        for i in 0..2 {
            let y = out.vapor.composition().get(i);
            let x = out.liquid.composition().get(i);
            assert!((y - out.k_values[i] * x).abs() < 1e-8);
        }
    }

    #[test]
    fn subcooled_inlet_stays_liquid() {
        let package = package();
        let mut inlets = InletStreams::new();
        inlets.push(stream(&[0.5, 0.5], 320.0, 5.0, Phase::Liquid));

        let config = stage_config(&package, StageSpec::Duty(0.0));
        let (out, record) = solve_stage(&config, &inlets).unwrap();
        assert!(record.converged);
        assert_eq!(out.vapor.flow(), 0.0);
        assert!((out.temperature.value - 320.0).abs() < 1e-9);
        assert!(out.k_values.is_empty());
    }

    #[test]
    fn vapor_fraction_spec_sets_split_and_duty() {
        let package = package();
        let mut inlets = InletStreams::new();
        inlets.push(stream(&[0.5, 0.5], 365.0, 10.0, Phase::Vapor));

        let total = stage_config(&package, StageSpec::VaporFraction(0.0));
        let (out, _) = solve_stage(&total, &inlets).unwrap();
        assert_eq!(out.vapor.flow(), 0.0);
        assert!(out.duty.value < 0.0);

        let partial = stage_config(&package, StageSpec::VaporFraction(0.25));
        let (out, record) = solve_stage(&partial, &inlets).unwrap();
        assert!(record.converged);
        assert!((out.vapor.flow() - 2.5).abs() < 1e-12);
        assert!(out.vapor.composition().get(0) > 0.5);
        assert!(out.liquid.composition().get(0) < 0.5);
    }

    #[test]
    fn empty_stage_returns_guess() {
        let package = package();
        let config = stage_config(&package, StageSpec::Duty(0.0));
        let (out, record) = solve_stage(&config, &InletStreams::new()).unwrap();
        assert_eq!(record, ConvergenceRecord::converged(0, 0.0));
        assert_eq!(out.total_flow(), 0.0);
        assert_eq!(out.temperature.value, 360.0);
    }

    #[test]
    fn starved_iterations_report_failure_with_estimate() {
        let package = package();
        let mut inlets = InletStreams::new();
        inlets.push(stream(&[0.6, 0.4], 358.0, 8.0, Phase::Liquid));
        inlets.push(stream(&[0.4, 0.6], 370.0, 10.0, Phase::Vapor));

        let mut config = stage_config(&package, StageSpec::Duty(0.0));
        config.options.max_iterations = 1;
        let (_, record) = solve_stage(&config, &inlets).unwrap();
        assert!(!record.converged);

        match solve_stage_with_retry(&config, &inlets, 0.5) {
            Err(ColumnError::StageNonConvergence { stage, best, .. }) => {
                assert_eq!(stage, 2);
                assert!((best.0.total_flow() - 18.0).abs() < 1e-9);
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
    }

    fn mixed_inlets() -> InletStreams {
        let mut inlets = InletStreams::new();
        inlets.push(stream(&[0.6, 0.4], 358.0, 8.0, Phase::Liquid));
        inlets.push(stream(&[0.4, 0.6], 370.0, 10.0, Phase::Vapor));
        inlets
    }

    #[test]
    fn inner_failure_is_retried_instead_of_escaping() {
        let package = flaky_package(1);
        let inlets = mixed_inlets();
        let config = stage_config(&package, StageSpec::Duty(0.0));
        let (out, record) = solve_stage_with_retry(&config, &inlets, 0.5).unwrap();
        assert!(record.converged);
        assert!((out.total_flow() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn persistent_inner_failure_reports_guess_estimate() {
        let package = flaky_package(usize::MAX);
        let inlets = mixed_inlets();
        let config = stage_config(&package, StageSpec::Duty(0.0));
        match solve_stage_with_retry(&config, &inlets, 0.5) {
            Err(ColumnError::StageNonConvergence {
                stage,
                residual,
                best,
                ..
            }) => {
                assert_eq!(stage, 2);
                assert!(residual.is_finite());
                let (out, record) = *best;
                assert!(!record.converged);
                assert_eq!(out.temperature.value, 360.0);
                assert!((out.total_flow() - 18.0).abs() < 1e-9);
                assert!((out.vapor.flow() - 10.0).abs() < 1e-9);
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
    }

    #[test]
    fn invalid_input_is_not_retried() {
        let package = package();
        let inlets = mixed_inlets();
        let mut config = stage_config(&package, StageSpec::Duty(0.0));
        config.pressure = pa(-1.0);
        let err = solve_stage_with_retry(&config, &inlets, 0.5).unwrap_err();
        assert!(err.is_invalid_input());
    }
}
