//! Plain report records.
//!
//! Everything here derives `Serialize`/`Deserialize` and holds SI numbers
//! only, so reports can be read back without the solver crates.

use dc_column::{ColumnState, ConvergenceRecord, StageRecord};
use dc_optim::{Candidate, CandidateOutcome, CostBreakdown, OptimalResult};
use dc_thermo::MixtureState;
use serde::{Deserialize, Serialize};

pub type RunId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    pub run_id: RunId,
    pub project_name: String,
    pub timestamp: String,
    pub run_type: RunType,
    pub solver_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunType {
    Simulate {
        reflux_ratio: f64,
    },
    Optimize {
        min: f64,
        max: f64,
        strategy: String,
    },
    Sweep {
        start: f64,
        end: f64,
        points: usize,
        spacing: String,
    },
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Simulate { .. } => "simulate",
            RunType::Optimize { .. } => "optimize",
            RunType::Sweep { .. } => "sweep",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergenceRow {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

impl From<&ConvergenceRecord> for ConvergenceRow {
    fn from(record: &ConvergenceRecord) -> Self {
        Self {
            iterations: record.iterations,
            residual: record.residual,
            converged: record.converged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRow {
    pub stage: u32,
    pub kind: String,
    pub temperature_k: f64,
    pub pressure_pa: f64,
    /// Total liquid leaving, draws included.
    pub liquid_mol_s: f64,
    pub vapor_mol_s: f64,
    pub liquid_draw_mol_s: f64,
    pub vapor_draw_mol_s: f64,
    pub duty_w: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub k_values: Vec<f64>,
    pub vlle: bool,
    pub convergence: ConvergenceRow,
}

impl From<&StageRecord> for StageRow {
    fn from(record: &StageRecord) -> Self {
        Self {
            stage: record.ordinal(),
            kind: record.kind.as_str().to_string(),
            temperature_k: record.temperature.value,
            pressure_pa: record.pressure.value,
            liquid_mol_s: record.liquid.flow(),
            vapor_mol_s: record.vapor.flow(),
            liquid_draw_mol_s: record.liquid_draw,
            vapor_draw_mol_s: record.vapor_draw,
            duty_w: record.duty.value,
            x: record.liquid.composition().fractions().to_vec(),
            y: record.vapor.composition().fractions().to_vec(),
            k_values: record.k_values.clone(),
            vlle: record.vlle,
            convergence: ConvergenceRow::from(&record.convergence),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRow {
    pub name: String,
    pub phase: String,
    pub flow_mol_s: f64,
    pub temperature_k: f64,
    pub composition: Vec<f64>,
}

impl ProductRow {
    fn new(name: impl Into<String>, stream: &MixtureState) -> Self {
        Self {
            name: name.into(),
            phase: stream.phase().as_str().to_string(),
            flow_mol_s: stream.flow(),
            temperature_k: stream.temperature_k(),
            composition: stream.composition().fractions().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnReport {
    pub manifest: RunManifest,
    pub components: Vec<String>,
    pub reflux_ratio: f64,
    pub stages: Vec<StageRow>,
    /// Distillate, bottoms, then side products in configuration order.
    pub products: Vec<ProductRow>,
    pub condenser_duty_w: f64,
    pub reboiler_duty_w: f64,
    pub convergence: ConvergenceRow,
}

impl ColumnReport {
    pub fn new(
        manifest: RunManifest,
        components: Vec<String>,
        state: &ColumnState,
        convergence: &ConvergenceRecord,
    ) -> Self {
        let mut products = vec![
            ProductRow::new("distillate", &state.distillate),
            ProductRow::new("bottoms", &state.bottoms),
        ];
        products.extend(
            state
                .side_products
                .iter()
                .enumerate()
                .map(|(i, s)| ProductRow::new(format!("side_{}", i + 1), s)),
        );
        Self {
            manifest,
            components,
            reflux_ratio: state.reflux_ratio,
            stages: state.stages.iter().map(StageRow::from).collect(),
            products,
            condenser_duty_w: state.condenser_duty.value,
            reboiler_duty_w: state.reboiler_duty.value,
            convergence: ConvergenceRow::from(convergence),
        }
    }

    pub fn product(&self, name: &str) -> Option<&ProductRow> {
        self.products.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostRow {
    pub condenser: f64,
    pub reboiler: f64,
    pub capital: f64,
    pub total: f64,
}

impl From<&CostBreakdown> for CostRow {
    fn from(cost: &CostBreakdown) -> Self {
        Self {
            condenser: cost.condenser,
            reboiler: cost.reboiler,
            capital: cost.capital,
            total: cost.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRow {
    pub reflux_ratio: f64,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<f64>,
    pub objective: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweeps: Option<usize>,
    /// Distillate composition, when the column produced a profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distillate: Vec<f64>,
}

impl From<&Candidate> for CandidateRow {
    fn from(candidate: &Candidate) -> Self {
        let shortfall = match candidate.outcome {
            CandidateOutcome::Infeasible { shortfall } => Some(shortfall),
            _ => None,
        };
        Self {
            reflux_ratio: candidate.reflux_ratio,
            outcome: candidate.outcome.as_str().to_string(),
            shortfall,
            objective: candidate.objective,
            cost: candidate.cost.as_ref().map(CostRow::from),
            sweeps: candidate.convergence.map(|c| c.iterations),
            distillate: candidate
                .state
                .as_ref()
                .map(|s| s.distillate.composition().fractions().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationReport {
    pub reflux_ratio: f64,
    pub strategy: String,
    pub cost: CostRow,
    /// Profile at the chosen reflux ratio.
    pub column: ColumnReport,
    pub candidates: Vec<CandidateRow>,
}

impl OptimizationReport {
    pub fn new(manifest: RunManifest, components: Vec<String>, result: &OptimalResult) -> Self {
        Self {
            reflux_ratio: result.reflux_ratio,
            strategy: result.strategy.to_string(),
            cost: CostRow::from(&result.cost),
            column: ColumnReport::new(manifest, components, &result.state, &result.convergence),
            candidates: result.candidates.iter().map(CandidateRow::from).collect(),
        }
    }

    pub fn manifest(&self) -> &RunManifest {
        &self.column.manifest
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepReport {
    pub manifest: RunManifest,
    pub components: Vec<String>,
    pub candidates: Vec<CandidateRow>,
}

impl SweepReport {
    pub fn new(manifest: RunManifest, components: Vec<String>, candidates: &[Candidate]) -> Self {
        Self {
            manifest,
            components,
            candidates: candidates.iter().map(CandidateRow::from).collect(),
        }
    }
}
