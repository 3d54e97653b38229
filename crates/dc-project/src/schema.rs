//! Project schema definitions.
//!
//! Units are carried in field names (`_pa`, `_k`, `_mol_s`, `_w`). Stage
//! numbers are 1-based with stage 1 the condenser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    pub components: Vec<ComponentDef>,
    #[serde(default)]
    pub activity: ActivityDef,
    pub column: ColumnDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationDef>,
}

impl Project {
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(ComponentDef::name).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ComponentDef {
    /// Built-in data looked up by name.
    Catalog { name: String },
    Explicit {
        name: String,
        molecular_weight: f64,
        heat_of_vaporization_j_per_mol: f64,
        vapor_pressure: VaporPressureDef,
        t_min_k: f64,
        t_max_k: f64,
        liquid_density: LiquidDensityDef,
        cp_liquid_j_per_mol_k: f64,
        cp_vapor_j_per_mol_k: f64,
    },
}

impl ComponentDef {
    pub fn name(&self) -> &str {
        match self {
            ComponentDef::Catalog { name } | ComponentDef::Explicit { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum VaporPressureDef {
    /// `ln(P / Pa) = a - b / (T / K + c)`
    Antoine { a: f64, b: f64, c: f64 },
    ClausiusClapeyron { p_ref_pa: f64, t_ref_k: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LiquidDensityDef {
    Constant { kg_per_m3: f64 },
    Dippr105 { a: f64, b: f64, c: f64, d: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type")]
pub enum ActivityDef {
    #[default]
    Ideal,
    /// `tau_ij = a_ij + b_ij / T`; row-major square matrices in component order.
    Nrtl {
        a: Vec<Vec<f64>>,
        b: Vec<Vec<f64>>,
        alpha: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    pub stages: usize,
    #[serde(default)]
    pub condenser: CondenserDef,
    pub reflux_ratio: f64,
    pub pressure: PressureDef,
    pub feed: FeedDef,
    pub product: ProductDef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_draws: Vec<SideDrawDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CondenserDef {
    #[default]
    Total,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PressureDef {
    Uniform { pressure_pa: f64 },
    Linear { top_pa: f64, bottom_pa: f64 },
    PerStage { pressures_pa: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedDef {
    pub stage: u32,
    pub flow_mol_s: f64,
    /// Mole fraction by component name; unlisted components are absent.
    pub composition: BTreeMap<String, f64>,
    pub condition: FeedConditionDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duty_w: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FeedConditionDef {
    SaturatedLiquid,
    SaturatedVapor,
    VaporFraction { fraction: f64 },
    Temperature { temperature_k: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ProductDef {
    DistillateRate { flow_mol_s: f64 },
    DistillateToFeed { ratio: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SideDrawDef {
    pub stage: u32,
    pub phase: DrawPhaseDef,
    pub flow_mol_s: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrawPhaseDef {
    Liquid,
    Vapor,
}

/// Overrides of the column solver defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SolverDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sweeps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stage_failures: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_relaxation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta_correction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization: Option<InitializationDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_max_iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_relaxation: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitializationDef {
    Linear,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationDef {
    pub bounds: RefluxBoundsDef,
    #[serde(default)]
    pub cost: CostDef,
    pub constraints: Vec<ConstraintDef>,
    #[serde(default)]
    pub strategy: StrategyDef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RefluxBoundsDef {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostDef {
    pub condenser_cost_per_w: f64,
    pub reboiler_cost_per_w: f64,
    pub capital_coefficient: f64,
}

impl Default for CostDef {
    fn default() -> Self {
        Self {
            condenser_cost_per_w: 1e-7,
            reboiler_cost_per_w: 3e-7,
            capital_coefficient: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ConstraintDef {
    DistillatePurity { component: String, minimum: f64 },
    BottomsPurity { component: String, minimum: f64 },
    DistillateRecovery { component: String, minimum: f64 },
    BottomsRecovery { component: String, minimum: f64 },
}

impl ConstraintDef {
    pub fn component(&self) -> &str {
        match self {
            ConstraintDef::DistillatePurity { component, .. }
            | ConstraintDef::BottomsPurity { component, .. }
            | ConstraintDef::DistillateRecovery { component, .. }
            | ConstraintDef::BottomsRecovery { component, .. } => component,
        }
    }

    pub fn minimum(&self) -> f64 {
        match self {
            ConstraintDef::DistillatePurity { minimum, .. }
            | ConstraintDef::BottomsPurity { minimum, .. }
            | ConstraintDef::DistillateRecovery { minimum, .. }
            | ConstraintDef::BottomsRecovery { minimum, .. } => *minimum,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StrategyDef {
    GridScan {
        #[serde(default = "default_grid_scan_points")]
        points: usize,
    },
    GoldenSection {
        #[serde(default = "default_search_tolerance")]
        tolerance: f64,
        #[serde(default = "default_search_iterations")]
        max_iterations: usize,
    },
    Brent {
        #[serde(default = "default_search_tolerance")]
        tolerance: f64,
        #[serde(default = "default_search_iterations")]
        max_iterations: usize,
    },
    BracketThenRefine {
        #[serde(default = "default_bracket_points")]
        grid_points: usize,
        #[serde(default = "default_search_tolerance")]
        tolerance: f64,
        #[serde(default = "default_search_iterations")]
        max_iterations: usize,
    },
}

impl Default for StrategyDef {
    fn default() -> Self {
        StrategyDef::BracketThenRefine {
            grid_points: default_bracket_points(),
            tolerance: default_search_tolerance(),
            max_iterations: default_search_iterations(),
        }
    }
}

fn default_grid_scan_points() -> usize {
    17
}

fn default_bracket_points() -> usize {
    9
}

fn default_search_tolerance() -> f64 {
    1e-4
}

fn default_search_iterations() -> usize {
    100
}
