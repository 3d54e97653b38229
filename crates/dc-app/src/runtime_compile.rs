//! Conversion of a validated project into solver inputs.

use std::sync::Arc;

use dc_column::{
    ColumnConfig, ColumnOptions, CondenserKind, FeedCondition, FeedSpec, InitializationStrategy,
    PressureProfile, ProductSpec, SideDraw,
};
use dc_core::units::{k, pa, watts};
use dc_core::{ComponentId, StageId};
use dc_optim::{
    BracketThenRefine, Brent, CostModel, GoldenSection, GridScan, RefluxBounds, SearchStrategy,
    SeparationConstraint, SeparationSpec,
};
use dc_project::schema::{
    ActivityDef, ColumnDef, ComponentDef, CondenserDef, ConstraintDef, DrawPhaseDef,
    FeedConditionDef, InitializationDef, LiquidDensityDef, OptimizationDef, PressureDef,
    ProductDef, Project, SolverDef, StrategyDef, VaporPressureDef,
};
use dc_thermo::{
    Component, Composition, LiquidDensity, Nrtl, Phase, PropertyPackage, PropertyTable,
    VaporPressure, catalog,
};
use nalgebra::DMatrix;

use crate::error::{AppError, AppResult};

/// Optimization inputs compiled from the project.
#[derive(Debug)]
pub struct OptimizationSetup {
    pub cost: CostModel,
    pub constraint: SeparationConstraint,
    pub bounds: RefluxBounds,
    pub strategy: Box<dyn SearchStrategy>,
}

#[derive(Debug)]
pub struct CompiledProject {
    pub component_names: Vec<String>,
    pub column: ColumnConfig,
    pub optimization: Option<OptimizationSetup>,
}

pub fn compile_project(project: &Project) -> AppResult<CompiledProject> {
    let package = build_package(project)?;
    let column = build_column(project, package)?;
    let optimization = project
        .optimization
        .as_ref()
        .map(|def| build_optimization(project, def))
        .transpose()?;
    Ok(CompiledProject {
        component_names: project
            .component_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        column,
        optimization,
    })
}

fn component_index(project: &Project, name: &str) -> AppResult<ComponentId> {
    project
        .components
        .iter()
        .position(|c| c.name() == name)
        .map(|i| ComponentId::from_index(i as u32))
        .ok_or_else(|| AppError::Compile(format!("unknown component '{name}'")))
}

pub fn build_component(def: &ComponentDef) -> AppResult<Component> {
    match def {
        ComponentDef::Catalog { name } => catalog::lookup(name)
            .ok_or_else(|| AppError::Compile(format!("'{name}' is not in the component catalog"))),
        ComponentDef::Explicit {
            name,
            molecular_weight,
            heat_of_vaporization_j_per_mol,
            vapor_pressure,
            t_min_k,
            t_max_k,
            liquid_density,
            cp_liquid_j_per_mol_k,
            cp_vapor_j_per_mol_k,
        } => Ok(Component {
            name: name.clone(),
            molecular_weight: *molecular_weight,
            heat_of_vaporization: *heat_of_vaporization_j_per_mol,
            vapor_pressure: match *vapor_pressure {
                VaporPressureDef::Antoine { a, b, c } => VaporPressure::Antoine { a, b, c },
                VaporPressureDef::ClausiusClapeyron { p_ref_pa, t_ref_k } => {
                    VaporPressure::ClausiusClapeyron { p_ref_pa, t_ref_k }
                }
            },
            t_min_k: *t_min_k,
            t_max_k: *t_max_k,
            liquid_density: match *liquid_density {
                LiquidDensityDef::Constant { kg_per_m3 } => LiquidDensity::Constant { kg_per_m3 },
                LiquidDensityDef::Dippr105 { a, b, c, d } => LiquidDensity::Dippr105 { a, b, c, d },
            },
            cp_liquid: *cp_liquid_j_per_mol_k,
            cp_vapor: *cp_vapor_j_per_mol_k,
        }),
    }
}

pub fn build_package(project: &Project) -> AppResult<PropertyPackage> {
    let components = project
        .components
        .iter()
        .map(build_component)
        .collect::<AppResult<Vec<_>>>()?;
    let table = Arc::new(PropertyTable::new(components)?);
    match &project.activity {
        ActivityDef::Ideal => Ok(PropertyPackage::ideal(table)),
        ActivityDef::Nrtl { a, b, alpha } => {
            let n = table.len();
            let nrtl = Nrtl::new(matrix(a, n)?, matrix(b, n)?, matrix(alpha, n)?)?;
            Ok(PropertyPackage::new(table, Arc::new(nrtl))?)
        }
    }
}

fn matrix(rows: &[Vec<f64>], n: usize) -> AppResult<DMatrix<f64>> {
    if rows.len() != n || rows.iter().any(|r| r.len() != n) {
        return Err(AppError::Compile(format!(
            "activity matrix must be {n}x{n}"
        )));
    }
    Ok(DMatrix::from_fn(n, n, |i, j| rows[i][j]))
}

pub fn build_column(project: &Project, package: PropertyPackage) -> AppResult<ColumnConfig> {
    let def: &ColumnDef = &project.column;
    let nc = package.component_count();

    let mut fractions = vec![0.0; nc];
    for (name, x) in &def.feed.composition {
        fractions[component_index(project, name)?.idx()] = *x;
    }
    let composition = Composition::new(fractions)?;

    let condition = match def.feed.condition {
        FeedConditionDef::SaturatedLiquid => FeedCondition::SaturatedLiquid,
        FeedConditionDef::SaturatedVapor => FeedCondition::SaturatedVapor,
        FeedConditionDef::VaporFraction { fraction } => FeedCondition::VaporFraction(fraction),
        FeedConditionDef::Temperature { temperature_k } => {
            FeedCondition::Temperature(k(temperature_k))
        }
    };

    let pressure = match &def.pressure {
        PressureDef::Uniform { pressure_pa } => PressureProfile::Uniform(pa(*pressure_pa)),
        PressureDef::Linear { top_pa, bottom_pa } => PressureProfile::Linear {
            top: pa(*top_pa),
            bottom: pa(*bottom_pa),
        },
        PressureDef::PerStage { pressures_pa } => {
            PressureProfile::PerStage(pressures_pa.iter().map(|p| pa(*p)).collect())
        }
    };

    let product = match def.product {
        ProductDef::DistillateRate { flow_mol_s } => ProductSpec::DistillateRate(flow_mol_s),
        ProductDef::DistillateToFeed { ratio } => ProductSpec::DistillateToFeed(ratio),
    };

    let side_draws = def
        .side_draws
        .iter()
        .map(|d| SideDraw {
            stage: stage_id(d.stage),
            phase: match d.phase {
                DrawPhaseDef::Liquid => Phase::Liquid,
                DrawPhaseDef::Vapor => Phase::Vapor,
            },
            flow: d.flow_mol_s,
        })
        .collect();

    let config = ColumnConfig {
        package,
        stages: def.stages,
        feed: FeedSpec {
            stage: stage_id(def.feed.stage),
            flow: def.feed.flow_mol_s,
            composition,
            condition,
            duty: def.feed.duty_w.map(watts),
        },
        reflux_ratio: def.reflux_ratio,
        product,
        condenser: match def.condenser {
            CondenserDef::Total => CondenserKind::Total,
            CondenserDef::Partial => CondenserKind::Partial,
        },
        pressure,
        side_draws,
        options: solver_options(def.solver.as_ref()),
    };
    config.validate()?;
    Ok(config)
}

/// Project stage numbers are 1-based.
fn stage_id(ordinal: u32) -> StageId {
    StageId::from_index(ordinal.saturating_sub(1))
}

fn solver_options(def: Option<&SolverDef>) -> ColumnOptions {
    let mut options = ColumnOptions::default();
    let Some(def) = def else {
        return options;
    };
    if let Some(v) = def.max_sweeps {
        options.max_sweeps = v;
    }
    if let Some(v) = def.tolerance {
        options.tolerance = v;
    }
    if let Some(v) = def.max_stage_failures {
        options.max_stage_failures = v;
    }
    if let Some(v) = def.retry_relaxation {
        options.retry_relaxation = v;
    }
    if let Some(v) = def.theta_correction {
        options.theta_correction = v;
    }
    if let Some(v) = def.initialization {
        options.initialization = match v {
            InitializationDef::Linear => InitializationStrategy::Linear,
            InitializationDef::Flat => InitializationStrategy::Flat,
        };
    }
    if let Some(v) = def.stage_max_iterations {
        options.stage.max_iterations = v;
    }
    if let Some(v) = def.stage_relaxation {
        options.stage.relaxation = v;
    }
    options
}

pub fn build_optimization(project: &Project, def: &OptimizationDef) -> AppResult<OptimizationSetup> {
    let specs = def
        .constraints
        .iter()
        .map(|c| {
            let component = component_index(project, c.component())?;
            let minimum = c.minimum();
            Ok(match c {
                ConstraintDef::DistillatePurity { .. } => {
                    SeparationSpec::DistillatePurity { component, minimum }
                }
                ConstraintDef::BottomsPurity { .. } => {
                    SeparationSpec::BottomsPurity { component, minimum }
                }
                ConstraintDef::DistillateRecovery { .. } => {
                    SeparationSpec::DistillateRecovery { component, minimum }
                }
                ConstraintDef::BottomsRecovery { .. } => {
                    SeparationSpec::BottomsRecovery { component, minimum }
                }
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(OptimizationSetup {
        cost: CostModel {
            condenser_cost: def.cost.condenser_cost_per_w,
            reboiler_cost: def.cost.reboiler_cost_per_w,
            capital_coefficient: def.cost.capital_coefficient,
        },
        constraint: SeparationConstraint::new(specs),
        bounds: RefluxBounds::new(def.bounds.min, def.bounds.max)?,
        strategy: build_strategy(def.strategy),
    })
}

pub fn build_strategy(def: StrategyDef) -> Box<dyn SearchStrategy> {
    match def {
        StrategyDef::GridScan { points } => Box::new(GridScan { points }),
        StrategyDef::GoldenSection {
            tolerance,
            max_iterations,
        } => Box::new(GoldenSection {
            tolerance,
            max_iterations,
        }),
        StrategyDef::Brent {
            tolerance,
            max_iterations,
        } => Box::new(Brent {
            tolerance,
            max_iterations,
        }),
        StrategyDef::BracketThenRefine {
            grid_points,
            tolerance,
            max_iterations,
        } => Box::new(BracketThenRefine {
            grid_points,
            tolerance,
            max_iterations,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(name: &str) -> Project {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../demos/projects")
            .join(name);
        dc_project::load_yaml(&path).unwrap()
    }

    #[test]
    fn catalog_project_compiles_to_column_config() {
        let compiled = compile_project(&demo("01_btx_simulate.yaml")).unwrap();
        let column = &compiled.column;
        assert_eq!(compiled.component_names, vec!["benzene", "toluene", "o-xylene"]);
        assert_eq!(column.stages, 15);
        assert_eq!(column.feed.stage.ordinal(), 8);
        assert_eq!(column.feed.composition.get(2), 0.2);
        assert_eq!(column.side_draws.len(), 1);
        assert_eq!(column.side_draws[0].stage.ordinal(), 11);
        assert!((column.stage_pressure(14).value - 121_325.0).abs() < 1e-9);
        assert!(column.package.is_ideal());
        assert!(compiled.optimization.is_none());
    }

    #[test]
    fn optimization_section_compiles() {
        let compiled = compile_project(&demo("02_binary_optimize.yaml")).unwrap();
        let setup = compiled.optimization.unwrap();
        assert_eq!(setup.bounds, RefluxBounds { min: 1.0, max: 5.0 });
        assert_eq!(setup.strategy.name(), "bracket_then_refine");
        assert_eq!(
            setup.constraint.specs,
            vec![SeparationSpec::DistillatePurity {
                component: ComponentId::from_index(0),
                minimum: 0.95
            }]
        );
        assert_eq!(setup.cost, CostModel::default());
    }

    #[test]
    fn nrtl_project_gets_non_ideal_package() {
        let compiled = compile_project(&demo("03_heterogeneous_nrtl.yaml")).unwrap();
        assert!(!compiled.column.package.is_ideal());
        assert_eq!(compiled.column.condenser, CondenserKind::Partial);
        assert_eq!(compiled.column.options.max_sweeps, 2000);
        assert_eq!(compiled.column.distillate_rate(), 4.0);
    }

    #[test]
    fn unknown_catalog_name_fails_compilation() {
        let mut project = demo("01_btx_simulate.yaml");
        project.components[2] = ComponentDef::Catalog {
            name: "unobtainium".to_string(),
        };
        assert!(matches!(
            compile_project(&project),
            Err(AppError::Compile(_))
        ));
    }
}
