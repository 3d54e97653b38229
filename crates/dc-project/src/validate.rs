//! Project validation logic.
//!
//! Structural checks only: every reference resolves and every number lies
//! in its physical range. Thermodynamic feasibility is left to the solvers.

use crate::schema::{
    ActivityDef, ColumnDef, ComponentDef, FeedConditionDef, OptimizationDef, PressureDef,
    ProductDef, Project, StrategyDef,
};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require(ok: bool, field: &str, value: impl ToString, reason: &str) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(invalid(field, value, reason))
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    require(value.is_finite() && value > 0.0, field, value, "must be positive")
}

fn non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    require(value.is_finite() && value >= 0.0, field, value, "must be non-negative")
}

fn fraction(field: &str, value: f64) -> Result<(), ValidationError> {
    require((0.0..=1.0).contains(&value), field, value, "must lie in [0, 1]")
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version == 0 || project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    if project.components.is_empty() {
        return Err(invalid("components", "[]", "at least one component is required"));
    }
    let mut names = HashSet::new();
    for component in &project.components {
        if !names.insert(component.name()) {
            return Err(ValidationError::DuplicateId {
                id: component.name().to_string(),
                context: "components".to_string(),
            });
        }
        validate_component(component)?;
    }

    validate_activity(&project.activity, project.components.len())?;
    validate_column(&project.column, &names)?;
    if let Some(optimization) = &project.optimization {
        validate_optimization(optimization, &names)?;
    }
    Ok(())
}

fn validate_component(component: &ComponentDef) -> Result<(), ValidationError> {
    let ComponentDef::Explicit {
        name,
        molecular_weight,
        heat_of_vaporization_j_per_mol,
        t_min_k,
        t_max_k,
        cp_liquid_j_per_mol_k,
        cp_vapor_j_per_mol_k,
        ..
    } = component
    else {
        return require(
            !component.name().trim().is_empty(),
            "components.name",
            "''",
            "catalog name must not be empty",
        );
    };
    let field = |f: &str| format!("components.{name}.{f}");
    positive(&field("molecular_weight"), *molecular_weight)?;
    positive(
        &field("heat_of_vaporization_j_per_mol"),
        *heat_of_vaporization_j_per_mol,
    )?;
    positive(&field("t_min_k"), *t_min_k)?;
    require(
        t_max_k.is_finite() && t_max_k > t_min_k,
        &field("t_max_k"),
        t_max_k,
        "must exceed t_min_k",
    )?;
    non_negative(&field("cp_liquid_j_per_mol_k"), *cp_liquid_j_per_mol_k)?;
    non_negative(&field("cp_vapor_j_per_mol_k"), *cp_vapor_j_per_mol_k)?;
    Ok(())
}

fn validate_activity(activity: &ActivityDef, n: usize) -> Result<(), ValidationError> {
    let ActivityDef::Nrtl { a, b, alpha } = activity else {
        return Ok(());
    };
    for (label, matrix) in [("a", a), ("b", b), ("alpha", alpha)] {
        let square = matrix.len() == n && matrix.iter().all(|row| row.len() == n);
        require(
            square,
            &format!("activity.{label}"),
            format!("{}x?", matrix.len()),
            "must be a square matrix over all components",
        )?;
    }
    Ok(())
}

fn validate_column(column: &ColumnDef, names: &HashSet<&str>) -> Result<(), ValidationError> {
    let n = column.stages;
    require(n >= 2, "column.stages", n, "a column needs a condenser and a reboiler")?;
    non_negative("column.reflux_ratio", column.reflux_ratio)?;

    match &column.pressure {
        PressureDef::Uniform { pressure_pa } => positive("column.pressure.pressure_pa", *pressure_pa)?,
        PressureDef::Linear { top_pa, bottom_pa } => {
            positive("column.pressure.top_pa", *top_pa)?;
            positive("column.pressure.bottom_pa", *bottom_pa)?;
        }
        PressureDef::PerStage { pressures_pa } => {
            require(
                pressures_pa.len() == n,
                "column.pressure.pressures_pa",
                pressures_pa.len(),
                "needs one entry per stage",
            )?;
            for p in pressures_pa {
                positive("column.pressure.pressures_pa", *p)?;
            }
        }
    }

    let feed = &column.feed;
    require(
        (1..=n as u32).contains(&feed.stage),
        "column.feed.stage",
        feed.stage,
        "must be a stage of the column",
    )?;
    non_negative("column.feed.flow_mol_s", feed.flow_mol_s)?;
    for (component, x) in &feed.composition {
        if !names.contains(component.as_str()) {
            return Err(ValidationError::MissingReference {
                id: component.clone(),
                context: "column.feed.composition".to_string(),
            });
        }
        fraction(&format!("column.feed.composition.{component}"), *x)?;
    }
    let total: f64 = feed.composition.values().sum();
    require(
        (total - 1.0).abs() <= 1e-6,
        "column.feed.composition",
        total,
        "fractions must sum to 1",
    )?;
    match feed.condition {
        FeedConditionDef::VaporFraction { fraction: q } => {
            fraction("column.feed.condition.fraction", q)?
        }
        FeedConditionDef::Temperature { temperature_k } => {
            positive("column.feed.condition.temperature_k", temperature_k)?
        }
        FeedConditionDef::SaturatedLiquid | FeedConditionDef::SaturatedVapor => {}
    }
    if let Some(duty) = feed.duty_w {
        require(duty.is_finite(), "column.feed.duty_w", duty, "must be finite")?;
        require(
            feed.stage > 1 && (feed.stage as usize) < n,
            "column.feed.duty_w",
            duty,
            "feed duty is only allowed on interior stages",
        )?;
    }

    match column.product {
        ProductDef::DistillateRate { flow_mol_s } => {
            non_negative("column.product.flow_mol_s", flow_mol_s)?;
            require(
                flow_mol_s <= feed.flow_mol_s,
                "column.product.flow_mol_s",
                flow_mol_s,
                "distillate cannot exceed the feed",
            )?;
        }
        ProductDef::DistillateToFeed { ratio } => fraction("column.product.ratio", ratio)?,
    }

    for draw in &column.side_draws {
        require(
            draw.stage > 1 && (draw.stage as usize) < n,
            "column.side_draws.stage",
            draw.stage,
            "side draws are only allowed on interior stages",
        )?;
        non_negative("column.side_draws.flow_mol_s", draw.flow_mol_s)?;
    }

    if let Some(solver) = &column.solver {
        if let Some(sweeps) = solver.max_sweeps {
            require(sweeps > 0, "column.solver.max_sweeps", sweeps, "must be positive")?;
        }
        if let Some(tol) = solver.tolerance {
            positive("column.solver.tolerance", tol)?;
        }
        for (field, value) in [
            ("column.solver.retry_relaxation", solver.retry_relaxation),
            ("column.solver.stage_relaxation", solver.stage_relaxation),
        ] {
            if let Some(w) = value {
                require(w > 0.0 && w <= 1.0, field, w, "must lie in (0, 1]")?;
            }
        }
        if let Some(iterations) = solver.stage_max_iterations {
            require(
                iterations > 0,
                "column.solver.stage_max_iterations",
                iterations,
                "must be positive",
            )?;
        }
    }
    Ok(())
}

fn validate_optimization(
    optimization: &OptimizationDef,
    names: &HashSet<&str>,
) -> Result<(), ValidationError> {
    let bounds = optimization.bounds;
    non_negative("optimization.bounds.min", bounds.min)?;
    require(
        bounds.max.is_finite() && bounds.max > bounds.min,
        "optimization.bounds.max",
        bounds.max,
        "must exceed the lower bound",
    )?;

    let cost = optimization.cost;
    non_negative("optimization.cost.condenser_cost_per_w", cost.condenser_cost_per_w)?;
    non_negative("optimization.cost.reboiler_cost_per_w", cost.reboiler_cost_per_w)?;
    non_negative("optimization.cost.capital_coefficient", cost.capital_coefficient)?;

    if optimization.constraints.is_empty() {
        return Err(invalid(
            "optimization.constraints",
            "[]",
            "at least one constraint is required",
        ));
    }
    for constraint in &optimization.constraints {
        if !names.contains(constraint.component()) {
            return Err(ValidationError::MissingReference {
                id: constraint.component().to_string(),
                context: "optimization.constraints".to_string(),
            });
        }
        fraction("optimization.constraints.minimum", constraint.minimum())?;
    }

    let (tolerance, points) = match optimization.strategy {
        StrategyDef::GridScan { points } => (None, Some((points, 2))),
        StrategyDef::GoldenSection { tolerance, .. } | StrategyDef::Brent { tolerance, .. } => {
            (Some(tolerance), None)
        }
        StrategyDef::BracketThenRefine {
            grid_points,
            tolerance,
            ..
        } => (Some(tolerance), Some((grid_points, 3))),
    };
    if let Some(tolerance) = tolerance {
        positive("optimization.strategy.tolerance", tolerance)?;
    }
    if let Some((points, min)) = points {
        require(
            points >= min,
            "optimization.strategy.points",
            points,
            "too few grid points",
        )?;
    }
    Ok(())
}
