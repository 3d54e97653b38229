//! End-to-end reflux optimization on an ideal binary.

use dc_column::{
    ColumnConfig, ColumnOptions, CondenserKind, FeedCondition, FeedSpec, PressureProfile,
    ProductSpec,
};
use dc_core::units::pa;
use dc_core::{ComponentId, StageId};
use dc_optim::*;
use dc_thermo::{Component, Composition, LiquidDensity, PropertyPackage, PropertyTable, VaporPressure};
use std::sync::Arc;

/// Two components with equal heats of vaporization: constant volatility
/// `p_light / p_heavy`.
fn binary(p_light_atm: f64, p_heavy_atm: f64) -> PropertyPackage {
    let comp = |name: &str, p_ref_atm: f64| Component {
        name: name.into(),
        molecular_weight: 60.0,
        heat_of_vaporization: 30_000.0,
        vapor_pressure: VaporPressure::ClausiusClapeyron {
            p_ref_pa: p_ref_atm * 101_325.0,
            t_ref_k: 350.0,
        },
        t_min_k: 250.0,
        t_max_k: 500.0,
        liquid_density: LiquidDensity::Constant { kg_per_m3: 800.0 },
        cp_liquid: 1.0,
        cp_vapor: 1.0,
    };
    let table = PropertyTable::new(vec![comp("A", p_light_atm), comp("B", p_heavy_atm)]).unwrap();
    PropertyPackage::ideal(Arc::new(table))
}

fn column(package: PropertyPackage, stages: usize, feed_index: u32) -> ColumnConfig {
    ColumnConfig {
        package,
        stages,
        feed: FeedSpec {
            stage: StageId::from_index(feed_index),
            flow: 100.0,
            composition: Composition::new(vec![0.5, 0.5]).unwrap(),
            condition: FeedCondition::SaturatedLiquid,
            duty: None,
        },
        reflux_ratio: 1.0,
        product: ProductSpec::DistillateRate(50.0),
        condenser: CondenserKind::Total,
        pressure: PressureProfile::Uniform(pa(101_325.0)),
        side_draws: Vec::new(),
        options: ColumnOptions::default(),
    }
}

fn light() -> ComponentId {
    ComponentId::from_index(0)
}

/// Reflux at which McCabe-Thiele stepping from `x_D` down nine equilibrium
/// stages (feed on the fifth) lands exactly on `x_B`.
fn mccabe_thiele_reflux(alpha: f64, x_d: f64) -> f64 {
    let (f, d, b) = (100.0, 50.0, 50.0);
    let x_b = (f * 0.5 - d * x_d) / b;
    let bottom_liquid = |r: f64| {
        let (l, v) = (r * d, (r + 1.0) * d);
        let mut y = x_d;
        let mut x = 0.0;
        for stage in 2..=10 {
            x = y / (alpha - (alpha - 1.0) * y);
            y = if stage < 5 {
                (l * x + d * x_d) / v
            } else {
                ((l + f) * x - b * x_b) / v
            };
        }
        x
    };
    let (mut lo, mut hi) = (2.0, 10.0);
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if bottom_liquid(mid) > x_b {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[test]
fn optimum_sits_at_the_purity_boundary() {
    let base = column(binary(1.5, 0.6), 10, 4);
    let constraint = SeparationConstraint::distillate_purity(light(), 0.95);
    let bounds = RefluxBounds::new(1.0, 5.0).unwrap();

    let result = optimize_reflux(&base, &CostModel::default(), &constraint, bounds).unwrap();
    let reference = mccabe_thiele_reflux(2.5, 0.95);
    assert!(
        (result.reflux_ratio - reference).abs() < 0.05 * reference,
        "R* = {} vs stepped {reference}",
        result.reflux_ratio
    );
    assert!(result.state.distillate_fraction(light()) >= 0.95);
    assert!(result.convergence.converged);
    assert_eq!(result.strategy, "bracket_then_refine");

    // no feasible candidate is cheaper than the chosen one
    for c in result.candidates.iter().filter(|c| c.is_feasible()) {
        assert!(c.objective >= result.cost.total * (1.0 - 1e-6));
    }
    assert!(result.candidates.windows(2).all(|w| w[0].reflux_ratio < w[1].reflux_ratio));
    assert!(result.candidates.iter().any(|c| !c.is_feasible()));
}

#[test]
fn cost_curve_has_an_interior_minimum() {
    let base = column(binary(1.5, 0.6), 10, 4);
    let constraint = SeparationConstraint::distillate_purity(light(), 0.95);
    let grid = RefluxGrid::new(1.0, 5.0, 9, GridSpacing::Linear).unwrap();

    let candidates = sweep_reflux(&base, &CostModel::default(), &constraint, &grid).unwrap();
    assert_eq!(candidates.len(), 9);
    let objectives: Vec<f64> = candidates.iter().map(|c| c.objective).collect();
    let best = objectives
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert!(best > 0 && best < objectives.len() - 1, "{objectives:?}");
    assert!(objectives[..=best].windows(2).all(|w| w[0] > w[1]));
    assert!(objectives[best..].windows(2).all(|w| w[0] < w[1]));

    // below the boundary the purity is missed, above it energy costs grow
    assert!(!candidates[0].is_feasible());
    assert!(candidates[best].is_feasible());
    let costs: Vec<f64> = candidates.iter().map(|c| c.cost.unwrap().total).collect();
    assert!(costs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn unreachable_purity_reports_no_feasible_reflux() {
    // three stages and a volatility of 1.2 cannot approach 99.99 %
    let base = column(binary(0.96, 0.8), 3, 1);
    let constraint = SeparationConstraint::distillate_purity(light(), 0.9999);
    let bounds = RefluxBounds::new(0.5, 20.0).unwrap();

    match optimize_reflux(&base, &CostModel::default(), &constraint, bounds) {
        Err(OptimError::NoFeasibleReflux {
            evaluated, best, ..
        }) => {
            assert!(evaluated >= 9);
            let best = best.expect("best infeasible candidate");
            assert!(matches!(best.outcome, CandidateOutcome::Infeasible { .. }));
        }
        other => panic!("expected NoFeasibleReflux, got {other:?}"),
    }
}

#[test]
fn brent_and_default_strategy_agree() {
    let base = column(binary(1.5, 0.6), 10, 4);
    let constraint = SeparationConstraint::distillate_purity(light(), 0.95);
    let bounds = RefluxBounds::new(1.0, 5.0).unwrap();
    let cost = CostModel::default();

    let default = optimize_reflux(&base, &cost, &constraint, bounds).unwrap();
    let brent = RefluxOptimizer::new(Box::new(Brent::default()))
        .optimize(&base, &cost, &constraint, bounds)
        .unwrap();
    assert_eq!(brent.strategy, "brent");
    assert!(
        (brent.reflux_ratio - default.reflux_ratio).abs() < 0.02 * default.reflux_ratio,
        "brent {} vs default {}",
        brent.reflux_ratio,
        default.reflux_ratio
    );
}

#[test]
fn setup_errors_abort_before_any_solve() {
    let base = column(binary(1.5, 0.6), 10, 4);
    let cost = CostModel::default();
    let constraint = SeparationConstraint::distillate_purity(light(), 0.95);

    let inverted = RefluxBounds { min: 5.0, max: 1.0 };
    assert!(matches!(
        optimize_reflux(&base, &cost, &constraint, inverted),
        Err(OptimError::InvalidBounds { .. })
    ));

    let bounds = RefluxBounds::new(1.0, 5.0).unwrap();
    let missing = SeparationConstraint::distillate_purity(ComponentId::from_index(5), 0.95);
    assert!(matches!(
        optimize_reflux(&base, &cost, &missing, bounds),
        Err(OptimError::InvalidSetup { .. })
    ));

    let mut bad = base.clone();
    bad.pressure = PressureProfile::Uniform(pa(-1.0));
    match optimize_reflux(&bad, &cost, &constraint, bounds) {
        Err(OptimError::Column(err)) => assert!(err.is_invalid_input()),
        other => panic!("expected a column input error, got {other:?}"),
    }
}
