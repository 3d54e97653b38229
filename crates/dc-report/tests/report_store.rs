use dc_column::{
    ColumnConfig, ColumnOptions, CondenserKind, FeedCondition, FeedSpec, PressureProfile,
    ProductSpec, solve_column,
};
use dc_core::StageId;
use dc_core::units::pa;
use dc_report::*;
use dc_thermo::{Composition, PropertyPackage, catalog};
use std::sync::Arc;

fn btx_column() -> ColumnConfig {
    let table = Arc::new(catalog::table_from_names(&["benzene", "toluene"]).unwrap());
    ColumnConfig {
        package: PropertyPackage::ideal(table),
        stages: 6,
        feed: FeedSpec {
            stage: StageId::from_index(2),
            flow: 10.0,
            composition: Composition::new(vec![0.5, 0.5]).unwrap(),
            condition: FeedCondition::SaturatedLiquid,
            duty: None,
        },
        reflux_ratio: 1.5,
        product: ProductSpec::DistillateRate(5.0),
        condenser: CondenserKind::Total,
        pressure: PressureProfile::Uniform(pa(101_325.0)),
        side_draws: Vec::new(),
        options: ColumnOptions::default(),
    }
}

fn names() -> Vec<String> {
    vec!["benzene".to_string(), "toluene".to_string()]
}

fn fresh_store(name: &str) -> ReportStore {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    ReportStore::new(dir).unwrap()
}

#[test]
fn column_report_saves_json_and_stage_table() {
    let config = btx_column();
    let (state, record) = solve_column(&config).unwrap();
    let run_type = RunType::Simulate { reflux_ratio: 1.5 };
    let report = ColumnReport::new(
        manifest("run_column".to_string(), "btx", run_type, "test"),
        names(),
        &state,
        &record,
    );
    assert_eq!(report.stages.len(), 6);
    assert_eq!(report.stages[0].kind, "total condenser");
    assert_eq!(report.products.len(), 2);

    let store = fresh_store("dc_report_column");
    let dir = store.save_column(&report).unwrap();
    assert!(store.has_run("run_column"));

    let csv = std::fs::read_to_string(dir.join("stages.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 7);
    assert!(lines[0].starts_with("stage,kind,temperature_k"));
    assert!(lines[0].contains("x_benzene,x_toluene,y_benzene"));
    assert!(lines[1].starts_with("1,total condenser,"));

    let loaded = store.load_column("run_column").unwrap();
    assert_eq!(loaded.manifest, report.manifest);
    assert_eq!(loaded.components, report.components);
    assert_eq!(loaded.stages.len(), report.stages.len());
    let x_d = |r: &ColumnReport| r.product("distillate").unwrap().composition[0];
    assert!((x_d(&loaded) - x_d(&report)).abs() < 1e-12);
    assert!((loaded.reboiler_duty_w - report.reboiler_duty_w).abs() < 1e-6);
}

#[test]
fn sweep_report_lists_every_candidate() {
    use dc_core::ComponentId;
    use dc_optim::{CostModel, GridSpacing, RefluxGrid, SeparationConstraint, sweep_reflux};

    let config = btx_column();
    let grid = RefluxGrid::new(1.0, 3.0, 3, GridSpacing::Linear).unwrap();
    let constraint = SeparationConstraint::distillate_purity(ComponentId::from_index(0), 0.9);
    let candidates = sweep_reflux(&config, &CostModel::default(), &constraint, &grid).unwrap();

    let run_type = RunType::Sweep {
        start: 1.0,
        end: 3.0,
        points: 3,
        spacing: grid.spacing.to_string(),
    };
    let report = SweepReport::new(
        manifest("run_sweep".to_string(), "btx", run_type, "test"),
        names(),
        &candidates,
    );
    let store = fresh_store("dc_report_sweep");
    let dir = store.save_sweep(&report).unwrap();

    let csv = std::fs::read_to_string(dir.join("candidates.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4);
    let loaded = store.load_sweep("run_sweep").unwrap();
    assert_eq!(loaded.candidates.len(), 3);
    assert_eq!(loaded.candidates[0].reflux_ratio, 1.0);
    assert_eq!(loaded.manifest.run_type.as_str(), "sweep");
}

#[test]
fn missing_run_is_reported() {
    let store = fresh_store("dc_report_missing");
    assert!(matches!(
        store.load_manifest("nope"),
        Err(ReportError::RunNotFound { .. })
    ));
    assert!(store.list_runs().unwrap().is_empty());
}

#[test]
fn list_and_delete_runs() {
    let config = btx_column();
    let (state, record) = solve_column(&config).unwrap();
    let store = fresh_store("dc_report_list");
    for id in ["a", "b"] {
        let report = ColumnReport::new(
            manifest(id.to_string(), "btx", RunType::Simulate { reflux_ratio: 1.5 }, "test"),
            names(),
            &state,
            &record,
        );
        store.save_column(&report).unwrap();
    }
    assert_eq!(store.list_runs().unwrap().len(), 2);
    store.delete_run("a").unwrap();
    let remaining = store.list_runs().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].run_id, "b");
}
