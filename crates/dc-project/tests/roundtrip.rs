use dc_project::schema::*;
use dc_project::{load_json, load_yaml, parse_yaml, save_json, save_yaml, validate_project};
use std::collections::BTreeMap;

fn binary_project() -> Project {
    let component = |name: &str, p_ref_pa: f64| ComponentDef::Explicit {
        name: name.to_string(),
        molecular_weight: 60.0,
        heat_of_vaporization_j_per_mol: 30_000.0,
        vapor_pressure: VaporPressureDef::ClausiusClapeyron {
            p_ref_pa,
            t_ref_k: 350.0,
        },
        t_min_k: 250.0,
        t_max_k: 500.0,
        liquid_density: LiquidDensityDef::Constant { kg_per_m3: 800.0 },
        cp_liquid_j_per_mol_k: 1.0,
        cp_vapor_j_per_mol_k: 1.0,
    };
    Project {
        version: 1,
        name: "Binary".to_string(),
        components: vec![component("A", 151_987.5), component("B", 60_795.0)],
        activity: ActivityDef::Ideal,
        column: ColumnDef {
            stages: 10,
            condenser: CondenserDef::Total,
            reflux_ratio: 2.0,
            pressure: PressureDef::Uniform {
                pressure_pa: 101_325.0,
            },
            feed: FeedDef {
                stage: 5,
                flow_mol_s: 100.0,
                composition: BTreeMap::from([("A".to_string(), 0.5), ("B".to_string(), 0.5)]),
                condition: FeedConditionDef::SaturatedLiquid,
                duty_w: None,
            },
            product: ProductDef::DistillateRate { flow_mol_s: 50.0 },
            side_draws: vec![],
            solver: None,
        },
        optimization: Some(OptimizationDef {
            bounds: RefluxBoundsDef { min: 1.0, max: 5.0 },
            cost: CostDef::default(),
            constraints: vec![ConstraintDef::DistillatePurity {
                component: "A".to_string(),
                minimum: 0.95,
            }],
            strategy: StrategyDef::default(),
        }),
    }
}

#[test]
fn roundtrip_yaml_binary_project() {
    let project = binary_project();
    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("dc_project_roundtrip_binary.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json_with_nrtl_and_side_draws() {
    let mut project = binary_project();
    project.activity = ActivityDef::Nrtl {
        a: vec![vec![0.0, 1.2], vec![0.8, 0.0]],
        b: vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        alpha: vec![vec![0.0, 0.3], vec![0.3, 0.0]],
    };
    project.column.side_draws.push(SideDrawDef {
        stage: 7,
        phase: DrawPhaseDef::Liquid,
        flow_mol_s: 5.0,
    });
    project.column.solver = Some(SolverDef {
        max_sweeps: Some(400),
        initialization: Some(InitializationDef::Flat),
        ..SolverDef::default()
    });

    let path = std::env::temp_dir().join("dc_project_roundtrip_nrtl.json");
    save_json(&path, &project).unwrap();
    let loaded = load_json(&path).unwrap();
    assert_eq!(project, loaded);
}

#[test]
fn minimal_yaml_fills_defaults() {
    let yaml = r#"
version: 1
name: Minimal
components:
  - type: Catalog
    name: benzene
  - type: Catalog
    name: toluene
column:
  stages: 8
  reflux_ratio: 1.5
  pressure:
    type: Uniform
    pressure_pa: 101325.0
  feed:
    stage: 4
    flow_mol_s: 10.0
    composition:
      benzene: 0.5
      toluene: 0.5
    condition:
      type: VaporFraction
      fraction: 0.25
  product:
    type: DistillateToFeed
    ratio: 0.5
optimization:
  bounds: { min: 0.5, max: 4.0 }
  constraints:
    - type: BottomsRecovery
      component: toluene
      minimum: 0.9
"#;
    let project = parse_yaml(yaml).unwrap();
    assert_eq!(project.activity, ActivityDef::Ideal);
    assert_eq!(project.column.condenser, CondenserDef::Total);
    assert!(project.column.side_draws.is_empty());
    let optimization = project.optimization.unwrap();
    assert_eq!(optimization.cost, CostDef::default());
    assert_eq!(optimization.strategy, StrategyDef::default());
}

#[test]
fn unversioned_project_is_migrated() {
    let mut project = binary_project();
    project.version = 0;
    let yaml = serde_yaml::to_string(&project).unwrap();
    let loaded = parse_yaml(&yaml).unwrap();
    assert_eq!(loaded.version, dc_project::LATEST_VERSION);
}
