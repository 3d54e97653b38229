use dc_project::schema::*;
use dc_project::{ValidationError, parse_yaml, validate_project};

fn base() -> Project {
    parse_yaml(include_str!("../../../demos/projects/02_binary_optimize.yaml")).unwrap()
}

fn field_of(err: ValidationError) -> String {
    match err {
        ValidationError::InvalidValue { field, .. } => field,
        other => panic!("expected InvalidValue, got {other}"),
    }
}

#[test]
fn duplicate_component_names_rejected() {
    let mut project = base();
    let first = project.components[0].clone();
    project.components.push(first);
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::DuplicateId { .. })
    ));
}

#[test]
fn feed_composition_must_reference_components_and_sum_to_one() {
    let mut project = base();
    project.column.feed.composition.insert("ghost".to_string(), 0.0);
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::MissingReference { .. })
    ));

    let mut project = base();
    project.column.feed.composition.insert("light".to_string(), 0.6);
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.feed.composition"
    );
}

#[test]
fn stage_numbers_checked_against_column_height() {
    let mut project = base();
    project.column.feed.stage = 11;
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.feed.stage"
    );

    let mut project = base();
    project.column.side_draws.push(SideDrawDef {
        stage: 10,
        phase: DrawPhaseDef::Vapor,
        flow_mol_s: 1.0,
    });
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.side_draws.stage"
    );
}

#[test]
fn physical_ranges_enforced() {
    let mut project = base();
    project.column.pressure = PressureDef::Uniform { pressure_pa: -5.0 };
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.pressure.pressure_pa"
    );

    let mut project = base();
    project.column.reflux_ratio = f64::NAN;
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.reflux_ratio"
    );

    let mut project = base();
    project.column.pressure = PressureDef::PerStage {
        pressures_pa: vec![101_325.0; 3],
    };
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "column.pressure.pressures_pa"
    );
}

#[test]
fn nrtl_matrices_must_cover_every_component() {
    let mut project = base();
    project.activity = ActivityDef::Nrtl {
        a: vec![vec![0.0]],
        b: vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        alpha: vec![vec![0.0, 0.2], vec![0.2, 0.0]],
    };
    assert_eq!(field_of(validate_project(&project).unwrap_err()), "activity.a");
}

#[test]
fn optimization_section_checked() {
    let mut project = base();
    if let Some(opt) = project.optimization.as_mut() {
        opt.bounds = RefluxBoundsDef { min: 3.0, max: 2.0 };
    }
    assert_eq!(
        field_of(validate_project(&project).unwrap_err()),
        "optimization.bounds.max"
    );

    let mut project = base();
    if let Some(opt) = project.optimization.as_mut() {
        opt.constraints = vec![ConstraintDef::BottomsPurity {
            component: "nobody".to_string(),
            minimum: 0.9,
        }];
    }
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::MissingReference { .. })
    ));
}

#[test]
fn future_versions_rejected() {
    let mut project = base();
    project.version = dc_project::LATEST_VERSION + 1;
    assert!(matches!(
        validate_project(&project),
        Err(ValidationError::UnsupportedVersion { .. })
    ));
}
