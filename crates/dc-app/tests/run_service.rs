use dc_app::*;
use std::path::{Path, PathBuf};

/// Copy a demo project into a fresh temp directory so the report store
/// lands next to it.
fn staged_demo(name: &str, dir_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(dir_name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/projects")
        .join(name);
    let target = dir.join(name);
    std::fs::copy(source, &target).unwrap();
    target
}

#[test]
fn simulate_saves_report_and_then_hits_cache() {
    let path = staged_demo("02_binary_optimize.yaml", "dc_app_simulate");
    let request = RunRequest {
        project_path: &path,
        mode: RunMode::Simulate {
            reflux_ratio: Some(3.0),
        },
        options: RunOptions::default(),
    };

    let mut stages = Vec::new();
    let mut sweeps = 0;
    let mut on_progress = |event: RunProgressEvent| {
        if event.column.is_some() {
            sweeps += 1;
        }
        stages.push(event.stage);
    };
    let first = ensure_run_with_progress(&request, Some(&mut on_progress)).unwrap();
    assert!(!first.loaded_from_cache);
    assert!(sweeps > 0);
    assert_eq!(stages.first(), Some(&RunStage::LoadingProject));
    assert_eq!(stages.last(), Some(&RunStage::Completed));
    assert!(stages.contains(&RunStage::SavingReport));
    assert!(first.report_dir.join("report.json").exists());
    assert!(first.report_dir.join("stages.csv").exists());

    let RunOutcome::Column(report) = &first.outcome else {
        panic!("expected a column report");
    };
    assert_eq!(report.reflux_ratio, 3.0);
    assert!(report.convergence.converged);
    let x_d = report.product("distillate").unwrap().composition[0];
    assert!(x_d > 0.95, "x_D = {x_d}");

    let second = ensure_run(&request).unwrap();
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);
}

#[test]
fn different_reflux_gets_a_different_run_id() {
    let path = staged_demo("02_binary_optimize.yaml", "dc_app_run_ids");
    let run = |r: f64| {
        ensure_run(&RunRequest {
            project_path: &path,
            mode: RunMode::Simulate {
                reflux_ratio: Some(r),
            },
            options: RunOptions::default(),
        })
        .unwrap()
    };
    assert_ne!(run(2.0).run_id, run(4.0).run_id);
}

#[test]
fn optimize_through_the_service_layer() {
    let path = staged_demo("02_binary_optimize.yaml", "dc_app_optimize");
    let out = std::env::temp_dir().join("dc_app_optimize_reports");
    let _ = std::fs::remove_dir_all(&out);
    let response = ensure_run(&RunRequest {
        project_path: &path,
        mode: RunMode::Optimize,
        options: RunOptions {
            output_dir: Some(out.clone()),
            ..RunOptions::default()
        },
    })
    .unwrap();

    let RunOutcome::Optimization(report) = &response.outcome else {
        panic!("expected an optimization report");
    };
    assert!((report.reflux_ratio - 2.8636).abs() < 0.05 * 2.8636);
    assert_eq!(report.strategy, "bracket_then_refine");
    assert!(report.candidates.len() >= 9);
    assert!(response.report_dir.starts_with(&out));
    assert!(response.report_dir.join("candidates.csv").exists());
}

#[test]
fn sweep_requires_an_optimization_section() {
    let path = staged_demo("01_btx_simulate.yaml", "dc_app_sweep_missing");
    let grid = dc_optim::RefluxGrid::new(1.0, 3.0, 3, dc_optim::GridSpacing::Linear).unwrap();
    let err = ensure_run(&RunRequest {
        project_path: &path,
        mode: RunMode::Sweep { grid },
        options: RunOptions::default(),
    })
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[test]
fn missing_project_file_is_reported() {
    let err = load_project(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, AppError::ProjectFileRead { .. }));
}

#[test]
fn summary_and_json_round_trip() {
    let path = staged_demo("01_btx_simulate.yaml", "dc_app_summary");
    let project = load_project(&path).unwrap();
    let summary = summarize(&project);
    assert_eq!(summary.stages, 15);
    assert_eq!(summary.catalog_components, 3);
    assert!(!summary.has_optimization);

    let json = path.with_extension("json");
    save_project(&json, &project).unwrap();
    assert_eq!(load_project(&json).unwrap(), project);
}

#[test]
fn cached_runs_can_be_listed_and_reloaded() {
    let path = staged_demo("02_binary_optimize.yaml", "dc_app_list_runs");
    let response = ensure_run(&RunRequest {
        project_path: &path,
        mode: RunMode::Simulate { reflux_ratio: None },
        options: RunOptions::default(),
    })
    .unwrap();

    let runs = list_runs(&path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, response.run_id);

    let (manifest, outcome) = load_run(&path, &response.run_id).unwrap();
    assert_eq!(manifest.run_type.as_str(), "simulate");
    assert!(matches!(outcome, RunOutcome::Column(_)));
}
