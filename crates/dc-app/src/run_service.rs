//! Run execution and caching service.

use std::path::{Path, PathBuf};
use std::time::Instant;

use dc_column::{ColumnProgressEvent, solve_column_with_progress};
use dc_optim::{GridSpacing, RefluxGrid, RefluxOptimizer, sweep_reflux};
use dc_project::schema::Project;
use dc_report::{
    ColumnReport, OptimizationReport, ReportStore, RunManifest, RunType, SweepReport,
    compute_run_id,
};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::progress::{ColumnProgress, RunProgressEvent, RunStage};
use crate::project_service;
use crate::runtime_compile::{self, CompiledProject};

pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What to run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// Solve the column once; `None` keeps the project's reflux ratio.
    Simulate { reflux_ratio: Option<f64> },
    Optimize,
    Sweep { grid: RefluxGrid },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    pub solver_version: String,
    /// Report root; defaults to `.distilcol/runs` next to the project.
    pub output_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            solver_version: SOLVER_VERSION.to_string(),
            output_dir: None,
        }
    }
}

pub struct RunRequest<'a> {
    pub project_path: &'a Path,
    pub mode: RunMode,
    pub options: RunOptions,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Column(ColumnReport),
    Optimization(OptimizationReport),
    Sweep(SweepReport),
}

#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub compile_time_s: f64,
    pub solve_time_s: f64,
    pub save_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub report_dir: PathBuf,
    pub outcome: RunOutcome,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    mode: &RunMode,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    column: Option<ColumnProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            mode: mode.clone(),
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            column,
        });
    }
}

fn run_type(project: &Project, mode: &RunMode) -> AppResult<RunType> {
    Ok(match mode {
        RunMode::Simulate { reflux_ratio } => RunType::Simulate {
            reflux_ratio: reflux_ratio.unwrap_or(project.column.reflux_ratio),
        },
        RunMode::Optimize => {
            let opt = project.optimization.as_ref().ok_or_else(|| {
                AppError::InvalidInput("project has no optimization section".to_string())
            })?;
            RunType::Optimize {
                min: opt.bounds.min,
                max: opt.bounds.max,
                strategy: runtime_compile::build_strategy(opt.strategy).name().to_string(),
            }
        }
        RunMode::Sweep { grid } => RunType::Sweep {
            start: grid.start,
            end: grid.end,
            points: grid.points,
            spacing: grid.spacing.as_str().to_string(),
        },
    })
}

/// Execute or load a run based on request.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Execute or load a run and stream progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();
    let mode = &request.mode;

    emit_progress(
        &mut progress_cb,
        mode,
        RunStage::LoadingProject,
        started,
        Some("Loading project".to_string()),
        None,
    );
    let project = project_service::load_project(request.project_path)?;
    let run_type = run_type(&project, mode)?;

    emit_progress(
        &mut progress_cb,
        mode,
        RunStage::CheckingCache,
        started,
        Some("Checking report cache".to_string()),
        None,
    );
    let run_id = compute_run_id(&project, &run_type, &request.options.solver_version);
    let store = match &request.options.output_dir {
        Some(dir) => ReportStore::new(dir.clone())?,
        None => ReportStore::for_project(request.project_path)?,
    };

    if request.options.use_cache && store.has_run(&run_id) {
        emit_progress(
            &mut progress_cb,
            mode,
            RunStage::LoadingCachedResult,
            started,
            Some("Loading cached report".to_string()),
            None,
        );
        let load_started = Instant::now();
        let manifest = store.load_manifest(&run_id)?;
        let outcome = match mode {
            RunMode::Simulate { .. } => RunOutcome::Column(store.load_column(&run_id)?),
            RunMode::Optimize => RunOutcome::Optimization(store.load_optimization(&run_id)?),
            RunMode::Sweep { .. } => RunOutcome::Sweep(store.load_sweep(&run_id)?),
        };
        timing.load_cache_time_s = load_started.elapsed().as_secs_f64();
        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            mode,
            RunStage::Completed,
            started,
            Some("Loaded cached report".to_string()),
            None,
        );
        return Ok(RunResponse {
            report_dir: store.run_dir(&run_id),
            run_id,
            manifest,
            loaded_from_cache: true,
            outcome,
            timing,
        });
    }

    emit_progress(
        &mut progress_cb,
        mode,
        RunStage::CompilingProject,
        started,
        None,
        None,
    );
    let compile_started = Instant::now();
    let compiled = runtime_compile::compile_project(&project)?;
    timing.compile_time_s = compile_started.elapsed().as_secs_f64();

    let manifest = dc_report::manifest(
        run_id.clone(),
        &project.name,
        run_type,
        &request.options.solver_version,
    );
    let solve_started = Instant::now();
    let outcome = execute(compiled, mode, manifest.clone(), &mut progress_cb, started)?;
    timing.solve_time_s = solve_started.elapsed().as_secs_f64();

    emit_progress(
        &mut progress_cb,
        mode,
        RunStage::SavingReport,
        started,
        None,
        None,
    );
    let save_started = Instant::now();
    let report_dir = match &outcome {
        RunOutcome::Column(report) => store.save_column(report)?,
        RunOutcome::Optimization(report) => store.save_optimization(report)?,
        RunOutcome::Sweep(report) => store.save_sweep(report)?,
    };
    timing.save_time_s = save_started.elapsed().as_secs_f64();
    timing.total_time_s = started.elapsed().as_secs_f64();

    info!(run_id = %run_id, dir = %report_dir.display(), "Run saved");
    emit_progress(
        &mut progress_cb,
        mode,
        RunStage::Completed,
        started,
        Some("Run completed".to_string()),
        None,
    );

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        report_dir,
        outcome,
        timing,
    })
}

fn execute(
    compiled: CompiledProject,
    mode: &RunMode,
    manifest: RunManifest,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
) -> AppResult<RunOutcome> {
    let CompiledProject {
        component_names: names,
        column,
        optimization,
    } = compiled;
    match mode {
        RunMode::Simulate { reflux_ratio } => {
            let config = match reflux_ratio {
                Some(r) => column.with_reflux_ratio(*r),
                None => column,
            };
            emit_progress(
                progress_cb,
                mode,
                RunStage::SolvingColumn,
                started,
                Some(format!("Solving column at R = {}", config.reflux_ratio)),
                None,
            );
            let mut forward = |event: ColumnProgressEvent| {
                let column = match event {
                    ColumnProgressEvent::SweepStarted { sweep, max_sweeps } => ColumnProgress {
                        sweep: Some(sweep),
                        max_sweeps: Some(max_sweeps),
                        ..ColumnProgress::default()
                    },
                    ColumnProgressEvent::SweepCompleted {
                        sweep,
                        residual,
                        failed_stages,
                    } => ColumnProgress {
                        sweep: Some(sweep),
                        residual: Some(residual),
                        failed_stages: Some(failed_stages),
                        ..ColumnProgress::default()
                    },
                    ColumnProgressEvent::StageFailed { sweep, .. } => ColumnProgress {
                        sweep: Some(sweep),
                        ..ColumnProgress::default()
                    },
                    ColumnProgressEvent::Converged { sweeps, residual } => ColumnProgress {
                        sweep: Some(sweeps),
                        residual: Some(residual),
                        ..ColumnProgress::default()
                    },
                };
                emit_progress(
                    progress_cb,
                    mode,
                    RunStage::SolvingColumn,
                    started,
                    None,
                    Some(column),
                );
            };
            let (state, record) = solve_column_with_progress(&config, None, Some(&mut forward))?;
            Ok(RunOutcome::Column(ColumnReport::new(
                manifest, names, &state, &record,
            )))
        }
        RunMode::Optimize => {
            let setup = optimization.ok_or_else(|| {
                AppError::InvalidInput("project has no optimization section".to_string())
            })?;
            emit_progress(
                progress_cb,
                mode,
                RunStage::Optimizing,
                started,
                Some(format!(
                    "Searching reflux in {} with {}",
                    setup.bounds,
                    setup.strategy.name()
                )),
                None,
            );
            let optimizer = RefluxOptimizer::new(setup.strategy);
            let result = optimizer.optimize(&column, &setup.cost, &setup.constraint, setup.bounds)?;
            Ok(RunOutcome::Optimization(OptimizationReport::new(
                manifest, names, &result,
            )))
        }
        RunMode::Sweep { grid } => {
            let setup = optimization.ok_or_else(|| {
                AppError::InvalidInput(
                    "a sweep needs the optimization section for cost and constraints".to_string(),
                )
            })?;
            emit_progress(
                progress_cb,
                mode,
                RunStage::Sweeping,
                started,
                Some(format!("Sweeping {grid}")),
                None,
            );
            let candidates = sweep_reflux(&column, &setup.cost, &setup.constraint, grid)?;
            Ok(RunOutcome::Sweep(SweepReport::new(manifest, names, &candidates)))
        }
    }
}

/// Linear sweep over the project's optimization bounds.
pub fn default_sweep(project: &Project, points: usize) -> AppResult<RefluxGrid> {
    let opt = project.optimization.as_ref().ok_or_else(|| {
        AppError::InvalidInput("project has no optimization section".to_string())
    })?;
    Ok(RefluxGrid::new(
        opt.bounds.min,
        opt.bounds.max,
        points,
        GridSpacing::Linear,
    )?)
}

/// Cached runs stored next to a project, oldest first.
pub fn list_runs(project_path: &Path) -> AppResult<Vec<RunManifest>> {
    let store = ReportStore::for_project(project_path)?;
    Ok(store.list_runs()?)
}

/// Load a cached run by id, whatever its type.
pub fn load_run(project_path: &Path, run_id: &str) -> AppResult<(RunManifest, RunOutcome)> {
    let store = ReportStore::for_project(project_path)?;
    let manifest = store.load_manifest(run_id)?;
    let outcome = match manifest.run_type {
        RunType::Simulate { .. } => RunOutcome::Column(store.load_column(run_id)?),
        RunType::Optimize { .. } => RunOutcome::Optimization(store.load_optimization(run_id)?),
        RunType::Sweep { .. } => RunOutcome::Sweep(store.load_sweep(run_id)?),
    };
    Ok((manifest, outcome))
}
