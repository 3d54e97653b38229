//! Shared application service layer for distilcol.
//!
//! Frontends go through this crate for project management, compilation
//! of projects into solver inputs, run execution and report caching.

pub mod error;
pub mod progress;
pub mod project_service;
pub mod run_service;
pub mod runtime_compile;

pub use error::{AppError, AppResult};
pub use progress::{ColumnProgress, RunProgressEvent, RunStage};
pub use project_service::{ProjectSummary, load_project, save_project, summarize, validate_project};
pub use run_service::{
    RunMode, RunOptions, RunOutcome, RunRequest, RunResponse, RunTimingSummary, SOLVER_VERSION,
    default_sweep, ensure_run, ensure_run_with_progress, list_runs, load_run,
};
pub use runtime_compile::{
    CompiledProject, OptimizationSetup, build_column, build_optimization, build_package,
    build_strategy, compile_project,
};
