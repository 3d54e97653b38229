//! Error types for the dc-app service layer.

use std::path::PathBuf;

/// Application error shared by every frontend.
///
/// Solver errors keep their type so callers can tell an infeasible
/// separation target from a configuration mistake.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to read project file: {path}")]
    ProjectFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write project file: {path}")]
    ProjectFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Project validation failed: {0}")]
    Validation(String),

    #[error("Project compilation failed: {0}")]
    Compile(String),

    #[error(transparent)]
    Thermo(#[from] dc_thermo::ThermoError),

    #[error(transparent)]
    Column(#[from] dc_column::ColumnError),

    #[error(transparent)]
    Optim(#[from] dc_optim::OptimError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<dc_project::ProjectError> for AppError {
    fn from(err: dc_project::ProjectError) -> Self {
        match err {
            dc_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<dc_report::ReportError> for AppError {
    fn from(err: dc_report::ReportError) -> Self {
        AppError::Report(err.to_string())
    }
}
