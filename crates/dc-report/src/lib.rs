//! dc-report: serializable run reports and their on-disk store.

pub mod csv;
pub mod hash;
pub mod store;
pub mod types;

pub use csv::{candidate_table_csv, stage_table_csv};
pub use hash::compute_run_id;
pub use store::ReportStore;
pub use types::*;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },
}

/// RFC 3339 UTC timestamp for manifests.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn manifest(run_id: RunId, project_name: &str, run_type: RunType, solver_version: &str) -> RunManifest {
    RunManifest {
        run_id,
        project_name: project_name.to_string(),
        timestamp: timestamp_now(),
        run_type,
        solver_version: solver_version.to_string(),
    }
}
