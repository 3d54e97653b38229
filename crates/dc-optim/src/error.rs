//! Reflux optimization errors.

use crate::candidate::Candidate;
use dc_column::ColumnError;
use thiserror::Error;

pub type OptimResult<T> = Result<T, OptimError>;

#[derive(Error, Debug, Clone)]
pub enum OptimError {
    /// Invalid column input; never penalized, aborts the search.
    #[error("Column error: {0}")]
    Column(#[from] ColumnError),

    #[error("Invalid reflux bounds: {what}")]
    InvalidBounds { what: String },

    #[error("Invalid optimization setup: {what}")]
    InvalidSetup { what: String },

    /// No evaluated candidate met the separation constraint.
    #[error(
        "No feasible reflux ratio in [{min}, {max}] after {evaluated} candidates{}",
        best_summary(best)
    )]
    NoFeasibleReflux {
        min: f64,
        max: f64,
        evaluated: usize,
        best: Option<Box<Candidate>>,
    },
}

fn best_summary(best: &Option<Box<Candidate>>) -> String {
    match best {
        Some(c) => format!(
            " (best R = {:.4}, {})",
            c.reflux_ratio,
            c.outcome.describe()
        ),
        None => String::new(),
    }
}

impl OptimError {
    pub fn setup(what: impl Into<String>) -> Self {
        OptimError::InvalidSetup { what: what.into() }
    }
}
