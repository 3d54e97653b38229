//! Column and stage solver errors.

use crate::column::ColumnState;
use crate::convergence::ConvergenceRecord;
use crate::stage::OutletStreams;
use dc_thermo::ThermoError;
use thiserror::Error;

pub type ColumnResult<T> = Result<T, ColumnError>;

#[derive(Error, Debug, Clone)]
pub enum ColumnError {
    #[error("Thermodynamics error: {0}")]
    Thermo(#[from] ThermoError),

    #[error("Invalid column configuration: {what}")]
    InvalidConfig { what: String },

    /// A stage kept failing after its damped retry. Carries the best
    /// estimate so the column solver can continue the sweep.
    #[error("Stage {stage} did not converge after {iterations} iterations (residual {residual:.3e})")]
    StageNonConvergence {
        stage: u32,
        iterations: usize,
        residual: f64,
        best: Box<(OutletStreams, ConvergenceRecord)>,
    },

    /// The column cannot be converged for this configuration.
    #[error("Column diverged after {sweeps} sweeps (residual {residual:.3e}): {reason}")]
    ColumnDivergence {
        sweeps: usize,
        residual: f64,
        reason: String,
        partial: Box<ColumnState>,
    },
}

impl ColumnError {
    pub fn invalid(what: impl Into<String>) -> Self {
        ColumnError::InvalidConfig { what: what.into() }
    }

    /// Errors caused by the inputs rather than by convergence trouble.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            ColumnError::Thermo(err) => err.is_invalid_input(),
            ColumnError::InvalidConfig { .. } => true,
            ColumnError::StageNonConvergence { .. } | ColumnError::ColumnDivergence { .. } => false,
        }
    }
}
