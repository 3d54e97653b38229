//! Thermodynamic property errors.

use dc_core::DcError;
use thiserror::Error;

/// Result type for thermodynamic operations.
pub type ThermoResult<T> = Result<T, ThermoError>;

/// Errors that can occur during equilibrium and property calculations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThermoError {
    /// Malformed composition, temperature or pressure handed to the engine.
    /// Indicates a caller bug; never retried.
    #[error("Physically invalid input: {what}")]
    PhysicallyInvalidInput { what: String },

    /// Component data rejected when building a property table.
    #[error("Invalid property data for '{component}': {what}")]
    InvalidProperty {
        component: String,
        what: &'static str,
    },

    /// Table-level inconsistency (duplicate names, empty range overlap).
    #[error("Invalid property table: {what}")]
    InvalidTable { what: String },

    /// Iterative calculation ran out of iterations.
    #[error("Convergence failed for {what} after {iterations} iterations")]
    ConvergenceFailed {
        what: &'static str,
        iterations: usize,
    },

    /// Linear algebra or other numeric failure.
    #[error("Numeric failure: {what}")]
    Numeric { what: String },

    #[error(transparent)]
    Core(#[from] DcError),
}

impl ThermoError {
    pub fn invalid_input(what: impl Into<String>) -> Self {
        ThermoError::PhysicallyInvalidInput { what: what.into() }
    }

    /// True for errors caused by the caller's inputs rather than by
    /// numerical difficulty.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ThermoError::PhysicallyInvalidInput { .. }
                | ThermoError::InvalidProperty { .. }
                | ThermoError::InvalidTable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ThermoError::invalid_input("pressure must be positive");
        assert!(err.to_string().contains("pressure"));
        assert!(err.is_invalid_input());

        let err = ThermoError::ConvergenceFailed {
            what: "liquid split",
            iterations: 200,
        };
        assert!(err.to_string().contains("200"));
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn core_error_converts() {
        let err: ThermoError = DcError::InvalidArg { what: "bracket" }.into();
        assert!(matches!(err, ThermoError::Core(_)));
    }
}
