/// Outcome summary of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceRecord {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

impl ConvergenceRecord {
    pub fn converged(iterations: usize, residual: f64) -> Self {
        Self {
            iterations,
            residual,
            converged: true,
        }
    }

    pub fn unconverged(iterations: usize, residual: f64) -> Self {
        Self {
            iterations,
            residual,
            converged: false,
        }
    }
}
