/// Events emitted while a column is being solved.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnProgressEvent {
    SweepStarted {
        sweep: usize,
        max_sweeps: usize,
    },
    /// A stage still failed after its damped retry; the sweep continues
    /// with the stage's best estimate.
    StageFailed { sweep: usize, stage: u32 },
    SweepCompleted {
        sweep: usize,
        residual: f64,
        failed_stages: usize,
    },
    Converged { sweeps: usize, residual: f64 },
}
