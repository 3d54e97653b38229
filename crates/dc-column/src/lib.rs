//! dc-column: stage-by-stage distillation column solver.
//!
//! - `stage`: single stage mass/energy balance at fixed duty or vapor fraction
//! - `column`: directional sweeps over the stage arena to a self-consistent profile
//! - `theta`: per-sweep correction of compositions to the overall component balance
//! - `balance`: mass and energy audit of a solved column

pub mod balance;
pub mod column;
pub mod config;
pub mod convergence;
pub mod error;
pub mod feed;
pub mod initialization;
pub mod progress;
pub mod stage;
mod theta;

pub use balance::{BalanceAudit, StageBalance, audit_balances};
pub use column::{
    ColumnState, StageKind, StageRecord, solve_column, solve_column_from,
    solve_column_with_progress,
};
pub use config::{
    ColumnConfig, ColumnOptions, CondenserKind, FeedCondition, FeedSpec, PressureProfile,
    ProductSpec, SideDraw, StageOptions,
};
pub use convergence::ConvergenceRecord;
pub use error::{ColumnError, ColumnResult};
pub use feed::FeedPortions;
pub use initialization::InitializationStrategy;
pub use progress::ColumnProgressEvent;
pub use stage::{
    InletStreams, OutletStreams, StageConfig, StageGuess, StageSpec, solve_stage,
    solve_stage_with_retry,
};
