//! dc-optim: minimum-cost reflux ratio search.
//!
//! Each candidate reflux ratio is a full column solve from a fresh
//! initialization. Candidates that miss the separation constraint or fail
//! to converge are penalized rather than dropped, so the search always has
//! an objective to compare.

pub mod candidate;
pub mod constraint;
pub mod cost;
pub mod error;
pub mod optimizer;
pub mod strategy;
pub mod sweep;

pub use candidate::{Candidate, CandidateOutcome, Evaluator, PenaltyPolicy};
pub use constraint::{SeparationConstraint, SeparationSpec};
pub use cost::{CostBreakdown, CostModel};
pub use error::{OptimError, OptimResult};
pub use optimizer::{OptimalResult, RefluxBounds, RefluxOptimizer, optimize_reflux, select_optimum};
pub use strategy::{
    BracketThenRefine, Brent, CandidateLog, GoldenSection, GridScan, SearchStrategy,
    brent_minimize, golden_section,
};
pub use sweep::{GridSpacing, RefluxGrid, sweep_reflux};
