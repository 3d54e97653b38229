//! Evaluation of one reflux ratio: solve, cost, constraint check, penalty.

use crate::constraint::SeparationConstraint;
use crate::cost::{CostBreakdown, CostModel};
use crate::error::{OptimError, OptimResult};
use dc_column::{ColumnConfig, ColumnError, ColumnState, ConvergenceRecord, solve_column};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Penalties added to the objective of candidates that cannot be accepted.
///
/// Both penalties exceed any realistic cost, so every feasible candidate
/// ranks ahead of every infeasible one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyPolicy {
    /// Floor for an infeasible candidate.
    pub infeasible_base: f64,
    /// Growth of the infeasible penalty per unit shortfall.
    pub shortfall_slope: f64,
    /// Objective of a candidate whose column did not converge.
    pub non_converged: f64,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            infeasible_base: 1e9,
            shortfall_slope: 1e3,
            non_converged: 1e12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Feasible,
    Infeasible { shortfall: f64 },
    /// The sweep cap was reached.
    NotConverged,
    Diverged { reason: String },
}

impl CandidateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateOutcome::Feasible => "feasible",
            CandidateOutcome::Infeasible { .. } => "infeasible",
            CandidateOutcome::NotConverged => "not_converged",
            CandidateOutcome::Diverged { .. } => "diverged",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CandidateOutcome::Infeasible { shortfall } => {
                format!("infeasible, shortfall {shortfall:.3e}")
            }
            CandidateOutcome::Diverged { reason } => format!("diverged: {reason}"),
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub reflux_ratio: f64,
    pub outcome: CandidateOutcome,
    /// Present whenever the column produced a profile.
    pub cost: Option<CostBreakdown>,
    /// Cost plus any penalty. Lower is better.
    pub objective: f64,
    pub convergence: Option<ConvergenceRecord>,
    pub state: Option<ColumnState>,
}

impl Candidate {
    pub fn is_feasible(&self) -> bool {
        self.outcome == CandidateOutcome::Feasible
    }
}

/// Fixed inputs shared by all candidates of one search.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    pub base: &'a ColumnConfig,
    pub cost: &'a CostModel,
    pub constraint: &'a SeparationConstraint,
    pub penalty: PenaltyPolicy,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        base: &'a ColumnConfig,
        cost: &'a CostModel,
        constraint: &'a SeparationConstraint,
        penalty: PenaltyPolicy,
    ) -> Self {
        Self {
            base,
            cost,
            constraint,
            penalty,
        }
    }

    /// Solve the column at `reflux_ratio` from a fresh initialization.
    ///
    /// Convergence failures become penalized candidates. Invalid input is
    /// returned as an error.
    pub fn evaluate(&self, reflux_ratio: f64) -> OptimResult<Candidate> {
        let config = self.base.with_reflux_ratio(reflux_ratio);
        let candidate = match solve_column(&config) {
            Ok((state, record)) if record.converged => {
                let cost = self.cost.evaluate(&state);
                let shortfall = self.constraint.shortfall(&config, &state);
                let (outcome, objective) = if shortfall <= 0.0 {
                    (CandidateOutcome::Feasible, cost.total)
                } else {
                    (
                        CandidateOutcome::Infeasible { shortfall },
                        self.penalty.infeasible_base
                            * (1.0 + self.penalty.shortfall_slope * shortfall)
                            + cost.total,
                    )
                };
                Candidate {
                    reflux_ratio,
                    outcome,
                    cost: Some(cost),
                    objective,
                    convergence: Some(record),
                    state: Some(state),
                }
            }
            Ok((state, record)) => {
                warn!(
                    reflux_ratio,
                    sweeps = record.iterations,
                    residual = record.residual,
                    "Column hit the sweep cap"
                );
                Candidate {
                    reflux_ratio,
                    outcome: CandidateOutcome::NotConverged,
                    cost: Some(self.cost.evaluate(&state)),
                    objective: self.penalty.non_converged,
                    convergence: Some(record),
                    state: Some(state),
                }
            }
            Err(err) if err.is_invalid_input() => return Err(OptimError::Column(err)),
            Err(ColumnError::ColumnDivergence {
                sweeps,
                residual,
                reason,
                partial,
            }) => {
                warn!(reflux_ratio, sweeps, residual, %reason, "Column diverged");
                Candidate {
                    reflux_ratio,
                    outcome: CandidateOutcome::Diverged { reason },
                    cost: None,
                    objective: self.penalty.non_converged,
                    convergence: Some(ConvergenceRecord::unconverged(sweeps, residual)),
                    state: Some(*partial),
                }
            }
            Err(err) => {
                warn!(reflux_ratio, error = %err, "Column solve failed");
                Candidate {
                    reflux_ratio,
                    outcome: CandidateOutcome::Diverged {
                        reason: err.to_string(),
                    },
                    cost: None,
                    objective: self.penalty.non_converged,
                    convergence: None,
                    state: None,
                }
            }
        };
        debug!(
            reflux_ratio,
            outcome = candidate.outcome.as_str(),
            objective = candidate.objective,
            "Evaluated reflux candidate"
        );
        Ok(candidate)
    }

    /// Evaluate independent candidates in parallel. Order follows `ratios`.
    pub fn evaluate_batch(&self, ratios: &[f64]) -> OptimResult<Vec<Candidate>> {
        ratios.par_iter().map(|&r| self.evaluate(r)).collect()
    }
}
