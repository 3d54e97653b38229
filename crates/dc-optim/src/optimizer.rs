//! Minimum-cost reflux ratio subject to a separation constraint.

use crate::candidate::{Candidate, Evaluator, PenaltyPolicy};
use crate::constraint::SeparationConstraint;
use crate::cost::{CostBreakdown, CostModel};
use crate::error::{OptimError, OptimResult};
use crate::strategy::{BracketThenRefine, CandidateLog, SearchStrategy};
use dc_column::{ColumnConfig, ColumnState, ConvergenceRecord};
use std::fmt;
use tracing::{info, warn};

/// Closed search interval for the reflux ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefluxBounds {
    pub min: f64,
    pub max: f64,
}

impl RefluxBounds {
    pub fn new(min: f64, max: f64) -> OptimResult<Self> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> OptimResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) {
            return Err(OptimError::InvalidBounds {
                what: format!("bounds must be finite, got {self}"),
            });
        }
        if self.min < 0.0 {
            return Err(OptimError::InvalidBounds {
                what: format!("reflux ratio cannot be negative, got {self}"),
            });
        }
        if self.min >= self.max {
            return Err(OptimError::InvalidBounds {
                what: format!("lower bound must be below upper bound, got {self}"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RefluxBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimalResult {
    pub reflux_ratio: f64,
    pub state: ColumnState,
    pub cost: CostBreakdown,
    pub convergence: ConvergenceRecord,
    pub strategy: &'static str,
    /// Every evaluated candidate, sorted by reflux ratio.
    pub candidates: Vec<Candidate>,
}

impl OptimalResult {
    pub fn feasible_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_feasible()).count()
    }
}

#[derive(Debug)]
pub struct RefluxOptimizer {
    pub strategy: Box<dyn SearchStrategy>,
    pub penalty: PenaltyPolicy,
    /// Relative cost difference below which candidates tie; the lower
    /// reflux ratio wins a tie.
    pub cost_tolerance: f64,
}

impl Default for RefluxOptimizer {
    fn default() -> Self {
        Self::new(Box::new(BracketThenRefine::default()))
    }
}

impl RefluxOptimizer {
    pub fn new(strategy: Box<dyn SearchStrategy>) -> Self {
        Self {
            strategy,
            penalty: PenaltyPolicy::default(),
            cost_tolerance: 1e-6,
        }
    }

    pub fn with_penalty(mut self, penalty: PenaltyPolicy) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn optimize(
        &self,
        base: &ColumnConfig,
        cost: &CostModel,
        constraint: &SeparationConstraint,
        bounds: RefluxBounds,
    ) -> OptimResult<OptimalResult> {
        bounds.validate()?;
        cost.validate()?;
        constraint.validate(base.package.component_count())?;
        base.validate()?;

        let evaluator = Evaluator::new(base, cost, constraint, self.penalty);
        let mut log = CandidateLog::new();
        self.strategy.search(&evaluator, bounds, &mut log)?;
        let candidates = log.into_sorted();

        let Some(best) = select_optimum(&candidates, self.cost_tolerance) else {
            let best = candidates
                .iter()
                .min_by(|a, b| a.objective.total_cmp(&b.objective))
                .cloned()
                .map(Box::new);
            warn!(
                bounds = %bounds,
                evaluated = candidates.len(),
                "No feasible reflux ratio"
            );
            return Err(OptimError::NoFeasibleReflux {
                min: bounds.min,
                max: bounds.max,
                evaluated: candidates.len(),
                best,
            });
        };

        let chosen = &candidates[best];
        let (Some(state), Some(cost), Some(convergence)) = (
            chosen.state.clone(),
            chosen.cost,
            chosen.convergence,
        ) else {
            return Err(OptimError::setup(
                "feasible candidate is missing its column state",
            ));
        };
        info!(
            strategy = self.strategy.name(),
            reflux_ratio = chosen.reflux_ratio,
            cost = cost.total,
            evaluated = candidates.len(),
            "Optimal reflux found"
        );
        Ok(OptimalResult {
            reflux_ratio: chosen.reflux_ratio,
            state,
            cost,
            convergence,
            strategy: self.strategy.name(),
            candidates,
        })
    }
}

/// Index of the cheapest feasible candidate. Candidates within
/// `cost_tolerance` of the cheapest tie and the lowest reflux ratio wins.
pub fn select_optimum(candidates: &[Candidate], cost_tolerance: f64) -> Option<usize> {
    let best = candidates
        .iter()
        .filter(|c| c.is_feasible())
        .map(|c| c.objective)
        .fold(f64::INFINITY, f64::min);
    if !best.is_finite() {
        return None;
    }
    let threshold = best + cost_tolerance * best.abs();
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_feasible() && c.objective <= threshold)
        .min_by(|(_, a), (_, b)| a.reflux_ratio.total_cmp(&b.reflux_ratio))
        .map(|(i, _)| i)
}

/// Optimize with the default strategy and penalties.
pub fn optimize_reflux(
    base: &ColumnConfig,
    cost: &CostModel,
    constraint: &SeparationConstraint,
    bounds: RefluxBounds,
) -> OptimResult<OptimalResult> {
    RefluxOptimizer::default().optimize(base, cost, constraint, bounds)
}
