//! Reflux ratio sweeps for cost curves and sensitivity tables.

use crate::candidate::{Candidate, Evaluator, PenaltyPolicy};
use crate::constraint::SeparationConstraint;
use crate::cost::CostModel;
use crate::error::{OptimError, OptimResult};
use dc_column::ColumnConfig;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridSpacing {
    #[default]
    Linear,
    /// Denser near small reflux ratios, where minimum reflux usually sits.
    Logarithmic,
}

impl GridSpacing {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridSpacing::Linear => "linear",
            GridSpacing::Logarithmic => "logarithmic",
        }
    }
}

impl fmt::Display for GridSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reflux ratios from `start` to `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefluxGrid {
    pub start: f64,
    pub end: f64,
    pub points: usize,
    pub spacing: GridSpacing,
}

impl RefluxGrid {
    pub fn new(start: f64, end: f64, points: usize, spacing: GridSpacing) -> OptimResult<Self> {
        let grid = Self {
            start,
            end,
            points,
            spacing,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> OptimResult<()> {
        let bad = |what: String| Err(OptimError::InvalidBounds { what });
        if !(self.start.is_finite() && self.end.is_finite()) {
            return bad(format!("sweep bounds must be finite: {self}"));
        }
        if self.start < 0.0 || self.end < 0.0 {
            return bad(format!("reflux ratios must be non-negative: {self}"));
        }
        if self.points < 2 {
            return bad("a sweep needs at least 2 points".to_string());
        }
        if (self.end - self.start).abs() < 1e-12 {
            return bad("sweep start and end must differ".to_string());
        }
        if self.spacing == GridSpacing::Logarithmic && self.start.min(self.end) <= 0.0 {
            return bad(format!("logarithmic sweep needs positive bounds: {self}"));
        }
        Ok(())
    }

    pub fn generate_points(&self) -> Vec<f64> {
        match self.spacing {
            GridSpacing::Linear => linspace(self.start, self.end, self.points),
            GridSpacing::Logarithmic => self.generate_logarithmic(),
        }
    }

    fn generate_logarithmic(&self) -> Vec<f64> {
        if self.points <= 1 || self.start <= 0.0 || self.end <= 0.0 {
            return linspace(self.start, self.end, self.points);
        }
        let log_start = self.start.ln();
        let log_delta = (self.end.ln() - log_start) / (self.points - 1) as f64;
        let mut points: Vec<f64> = (0..self.points)
            .map(|i| (log_start + i as f64 * log_delta).exp())
            .collect();
        // exact endpoints
        points[0] = self.start;
        points[self.points - 1] = self.end;
        points
    }
}

impl fmt::Display for RefluxGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R from {} to {} ({} points, {})",
            self.start, self.end, self.points, self.spacing
        )
    }
}

/// Evenly spaced points including both ends.
pub(crate) fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let delta = (end - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * delta).collect();
            out[n - 1] = end;
            out
        }
    }
}

/// Evaluate every grid point in parallel. Candidates follow grid order.
pub fn sweep_reflux(
    base: &ColumnConfig,
    cost: &CostModel,
    constraint: &SeparationConstraint,
    grid: &RefluxGrid,
) -> OptimResult<Vec<Candidate>> {
    grid.validate()?;
    cost.validate()?;
    constraint.validate(base.package.component_count())?;
    base.validate()?;

    let evaluator = Evaluator::new(base, cost, constraint, PenaltyPolicy::default());
    let candidates = evaluator.evaluate_batch(&grid.generate_points())?;
    info!(
        grid = %grid,
        feasible = candidates.iter().filter(|c| c.is_feasible()).count(),
        "Reflux sweep complete"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_grid_generation() {
        let grid = RefluxGrid::new(1.0, 5.0, 5, GridSpacing::Linear).unwrap();
        let points = grid.generate_points();
        assert_eq!(points.len(), 5);
        assert!((points[0] - 1.0).abs() < 1e-12);
        assert!((points[2] - 3.0).abs() < 1e-12);
        assert_eq!(points[4], 5.0);
    }

    #[test]
    fn logarithmic_grid_generation() {
        let grid = RefluxGrid::new(0.5, 8.0, 3, GridSpacing::Logarithmic).unwrap();
        let points = grid.generate_points();
        assert_eq!(points, vec![0.5, points[1], 8.0]);
        assert!((points[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn descending_grid_is_allowed() {
        let grid = RefluxGrid::new(4.0, 2.0, 3, GridSpacing::Linear).unwrap();
        assert_eq!(grid.generate_points(), vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn invalid_grids_rejected() {
        assert!(RefluxGrid::new(1.0, 5.0, 1, GridSpacing::Linear).is_err());
        assert!(RefluxGrid::new(2.0, 2.0, 4, GridSpacing::Linear).is_err());
        assert!(RefluxGrid::new(-1.0, 2.0, 4, GridSpacing::Linear).is_err());
        assert!(RefluxGrid::new(0.0, 2.0, 4, GridSpacing::Logarithmic).is_err());
        assert!(RefluxGrid::new(0.0, f64::INFINITY, 4, GridSpacing::Linear).is_err());
    }

    #[test]
    fn display_summarizes_grid() {
        let grid = RefluxGrid::new(1.0, 3.0, 5, GridSpacing::Logarithmic).unwrap();
        assert_eq!(grid.to_string(), "R from 1 to 3 (5 points, logarithmic)");
    }
}
