//! The spatially-indexed result accumulator for one scan session.
//!
//! Keys are lattice indices rather than float coordinates, so a recorded
//! point always matches exactly one plan point. `record` overwrites any
//! previous value for the same index, which is what lets a retried point
//! replace its earlier attempt without special cases.

use crate::plan::ScanPlan;
use scan_core::{Coordinate, GridIndex, SampleResult, SampleStatus};
use serde::Serialize;
use std::collections::HashMap;

/// Recorded-point totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Points recorded on the first attempt.
    pub ok: usize,
    /// Points recorded after at least one retry.
    pub retried: usize,
    /// Points whose retries were exhausted.
    pub failed: usize,
}

/// Mapping from plan point to measurement, plus the originating plan.
///
/// On a successfully completed scan the recorded keys equal the plan's full
/// index set; a partially completed scan holds a strict subset and reports
/// the remainder through [`missing`](ResultGrid::missing).
#[derive(Debug, Clone)]
pub struct ResultGrid {
    plan: ScanPlan,
    cells: HashMap<GridIndex, SampleResult>,
}

impl ResultGrid {
    /// Empty grid for a (validated) plan.
    pub fn new(plan: ScanPlan) -> Self {
        Self {
            plan,
            cells: HashMap::with_capacity(plan.len()),
        }
    }

    /// The originating plan.
    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// Record a measurement. Re-recording an index overwrites the previous
    /// value (retry semantics).
    pub fn record(&mut self, result: SampleResult) {
        self.cells.insert(result.index, result);
    }

    /// The measurement at a lattice index, if recorded.
    pub fn get(&self, index: GridIndex) -> Option<&SampleResult> {
        self.cells.get(&index)
    }

    /// Number of recorded points (any status).
    pub fn recorded(&self) -> usize {
        self.cells.len()
    }

    /// Number of points the plan generates.
    pub fn total(&self) -> usize {
        self.plan.len()
    }

    /// Whether every plan point has been recorded.
    pub fn is_complete(&self) -> bool {
        self.recorded() == self.total()
    }

    /// Recorded-point totals by status.
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for result in self.cells.values() {
            match result.status {
                SampleStatus::Ok => counts.ok += 1,
                SampleStatus::Retried => counts.retried += 1,
                SampleStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Plan coordinates not yet recorded, in traversal order.
    pub fn missing(&self) -> Vec<Coordinate> {
        self.plan
            .path()
            .filter(|(index, _)| !self.cells.contains_key(index))
            .map(|(_, coordinate)| coordinate)
            .collect()
    }

    /// Coordinates recorded as failed, in traversal order.
    pub fn failed(&self) -> Vec<Coordinate> {
        self.plan
            .path()
            .filter(|(index, _)| {
                self.cells
                    .get(index)
                    .is_some_and(|r| r.status == SampleStatus::Failed)
            })
            .map(|(_, coordinate)| coordinate)
            .collect()
    }

    /// Every plan point in traversal order with its recorded measurement,
    /// if any. This is the row source for file export.
    pub fn points(&self) -> Vec<(GridIndex, Coordinate, Option<SampleResult>)> {
        self.plan
            .path()
            .map(|(index, coordinate)| (index, coordinate, self.cells.get(&index).copied()))
            .collect()
    }

    /// Dense `[row][col]` value array matching the plan's dimensions.
    ///
    /// Unrecorded cells hold `f64::NAN` (as do failed points), so the shape
    /// is always `rows() × cols()` regardless of how far the scan got.
    pub fn export(&self) -> Vec<Vec<f64>> {
        let cols = self.plan.cols();
        let rows = self.plan.rows();
        let mut array = vec![vec![f64::NAN; cols]; rows];
        for (index, result) in &self.cells {
            let (row, col) = (index.row as usize, index.col as usize);
            if row < rows && col < cols {
                array[row][col] = result.value;
            }
        }
        array
    }
}
