//! Data model carried through a scan.
//!
//! A scan visits a lattice of points. Each point has two identities:
//!
//! - a [`GridIndex`]: its integer (column, row) position on the lattice,
//!   used as the result-grid key so lookups never hinge on float equality;
//! - a [`Coordinate`]: the physical (x, y) target the positioner is
//!   commanded to, in rig units (mm).
//!
//! The index ↔ coordinate mapping is a pure function of the scan plan, so a
//! grid keyed by indices represents exactly the plan's coordinate set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical target position, in rig units (mm per axis).
///
/// Immutable once generated by the grid planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Fast-axis position.
    pub x: f64,
    /// Slow-axis position.
    pub y: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Lattice position of a plan point: column on the fast axis, row on the
/// slow axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    /// Fast-axis (x) lattice column.
    pub col: u32,
    /// Slow-axis (y) lattice row.
    pub row: u32,
}

impl GridIndex {
    /// Create a lattice index.
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl std::fmt::Display for GridIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.col, self.row)
    }
}

/// One filtered measurement from the sample channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Filtered value, in channel units (volts).
    pub value: f64,
    /// Capture timestamp.
    pub captured_at: DateTime<Utc>,
}

/// How a recorded point was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    /// First attempt succeeded.
    Ok,
    /// Succeeded after at least one recoverable fault.
    Retried,
    /// All attempts exhausted; the recorded value is the NaN sentinel.
    Failed,
}

impl std::fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleStatus::Ok => write!(f, "ok"),
            SampleStatus::Retried => write!(f, "retried"),
            SampleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A measurement bound to the plan point it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    /// Lattice position of the point.
    pub index: GridIndex,
    /// Physical coordinate the rig was commanded to.
    pub coordinate: Coordinate,
    /// Measured value; `f64::NAN` when `status` is `Failed`.
    pub value: f64,
    /// When the value was captured (or the final attempt gave up).
    pub captured_at: DateTime<Utc>,
    /// Outcome classification for the point.
    pub status: SampleStatus,
    /// Total move/acquire attempts spent on the point.
    pub attempts: u32,
}

/// Reduction filter applied over the raw readings taken at one point.
///
/// Recovered from the rig's original analog-read filtering: a point dwell
/// collects many raw readings and reduces them to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Arithmetic mean of all readings.
    #[default]
    Mean,
    /// Middle value; robust against single-reading outliers.
    Median,
    /// Root mean square; useful for AC-coupled signals.
    Rms,
    /// Mean of readings within 2σ of the raw mean; falls back to the raw
    /// mean when every reading is rejected.
    TrimmedMean,
}

impl FilterKind {
    /// Reduce a set of raw readings to a single value.
    ///
    /// An empty slice reduces to `f64::NAN`.
    pub fn reduce(&self, readings: &[f64]) -> f64 {
        if readings.is_empty() {
            return f64::NAN;
        }
        match self {
            FilterKind::Mean => mean(readings),
            FilterKind::Median => {
                let mut sorted = readings.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            FilterKind::Rms => {
                let mean_sq = readings.iter().map(|v| v * v).sum::<f64>() / readings.len() as f64;
                mean_sq.sqrt()
            }
            FilterKind::TrimmedMean => {
                let m = mean(readings);
                let var = readings.iter().map(|v| (v - m) * (v - m)).sum::<f64>()
                    / readings.len() as f64;
                let sigma = var.sqrt();
                let kept: Vec<f64> = readings
                    .iter()
                    .copied()
                    .filter(|v| (v - m).abs() < 2.0 * sigma)
                    .collect();
                if kept.is_empty() {
                    m
                } else {
                    mean(&kept)
                }
            }
        }
    }
}

fn mean(readings: &[f64]) -> f64 {
    readings.iter().sum::<f64>() / readings.len() as f64
}
