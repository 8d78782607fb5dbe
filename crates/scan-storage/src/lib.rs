//! # scan-storage
//!
//! Persisted output for one scan session: the grid as CSV (one row per plan
//! point, in traversal order) and a JSON manifest describing how the grid
//! was produced. Rendering and plotting live behind this boundary: a
//! front end or analysis notebook consumes these files.

pub mod grid_csv;
pub mod manifest;

pub use grid_csv::write_grid_csv;
pub use manifest::{PointTotals, ScanManifest};

use thiserror::Error;

/// Failures while persisting scan output.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Manifest serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
