//! Scan manifest: the sidecar JSON that makes a grid file reproducible.
//!
//! Records the originating plan, the channel settings, how the session
//! ended, and the point totals by status, so an exported grid can be
//! interpreted (and a failed region re-scanned) without the process that
//! produced it.

use crate::StorageError;
use chrono::{DateTime, Utc};
use scan_engine::{ScanOutcome, ScanPlan};
use scan_hardware::ChannelSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Point totals by outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTotals {
    /// Points the plan generates.
    pub total: usize,
    /// Points recorded (any status).
    pub recorded: usize,
    /// Recorded on the first attempt.
    pub ok: usize,
    /// Recorded after retries.
    pub retried: usize,
    /// Retries exhausted.
    pub failed: usize,
    /// Never reached (aborted or faulted sessions).
    pub missing: usize,
}

/// Sidecar description of one scan session's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanManifest {
    /// When the manifest was written.
    pub created_at: DateTime<Utc>,
    /// Terminal session state (`completed`, `aborted`, `faulted`).
    pub state: String,
    /// Wall-clock session duration in seconds.
    pub elapsed_secs: f64,
    /// The originating plan.
    pub plan: ScanPlan,
    /// Acquisition settings the grid was measured with.
    pub channel: ChannelSettings,
    /// Point totals by outcome.
    pub points: PointTotals,
}

impl ScanManifest {
    /// Build a manifest from a finished session.
    pub fn new(outcome: &ScanOutcome, channel: ChannelSettings) -> Self {
        let counts = outcome.grid.status_counts();
        Self {
            created_at: Utc::now(),
            state: outcome.state.to_string(),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            plan: *outcome.grid.plan(),
            channel,
            points: PointTotals {
                total: outcome.grid.total(),
                recorded: outcome.grid.recorded(),
                ok: counts.ok,
                retried: counts.retried,
                failed: counts.failed,
                missing: outcome.grid.total() - outcome.grid.recorded(),
            },
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the manifest to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "manifest written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_engine::{AxisRange, ResultGrid, ScanState};
    use std::sync::Arc;
    use std::time::Duration;

    fn outcome() -> ScanOutcome {
        let plan = ScanPlan::new(AxisRange::new(0.0, 2.0, 1.0), AxisRange::new(0.0, 1.0, 1.0));
        ScanOutcome {
            state: ScanState::Aborted,
            grid: Arc::new(ResultGrid::new(plan)),
            elapsed: Duration::from_secs(12),
        }
    }

    #[test]
    fn test_manifest_totals_and_roundtrip() {
        let manifest = ScanManifest::new(&outcome(), ChannelSettings::default());
        assert_eq!(manifest.state, "aborted");
        assert_eq!(manifest.points.total, 6);
        assert_eq!(manifest.points.missing, 6);
        assert_eq!(manifest.elapsed_secs, 12.0);

        let json = manifest.to_json().unwrap();
        let parsed: ScanManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.points, manifest.points);
        assert_eq!(parsed.plan, manifest.plan);
    }

    #[test]
    fn test_manifest_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        ScanManifest::new(&outcome(), ChannelSettings::default())
            .write_json(&path)
            .unwrap();
        assert!(path.exists());
    }
}
