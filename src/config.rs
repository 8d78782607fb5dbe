//! Scan configuration: TOML file plus `BEAMSCAN_` environment overrides.
//!
//! A configuration file declares the rig hardware, the scan region, the
//! acquisition settings, and the fault policy:
//!
//! ```toml
//! [rig]
//! kind = "mock"
//!
//! [scan]
//! x = { min = -10.0, max = 10.0, step = 1.0 }
//! y = { min = -10.0, max = 10.0, step = 1.0 }
//! traversal = "serpentine"
//! settle = "1s"
//!
//! [acquisition]
//! samples_per_point = 100
//! filter = "mean"
//!
//! [retry]
//! max_attempts = 3
//! backoff_delay = "250ms"
//! ```
//!
//! Environment variables override file values with a double-underscore path
//! separator, e.g. `BEAMSCAN_SCAN__SETTLE=500ms`.

use anyhow::Context;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use scan_engine::{AxisRange, BoundaryPolicy, EngineSettings, ScanPlan, Traversal};
use scan_hardware::{BeamProfile, ChannelSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Which hardware backs the rig.
    #[serde(default)]
    pub rig: RigConfig,

    /// Scan region, traversal, and settle timing.
    pub scan: ScanSection,

    /// Sample channel settings.
    #[serde(default)]
    pub acquisition: ChannelSettings,

    /// Bounded-retry policy for recoverable faults.
    #[serde(default)]
    pub retry: scan_core::RetryPolicy,

    /// Where scan output lands.
    #[serde(default)]
    pub output: OutputSection,
}

/// Rig hardware selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RigConfig {
    /// Fully simulated rig: two mock axes and the beam probe watching them.
    Mock {
        /// Simulated beam shape.
        #[serde(default)]
        profile: BeamProfile,
    },

    /// Serial stepper controller driving both axes (feature `serial`).
    Stepper {
        /// Serial device path of the controller.
        port: String,
        /// Home both motors before the first scan.
        #[serde(default)]
        home_on_start: bool,
        /// Probe backing the sample channel.
        probe: ProbeConfig,
    },
}

impl Default for RigConfig {
    fn default() -> Self {
        RigConfig::Mock {
            profile: BeamProfile::default(),
        }
    }
}

/// Probe selection for rigs whose motion hardware is real.
///
/// The digitizer binding ships as a separate driver crate; until one is
/// configured the simulated probe keeps the full scan path exercisable
/// against real motion hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Simulated beam probe evaluated at the rig's reported position.
    Simulated {
        /// Simulated beam shape.
        #[serde(default)]
        profile: BeamProfile,
    },
}

/// Scan region and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSection {
    /// Fast (x) axis bounds and step.
    pub x: AxisRange,
    /// Slow (y) axis bounds and step.
    pub y: AxisRange,

    /// Traversal order.
    #[serde(default)]
    pub traversal: Traversal,

    /// Uneven-step boundary handling.
    #[serde(default)]
    pub boundary: BoundaryPolicy,

    /// Offset added to both axes' bounds, for plans written relative to a
    /// rig origin.
    #[serde(default)]
    pub origin: Option<[f64; 2]>,

    /// Settle wait after motion-complete, before sampling.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,

    /// Extra settle before the first sample of a scan.
    #[serde(default = "default_first_settle", with = "humantime_serde")]
    pub first_settle: Duration,
}

fn default_settle() -> Duration {
    Duration::from_secs(1)
}

fn default_first_settle() -> Duration {
    Duration::from_secs(2)
}

/// Output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory scan grids and manifests are written into.
    pub directory: std::path::PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: "scans".into(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from `path`, then apply `BEAMSCAN_` environment
    /// overrides, then validate the resulting plan.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: ScanConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BEAMSCAN_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        config
            .plan()
            .validate()
            .context("configured scan plan is invalid")?;
        Ok(config)
    }

    /// The scan plan the configuration describes, with the origin offset
    /// applied.
    pub fn plan(&self) -> ScanPlan {
        let mut x = self.scan.x;
        let mut y = self.scan.y;
        if let Some([origin_x, origin_y]) = self.scan.origin {
            x.min += origin_x;
            x.max += origin_x;
            y.min += origin_y;
            y.max += origin_y;
        }
        ScanPlan {
            x,
            y,
            traversal: self.scan.traversal,
            boundary: self.scan.boundary,
        }
    }

    /// Engine timing and fault-policy settings.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            settle: self.scan.settle,
            first_settle: self.scan.first_settle,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::FilterKind;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: ScanConfig = toml::from_str(
            r#"
            [scan]
            x = { min = 0.0, max = 2.0, step = 1.0 }
            y = { min = 0.0, max = 1.0, step = 1.0 }
            "#,
        )
        .unwrap();

        assert!(matches!(config.rig, RigConfig::Mock { .. }));
        assert_eq!(config.scan.traversal, Traversal::Serpentine);
        assert_eq!(config.scan.settle, Duration::from_secs(1));
        assert_eq!(config.acquisition.samples_per_point, 100);
        assert_eq!(config.acquisition.filter, FilterKind::Mean);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.output.directory, std::path::PathBuf::from("scans"));
        assert_eq!(config.plan().len(), 6);
    }

    #[test]
    fn test_origin_offsets_the_plan() {
        let config: ScanConfig = toml::from_str(
            r#"
            [scan]
            x = { min = -1.0, max = 1.0, step = 1.0 }
            y = { min = -1.0, max = 1.0, step = 1.0 }
            origin = [10.0, 20.0]
            "#,
        )
        .unwrap();

        let plan = config.plan();
        assert_eq!(plan.x.min, 9.0);
        assert_eq!(plan.x.max, 11.0);
        assert_eq!(plan.y.min, 19.0);
        assert_eq!(plan.y.max, 21.0);
        // The offset shifts the region without changing its point count.
        assert_eq!(plan.len(), 9);
    }

    #[test]
    fn test_stepper_rig_parses() {
        let config: ScanConfig = toml::from_str(
            r#"
            [rig]
            kind = "stepper"
            port = "/dev/ttyUSB0"
            home_on_start = true
            probe = { kind = "simulated" }

            [scan]
            x = { min = 0.0, max = 5.0, step = 1.0 }
            y = { min = 0.0, max = 5.0, step = 1.0 }
            settle = "250ms"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        match &config.rig {
            RigConfig::Stepper {
                port,
                home_on_start,
                probe: ProbeConfig::Simulated { .. },
            } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert!(home_on_start);
            }
            other => panic!("unexpected rig config: {other:?}"),
        }
        assert_eq!(config.scan.settle, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 5);
        // Unset retry fields keep their defaults.
        assert_eq!(config.retry.backoff_delay, Duration::from_millis(250));
    }
}
