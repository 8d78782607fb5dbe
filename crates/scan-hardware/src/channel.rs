//! Sample channel: the acquisition abstraction over a raw probe driver.
//!
//! A single "measurement" at a scan point is not one raw reading: the rig
//! dwells at the point, takes a burst of readings, and reduces them with a
//! configurable filter to suppress noise. That reduction lives here so
//! probe drivers stay single-reading simple.

use chrono::Utc;
use scan_core::{AcquisitionFault, FilterKind, Readable, Sample};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Per-scan acquisition settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Raw readings collected per scan point.
    #[serde(default = "default_samples_per_point")]
    pub samples_per_point: usize,

    /// Pause between consecutive raw readings.
    #[serde(default = "default_sample_interval", with = "humantime_serde")]
    pub sample_interval: Duration,

    /// Reduction applied over the burst of raw readings.
    #[serde(default)]
    pub filter: FilterKind,
}

fn default_samples_per_point() -> usize {
    100
}

fn default_sample_interval() -> Duration {
    Duration::from_millis(1)
}

impl Default for ChannelSettings {
    /// 100 readings at 1 ms spacing, mean-filtered: a 100 ms dwell.
    fn default() -> Self {
        Self {
            samples_per_point: default_samples_per_point(),
            sample_interval: default_sample_interval(),
            filter: FilterKind::Mean,
        }
    }
}

/// Configure/acquire front over a [`Readable`] probe.
#[derive(Clone)]
pub struct SampleChannel {
    probe: Arc<dyn Readable>,
    settings: ChannelSettings,
    configured: Arc<AtomicBool>,
}

impl SampleChannel {
    /// Wrap a probe driver with acquisition settings.
    pub fn new(probe: Arc<dyn Readable>, settings: ChannelSettings) -> Self {
        Self {
            probe,
            settings,
            configured: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The channel's acquisition settings.
    pub fn settings(&self) -> ChannelSettings {
        self.settings
    }

    /// One-time setup before a scan begins.
    ///
    /// Rejects settings the channel cannot honour; a scan is never entered
    /// with an unconfigured channel.
    pub async fn configure(&self) -> Result<(), AcquisitionFault> {
        if self.settings.samples_per_point == 0 {
            return Err(AcquisitionFault::Rejected(
                "samples_per_point must be at least 1".into(),
            ));
        }
        info!(
            samples_per_point = self.settings.samples_per_point,
            filter = ?self.settings.filter,
            "sample channel configured"
        );
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Acquire one filtered, timestamped measurement.
    ///
    /// Takes the configured burst of raw readings and reduces them. Any raw
    /// reading fault aborts the burst and surfaces to the caller; partial
    /// bursts are never reduced to a value.
    pub async fn acquire(&self) -> Result<Sample, AcquisitionFault> {
        if !self.configured.load(Ordering::SeqCst) {
            return Err(AcquisitionFault::Rejected(
                "channel has not been configured".into(),
            ));
        }

        let mut readings = Vec::with_capacity(self.settings.samples_per_point);
        for i in 0..self.settings.samples_per_point {
            if i > 0 && !self.settings.sample_interval.is_zero() {
                sleep(self.settings.sample_interval).await;
            }
            readings.push(self.probe.read().await?);
        }

        Ok(Sample {
            value: self.settings.filter.reduce(&readings),
            captured_at: Utc::now(),
        })
    }
}
