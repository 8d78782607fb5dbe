//! Fault taxonomy for the rig's hardware boundaries.
//!
//! Drivers never return silent default values: every motion or acquisition
//! failure surfaces as a typed fault. Faults come in two flavours:
//!
//! - **Recoverable**: transient conditions (a stall, a mechanical timeout, a
//!   busy digitizer) that the scan engine may retry under its bounded-retry
//!   policy before marking a point as failed.
//! - **Unrecoverable**: loss of communication with the driver. Continuing to
//!   command hardware after a communication loss risks damage or corrupted
//!   data, so these escalate the whole session to `Faulted` and halt further
//!   hardware calls.
//!
//! `is_recoverable()` encodes that classification so the engine never has to
//! match on individual variants.

use std::time::Duration;
use thiserror::Error;

/// Fault raised by a motion axis or its controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionFault {
    /// The motor stopped making progress before reaching its target.
    ///
    /// Typically caused by mechanical binding or lost steps. Usually clears on
    /// a retry once the mechanism un-sticks.
    #[error("motor stalled moving to {target}")]
    Stall {
        /// Commanded target position, in axis units.
        target: f64,
    },

    /// A limit switch tripped or the target lies outside the axis travel.
    #[error("limit violation moving to {target}")]
    LimitViolation {
        /// Commanded target position, in axis units.
        target: f64,
    },

    /// Motion did not report complete within the driver's deadline.
    #[error("motion did not complete within {timeout:?}")]
    Timeout {
        /// Deadline the driver waited for motion-complete.
        timeout: Duration,
    },

    /// Contact with the motion controller was lost.
    ///
    /// Unrecoverable: the controller state is unknown and the rig may require
    /// a manual reset before any new scan.
    #[error("lost contact with motion controller: {0}")]
    CommunicationLoss(String),
}

impl MotionFault {
    /// Whether the scan engine may retry the point after this fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MotionFault::CommunicationLoss(_))
    }
}

/// Fault raised by the acquisition channel or its digitizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquisitionFault {
    /// No sample was produced within the driver's deadline.
    #[error("no sample within {timeout:?}")]
    Timeout {
        /// Deadline the driver waited for a sample.
        timeout: Duration,
    },

    /// The reading exceeded the configured input range.
    #[error("reading {value} exceeds the configured input range")]
    Overrange {
        /// The out-of-range raw reading.
        value: f64,
    },

    /// The digitizer is still busy with a previous acquisition.
    #[error("digitizer busy with a previous acquisition")]
    Busy,

    /// The driver rejected the requested channel settings.
    ///
    /// Raised at configure time, before a scan starts; a scan is never
    /// entered with a channel the driver refused.
    #[error("channel settings rejected: {0}")]
    Rejected(String),

    /// Contact with the digitizer was lost.
    ///
    /// Unrecoverable, same contract as [`MotionFault::CommunicationLoss`].
    #[error("lost contact with digitizer: {0}")]
    CommunicationLoss(String),
}

impl AcquisitionFault {
    /// Whether the scan engine may retry the point after this fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AcquisitionFault::CommunicationLoss(_) | AcquisitionFault::Rejected(_)
        )
    }
}
