//! Hardware capability traits.
//!
//! Instead of one monolithic rig trait, devices implement the small
//! capability they actually provide:
//!
//! - a motion axis implements [`Movable`]
//! - a detector/digitizer channel implements [`Readable`]
//!
//! Higher layers compose capabilities: the two-axis positioner owns one
//! `Arc<dyn Movable>` per axis, and the sample channel wraps an
//! `Arc<dyn Readable>`. Mock implementations of either trait slot in for
//! testing without physical hardware.
//!
//! All traits are async (`#[async_trait]`), thread-safe (`Send + Sync`), and
//! take `&self`; drivers use interior mutability for their state. Failures
//! surface as the typed faults from [`crate::error`], never as default
//! values.

use crate::error::{AcquisitionFault, MotionFault};
use async_trait::async_trait;

/// Capability: motion control for a single axis.
///
/// # Contract
/// - Positions are in device-native units (typically mm).
/// - `move_abs` initiates motion and may return before the mechanism stops.
/// - `wait_settled` blocks until the driver reports motion-complete; it must
///   carry an internal deadline so it cannot block forever.
/// - `position` is a non-blocking status read and may be approximate while
///   the axis is still moving.
///
/// Mechanical settling (vibration damping after motion-complete) is *not*
/// part of this contract; the scan engine applies its own configured settle
/// wait before sampling is permitted.
#[async_trait]
pub trait Movable: Send + Sync {
    /// Command an absolute move.
    async fn move_abs(&self, position: f64) -> Result<(), MotionFault>;

    /// Current position, non-blocking.
    async fn position(&self) -> Result<f64, MotionFault>;

    /// Block until the driver reports motion-complete.
    async fn wait_settled(&self) -> Result<(), MotionFault>;
}

/// Capability: scalar readout.
///
/// # Contract
/// - `read` performs one raw measurement and returns its value; units are
///   device-specific (volts for the rig's beam probe).
/// - A reading should be fast (well under the per-point dwell); averaging
///   and filtering over multiple readings belong to the sample channel, not
///   the driver.
#[async_trait]
pub trait Readable: Send + Sync {
    /// Take one raw reading.
    async fn read(&self) -> Result<f64, AcquisitionFault>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestAxis {
        position: Mutex<f64>,
    }

    #[async_trait]
    impl Movable for TestAxis {
        async fn move_abs(&self, position: f64) -> Result<(), MotionFault> {
            *self.position.lock().unwrap() = position;
            Ok(())
        }

        async fn position(&self) -> Result<f64, MotionFault> {
            Ok(*self.position.lock().unwrap())
        }

        async fn wait_settled(&self) -> Result<(), MotionFault> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_movable_trait() {
        let axis = TestAxis {
            position: Mutex::new(0.0),
        };

        axis.move_abs(10.0).await.unwrap();
        axis.wait_settled().await.unwrap();
        assert_eq!(axis.position().await.unwrap(), 10.0);
    }

    struct TestProbe;

    #[async_trait]
    impl Readable for TestProbe {
        async fn read(&self) -> Result<f64, AcquisitionFault> {
            Ok(0.042)
        }
    }

    #[tokio::test]
    async fn test_readable_trait() {
        let probe = TestProbe;
        assert_eq!(probe.read().await.unwrap(), 0.042);
    }
}
