//! Mock hardware implementations.
//!
//! Provides a simulated two-axis rig and beam probe for testing and demo
//! runs without physical hardware. All mocks use async-safe waits
//! (`tokio::time`, never `std::thread::sleep`).
//!
//! Both mock devices accept scripted fault injection: queued faults are
//! consumed one per operation, which makes retry and escalation paths
//! deterministic to test.

use crate::positioner::Positioner;
use async_trait::async_trait;
use rand::Rng;
use scan_core::{AcquisitionFault, MotionFault, Movable, Readable};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Queue of scripted faults, consumed one per hardware operation.
pub struct FaultScript<F> {
    queue: Mutex<VecDeque<F>>,
}

impl<F> FaultScript<F> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    async fn push(&self, fault: F) {
        self.queue.lock().await.push_back(fault);
    }

    async fn take(&self) -> Option<F> {
        self.queue.lock().await.pop_front()
    }
}

// =============================================================================
// MockAxis - simulated motion axis
// =============================================================================

/// In-flight motion: where the axis is headed and when it gets there.
struct PendingMove {
    target: f64,
    arrival: Instant,
}

/// Simulated motion axis with finite travel speed.
///
/// `move_abs` only records the motion; the position updates when
/// `wait_settled` observes the arrival deadline, so two axes commanded
/// back-to-back travel concurrently like real independent motors.
pub struct MockAxis {
    label: String,
    position: RwLock<f64>,
    pending: Mutex<Option<PendingMove>>,
    speed: f64,
    travel: Option<(f64, f64)>,
    faults: FaultScript<MotionFault>,
}

impl MockAxis {
    /// New axis at position 0.0 with a 50 units/sec travel speed.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_speed(label, 50.0)
    }

    /// New axis that completes every move instantly (for tests).
    pub fn instant(label: impl Into<String>) -> Self {
        Self::with_speed(label, f64::INFINITY)
    }

    /// New axis with a custom travel speed in units/sec.
    pub fn with_speed(label: impl Into<String>, speed: f64) -> Self {
        Self {
            label: label.into(),
            position: RwLock::new(0.0),
            pending: Mutex::new(None),
            speed,
            travel: None,
            faults: FaultScript::new(),
        }
    }

    /// Restrict the axis travel; moves outside `[min, max]` raise
    /// [`MotionFault::LimitViolation`].
    pub fn with_travel(mut self, min: f64, max: f64) -> Self {
        self.travel = Some((min, max));
        self
    }

    /// Queue a fault to be raised by the next `move_abs` call.
    pub async fn inject_fault(&self, fault: MotionFault) {
        self.faults.push(fault).await;
    }
}

#[async_trait]
impl Movable for MockAxis {
    async fn move_abs(&self, position: f64) -> Result<(), MotionFault> {
        if let Some(fault) = self.faults.take().await {
            debug!(axis = %self.label, %fault, "scripted fault");
            return Err(fault);
        }
        if let Some((min, max)) = self.travel {
            if position < min || position > max {
                return Err(MotionFault::LimitViolation { target: position });
            }
        }

        let current = *self.position.read().await;
        let travel_time = if self.speed.is_finite() && self.speed > 0.0 {
            Duration::from_secs_f64((position - current).abs() / self.speed)
        } else {
            Duration::ZERO
        };
        *self.pending.lock().await = Some(PendingMove {
            target: position,
            arrival: Instant::now() + travel_time,
        });
        Ok(())
    }

    async fn position(&self) -> Result<f64, MotionFault> {
        Ok(*self.position.read().await)
    }

    async fn wait_settled(&self) -> Result<(), MotionFault> {
        let pending = self.pending.lock().await.take();
        if let Some(pending) = pending {
            sleep_until(pending.arrival).await;
            *self.position.write().await = pending.target;
        }
        Ok(())
    }
}

// =============================================================================
// MockProbe - simulated beam probe
// =============================================================================

/// Gaussian beam the simulated probe measures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamProfile {
    /// Beam centre, fast axis.
    pub center_x: f64,
    /// Beam centre, slow axis.
    pub center_y: f64,
    /// Beam width (1σ), rig units.
    pub sigma: f64,
    /// Peak reading above the floor, volts.
    pub peak: f64,
    /// Background reading far from the beam, volts.
    pub floor: f64,
    /// Peak-to-peak amplitude of uniform reading noise, volts.
    pub noise: f64,
}

impl Default for BeamProfile {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            sigma: 5.0,
            peak: 1.0,
            floor: 0.01,
            noise: 0.002,
        }
    }
}

impl BeamProfile {
    /// Noise-free beam reading at `(x, y)`.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let r2 = dx * dx + dy * dy;
        self.floor + self.peak * (-r2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// Simulated beam probe.
///
/// Reads the configured [`BeamProfile`] at the rig's current position
/// (obtained from the same axis drivers the scan engine commands) plus
/// uniform noise. A position query failure during a read surfaces as an
/// acquisition-side communication loss.
pub struct MockProbe {
    x: Arc<dyn Movable>,
    y: Arc<dyn Movable>,
    profile: BeamProfile,
    faults: FaultScript<AcquisitionFault>,
}

impl MockProbe {
    /// Probe reading `profile` at the position reported by the given axes.
    pub fn new(x: Arc<dyn Movable>, y: Arc<dyn Movable>, profile: BeamProfile) -> Self {
        Self {
            x,
            y,
            profile,
            faults: FaultScript::new(),
        }
    }

    /// Queue a fault to be raised by the next `read` call.
    pub async fn inject_fault(&self, fault: AcquisitionFault) {
        self.faults.push(fault).await;
    }
}

#[async_trait]
impl Readable for MockProbe {
    async fn read(&self) -> Result<f64, AcquisitionFault> {
        if let Some(fault) = self.faults.take().await {
            debug!(%fault, "scripted fault");
            return Err(fault);
        }

        let x = self
            .x
            .position()
            .await
            .map_err(|e| AcquisitionFault::CommunicationLoss(e.to_string()))?;
        let y = self
            .y
            .position()
            .await
            .map_err(|e| AcquisitionFault::CommunicationLoss(e.to_string()))?;

        let mut value = self.profile.evaluate(x, y);
        if self.profile.noise > 0.0 {
            value += rand::thread_rng().gen_range(-0.5..0.5) * self.profile.noise;
        }
        Ok(value)
    }
}

// =============================================================================
// SimulatedRig - wired axes + probe
// =============================================================================

/// A complete simulated rig: two axes and a probe watching them.
pub struct SimulatedRig {
    /// Fast (x) axis.
    pub x: Arc<MockAxis>,
    /// Slow (y) axis.
    pub y: Arc<MockAxis>,
    /// Beam probe tied to both axes.
    pub probe: Arc<MockProbe>,
}

impl SimulatedRig {
    /// Rig with realistic axis speeds (50 units/sec).
    pub fn new(profile: BeamProfile) -> Self {
        Self::build(MockAxis::new("axis_x"), MockAxis::new("axis_y"), profile)
    }

    /// Rig whose axes move instantly (for tests).
    pub fn instant(profile: BeamProfile) -> Self {
        Self::build(
            MockAxis::instant("axis_x"),
            MockAxis::instant("axis_y"),
            profile,
        )
    }

    fn build(x: MockAxis, y: MockAxis, profile: BeamProfile) -> Self {
        let x = Arc::new(x);
        let y = Arc::new(y);
        let probe = Arc::new(MockProbe::new(
            x.clone() as Arc<dyn Movable>,
            y.clone() as Arc<dyn Movable>,
            profile,
        ));
        Self { x, y, probe }
    }

    /// Positioner over the rig's axes.
    pub fn positioner(&self) -> Positioner {
        Positioner::new(
            self.x.clone() as Arc<dyn Movable>,
            self.y.clone() as Arc<dyn Movable>,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_axis_reaches_target() {
        let axis = MockAxis::with_speed("x", 1000.0);
        axis.move_abs(5.0).await.unwrap();
        axis.wait_settled().await.unwrap();
        assert_eq!(axis.position().await.unwrap(), 5.0);
    }

    #[tokio::test]
    async fn test_axis_travel_limit() {
        let axis = MockAxis::instant("x").with_travel(-10.0, 10.0);
        let err = axis.move_abs(12.0).await.unwrap_err();
        assert!(matches!(err, MotionFault::LimitViolation { .. }));
        // Position unchanged after the rejected move.
        assert_eq!(axis.position().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_scripted_faults_consume_in_order() {
        let axis = MockAxis::instant("x");
        axis.inject_fault(MotionFault::Stall { target: 1.0 }).await;

        assert!(axis.move_abs(1.0).await.is_err());
        // Script exhausted; the next move succeeds.
        assert!(axis.move_abs(1.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_tracks_rig_position() {
        let profile = BeamProfile {
            noise: 0.0,
            ..BeamProfile::default()
        };
        let rig = SimulatedRig::instant(profile);

        // On the beam centre the probe reads floor + peak.
        rig.positioner()
            .move_to(&scan_core::Coordinate::new(0.0, 0.0))
            .await
            .unwrap();
        let on_peak = rig.probe.read().await.unwrap();
        assert!((on_peak - (profile.floor + profile.peak)).abs() < 1e-9);

        // Far off-centre it reads close to the floor.
        rig.positioner()
            .move_to(&scan_core::Coordinate::new(100.0, 100.0))
            .await
            .unwrap();
        let off_peak = rig.probe.read().await.unwrap();
        assert!(off_peak < profile.floor + 1e-6);
    }
}
