//! Two-axis positioner: the axis abstraction over individual motion drivers.
//!
//! The rig's axes are independent motors, so a coordinate move commands both
//! axes and then waits for *all* motion-complete reports before returning;
//! the scan engine must never start its settle wait while one axis is still
//! traveling.

use scan_core::{Coordinate, MotionFault, Movable};
use std::sync::Arc;
use tracing::debug;

/// Unified move/query front over one [`Movable`] per rig axis.
#[derive(Clone)]
pub struct Positioner {
    x: Arc<dyn Movable>,
    y: Arc<dyn Movable>,
}

impl Positioner {
    /// Build a positioner from the fast (x) and slow (y) axis drivers.
    pub fn new(x: Arc<dyn Movable>, y: Arc<dyn Movable>) -> Self {
        Self { x, y }
    }

    /// Move both axes to `target` and block until both report
    /// motion-complete.
    ///
    /// Both moves are commanded before either completion wait so the axes
    /// may travel simultaneously when the controller supports it.
    pub async fn move_to(&self, target: &Coordinate) -> Result<(), MotionFault> {
        debug!(x = target.x, y = target.y, "moving");
        self.x.move_abs(target.x).await?;
        self.y.move_abs(target.y).await?;
        self.x.wait_settled().await?;
        self.y.wait_settled().await?;
        Ok(())
    }

    /// Current rig position, non-blocking.
    pub async fn position(&self) -> Result<Coordinate, MotionFault> {
        Ok(Coordinate::new(
            self.x.position().await?,
            self.y.position().await?,
        ))
    }

    /// Scoped wait after motion-complete, before sampling is permitted.
    ///
    /// Damps mechanical oscillation; distinct from the motion-complete
    /// report, which only says the controller stopped commanding steps.
    pub async fn settle(&self, duration: std::time::Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
