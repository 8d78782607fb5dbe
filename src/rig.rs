//! Rig assembly: turn a [`RigConfig`](crate::config::RigConfig) into a
//! registry of live devices and the handles the scan engine consumes.
//!
//! Device handles are acquired here, at session-build time, and released
//! when the handles drop, so completion, abort, and fault all tear down
//! through the same ownership path.

use crate::config::{ProbeConfig, RigConfig, ScanConfig};
use anyhow::Context;
use scan_hardware::registry::{ids, simulated_registry, RigRegistry};
use scan_hardware::{Positioner, SampleChannel};
use tracing::info;

#[cfg(feature = "serial")]
use scan_core::Movable;
#[cfg(feature = "serial")]
use scan_hardware::drivers::stepper::{StepperAxis, StepperController, StepperSettings};
#[cfg(feature = "serial")]
use scan_hardware::MockProbe;
#[cfg(feature = "serial")]
use std::sync::Arc;

/// Capability handles the scan engine is wired with.
pub struct RigHandles {
    /// Two-axis positioner.
    pub positioner: Positioner,
    /// Sample channel over the configured probe.
    pub channel: SampleChannel,
}

/// Build the configured rig and the engine-facing handles over it.
pub async fn build_rig(config: &ScanConfig) -> anyhow::Result<(RigRegistry, RigHandles)> {
    let registry = match &config.rig {
        RigConfig::Mock { profile } => {
            info!("building simulated rig");
            simulated_registry(*profile)
        }
        RigConfig::Stepper {
            port,
            home_on_start,
            probe,
        } => build_stepper_rig(port, *home_on_start, probe).await?,
    };

    let x = registry
        .get_movable(ids::AXIS_X)
        .context("rig has no x axis")?;
    let y = registry
        .get_movable(ids::AXIS_Y)
        .context("rig has no y axis")?;
    let probe = registry
        .get_readable(ids::PROBE)
        .context("rig has no probe")?;

    let handles = RigHandles {
        positioner: Positioner::new(x, y),
        channel: SampleChannel::new(probe, config.acquisition),
    };
    Ok((registry, handles))
}

#[cfg(feature = "serial")]
async fn build_stepper_rig(
    port: &str,
    home_on_start: bool,
    probe: &ProbeConfig,
) -> anyhow::Result<RigRegistry> {
    info!(port, "building stepper rig");
    let controller = Arc::new(StepperController::open(StepperSettings {
        port: port.to_string(),
        ..StepperSettings::default()
    })?);
    controller.setup().await?;
    if home_on_start {
        controller.home(1).await?;
        controller.home(2).await?;
    }

    let x = Arc::new(StepperAxis::new(controller.clone(), 1));
    let y = Arc::new(StepperAxis::new(controller, 2));

    let mut registry = RigRegistry::new();
    match probe {
        ProbeConfig::Simulated { profile } => {
            let probe = Arc::new(MockProbe::new(
                x.clone() as Arc<dyn Movable>,
                y.clone() as Arc<dyn Movable>,
                *profile,
            ));
            registry.register_readable(ids::PROBE, "Simulated beam probe", probe);
        }
    }
    registry.register_movable(ids::AXIS_X, "Stepper motor 1 (X)", x);
    registry.register_movable(ids::AXIS_Y, "Stepper motor 2 (Y)", y);
    Ok(registry)
}

#[cfg(not(feature = "serial"))]
async fn build_stepper_rig(
    _port: &str,
    _home_on_start: bool,
    _probe: &ProbeConfig,
) -> anyhow::Result<RigRegistry> {
    anyhow::bail!("stepper rig support is not compiled in; rebuild with --features serial")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;

    fn mock_config() -> ScanConfig {
        toml::from_str(
            r#"
            [scan]
            x = { min = 0.0, max = 1.0, step = 1.0 }
            y = { min = 0.0, max = 1.0, step = 1.0 }
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mock_rig_builds_engine_handles() {
        let (registry, handles) = build_rig(&mock_config()).await.unwrap();
        assert_eq!(registry.len(), 3);

        // The handles are live: a move lands and a reading comes back.
        handles
            .positioner
            .move_to(&scan_core::Coordinate::new(0.5, 0.5))
            .await
            .unwrap();
        handles.channel.configure().await.unwrap();
        let sample = handles.channel.acquire().await.unwrap();
        assert!(sample.value.is_finite());
    }
}
