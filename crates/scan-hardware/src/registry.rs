//! Device registry for runtime rig assembly.
//!
//! A central place that owns the rig's device handles and hands out
//! capability views by id: the front end registers whatever drivers its
//! configuration names, then the scan wiring asks for `Movable` axes and a
//! `Readable` probe without caring which driver backs them.

use crate::drivers::mock::{BeamProfile, SimulatedRig};
use scan_core::{Movable, Readable};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Well-known device ids used by the default wiring.
pub mod ids {
    /// Fast (x) axis.
    pub const AXIS_X: &str = "axis_x";
    /// Slow (y) axis.
    pub const AXIS_Y: &str = "axis_y";
    /// Beam probe.
    pub const PROBE: &str = "probe";
}

/// Capability tags for device listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Device implements [`Movable`].
    Movable,
    /// Device implements [`Readable`].
    Readable,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Movable => write!(f, "movable"),
            Capability::Readable => write!(f, "readable"),
        }
    }
}

/// Summary of one registered device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Registry id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Capabilities the device exposes.
    pub capabilities: Vec<Capability>,
}

struct DeviceEntry {
    name: String,
    movable: Option<Arc<dyn Movable>>,
    readable: Option<Arc<dyn Readable>>,
}

/// Central hub for the rig's device handles.
#[derive(Default)]
pub struct RigRegistry {
    devices: HashMap<String, DeviceEntry>,
}

impl RigRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motion axis.
    pub fn register_movable(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        device: Arc<dyn Movable>,
    ) {
        let id = id.into();
        info!(id = %id, "registered axis");
        self.devices.insert(
            id,
            DeviceEntry {
                name: name.into(),
                movable: Some(device),
                readable: None,
            },
        );
    }

    /// Register a readout device.
    pub fn register_readable(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        device: Arc<dyn Readable>,
    ) {
        let id = id.into();
        info!(id = %id, "registered probe");
        self.devices.insert(
            id,
            DeviceEntry {
                name: name.into(),
                movable: None,
                readable: Some(device),
            },
        );
    }

    /// Motion handle for `id`, if the device exists and can move.
    pub fn get_movable(&self, id: &str) -> Option<Arc<dyn Movable>> {
        self.devices.get(id)?.movable.clone()
    }

    /// Readout handle for `id`, if the device exists and can read.
    pub fn get_readable(&self, id: &str) -> Option<Arc<dyn Readable>> {
        self.devices.get(id)?.readable.clone()
    }

    /// Whether a device with `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Summaries of all registered devices, ordered by id.
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        let mut infos: Vec<DeviceInfo> = self
            .devices
            .iter()
            .map(|(id, entry)| {
                let mut capabilities = Vec::new();
                if entry.movable.is_some() {
                    capabilities.push(Capability::Movable);
                }
                if entry.readable.is_some() {
                    capabilities.push(Capability::Readable);
                }
                DeviceInfo {
                    id: id.clone(),
                    name: entry.name.clone(),
                    capabilities,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}

/// Registry backed by the simulated rig: two mock axes and the beam probe
/// watching them, under the default device ids.
pub fn simulated_registry(profile: BeamProfile) -> RigRegistry {
    let rig = SimulatedRig::new(profile);
    let mut registry = RigRegistry::new();
    registry.register_movable(ids::AXIS_X, "Simulated X axis", rig.x);
    registry.register_movable(ids::AXIS_Y, "Simulated Y axis", rig.y);
    registry.register_readable(ids::PROBE, "Simulated beam probe", rig.probe);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_registry_contents() {
        let registry = simulated_registry(BeamProfile::default());
        assert_eq!(registry.len(), 3);
        assert!(registry.get_movable(ids::AXIS_X).is_some());
        assert!(registry.get_movable(ids::AXIS_Y).is_some());
        assert!(registry.get_readable(ids::PROBE).is_some());
        // Capability views don't cross: the probe is not movable.
        assert!(registry.get_movable(ids::PROBE).is_none());
    }

    #[test]
    fn test_list_devices_sorted_with_capabilities() {
        let registry = simulated_registry(BeamProfile::default());
        let infos = registry.list_devices();
        let ids: Vec<&str> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["axis_x", "axis_y", "probe"]);
        assert_eq!(infos[0].capabilities, vec![Capability::Movable]);
        assert_eq!(infos[2].capabilities, vec![Capability::Readable]);
    }
}
