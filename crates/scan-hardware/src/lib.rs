//! # scan-hardware
//!
//! The hardware side of beamscan: thin shims that adapt concrete drivers to
//! the capability traits from `scan-core`, plus the registry that hands out
//! capability handles by device id.
//!
//! - [`positioner::Positioner`]: the axis abstraction: composes one
//!   [`scan_core::Movable`] per rig axis behind a single
//!   move-to-coordinate call.
//! - [`channel::SampleChannel`]: the sample abstraction: wraps a
//!   [`scan_core::Readable`] probe with per-point averaging and filtering.
//! - [`registry::RigRegistry`]: device lookup by id and capability.
//! - [`drivers`]: the mock rig (always available) and the serial
//!   stepper-controller driver (feature `serial`).

pub mod channel;
pub mod drivers;
pub mod positioner;
pub mod registry;

pub use channel::{ChannelSettings, SampleChannel};
pub use drivers::mock::{BeamProfile, MockAxis, MockProbe, SimulatedRig};
pub use positioner::Positioner;
pub use registry::{Capability, DeviceInfo, RigRegistry};
