//! # scan-core
//!
//! Shared vocabulary for the beamscan workspace: the fault taxonomy raised by
//! hardware drivers, the capability traits those drivers implement, the data
//! model carried through a scan (coordinates, samples, statuses), and the
//! bounded-retry policy applied by the scan engine.
//!
//! This crate is hardware-free and engine-free by design; everything in it is
//! a pure type or a trait contract, so driver crates and the orchestration
//! engine can depend on it without pulling in each other.

pub mod capabilities;
pub mod data;
pub mod error;
pub mod retry;

pub use capabilities::{Movable, Readable};
pub use data::{Coordinate, FilterKind, GridIndex, Sample, SampleResult, SampleStatus};
pub use error::{AcquisitionFault, MotionFault};
pub use retry::RetryPolicy;
