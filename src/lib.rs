//! # beamscan
//!
//! Front-end crate for the beamscan workspace: configuration loading, rig
//! assembly, and the CLI entry point (`main.rs`). The actual scan machinery
//! lives in the member crates, re-exported here for convenience:
//!
//! - [`scan_core`]: shared types, fault taxonomy, capability traits
//! - [`scan_hardware`]: driver shims, positioner, sample channel, registry
//! - [`scan_engine`]: grid planner, result grid, scan state machine
//! - [`scan_storage`]: CSV grid export and the scan manifest

pub mod config;
pub mod rig;

pub use scan_core;
pub use scan_engine;
pub use scan_hardware;
pub use scan_storage;
