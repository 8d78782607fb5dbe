//! Hardware drivers.
//!
//! The mock rig is always compiled and backs tests and `--mock` runs. The
//! serial stepper-controller driver needs the `serial` feature (default).

pub mod mock;

#[cfg(feature = "serial")]
pub mod stepper;
