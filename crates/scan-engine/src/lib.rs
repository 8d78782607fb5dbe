//! # scan-engine
//!
//! The orchestration core of beamscan:
//!
//! - [`plan`]: scan plans and the lazy grid-path generator that turns
//!   bounds + step into an ordered coordinate sequence (row-major or
//!   serpentine).
//! - [`grid`]: the spatially-indexed result accumulator, exportable as a
//!   dense 2-D array whose shape always matches the plan.
//! - [`engine`]: the scan state machine: drives the positioner and sample
//!   channel through the planned sequence, applies the bounded-retry fault
//!   policy, honours abort requests at safe boundaries, and publishes
//!   pull-based progress.

pub mod engine;
pub mod grid;
pub mod plan;

pub use engine::{
    EngineSettings, ProgressSnapshot, ScanEngine, ScanOutcome, ScanPhase, ScanState, SessionError,
};
pub use grid::{ResultGrid, StatusCounts};
pub use plan::{AxisRange, BoundaryPolicy, GridPath, PlanError, ScanPlan, Traversal};
