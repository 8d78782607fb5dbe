//! Scan orchestration state machine.
//!
//! The engine owns the whole life of a scan session: it drives the
//! positioner and sample channel through the planned coordinate sequence,
//! applies the bounded-retry policy to transient faults, honours abort
//! requests at safe boundaries, and publishes pull-based progress for any
//! front end that cares to ask.
//!
//! # State machine
//!
//! ```text
//! ┌──────┐   run(plan)    ┌─────────────────────────────────┐
//! │ Idle │───────────────▶│             Running             │
//! └──────┘                │ Moving→Settling→Acquiring→      │
//!                         │        Recording → next point   │
//!                         └──┬───────────┬───────────┬──────┘
//!                sequence    │           │ abort()   │ unrecoverable
//!                exhausted   ▼           ▼           ▼ fault
//!                     ┌───────────┐ ┌─────────┐ ┌─────────┐
//!                     │ Completed │ │ Aborted │ │ Faulted │
//!                     └───────────┘ └─────────┘ └─────────┘
//! ```
//!
//! Recoverable faults never leave `Running`: the affected point retries
//! under the policy and, once retries are exhausted, is recorded as failed
//! so the sweep keeps its partial results. Transient hardware flakiness is
//! the dominant failure mode of an hours-long mechanical scan, and
//! abandoning the whole grid over one bad point would throw the rest away.
//!
//! `Faulted` is reserved for unrecoverable conditions (communication loss):
//! the engine stops commanding hardware entirely and the state tells the
//! operator a manual reset may be needed before the next scan.
//!
//! # Concurrency
//!
//! One scan runs on one task; hardware calls block its progress, matching
//! physical reality. `abort()`, `status()`, `progress()`, and
//! `grid_snapshot()` are safe to call from other tasks: the abort flag is
//! observed between sub-cycle steps (never mid-motion or mid-acquisition,
//! since drivers rarely support safe cancellation in flight), and readers
//! get an immutable snapshot taken at the last `Recording` transition, not
//! the live session state.

use crate::grid::ResultGrid;
use crate::plan::{PlanError, ScanPlan};
use chrono::Utc;
use scan_core::{Coordinate, GridIndex, RetryPolicy, SampleResult, SampleStatus};
use scan_hardware::{Positioner, SampleChannel};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Per-point sub-cycle step within `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Commanding the positioner and waiting for motion-complete.
    Moving,
    /// Damping mechanical oscillation before sampling is trusted.
    Settling,
    /// Triggering and reading the sample channel.
    Acquiring,
    /// Writing the result into the grid and advancing the cursor.
    Recording,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::Moving => write!(f, "moving"),
            ScanPhase::Settling => write!(f, "settling"),
            ScanPhase::Acquiring => write!(f, "acquiring"),
            ScanPhase::Recording => write!(f, "recording"),
        }
    }
}

/// Session state exposed on the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No session; ready to start.
    Idle,
    /// A session is executing the given sub-cycle step.
    Running(ScanPhase),
    /// The sequence was exhausted; the grid is complete.
    Completed,
    /// An abort request was honoured; the grid holds a partial result.
    Aborted,
    /// An unrecoverable fault halted the session; the grid may be
    /// unreliable and the hardware may need a manual reset.
    Faulted,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Running(phase) => write!(f, "running ({phase})"),
            ScanState::Completed => write!(f, "completed"),
            ScanState::Aborted => write!(f, "aborted"),
            ScanState::Faulted => write!(f, "faulted"),
        }
    }
}

/// Rejections raised synchronously by [`ScanEngine::run`] before a session
/// enters `Running`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Only one session may run at a time; the running scan is untouched.
    #[error("a scan session is already running")]
    AlreadyRunning,

    /// The plan failed validation.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Timing and fault-policy settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Settle wait after motion-complete, before sampling is permitted.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,

    /// Extra settle before the very first sample of a scan; the approach
    /// move is typically the longest and rings the hardest.
    #[serde(with = "humantime_serde")]
    pub first_settle: Duration,

    /// Bounded-retry policy for recoverable faults.
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            first_settle: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Pull-based progress for a front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Points recorded so far (any status).
    pub completed: usize,
    /// Points recorded as failed.
    pub failed: usize,
    /// Points the plan generates.
    pub total: usize,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Current sub-cycle step, while running.
    pub phase: Option<ScanPhase>,
}

/// Terminal result of one session.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Terminal state: `Completed`, `Aborted`, or `Faulted`.
    pub state: ScanState,
    /// The accumulated grid, partial on `Aborted`/`Faulted`.
    pub grid: Arc<ResultGrid>,
    /// Wall-clock session duration.
    pub elapsed: Duration,
}

/// Live session bookkeeping, owned exclusively by the running `run` call.
struct ScanSession {
    grid: ResultGrid,
    started: Instant,
}

#[derive(Clone, Copy)]
struct ProgressInner {
    completed: usize,
    failed: usize,
    total: usize,
    started: Instant,
    /// Set at terminal states so elapsed stops ticking once the session
    /// ends.
    frozen_elapsed: Option<Duration>,
}

enum PointOutcome {
    Recorded,
    Aborted,
    Faulted,
}

enum FaultAction {
    Retry,
    GiveUp,
    Escalate,
}

/// The scan orchestrator.
pub struct ScanEngine {
    positioner: Positioner,
    channel: SampleChannel,
    settings: EngineSettings,
    state: RwLock<ScanState>,
    abort_requested: AtomicBool,
    progress: RwLock<Option<ProgressInner>>,
    snapshot: RwLock<Option<Arc<ResultGrid>>>,
}

impl ScanEngine {
    /// Engine over a positioner and a sample channel.
    pub fn new(positioner: Positioner, channel: SampleChannel, settings: EngineSettings) -> Self {
        Self {
            positioner,
            channel,
            settings,
            state: RwLock::new(ScanState::Idle),
            abort_requested: AtomicBool::new(false),
            progress: RwLock::new(None),
            snapshot: RwLock::new(None),
        }
    }

    /// Current session state.
    pub async fn status(&self) -> ScanState {
        *self.state.read().await
    }

    /// Progress of the current (or last) session, if one ever started.
    pub async fn progress(&self) -> Option<ProgressSnapshot> {
        let inner = (*self.progress.read().await)?;
        let phase = match *self.state.read().await {
            ScanState::Running(phase) => Some(phase),
            _ => None,
        };
        Some(ProgressSnapshot {
            completed: inner.completed,
            failed: inner.failed,
            total: inner.total,
            elapsed: inner
                .frozen_elapsed
                .unwrap_or_else(|| inner.started.elapsed()),
            phase,
        })
    }

    /// Immutable snapshot of the results recorded so far, refreshed at each
    /// `Recording` transition.
    pub async fn grid_snapshot(&self) -> Option<Arc<ResultGrid>> {
        self.snapshot.read().await.clone()
    }

    /// Request an orderly stop. Takes effect at the next sub-cycle
    /// boundary, never mid-motion or mid-acquisition; everything recorded
    /// so far is preserved.
    pub fn abort(&self) {
        info!("abort requested; stopping at the next safe boundary");
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    /// Execute one scan session to its terminal state.
    ///
    /// Rejects synchronously, without touching hardware, when the plan is
    /// invalid or another session is running. Otherwise runs the session
    /// and reports how it ended; recoverable per-point failures are
    /// recorded in the grid rather than surfaced as errors.
    pub async fn run(&self, plan: ScanPlan) -> Result<ScanOutcome, SessionError> {
        {
            let mut state = self.state.write().await;
            if matches!(*state, ScanState::Running(_)) {
                return Err(SessionError::AlreadyRunning);
            }
            plan.validate()?;
            *state = ScanState::Running(ScanPhase::Moving);
        }
        self.abort_requested.store(false, Ordering::SeqCst);

        info!(
            points = plan.len(),
            cols = plan.cols(),
            rows = plan.rows(),
            traversal = ?plan.traversal,
            "scan session started"
        );
        let session = ScanSession {
            grid: ResultGrid::new(plan),
            started: Instant::now(),
        };
        self.publish(&session).await;

        // One-time channel setup; a rejected channel never scans.
        if let Err(fault) = self.channel.configure().await {
            error!(%fault, "sample channel configuration failed");
            return Ok(self.finish(session, ScanState::Faulted).await);
        }

        Ok(self.drive(session).await)
    }

    /// Drive the session through the coordinate sequence.
    async fn drive(&self, mut session: ScanSession) -> ScanOutcome {
        let mut path = session.grid.plan().path();
        let mut first_point = true;

        let terminal = loop {
            if self.abort_pending() {
                break ScanState::Aborted;
            }
            let Some((index, coordinate)) = path.next() else {
                break ScanState::Completed;
            };

            match self.scan_point(&mut session, index, coordinate, first_point).await {
                PointOutcome::Recorded => first_point = false,
                PointOutcome::Aborted => break ScanState::Aborted,
                PointOutcome::Faulted => break ScanState::Faulted,
            }
        };

        self.finish(session, terminal).await
    }

    /// One point's Moving → Settling → Acquiring → Recording sub-cycle,
    /// including its retries.
    async fn scan_point(
        &self,
        session: &mut ScanSession,
        index: GridIndex,
        coordinate: Coordinate,
        first_point: bool,
    ) -> PointOutcome {
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            self.set_phase(ScanPhase::Moving).await;
            if let Err(fault) = self.positioner.move_to(&coordinate).await {
                warn!(point = %index, %fault, attempts, "motion fault");
                match self.classify(fault.is_recoverable(), attempts) {
                    FaultAction::Escalate => return PointOutcome::Faulted,
                    FaultAction::GiveUp => {
                        self.record_failed(session, index, coordinate, attempts).await;
                        return PointOutcome::Recorded;
                    }
                    FaultAction::Retry => {
                        if self.backoff_then_abort().await {
                            return PointOutcome::Aborted;
                        }
                        continue;
                    }
                }
            }

            self.set_phase(ScanPhase::Settling).await;
            if first_point && attempts == 1 {
                self.positioner.settle(self.settings.first_settle).await;
            }
            self.positioner.settle(self.settings.settle).await;

            if self.abort_pending() {
                return PointOutcome::Aborted;
            }

            self.set_phase(ScanPhase::Acquiring).await;
            match self.channel.acquire().await {
                Ok(sample) => {
                    self.set_phase(ScanPhase::Recording).await;
                    let status = if attempts > 1 {
                        SampleStatus::Retried
                    } else {
                        SampleStatus::Ok
                    };
                    debug!(point = %index, value = sample.value, %status, "recorded");
                    session.grid.record(SampleResult {
                        index,
                        coordinate,
                        value: sample.value,
                        captured_at: sample.captured_at,
                        status,
                        attempts,
                    });
                    self.publish(session).await;
                    return PointOutcome::Recorded;
                }
                Err(fault) => {
                    warn!(point = %index, %fault, attempts, "acquisition fault");
                    match self.classify(fault.is_recoverable(), attempts) {
                        FaultAction::Escalate => return PointOutcome::Faulted,
                        FaultAction::GiveUp => {
                            self.record_failed(session, index, coordinate, attempts).await;
                            return PointOutcome::Recorded;
                        }
                        FaultAction::Retry => {
                            if self.backoff_then_abort().await {
                                return PointOutcome::Aborted;
                            }
                        }
                    }
                }
            }
        }
    }

    fn classify(&self, recoverable: bool, attempts: u32) -> FaultAction {
        if !recoverable {
            FaultAction::Escalate
        } else if self.settings.retry.attempts_left(attempts) {
            FaultAction::Retry
        } else {
            FaultAction::GiveUp
        }
    }

    /// Wait out the retry backoff; reports whether an abort arrived
    /// meanwhile.
    async fn backoff_then_abort(&self) -> bool {
        sleep(self.settings.retry.backoff_delay).await;
        self.abort_pending()
    }

    async fn record_failed(
        &self,
        session: &mut ScanSession,
        index: GridIndex,
        coordinate: Coordinate,
        attempts: u32,
    ) {
        warn!(point = %index, attempts, "retries exhausted; point marked failed");
        self.set_phase(ScanPhase::Recording).await;
        session.grid.record(SampleResult {
            index,
            coordinate,
            value: f64::NAN,
            captured_at: Utc::now(),
            status: SampleStatus::Failed,
            attempts,
        });
        self.publish(session).await;
    }

    fn abort_pending(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    async fn set_phase(&self, phase: ScanPhase) {
        *self.state.write().await = ScanState::Running(phase);
    }

    /// Refresh the pull surfaces: progress numbers and the immutable grid
    /// snapshot.
    async fn publish(&self, session: &ScanSession) {
        self.publish_with(session, None).await;
    }

    async fn publish_with(&self, session: &ScanSession, frozen_elapsed: Option<Duration>) {
        *self.progress.write().await = Some(ProgressInner {
            completed: session.grid.recorded(),
            failed: session.grid.status_counts().failed,
            total: session.grid.total(),
            started: session.started,
            frozen_elapsed,
        });
        *self.snapshot.write().await = Some(Arc::new(session.grid.clone()));
    }

    /// Freeze the session into its terminal state.
    async fn finish(&self, session: ScanSession, terminal: ScanState) -> ScanOutcome {
        let elapsed = session.started.elapsed();
        self.publish_with(&session, Some(elapsed)).await;
        let grid = Arc::new(session.grid);
        *self.state.write().await = terminal;

        match terminal {
            ScanState::Completed => {
                info!(points = grid.recorded(), ?elapsed, "scan completed");
            }
            ScanState::Aborted => {
                warn!(
                    recorded = grid.recorded(),
                    total = grid.total(),
                    "scan aborted; partial results preserved"
                );
            }
            ScanState::Faulted => {
                error!(
                    recorded = grid.recorded(),
                    "scan faulted; hardware may require a manual reset"
                );
            }
            _ => {}
        }

        ScanOutcome {
            state: terminal,
            grid,
            elapsed,
        }
    }
}
