//! Fault-policy integration tests: bounded retries, escalation, abort.

use scan_core::{
    AcquisitionFault, FilterKind, MotionFault, Readable, RetryPolicy, SampleStatus,
};
use scan_engine::{AxisRange, EngineSettings, ScanEngine, ScanPlan, ScanState, Traversal};
use scan_hardware::{BeamProfile, ChannelSettings, SampleChannel, SimulatedRig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn quiet_profile() -> BeamProfile {
    BeamProfile {
        noise: 0.0,
        ..BeamProfile::default()
    }
}

fn settings_with_retries(max_attempts: u32) -> EngineSettings {
    EngineSettings {
        settle: Duration::ZERO,
        first_settle: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts,
            backoff_delay: Duration::ZERO,
        },
    }
}

fn engine_for(rig: &SimulatedRig, settings: EngineSettings) -> ScanEngine {
    let channel = SampleChannel::new(
        rig.probe.clone() as Arc<dyn Readable>,
        ChannelSettings {
            samples_per_point: 1,
            sample_interval: Duration::ZERO,
            filter: FilterKind::Mean,
        },
    );
    ScanEngine::new(rig.positioner(), channel, settings)
}

/// Two points on one row: the fault scripts land on the first point.
fn two_point_plan() -> ScanPlan {
    ScanPlan {
        x: AxisRange::new(0.0, 1.0, 1.0),
        y: AxisRange::new(0.0, 0.0, 1.0),
        traversal: Traversal::Serpentine,
        boundary: Default::default(),
    }
}

#[tokio::test]
async fn test_exhausted_retries_mark_point_failed_and_continue() {
    let rig = SimulatedRig::instant(quiet_profile());
    // Exactly as many consecutive faults as the attempt limit.
    for _ in 0..3 {
        rig.probe.inject_fault(AcquisitionFault::Busy).await;
    }
    let engine = engine_for(&rig, settings_with_retries(3));

    let outcome = engine.run(two_point_plan()).await.unwrap();

    // The scan continued past the bad point instead of aborting.
    assert_eq!(outcome.state, ScanState::Completed);
    assert!(outcome.grid.is_complete());

    let counts = outcome.grid.status_counts();
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.ok, 1);

    let failed = outcome.grid.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!((failed[0].x, failed[0].y), (0.0, 0.0));

    // The failed cell carries the NaN sentinel in the export.
    let array = outcome.grid.export();
    assert!(array[0][0].is_nan());
    assert!(array[0][1].is_finite());
}

#[tokio::test]
async fn test_success_after_faults_marks_point_retried() {
    let rig = SimulatedRig::instant(quiet_profile());
    // One fewer fault than the attempt limit: the final attempt succeeds.
    for _ in 0..2 {
        rig.probe.inject_fault(AcquisitionFault::Busy).await;
    }
    let engine = engine_for(&rig, settings_with_retries(3));

    let outcome = engine.run(two_point_plan()).await.unwrap();

    assert_eq!(outcome.state, ScanState::Completed);
    let counts = outcome.grid.status_counts();
    assert_eq!(counts.retried, 1);
    assert_eq!(counts.ok, 1);
    assert_eq!(counts.failed, 0);

    let first = outcome.grid.get(scan_core::GridIndex::new(0, 0)).unwrap();
    assert_eq!(first.status, SampleStatus::Retried);
    assert_eq!(first.attempts, 3);
    assert!(first.value.is_finite());
}

#[tokio::test]
async fn test_motion_faults_follow_the_same_policy() {
    let rig = SimulatedRig::instant(quiet_profile());
    rig.x.inject_fault(MotionFault::Stall { target: 0.0 }).await;
    let engine = engine_for(&rig, settings_with_retries(3));

    let outcome = engine.run(two_point_plan()).await.unwrap();

    assert_eq!(outcome.state, ScanState::Completed);
    let first = outcome.grid.get(scan_core::GridIndex::new(0, 0)).unwrap();
    assert_eq!(first.status, SampleStatus::Retried);
    assert_eq!(first.attempts, 2);
}

#[tokio::test]
async fn test_communication_loss_escalates_to_faulted() {
    let rig = SimulatedRig::instant(quiet_profile());
    let engine = engine_for(&rig, settings_with_retries(3));

    // The digitizer disappears on the very first acquisition.
    rig.probe
        .inject_fault(AcquisitionFault::CommunicationLoss("usb unplugged".into()))
        .await;

    let outcome = engine.run(two_point_plan()).await.unwrap();

    assert_eq!(outcome.state, ScanState::Faulted);
    assert_eq!(engine.status().await, ScanState::Faulted);
    // No retry, no continuation: the engine stopped commanding hardware.
    assert_eq!(outcome.grid.recorded(), 0);
    assert_eq!(outcome.grid.missing().len(), 2);
}

#[tokio::test]
async fn test_motion_communication_loss_also_faults() {
    let rig = SimulatedRig::instant(quiet_profile());
    rig.x
        .inject_fault(MotionFault::CommunicationLoss("port closed".into()))
        .await;
    let engine = engine_for(&rig, settings_with_retries(3));

    let outcome = engine.run(two_point_plan()).await.unwrap();
    assert_eq!(outcome.state, ScanState::Faulted);
    assert_eq!(outcome.grid.recorded(), 0);
}

#[tokio::test]
async fn test_rejected_channel_settings_never_scan() {
    let rig = SimulatedRig::instant(quiet_profile());
    let channel = SampleChannel::new(
        rig.probe.clone() as Arc<dyn Readable>,
        ChannelSettings {
            samples_per_point: 0,
            sample_interval: Duration::ZERO,
            filter: FilterKind::Mean,
        },
    );
    let engine = ScanEngine::new(rig.positioner(), channel, settings_with_retries(3));

    let outcome = engine.run(two_point_plan()).await.unwrap();
    assert_eq!(outcome.state, ScanState::Faulted);
    assert_eq!(outcome.grid.recorded(), 0);
}

#[tokio::test]
async fn test_abort_preserves_recorded_results() {
    let rig = SimulatedRig::instant(quiet_profile());
    let engine = Arc::new(engine_for(
        &rig,
        EngineSettings {
            // Slow enough that the abort lands mid-scan.
            settle: Duration::from_millis(15),
            ..settings_with_retries(3)
        },
    ));

    let plan = ScanPlan {
        x: AxisRange::new(0.0, 5.0, 1.0),
        y: AxisRange::new(0.0, 3.0, 1.0),
        traversal: Traversal::Serpentine,
        boundary: Default::default(),
    };
    let total = plan.len();

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(plan).await })
    };

    // Let at least one point land, then ask for an orderly stop.
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(progress) = engine.progress().await {
                if progress.completed >= 1 {
                    break;
                }
            }
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    engine.abort();

    let outcome = runner.await.unwrap().unwrap();
    assert_eq!(outcome.state, ScanState::Aborted);

    // Partial results survived, and the remainder is accounted for.
    let recorded = outcome.grid.recorded();
    assert!(recorded >= 1, "abort dropped recorded points");
    assert!(recorded < total, "abort never took effect");
    assert_eq!(outcome.grid.missing().len(), total - recorded);

    // The exported array still has the full planned shape.
    let array = outcome.grid.export();
    assert_eq!(array.len(), 4);
    assert!(array.iter().all(|row| row.len() == 6));
}
