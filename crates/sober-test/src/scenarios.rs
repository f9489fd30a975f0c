//! End-to-end scenarios over the harness

use std::time::Duration;

use proptest::prelude::*;

use sober_biometric::CapturePurpose;
use sober_core::{CaptureError, SensorEvent, VehicleCommand, DEFAULT_BLOCK_WINDOW};
use sober_policy::{AuthorizationState, Input, Outcome, Phase, PolicyConfig, PolicyEngine};
use sober_registry::MemoryRegistry;
use sober_time::{ManualClock, TickOutcome};

use crate::{
    uniform_encoding, InterlockHarness, LogCapture, ScriptedCamera, ScriptedComparator,
    HARNESS_EPOCH,
};

use VehicleCommand::*;

async fn blocked_harness() -> InterlockHarness {
    let mut h = InterlockHarness::new();
    h.camera.push_face(uniform_encoding(0.8));
    h.send("BLOCKED").await.unwrap();
    assert_eq!(h.commands().await, vec![Lock]);
    h
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn scenario_a_alcohol_then_block_locks_and_alerts() {
    let mut h = InterlockHarness::new();
    h.camera.push_face(uniform_encoding(0.8));

    h.send("ALCOHOL:750").await.unwrap();
    assert!(h.commands().await.is_empty());

    h.send("BLOCKED").await.unwrap();
    assert_eq!(h.commands().await, vec![Lock]);

    let block = h.state().block().unwrap();
    assert_eq!(block.blocked_since(), HARNESS_EPOCH);
    assert_eq!(block.blocked_until(), HARNESS_EPOCH + Duration::from_secs(3 * 3600));
    assert!(h.registry.current().block.is_some());

    assert_eq!(h.wait_for_alerts(1).await, 1);
    let alert = &h.notifier.alerts()[0];
    assert_eq!(alert.alcohol_level, Some(750));
    assert_eq!(alert.blocked_until, block.blocked_until());
    assert_eq!(alert.location.city.as_deref(), Some("Test City"));
}

#[tokio::test]
async fn scenario_b_recheck_different_driver_unlocks() {
    let mut h = blocked_harness().await;

    h.send("RECHECK").await.unwrap();
    assert_eq!(h.state().phase(), Phase::AwaitingRecheck);

    h.camera.push_face(uniform_encoding(0.1));
    h.comparator.push_score(0.2);
    h.send("CMD:CHECK_FACE").await.unwrap();

    assert_eq!(h.commands().await, vec![FaceDifferent, Unlock]);
    assert_eq!(h.state().phase(), Phase::Unblocked);
    assert!(h.registry.current().block.is_none());
}

#[tokio::test]
async fn scenario_c_recheck_same_driver_stays_locked() {
    let mut h = blocked_harness().await;
    let until = h.state().block().unwrap().blocked_until();
    let saves = h.registry.save_count();

    h.send("RECHECK").await.unwrap();
    h.camera.push_face(uniform_encoding(0.8));
    h.comparator.push_score(0.9);
    h.send("CMD:CHECK_FACE").await.unwrap();

    assert_eq!(h.commands().await, vec![FaceSame]);
    assert_eq!(h.state().phase(), Phase::Blocked);
    assert_eq!(h.state().block().unwrap().blocked_until(), until);
    assert_eq!(h.registry.save_count(), saves);
}

#[tokio::test]
async fn scenario_d_block_capture_fails_twice() {
    let (logs, _guard) = LogCapture::install();
    let mut h = InterlockHarness::new();
    h.camera.push_failure(CaptureError::NoFace);
    h.camera.push_failure(CaptureError::Timeout(Duration::from_secs(5)));

    h.send("BLOCKED").await.unwrap();

    assert!(h.commands().await.is_empty());
    assert_eq!(
        h.camera.purposes(),
        vec![CapturePurpose::BlockedDriver, CapturePurpose::BlockedDriver]
    );
    assert_eq!(h.state().phase(), Phase::Unblocked);
    assert_eq!(h.registry.save_count(), 0);
    assert_eq!(h.wait_for_alerts(0).await, 0);

    assert_eq!(h.interlock().last_outcome(), Some(Outcome::BlockNotStarted));
    let errors = logs.errors();
    assert_eq!(errors.len(), 1, "errors logged: {errors:?}");
    assert!(errors[0].contains("vehicle not locked"));
}

// ============================================================================
// SUPPLEMENTARY
// ============================================================================

#[tokio::test]
async fn unblocked_line_never_triggers_block() {
    let mut h = blocked_harness().await;

    h.send("STATUS: UNBLOCKED").await.unwrap();

    assert!(h.commands().await.is_empty());
    assert_eq!(h.state().phase(), Phase::Unblocked);
    assert!(h.registry.current().block.is_none());
    assert_eq!(h.camera.calls(), 1);
}

#[tokio::test]
async fn verify_during_block_compares_and_never_clears() {
    let mut h = blocked_harness().await;
    let until = h.state().block().unwrap().blocked_until();

    h.camera.push_face(uniform_encoding(0.8));
    h.send("CMD:VERIFY_DRIVER").await.unwrap();
    assert_eq!(h.commands().await, vec![FaceBlocked]);

    h.camera.push_face(uniform_encoding(-0.5));
    h.send("CMD:VERIFY_DRIVER").await.unwrap();
    assert_eq!(h.commands().await, vec![FaceAllowed]);

    assert_eq!(h.comparator.comparisons(), 2);
    assert_eq!(h.state().phase(), Phase::Blocked);
    let history = h.registry.current().history;
    assert_eq!(history.len(), 1);
    assert_eq!(history.last().unwrap().blocked_until, Some(until));
}

#[tokio::test]
async fn block_expires_on_tick_without_input() {
    let mut h = blocked_harness().await;

    h.advance(DEFAULT_BLOCK_WINDOW);
    h.tick().await.unwrap();
    assert_eq!(h.state().phase(), Phase::Blocked);

    h.advance(Duration::from_secs(1));
    assert_eq!(h.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(h.state().phase(), Phase::Unblocked);
    assert!(h.registry.current().block.is_none());
    assert!(h.commands().await.is_empty());
}

#[tokio::test]
async fn restart_restores_unexpired_block() {
    let h = blocked_harness().await;
    let until = h.state().block().unwrap().blocked_until();
    h.advance(Duration::from_secs(60));

    let mut h = h.restart();
    assert_eq!(h.state().phase(), Phase::Blocked);
    assert_eq!(h.state().block().unwrap().blocked_until(), until);

    h.camera.push_face(uniform_encoding(0.8));
    h.send("CMD:VERIFY_DRIVER").await.unwrap();
    assert_eq!(h.commands().await, vec![FaceBlocked]);
}

#[tokio::test]
async fn restart_after_window_starts_unblocked_and_persists_drop() {
    let h = blocked_harness().await;
    h.advance(DEFAULT_BLOCK_WINDOW + Duration::from_secs(1));

    let mut h = h.restart();
    assert_eq!(h.state().phase(), Phase::Unblocked);
    assert!(h.registry.current().block.is_some());

    h.tick().await.unwrap();
    assert!(h.registry.current().block.is_none());
}

#[tokio::test]
async fn save_failure_still_locks() {
    let registry = MemoryRegistry::new();
    registry.set_fail_saves(true);
    let mut h = InterlockHarness::with_registry(registry);
    h.camera.push_face(uniform_encoding(0.8));

    h.send("BLOCKED").await.unwrap();

    assert_eq!(h.commands().await, vec![Lock]);
    assert!(h.state().is_blocked());
    assert_eq!(h.interlock().stats().save_failures, 1);
}

#[tokio::test]
async fn notification_failure_does_not_reverse_lock() {
    let mut h = InterlockHarness::new();
    h.notifier.set_failing(true);
    h.camera.push_face(uniform_encoding(0.8));

    h.send("BLOCKED").await.unwrap();

    assert_eq!(h.commands().await, vec![Lock]);
    assert_eq!(h.wait_for_alerts(1).await, 1);
    assert!(h.state().is_blocked());
}

#[tokio::test]
async fn external_unblock_clears_pending_recheck() {
    let mut h = blocked_harness().await;
    h.send("RECHECK").await.unwrap();

    h.send("UNBLOCKED").await.unwrap();
    assert_eq!(h.state().phase(), Phase::Unblocked);

    // A late face check is ignored once the flag is gone
    h.send("CMD:CHECK_FACE").await.unwrap();
    assert!(h.commands().await.is_empty());
    assert_eq!(h.camera.calls(), 1);
}

#[tokio::test]
async fn verification_when_unblocked_appends_history() {
    let mut h = InterlockHarness::new();
    h.camera.push_face(uniform_encoding(0.1));
    h.camera.push_empty_frame();
    h.camera.push_face(uniform_encoding(0.2));

    h.send("CMD:VERIFY_DRIVER").await.unwrap();
    h.send("CMD:VERIFY_DRIVER").await.unwrap();
    h.send("CMD:VERIFY_DRIVER").await.unwrap();

    assert_eq!(h.commands().await, vec![FaceAllowed, FaceError, FaceAllowed]);
    let history = h.registry.current().history;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|r| r.blocked_until.is_none()));
    assert!(history.records()[0].verified_at <= history.records()[1].verified_at);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn verify_before_expiry_never_clears(
        similarity in 0.0f64..=1.0,
        offset_secs in 0u64..=(3 * 3600),
    ) {
        let clock = ManualClock::new(HARNESS_EPOCH);
        let camera = ScriptedCamera::new();
        let comparator = ScriptedComparator::new();
        let mut engine = PolicyEngine::new(
            PolicyConfig::default(),
            camera.clone(),
            comparator.clone(),
            clock.clone(),
        );

        camera.push_face(uniform_encoding(0.5));
        let (state, _) = engine.handle(
            AuthorizationState::new(),
            Input::Sensor(SensorEvent::AlcoholBlockTriggered),
        );
        prop_assert!(state.is_blocked());

        clock.advance(Duration::from_secs(offset_secs));
        camera.push_face(uniform_encoding(0.4));
        comparator.push_score(similarity);
        let (state, decision) = engine.handle(state, Input::Sensor(SensorEvent::VerifyDriverRequest));

        prop_assert_eq!(comparator.comparisons(), 1);
        prop_assert!(state.is_blocked());
        prop_assert!(!decision.commands.contains(&Unlock));
        let expected = if similarity < 0.5 { FaceAllowed } else { FaceBlocked };
        prop_assert_eq!(decision.commands, vec![expected]);
    }
}
