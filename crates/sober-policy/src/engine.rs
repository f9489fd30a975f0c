//! Policy engine

use std::time::Duration;

use sober_biometric::{
    Camera, CapturePurpose, FaceComparator, MatchPolicy, Verdict, DEFAULT_CAPTURE_TIMEOUT,
};
use sober_core::{
    BlockAlert, BlockState, CaptureError, DriverRecord, FaceEncoding, SensorEvent, Timestamp,
    VehicleCommand, DEFAULT_BLOCK_WINDOW,
};
use sober_time::Clock;
use tracing::{debug, error, info, warn};

use crate::{AuthorizationState, Decision, Input, Outcome};

/// Policy configuration
#[derive(Clone, Debug)]
pub struct PolicyConfig {
    /// How long a block lasts
    pub block_window: Duration,
    /// Upper bound for one capture attempt
    pub capture_timeout: Duration,
    /// Extra capture attempts when recording a blocked driver
    pub capture_retries: u32,
    pub match_policy: MatchPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            block_window: DEFAULT_BLOCK_WINDOW,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            capture_retries: 1,
            match_policy: MatchPolicy::default(),
        }
    }
}

/// The authorization state machine
pub struct PolicyEngine {
    config: PolicyConfig,
    camera: Box<dyn Camera>,
    comparator: Box<dyn FaceComparator>,
    clock: Box<dyn Clock>,
}

impl PolicyEngine {
    pub fn new<C, F, K>(config: PolicyConfig, camera: C, comparator: F, clock: K) -> Self
    where
        C: Camera + 'static,
        F: FaceComparator + 'static,
        K: Clock + 'static,
    {
        PolicyEngine {
            config,
            camera: Box::new(camera),
            comparator: Box::new(comparator),
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Run one transition.
    ///
    /// Clock-driven expiry is applied first, then the input is dispatched.
    pub fn handle(
        &mut self,
        mut state: AuthorizationState,
        input: Input,
    ) -> (AuthorizationState, Decision) {
        let now = self.clock.now();
        let restored_drop = std::mem::take(&mut state.dirty);
        let expired = self.apply_expiry(&mut state, now);

        let mut decision = match input {
            Input::Tick if expired => Decision::new(Outcome::BlockExpired),
            Input::Tick => Decision::idle(),
            Input::Sensor(event) => self.on_event(&mut state, event, now),
        };
        decision.persist |= expired || restored_drop;

        if !decision.is_noop() {
            debug!(
                outcome = %decision.outcome,
                phase = %state.phase(),
                commands = ?decision.commands,
                persist = decision.persist,
                "Transition"
            );
        }
        (state, decision)
    }

    fn apply_expiry(&self, state: &mut AuthorizationState, now: Timestamp) -> bool {
        match state.block.as_ref() {
            Some(block) if block.is_expired(now) => {
                let until = block.blocked_until();
                state.clear_block();
                info!(blocked_until = %until, "Block window expired");
                true
            }
            _ => false,
        }
    }

    fn on_event(
        &mut self,
        state: &mut AuthorizationState,
        event: SensorEvent,
        now: Timestamp,
    ) -> Decision {
        match event {
            SensorEvent::AlcoholReading(level) => {
                debug!(level, "Alcohol reading");
                state.last_alcohol_level = Some(level);
                Decision::new(Outcome::AlcoholRecorded(level))
            }
            SensorEvent::VerifyDriverRequest => match state.block.as_ref() {
                Some(block) => {
                    let blocked = block.encoding().clone();
                    let until = block.blocked_until();
                    self.verify_during_block(state, &blocked, until, now)
                }
                None => self.verify_unblocked(state, now),
            },
            SensorEvent::AlcoholBlockTriggered => self.start_block(state, now),
            SensorEvent::RecheckRequested => {
                info!(blocked = state.is_blocked(), "Recheck requested");
                state.awaiting_recheck = true;
                Decision::new(Outcome::RecheckArmed)
            }
            SensorEvent::CheckFaceRequested => self.recheck_face(state),
            SensorEvent::ExternalUnblockNotice => {
                let cleared = state.clear_block();
                info!(had_block = cleared.is_some(), "Block lifted by microcontroller");
                Decision::new(Outcome::ExternalUnblock).persisted()
            }
        }
    }

    fn verify_unblocked(&mut self, state: &mut AuthorizationState, now: Timestamp) -> Decision {
        match self.capture_face(CapturePurpose::Verification, 0) {
            Ok(encoding) => {
                state.history.append(DriverRecord::new(encoding, now));
                info!(history = state.history.len(), "Driver verified");
                Decision::new(Outcome::DriverAllowed { during_block: false })
                    .persisted()
                    .with_command(VehicleCommand::FaceAllowed)
            }
            Err(_) => Decision::new(Outcome::CaptureFailed(CapturePurpose::Verification))
                .with_command(VehicleCommand::FaceError),
        }
    }

    fn verify_during_block(
        &mut self,
        state: &mut AuthorizationState,
        blocked: &FaceEncoding,
        until: Timestamp,
        now: Timestamp,
    ) -> Decision {
        let encoding = match self.capture_face(CapturePurpose::Verification, 0) {
            Ok(encoding) => encoding,
            Err(_) => {
                return Decision::new(Outcome::CaptureFailed(CapturePurpose::Verification))
                    .with_command(VehicleCommand::FaceBlocked)
            }
        };

        match self.compare(&encoding, blocked) {
            Verdict::Different => {
                state
                    .history
                    .append(DriverRecord::new(encoding, now).during_block(until));
                info!(blocked_until = %until, "Different driver allowed during block");
                Decision::new(Outcome::DriverAllowed { during_block: true })
                    .persisted()
                    .with_command(VehicleCommand::FaceAllowed)
            }
            Verdict::Same => {
                warn!(blocked_until = %until, "Blocked driver refused");
                Decision::new(Outcome::DriverRefused).with_command(VehicleCommand::FaceBlocked)
            }
        }
    }

    fn start_block(&mut self, state: &mut AuthorizationState, now: Timestamp) -> Decision {
        let encoding = match self.capture_face(CapturePurpose::BlockedDriver, self.config.capture_retries)
        {
            Ok(encoding) => encoding,
            Err(e) => {
                error!(error = %e, "Could not record blocked driver; vehicle not locked");
                return Decision::new(Outcome::BlockNotStarted);
            }
        };

        let block = match BlockState::starting(encoding, now, self.config.block_window) {
            Ok(block) => block,
            Err(e) => {
                error!(error = %e, "Invalid block window");
                return Decision::new(Outcome::BlockNotStarted);
            }
        };

        let until = block.blocked_until();
        if let Some(previous) = state.block.replace(block) {
            debug!(previous_until = %previous.blocked_until(), "Replacing active block");
        }
        state.awaiting_recheck = false;

        warn!(
            blocked_until = %until,
            alcohol_level = ?state.last_alcohol_level,
            "Alcohol block started"
        );

        let alert = BlockAlert {
            raised_at: now,
            blocked_until: until,
            alcohol_level: state.last_alcohol_level,
        };
        Decision::new(Outcome::BlockStarted { until })
            .persisted()
            .with_command(VehicleCommand::Lock)
            .with_alert(alert)
    }

    fn recheck_face(&mut self, state: &mut AuthorizationState) -> Decision {
        if !state.awaiting_recheck {
            debug!("Face check without pending recheck");
            return Decision::new(Outcome::Ignored);
        }
        state.awaiting_recheck = false;

        let blocked = match state.block.as_ref() {
            Some(block) => block.encoding().clone(),
            None => {
                info!("Recheck passed with no block in place");
                return Decision::new(Outcome::RecheckWithoutBlock)
                    .with_command(VehicleCommand::FaceAllowed)
                    .with_command(VehicleCommand::Unlock);
            }
        };

        let encoding = match self.capture_face(CapturePurpose::Recheck, 0) {
            Ok(encoding) => encoding,
            Err(_) => {
                return Decision::new(Outcome::CaptureFailed(CapturePurpose::Recheck))
                    .with_command(VehicleCommand::FaceError)
            }
        };

        match self.compare(&encoding, &blocked) {
            Verdict::Different => {
                state.clear_block();
                info!("Recheck found a different driver; block lifted");
                Decision::new(Outcome::RecheckCleared)
                    .with_command(VehicleCommand::FaceDifferent)
                    .persisted()
                    .with_command(VehicleCommand::Unlock)
            }
            Verdict::Same => {
                warn!("Recheck found the blocked driver; block kept");
                Decision::new(Outcome::RecheckKeptBlock).with_command(VehicleCommand::FaceSame)
            }
        }
    }

    /// Capture and encode a face, trying `1 + retries` times
    fn capture_face(
        &mut self,
        purpose: CapturePurpose,
        retries: u32,
    ) -> Result<FaceEncoding, CaptureError> {
        let attempts = retries.saturating_add(1);
        let mut last = CaptureError::NoFace;

        for attempt in 1..=attempts {
            match self.camera.capture(purpose, self.config.capture_timeout) {
                Ok(frame) => match self.comparator.encode(&frame) {
                    Some(encoding) => return Ok(encoding),
                    None => last = CaptureError::NoFace,
                },
                Err(e) => last = e,
            }
            warn!(%purpose, attempt, attempts, error = %last, "Face capture failed");
        }
        Err(last)
    }

    fn compare(&self, candidate: &FaceEncoding, blocked: &FaceEncoding) -> Verdict {
        let similarity = self.comparator.similarity(candidate, blocked);
        let verdict = self.config.match_policy.classify(similarity);
        debug!(
            similarity,
            threshold = self.config.match_policy.threshold,
            ?verdict,
            "Compared against blocked driver"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use sober_biometric::CapturedFrame;
    use sober_core::ENCODING_DIMENSIONS;
    use sober_registry::RegistrySnapshot;
    use sober_time::ManualClock;

    use crate::Phase;

    #[derive(Clone, Default)]
    struct FakeCamera {
        script: Arc<Mutex<VecDeque<Result<CapturedFrame, CaptureError>>>>,
        calls: Arc<Mutex<u32>>,
    }

    impl FakeCamera {
        fn face(&self, seed: f64) {
            let encoding = FaceEncoding::new(vec![seed; ENCODING_DIMENSIONS]).unwrap();
            self.script
                .lock()
                .push_back(Ok(CapturedFrame::new(Timestamp::UNIX_EPOCH, vec![encoding])));
        }

        fn fail(&self, error: CaptureError) {
            self.script.lock().push_back(Err(error));
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl Camera for FakeCamera {
        fn capture(
            &mut self,
            _purpose: CapturePurpose,
            timeout: Duration,
        ) -> Result<CapturedFrame, CaptureError> {
            *self.calls.lock() += 1;
            self.script
                .lock()
                .pop_front()
                .unwrap_or(Err(CaptureError::Timeout(timeout)))
        }
    }

    /// Returns scripted similarity scores, 1.0 when the script runs out
    #[derive(Clone, Default)]
    struct FakeComparator {
        scores: Arc<Mutex<VecDeque<f64>>>,
        comparisons: Arc<Mutex<u32>>,
    }

    impl FakeComparator {
        fn score(&self, similarity: f64) {
            self.scores.lock().push_back(similarity);
        }

        fn comparisons(&self) -> u32 {
            *self.comparisons.lock()
        }
    }

    impl FaceComparator for FakeComparator {
        fn encode(&self, frame: &CapturedFrame) -> Option<FaceEncoding> {
            frame.faces.first().cloned()
        }

        fn similarity(&self, _a: &FaceEncoding, _b: &FaceEncoding) -> f64 {
            *self.comparisons.lock() += 1;
            self.scores.lock().pop_front().unwrap_or(1.0)
        }
    }

    struct Fixture {
        engine: PolicyEngine,
        camera: FakeCamera,
        comparator: FakeComparator,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let camera = FakeCamera::default();
        let comparator = FakeComparator::default();
        let clock = ManualClock::new(Timestamp::from_secs(1_700_000_000));
        let engine = PolicyEngine::new(
            PolicyConfig::default(),
            camera.clone(),
            comparator.clone(),
            clock.clone(),
        );
        Fixture {
            engine,
            camera,
            comparator,
            clock,
        }
    }

    fn sensor(event: SensorEvent) -> Input {
        Input::Sensor(event)
    }

    fn blocked(fx: &mut Fixture) -> AuthorizationState {
        fx.camera.face(0.9);
        let (state, decision) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::AlcoholBlockTriggered));
        assert_eq!(decision.commands, vec![VehicleCommand::Lock]);
        state
    }

    #[test]
    fn test_verify_unblocked_records_driver() {
        let mut fx = fixture();
        fx.camera.face(0.1);

        let (state, decision) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::VerifyDriverRequest));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceAllowed]);
        assert!(decision.persist);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history().last().unwrap().blocked_until, None);
        assert_eq!(state.phase(), Phase::Unblocked);
    }

    #[test]
    fn test_verify_unblocked_capture_failure() {
        let mut fx = fixture();
        fx.camera.fail(CaptureError::NoFace);

        let (state, decision) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::VerifyDriverRequest));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceError]);
        assert!(!decision.persist);
        assert!(state.history().is_empty());
        assert_eq!(fx.camera.calls(), 1);
    }

    #[test]
    fn test_block_started_with_alert() {
        let mut fx = fixture();
        let start = fx.clock.now();

        let (state, _) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::AlcoholReading(750)));
        fx.camera.face(0.9);
        let (state, decision) = fx
            .engine
            .handle(state, sensor(SensorEvent::AlcoholBlockTriggered));

        assert_eq!(decision.commands, vec![VehicleCommand::Lock]);
        assert!(decision.persist);
        let alert = decision.alert.unwrap();
        assert_eq!(alert.alcohol_level, Some(750));
        assert_eq!(alert.blocked_until, start + DEFAULT_BLOCK_WINDOW);
        assert_eq!(state.block().unwrap().blocked_until(), start + DEFAULT_BLOCK_WINDOW);
        assert_eq!(state.phase(), Phase::Blocked);
    }

    #[test]
    fn test_block_capture_retried_once() {
        let mut fx = fixture();
        fx.camera.fail(CaptureError::NoFace);
        fx.camera.face(0.9);

        let (state, decision) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::AlcoholBlockTriggered));

        assert_eq!(fx.camera.calls(), 2);
        assert_eq!(decision.commands, vec![VehicleCommand::Lock]);
        assert!(state.is_blocked());
    }

    #[test]
    fn test_block_not_started_after_two_failures() {
        let mut fx = fixture();
        fx.camera.fail(CaptureError::NoFace);
        fx.camera.fail(CaptureError::Timeout(Duration::from_secs(5)));

        let (state, decision) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::AlcoholBlockTriggered));

        assert_eq!(fx.camera.calls(), 2);
        assert_eq!(decision.outcome, Outcome::BlockNotStarted);
        assert!(decision.is_noop());
        assert!(!state.is_blocked());
    }

    #[test]
    fn test_verify_during_block_never_clears() {
        for similarity in [0.0, 0.2, 0.4999, 0.5, 0.9, 1.0] {
            let mut fx = fixture();
            let state = blocked(&mut fx);
            let until = state.block().unwrap().blocked_until();
            fx.clock.set(until);
            fx.camera.face(0.1);
            fx.comparator.score(similarity);

            let (state, decision) = fx
                .engine
                .handle(state, sensor(SensorEvent::VerifyDriverRequest));

            assert_eq!(fx.comparator.comparisons(), 1);
            assert!(state.is_blocked(), "similarity {similarity} cleared the block");
            if similarity < 0.5 {
                assert_eq!(decision.commands, vec![VehicleCommand::FaceAllowed]);
                assert_eq!(state.history().last().unwrap().blocked_until, Some(until));
            } else {
                assert_eq!(decision.commands, vec![VehicleCommand::FaceBlocked]);
                assert!(state.history().is_empty());
            }
        }
    }

    #[test]
    fn test_verify_during_block_capture_failure_refuses() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        fx.camera.fail(CaptureError::Device("unplugged".into()));

        let (state, decision) = fx
            .engine
            .handle(state, sensor(SensorEvent::VerifyDriverRequest));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceBlocked]);
        assert!(state.is_blocked());
        assert_eq!(fx.comparator.comparisons(), 0);
    }

    #[test]
    fn test_recheck_different_driver_unlocks() {
        let mut fx = fixture();
        let state = blocked(&mut fx);

        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::RecheckRequested));
        assert_eq!(decision.outcome, Outcome::RecheckArmed);
        assert_eq!(state.phase(), Phase::AwaitingRecheck);

        fx.camera.face(0.1);
        fx.comparator.score(0.2);
        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::CheckFaceRequested));

        assert_eq!(
            decision.commands,
            vec![VehicleCommand::FaceDifferent, VehicleCommand::Unlock]
        );
        assert!(decision.persist);
        assert_eq!(state.phase(), Phase::Unblocked);
    }

    #[test]
    fn test_recheck_same_driver_stays_blocked() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        let until = state.block().unwrap().blocked_until();

        let (state, _) = fx.engine.handle(state, sensor(SensorEvent::RecheckRequested));
        fx.camera.face(0.9);
        fx.comparator.score(0.9);
        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::CheckFaceRequested));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceSame]);
        assert!(!decision.persist);
        assert_eq!(state.phase(), Phase::Blocked);
        assert_eq!(state.block().unwrap().blocked_until(), until);
    }

    #[test]
    fn test_recheck_capture_failure_is_error() {
        let mut fx = fixture();
        let state = blocked(&mut fx);

        let (state, _) = fx.engine.handle(state, sensor(SensorEvent::RecheckRequested));
        fx.camera.fail(CaptureError::NoFace);
        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::CheckFaceRequested));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceError]);
        assert_eq!(state.phase(), Phase::Blocked);
        assert_eq!(fx.camera.calls(), 2);
    }

    #[test]
    fn test_check_face_without_recheck_ignored() {
        let mut fx = fixture();
        let state = blocked(&mut fx);

        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::CheckFaceRequested));

        assert_eq!(decision.outcome, Outcome::Ignored);
        assert!(decision.is_noop());
        assert!(state.is_blocked());
        assert_eq!(fx.camera.calls(), 1);
    }

    #[test]
    fn test_recheck_without_block_unlocks() {
        let mut fx = fixture();
        let (state, _) = fx
            .engine
            .handle(AuthorizationState::new(), sensor(SensorEvent::RecheckRequested));
        assert_eq!(state.phase(), Phase::Unblocked);
        assert!(state.awaiting_recheck());
        let (state, decision) = fx.engine.handle(state, sensor(SensorEvent::CheckFaceRequested));

        assert_eq!(
            decision.commands,
            vec![VehicleCommand::FaceAllowed, VehicleCommand::Unlock]
        );
        assert_eq!(state.phase(), Phase::Unblocked);
        assert_eq!(fx.camera.calls(), 0);
    }

    #[test]
    fn test_tick_expires_block() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        let until = state.block().unwrap().blocked_until();

        fx.clock.set(until);
        let (state, decision) = fx.engine.handle(state, Input::Tick);
        assert!(decision.is_noop());
        assert!(state.is_blocked());

        fx.clock.advance(Duration::from_micros(1));
        let (state, decision) = fx.engine.handle(state, Input::Tick);
        assert_eq!(decision.outcome, Outcome::BlockExpired);
        assert!(decision.persist);
        assert!(decision.commands.is_empty());
        assert_eq!(state.phase(), Phase::Unblocked);
    }

    #[test]
    fn test_expiry_applied_before_verification() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        fx.clock.advance(DEFAULT_BLOCK_WINDOW + Duration::from_secs(1));
        fx.camera.face(0.9);

        let (state, decision) = fx
            .engine
            .handle(state, sensor(SensorEvent::VerifyDriverRequest));

        assert_eq!(decision.commands, vec![VehicleCommand::FaceAllowed]);
        assert!(decision.persist);
        assert_eq!(fx.comparator.comparisons(), 0);
        assert!(!state.is_blocked());
        assert_eq!(state.history().last().unwrap().blocked_until, None);
    }

    #[test]
    fn test_external_unblock_clears_flag() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        let (state, _) = fx.engine.handle(state, sensor(SensorEvent::RecheckRequested));

        let (state, decision) = fx
            .engine
            .handle(state, sensor(SensorEvent::ExternalUnblockNotice));

        assert!(decision.persist);
        assert!(decision.commands.is_empty());
        assert_eq!(state.phase(), Phase::Unblocked);
    }

    #[test]
    fn test_restored_drop_is_persisted_on_first_tick() {
        let mut fx = fixture();
        let state = blocked(&mut fx);
        let snapshot: RegistrySnapshot = state.snapshot();

        let later = fx.clock.advance(DEFAULT_BLOCK_WINDOW * 2);
        let restored = AuthorizationState::restore(snapshot, later);
        assert!(!restored.is_blocked());

        let (state, decision) = fx.engine.handle(restored, Input::Tick);
        assert!(decision.persist);
        assert_eq!(decision.outcome, Outcome::Idle);

        let (_, decision) = fx.engine.handle(state, Input::Tick);
        assert!(!decision.persist);
    }
}
