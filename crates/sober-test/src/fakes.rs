//! Scripted capabilities
//!
//! Every fake is a cheap handle over shared state: give one clone to the
//! engine and keep another to script and inspect it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use sober_biometric::{Camera, CapturePurpose, CapturedFrame, EuclideanComparator, FaceComparator};
use sober_core::{CaptureError, FaceEncoding, Timestamp, ENCODING_DIMENSIONS};
use sober_notify::{Notifier, NotifyError, NotifyResult, OwnerAlert};

/// Encoding with every component set to `value`
pub fn uniform_encoding(value: f64) -> FaceEncoding {
    FaceEncoding::new(vec![value; ENCODING_DIMENSIONS]).unwrap_or_else(|_| {
        panic!("uniform encoding with non-finite value {value}")
    })
}

/// Random encoding with components in `[-1, 1)`
pub fn random_encoding<R: Rng>(rng: &mut R) -> FaceEncoding {
    let values = (0..ENCODING_DIMENSIONS).map(|_| rng.gen_range(-1.0..1.0)).collect();
    FaceEncoding::new(values).unwrap_or_else(|e| panic!("random encoding rejected: {e}"))
}

#[derive(Default)]
struct CameraScript {
    frames: VecDeque<Result<CapturedFrame, CaptureError>>,
    purposes: Vec<CapturePurpose>,
}

/// Camera that replays a script; an exhausted script times out
#[derive(Clone, Default)]
pub struct ScriptedCamera {
    script: Arc<Mutex<CameraScript>>,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next capture sees `encoding`
    pub fn push_face(&self, encoding: FaceEncoding) {
        self.script
            .lock()
            .frames
            .push_back(Ok(CapturedFrame::new(Timestamp::UNIX_EPOCH, vec![encoding])));
    }

    /// Next capture returns a frame with no face in it
    pub fn push_empty_frame(&self) {
        self.script
            .lock()
            .frames
            .push_back(Ok(CapturedFrame::new(Timestamp::UNIX_EPOCH, Vec::new())));
    }

    pub fn push_failure(&self, error: CaptureError) {
        self.script.lock().frames.push_back(Err(error));
    }

    /// Captures attempted so far
    pub fn calls(&self) -> usize {
        self.script.lock().purposes.len()
    }

    pub fn purposes(&self) -> Vec<CapturePurpose> {
        self.script.lock().purposes.clone()
    }

    /// Scripted frames not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().frames.len()
    }
}

impl Camera for ScriptedCamera {
    fn capture(
        &mut self,
        purpose: CapturePurpose,
        timeout: Duration,
    ) -> Result<CapturedFrame, CaptureError> {
        let mut script = self.script.lock();
        script.purposes.push(purpose);
        script
            .frames
            .pop_front()
            .unwrap_or(Err(CaptureError::Timeout(timeout)))
    }
}

/// Comparator returning scripted scores, falling back to euclidean similarity
#[derive(Clone, Default)]
pub struct ScriptedComparator {
    scores: Arc<Mutex<VecDeque<f64>>>,
    comparisons: Arc<Mutex<usize>>,
}

impl ScriptedComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_score(&self, similarity: f64) {
        self.scores.lock().push_back(similarity);
    }

    pub fn comparisons(&self) -> usize {
        *self.comparisons.lock()
    }
}

impl FaceComparator for ScriptedComparator {
    fn encode(&self, frame: &CapturedFrame) -> Option<FaceEncoding> {
        EuclideanComparator.encode(frame)
    }

    fn similarity(&self, a: &FaceEncoding, b: &FaceEncoding) -> f64 {
        *self.comparisons.lock() += 1;
        match self.scores.lock().pop_front() {
            Some(score) => score,
            None => EuclideanComparator.similarity(a, b),
        }
    }
}

/// Notifier that keeps every alert it is handed
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OwnerAlert>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make delivery fail (the alert is still recorded as attempted)
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn alerts(&self) -> Vec<OwnerAlert> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, alert: &OwnerAlert) -> NotifyResult<()> {
        self.sent.lock().push(alert.clone());
        if *self.fail.lock() {
            return Err(NotifyError::Delivery("recording notifier set to fail".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_times_out_when_script_runs_out() {
        let camera = ScriptedCamera::new();
        camera.push_face(uniform_encoding(0.1));
        let mut engine_side = camera.clone();

        assert!(engine_side
            .capture(CapturePurpose::Verification, Duration::from_secs(5))
            .is_ok());
        assert_eq!(
            engine_side
                .capture(CapturePurpose::Recheck, Duration::from_secs(5))
                .unwrap_err(),
            CaptureError::Timeout(Duration::from_secs(5))
        );
        assert_eq!(
            camera.purposes(),
            vec![CapturePurpose::Verification, CapturePurpose::Recheck]
        );
    }

    #[test]
    fn test_comparator_falls_back_to_distance() {
        let comparator = ScriptedComparator::new();
        comparator.push_score(0.2);
        let a = uniform_encoding(0.0);

        assert_eq!(comparator.similarity(&a, &a), 0.2);
        assert_eq!(comparator.similarity(&a, &a), 1.0);
        assert_eq!(comparator.comparisons(), 2);
    }
}
