//! Camera capability

use std::fmt;
use std::time::Duration;

use sober_core::{CaptureError, FaceEncoding, Timestamp};

/// Default upper bound for one capture attempt
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a capture is being taken; carried into logs and the capture helper
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapturePurpose {
    /// Recording the face of a driver who just failed the alcohol test
    BlockedDriver,
    /// Driver asking to start the car
    Verification,
    /// Face check after a passed recheck
    Recheck,
}

impl CapturePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePurpose::BlockedDriver => "blocked_driver",
            CapturePurpose::Verification => "verification",
            CapturePurpose::Recheck => "recheck",
        }
    }
}

impl fmt::Display for CapturePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured frame, with whatever faces the detector found in it
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub captured_at: Timestamp,
    /// Detected faces, in detector order
    pub faces: Vec<FaceEncoding>,
}

impl CapturedFrame {
    pub fn new(captured_at: Timestamp, faces: Vec<FaceEncoding>) -> Self {
        CapturedFrame { captured_at, faces }
    }

    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }
}

/// Frame source.
///
/// `capture` may block for at most `timeout`; a timeout fails only this
/// attempt.
pub trait Camera: Send {
    fn capture(
        &mut self,
        purpose: CapturePurpose,
        timeout: Duration,
    ) -> Result<CapturedFrame, CaptureError>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn capture(
        &mut self,
        purpose: CapturePurpose,
        timeout: Duration,
    ) -> Result<CapturedFrame, CaptureError> {
        (**self).capture(purpose, timeout)
    }
}
