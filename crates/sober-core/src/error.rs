//! Error types for the interlock

use std::time::Duration;

use thiserror::Error;

use crate::Timestamp;

/// Core interlock errors
#[derive(Error, Debug)]
pub enum SoberError {
    // Encoding errors
    #[error("Invalid encoding dimension: expected {expected}, got {actual}")]
    InvalidEncodingDimension { expected: usize, actual: usize },

    #[error("Encoding component {index} is not finite")]
    NonFiniteComponent { index: usize },

    // Block errors
    #[error("Invalid block window: until {until} is not after since {since}")]
    InvalidBlockWindow { since: Timestamp, until: Timestamp },

    // Time errors
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // Capture errors
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Why a face capture produced no usable encoding.
///
/// Always local and non-fatal: the policy turns it into a FACE:ERROR or
/// FACE:BLOCKED answer, never into an unblock.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no face found in frame")]
    NoFace,

    #[error("capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("camera device error: {0}")]
    Device(String),
}

/// Result type for core operations
pub type SoberResult<T> = Result<T, SoberError>;
