//! Face comparison
//!
//! Similarity is `1 - distance`, clamped to `[0, 1]`. One rule decides
//! identity everywhere: below the threshold is a different driver, at or
//! above it is the same driver.

use sober_core::FaceEncoding;

use crate::CapturedFrame;

/// Default decision boundary (50%)
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Pure biometric comparator: no state mutation, no I/O
pub trait FaceComparator: Send + Sync {
    /// Pick the encoding to use from a frame; `None` when no usable face
    fn encode(&self, frame: &CapturedFrame) -> Option<FaceEncoding>;

    /// Score in `[0, 1]`; `similarity(x, x) == 1.0`
    fn similarity(&self, a: &FaceEncoding, b: &FaceEncoding) -> f64;
}

/// Identity verdict for a similarity score
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Same,
    Different,
}

/// Threshold rule applied to similarity scores
#[derive(Clone, Copy, Debug)]
pub struct MatchPolicy {
    pub threshold: f64,
}

impl MatchPolicy {
    pub fn new(threshold: f64) -> Self {
        MatchPolicy { threshold }
    }

    /// `< threshold` is different, `>= threshold` is same
    #[inline]
    pub fn classify(&self, similarity: f64) -> Verdict {
        if similarity < self.threshold {
            Verdict::Different
        } else {
            Verdict::Same
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

/// Euclidean-distance comparator, the usual metric for 128-d face embeddings
#[derive(Clone, Copy, Debug, Default)]
pub struct EuclideanComparator;

impl EuclideanComparator {
    pub fn new() -> Self {
        EuclideanComparator
    }

    pub fn distance(a: &FaceEncoding, b: &FaceEncoding) -> f64 {
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

impl FaceComparator for EuclideanComparator {
    fn encode(&self, frame: &CapturedFrame) -> Option<FaceEncoding> {
        frame.faces.first().cloned()
    }

    fn similarity(&self, a: &FaceEncoding, b: &FaceEncoding) -> f64 {
        (1.0 - Self::distance(a, b)).clamp(0.0, 1.0)
    }
}
