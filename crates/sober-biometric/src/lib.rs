//! SoberSense Biometrics - Face capture and comparison
//!
//! Two capabilities are consumed by the policy engine:
//! - [`Camera`]: blocking, timeout-bounded frame capture
//! - [`FaceComparator`]: encode a frame, score two encodings
//!
//! The matching algorithm itself is external. Frames arrive with face
//! encodings already extracted by the capture helper; the comparator picks
//! the face to use and scores it.

pub mod camera;
pub mod comparator;
pub mod spool;

pub use camera::*;
pub use comparator::*;
pub use spool::*;
