//! SoberSense Time - Clocks and loop scheduling
//!
//! - [`Clock`]: injectable wall-clock source for block windows
//! - [`Scheduler`]: fixed-interval tick with error backoff for the control loop

pub mod clock;
pub mod scheduler;

pub use clock::*;
pub use scheduler::*;
