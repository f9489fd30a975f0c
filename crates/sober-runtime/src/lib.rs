//! SoberSense Runtime - Interlock orchestration and main loop
//!
//! Each iteration of the control loop:
//! 1. Take at most one framed line from the link reader
//! 2. Route it to a sensor event and run one policy transition
//! 3. Run the clock tick (block expiry)
//! 4. Apply each decision: save, then commands, then alert
//! 5. Wait for the scheduler (fixed interval, or backoff after a failure)

pub mod actuator;
pub mod config;
pub mod error;
pub mod interlock;
pub mod telemetry;

pub use actuator::*;
pub use config::*;
pub use error::*;
pub use interlock::*;
pub use telemetry::*;
