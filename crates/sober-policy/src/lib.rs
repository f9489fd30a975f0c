//! SoberSense Policy - Driver authorization state machine
//!
//! [`PolicyEngine::handle`] is the only place authorization decisions are
//! made. It takes the current [`AuthorizationState`] and one [`Input`], and
//! returns the next state plus a [`Decision`] describing the side effects
//! (commands, persistence, owner alert) for the runtime to carry out.
//!
//! The engine talks to a camera and a comparator but performs no
//! persistence, transport or notification I/O.

pub mod decision;
pub mod engine;
pub mod state;

pub use decision::*;
pub use engine::*;
pub use state::*;
