//! SoberSense Notify - Owner notifications
//!
//! When a block starts, the owner is told where the vehicle is. Delivery is
//! best-effort: it runs off the control loop, is never retried, and can never
//! reverse a lock.

pub mod alert;
pub mod dispatcher;
pub mod error;
pub mod location;
pub mod notifier;

pub use alert::*;
pub use dispatcher::*;
pub use error::*;
pub use location::*;
pub use notifier::*;
