//! SoberSense Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the interlock:
//! - Wall-clock timestamps
//! - Face encodings (opaque biometric vectors)
//! - Block state and the verified-driver audit record
//! - Sensor events, vehicle commands and block alerts
//! - The error taxonomy shared by every crate

pub mod block;
pub mod encoding;
pub mod error;
pub mod event;
pub mod time;

pub use block::*;
pub use encoding::*;
pub use error::*;
pub use event::*;
pub use time::*;
