//! SoberSense Wire Protocol - Sensor line format
//!
//! The microcontroller speaks newline-terminated ASCII:
//! - Inbound: `ALCOHOL:<n>`, `CMD:VERIFY_DRIVER`, `BLOCKED`, `RECHECK`,
//!   `CMD:CHECK_FACE`, `UNBLOCKED`
//! - Outbound: `ON`, `OFF`, `FACE:<verdict>`
//!
//! [`LineFramer`] turns an arbitrary byte stream into lines; [`decode_line`]
//! and [`encode_command`] map lines to and from typed values.

pub mod error;
pub mod framer;
pub mod line;

pub use error::*;
pub use framer::*;
pub use line::*;
