//! SoberSense Transport - Sensor link
//!
//! The link is a bidirectional byte stream to the microcontroller: a serial
//! TTY in raw mode or a serial-to-TCP bridge. Reading happens
//! in a background task that frames bytes into lines and queues them on a
//! bounded channel; commands are written by the single [`CommandWriter`].

pub mod endpoint;
pub mod error;
pub mod reader;
#[cfg(unix)]
pub mod tty;
pub mod writer;

pub use endpoint::*;
pub use error::*;
pub use reader::*;
#[cfg(unix)]
pub use tty::TtyStream;
pub use writer::*;
