//! SoberSense Registry - Durable block state
//!
//! The registry persists two things as one unit:
//! - the active block (encoding + window), if any
//! - the append-only history of verified drivers
//!
//! [`FileRegistry`] writes them as a single checksummed record via
//! temp-file + fsync + rename, so a crash can never leave a block's encoding
//! without its window or the other way round.

pub mod error;
pub mod file;
pub mod snapshot;
pub mod store;

pub use error::*;
pub use file::*;
pub use snapshot::*;
pub use store::*;
