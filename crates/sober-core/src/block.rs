//! Block state and the verified-driver audit record
//!
//! A [`BlockState`] exists only while a block is active. Its constructor
//! enforces `blocked_until > blocked_since`, including on deserialization.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FaceEncoding, SoberError, SoberResult, Timestamp};

/// Default block window after an alcohol trigger
pub const DEFAULT_BLOCK_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// The single active block: who is locked out, and until when
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawBlockState", into = "RawBlockState")]
pub struct BlockState {
    encoding: FaceEncoding,
    blocked_since: Timestamp,
    blocked_until: Timestamp,
}

impl BlockState {
    pub fn new(
        encoding: FaceEncoding,
        blocked_since: Timestamp,
        blocked_until: Timestamp,
    ) -> SoberResult<Self> {
        if blocked_until <= blocked_since {
            return Err(SoberError::InvalidBlockWindow {
                since: blocked_since,
                until: blocked_until,
            });
        }
        Ok(BlockState {
            encoding,
            blocked_since,
            blocked_until,
        })
    }

    /// Block starting at `since` and lasting `window`
    pub fn starting(encoding: FaceEncoding, since: Timestamp, window: Duration) -> SoberResult<Self> {
        Self::new(encoding, since, since + window)
    }

    pub fn encoding(&self) -> &FaceEncoding {
        &self.encoding
    }

    pub fn blocked_since(&self) -> Timestamp {
        self.blocked_since
    }

    pub fn blocked_until(&self) -> Timestamp {
        self.blocked_until
    }

    /// The window is over once `now` is strictly past `blocked_until`
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.blocked_until
    }

    /// Time left in the window, zero once expired
    #[inline]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        self.blocked_until - now
    }
}

#[derive(Serialize, Deserialize)]
struct RawBlockState {
    encoding: FaceEncoding,
    blocked_since: Timestamp,
    blocked_until: Timestamp,
}

impl TryFrom<RawBlockState> for BlockState {
    type Error = SoberError;

    fn try_from(raw: RawBlockState) -> Result<Self, Self::Error> {
        BlockState::new(raw.encoding, raw.blocked_since, raw.blocked_until)
    }
}

impl From<BlockState> for RawBlockState {
    fn from(state: BlockState) -> Self {
        RawBlockState {
            encoding: state.encoding,
            blocked_since: state.blocked_since,
            blocked_until: state.blocked_until,
        }
    }
}

/// One successful driver verification, kept forever as an audit entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverRecord {
    pub encoding: FaceEncoding,
    pub verified_at: Timestamp,
    /// End of the block that was active when this driver was let through, if any
    pub blocked_until: Option<Timestamp>,
}

impl DriverRecord {
    pub fn new(encoding: FaceEncoding, verified_at: Timestamp) -> Self {
        DriverRecord {
            encoding,
            verified_at,
            blocked_until: None,
        }
    }

    pub fn during_block(mut self, blocked_until: Timestamp) -> Self {
        self.blocked_until = Some(blocked_until);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENCODING_DIMENSIONS;

    fn encoding() -> FaceEncoding {
        FaceEncoding::new(vec![0.1; ENCODING_DIMENSIONS]).unwrap()
    }

    #[test]
    fn test_window_must_be_positive() {
        let t = Timestamp::from_secs(1000);
        assert!(BlockState::new(encoding(), t, t).is_err());
        assert!(BlockState::new(encoding(), t, Timestamp::from_secs(999)).is_err());
        assert!(BlockState::starting(encoding(), t, Duration::ZERO).is_err());
    }

    #[test]
    fn test_expiry_is_strict() {
        let since = Timestamp::from_secs(0);
        let block = BlockState::starting(encoding(), since, DEFAULT_BLOCK_WINDOW).unwrap();
        let until = block.blocked_until();

        assert_eq!(until, Timestamp::from_secs(3 * 3600));
        assert!(!block.is_expired(until));
        assert!(block.is_expired(until + Duration::from_micros(1)));
        assert_eq!(block.remaining(since), DEFAULT_BLOCK_WINDOW);
        assert_eq!(block.remaining(until + Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_deserialize_rejects_inverted_window() {
        let block = BlockState::starting(encoding(), Timestamp::from_secs(10), DEFAULT_BLOCK_WINDOW)
            .unwrap();
        let mut value = serde_json::to_value(&block).unwrap();
        value["blocked_until"] = serde_json::json!("1970-01-01T00:00:01Z");

        assert!(serde_json::from_value::<BlockState>(value).is_err());
    }

    #[test]
    fn test_record_during_block() {
        let record = DriverRecord::new(encoding(), Timestamp::from_secs(5))
            .during_block(Timestamp::from_secs(50));
        assert_eq!(record.blocked_until, Some(Timestamp::from_secs(50)));
    }
}
