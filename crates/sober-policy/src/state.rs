//! Authorization state

use std::fmt;

use sober_core::{BlockState, SensorEvent, Timestamp};
use sober_registry::{DriverHistory, RegistrySnapshot};
use tracing::{info, warn};

/// Coarse phase, derived from [`AuthorizationState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Unblocked,
    Blocked,
    /// Blocked with a recheck requested; the next face check decides.
    /// A recheck armed with no block reports [`Phase::Unblocked`]; see
    /// [`AuthorizationState::awaiting_recheck`] for the raw flag.
    AwaitingRecheck,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unblocked => "unblocked",
            Phase::Blocked => "blocked",
            Phase::AwaitingRecheck => "awaiting_recheck",
        };
        f.write_str(s)
    }
}

/// One input to the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    Sensor(SensorEvent),
    /// Clock tick with no inbound event
    Tick,
}

impl From<SensorEvent> for Input {
    fn from(event: SensorEvent) -> Self {
        Input::Sensor(event)
    }
}

/// Everything the state machine owns.
///
/// There is exactly one of these per process; it is moved into and out of
/// every [`crate::PolicyEngine::handle`] call.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationState {
    pub(crate) block: Option<BlockState>,
    pub(crate) awaiting_recheck: bool,
    pub(crate) history: DriverHistory,
    pub(crate) last_alcohol_level: Option<i64>,
    /// Restored state differs from the persisted record
    pub(crate) dirty: bool,
}

impl AuthorizationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from a persisted snapshot.
    ///
    /// A block whose window ended while the process was down is dropped here;
    /// the next [`crate::Decision`] asks for the drop to be persisted.
    pub fn restore(snapshot: RegistrySnapshot, now: Timestamp) -> Self {
        let RegistrySnapshot { history, block } = snapshot;
        let mut dirty = false;

        let block = match block {
            Some(block) if block.is_expired(now) => {
                info!(
                    blocked_until = %block.blocked_until(),
                    "Persisted block expired while offline"
                );
                dirty = true;
                None
            }
            Some(block) => {
                warn!(
                    blocked_until = %block.blocked_until(),
                    remaining_secs = block.remaining(now).as_secs(),
                    "Restored active block"
                );
                Some(block)
            }
            None => None,
        };

        AuthorizationState {
            block,
            awaiting_recheck: false,
            history,
            last_alcohol_level: None,
            dirty,
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.block, self.awaiting_recheck) {
            (Some(_), true) => Phase::AwaitingRecheck,
            (Some(_), false) => Phase::Blocked,
            (None, _) => Phase::Unblocked,
        }
    }

    pub fn block(&self) -> Option<&BlockState> {
        self.block.as_ref()
    }

    pub fn is_blocked(&self) -> bool {
        self.block.is_some()
    }

    pub fn awaiting_recheck(&self) -> bool {
        self.awaiting_recheck
    }

    pub fn history(&self) -> &DriverHistory {
        &self.history
    }

    pub fn last_alcohol_level(&self) -> Option<i64> {
        self.last_alcohol_level
    }

    /// The persistable part of the state
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.history.clone(), self.block.clone())
    }

    pub(crate) fn clear_block(&mut self) -> Option<BlockState> {
        self.awaiting_recheck = false;
        self.block.take()
    }
}
