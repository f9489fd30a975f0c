//! Side effects requested by one transition

use std::fmt;

use sober_biometric::CapturePurpose;
use sober_core::{BlockAlert, Timestamp, VehicleCommand};

/// What happened, for logs and tests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Tick with nothing to do
    Idle,
    AlcoholRecorded(i64),
    /// Driver let through; `during_block` when a block was active at the time
    DriverAllowed { during_block: bool },
    /// The blocked driver tried again
    DriverRefused,
    /// A capture produced no usable face
    CaptureFailed(CapturePurpose),
    BlockStarted { until: Timestamp },
    /// Block trigger arrived but no face could be recorded
    BlockNotStarted,
    RecheckArmed,
    /// Recheck found a different driver; block lifted
    RecheckCleared,
    /// Recheck found the same driver; block kept
    RecheckKeptBlock,
    /// Face check after a recheck with no block in place
    RecheckWithoutBlock,
    /// Face check with no recheck pending
    Ignored,
    BlockExpired,
    ExternalUnblock,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Idle => f.write_str("idle"),
            Outcome::AlcoholRecorded(level) => write!(f, "alcohol_recorded({level})"),
            Outcome::DriverAllowed { during_block: true } => f.write_str("driver_allowed_during_block"),
            Outcome::DriverAllowed { during_block: false } => f.write_str("driver_allowed"),
            Outcome::DriverRefused => f.write_str("driver_refused"),
            Outcome::CaptureFailed(purpose) => write!(f, "capture_failed({purpose})"),
            Outcome::BlockStarted { .. } => f.write_str("block_started"),
            Outcome::BlockNotStarted => f.write_str("block_not_started"),
            Outcome::RecheckArmed => f.write_str("recheck_armed"),
            Outcome::RecheckCleared => f.write_str("recheck_cleared"),
            Outcome::RecheckKeptBlock => f.write_str("recheck_kept_block"),
            Outcome::RecheckWithoutBlock => f.write_str("recheck_without_block"),
            Outcome::Ignored => f.write_str("ignored"),
            Outcome::BlockExpired => f.write_str("block_expired"),
            Outcome::ExternalUnblock => f.write_str("external_unblock"),
        }
    }
}

/// Effects the runtime applies after a transition, in this order:
/// persist, then commands, then alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Commands in emission order
    pub commands: Vec<VehicleCommand>,
    pub alert: Option<BlockAlert>,
    pub persist: bool,
    pub outcome: Outcome,
}

impl Decision {
    pub fn new(outcome: Outcome) -> Self {
        Decision {
            commands: Vec::new(),
            alert: None,
            persist: false,
            outcome,
        }
    }

    pub fn idle() -> Self {
        Self::new(Outcome::Idle)
    }

    pub fn with_command(mut self, command: VehicleCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_alert(mut self, alert: BlockAlert) -> Self {
        self.alert = Some(alert);
        self
    }

    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    /// No command, alert or save requested
    pub fn is_noop(&self) -> bool {
        self.commands.is_empty() && self.alert.is_none() && !self.persist
    }
}
