//! Event definitions
//!
//! Sensor events flow in from the microcontroller; vehicle commands flow back
//! out. Both sets are closed.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Typed inbound signal from the sensor link
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorEvent {
    /// Raw breath-alcohol reading
    AlcoholReading(i64),
    /// Driver asked to start the car
    VerifyDriverRequest,
    /// Sensor decided the driver is intoxicated
    AlcoholBlockTriggered,
    /// Operator pressed the recheck button
    RecheckRequested,
    /// Recheck passed the alcohol test; a face check should follow
    CheckFaceRequested,
    /// Microcontroller lifted the block on its own timer
    ExternalUnblockNotice,
}

impl SensorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SensorEvent::AlcoholReading(_) => "alcohol_reading",
            SensorEvent::VerifyDriverRequest => "verify_driver",
            SensorEvent::AlcoholBlockTriggered => "block_triggered",
            SensorEvent::RecheckRequested => "recheck",
            SensorEvent::CheckFaceRequested => "check_face",
            SensorEvent::ExternalUnblockNotice => "external_unblock",
        }
    }
}

/// Outbound instruction for the microcontroller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VehicleCommand {
    Lock,
    Unlock,
    FaceAllowed,
    FaceBlocked,
    FaceError,
    FaceDifferent,
    FaceSame,
}

impl VehicleCommand {
    /// Does this command change whether the vehicle can move?
    pub fn is_actuation(self) -> bool {
        matches!(self, VehicleCommand::Lock | VehicleCommand::Unlock)
    }
}

/// Request for an owner notification, raised when a block is put in place
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAlert {
    pub raised_at: Timestamp,
    pub blocked_until: Timestamp,
    /// Last alcohol reading seen before the block, if any
    pub alcohol_level: Option<i64>,
}
