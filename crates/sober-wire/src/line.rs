//! Line <-> typed value mapping

use sober_core::{SensorEvent, VehicleCommand};

use crate::{WireError, WireResult};

pub const ALCOHOL_PREFIX: &str = "ALCOHOL:";
pub const VERIFY_DRIVER_TOKEN: &str = "CMD:VERIFY_DRIVER";
pub const CHECK_FACE_TOKEN: &str = "CMD:CHECK_FACE";
pub const UNBLOCKED_TOKEN: &str = "UNBLOCKED";
pub const BLOCKED_TOKEN: &str = "BLOCKED";
pub const RECHECK_TOKEN: &str = "RECHECK";

/// Decode one inbound line.
///
/// Matching is by prefix for readings and by substring for everything else,
/// first match wins. `UNBLOCKED` is tested before `BLOCKED` because it
/// contains it.
pub fn decode_line(line: &str) -> WireResult<SensorEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(ALCOHOL_PREFIX) {
        return rest
            .trim()
            .parse::<i64>()
            .map(SensorEvent::AlcoholReading)
            .map_err(|_| WireError::MalformedReading(line.to_string()));
    }

    if line.contains(VERIFY_DRIVER_TOKEN) {
        Ok(SensorEvent::VerifyDriverRequest)
    } else if line.contains(CHECK_FACE_TOKEN) {
        Ok(SensorEvent::CheckFaceRequested)
    } else if line.contains(UNBLOCKED_TOKEN) {
        Ok(SensorEvent::ExternalUnblockNotice)
    } else if line.contains(BLOCKED_TOKEN) {
        Ok(SensorEvent::AlcoholBlockTriggered)
    } else if line.contains(RECHECK_TOKEN) {
        Ok(SensorEvent::RecheckRequested)
    } else {
        Err(WireError::UnrecognizedLine(line.to_string()))
    }
}

/// Line text for a command, without terminator
pub fn command_text(command: VehicleCommand) -> &'static str {
    match command {
        VehicleCommand::Unlock => "ON",
        VehicleCommand::Lock => "OFF",
        VehicleCommand::FaceAllowed => "FACE:ALLOWED",
        VehicleCommand::FaceBlocked => "FACE:BLOCKED",
        VehicleCommand::FaceError => "FACE:ERROR",
        VehicleCommand::FaceDifferent => "FACE:DIFFERENT",
        VehicleCommand::FaceSame => "FACE:SAME",
    }
}

/// Newline-terminated bytes for a command
pub fn encode_command(command: VehicleCommand) -> Vec<u8> {
    let text = command_text(command);
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(b'\n');
    buf
}

/// Parse an outbound line back into a command (exact match)
pub fn decode_command(line: &str) -> WireResult<VehicleCommand> {
    match line.trim() {
        "ON" => Ok(VehicleCommand::Unlock),
        "OFF" => Ok(VehicleCommand::Lock),
        "FACE:ALLOWED" => Ok(VehicleCommand::FaceAllowed),
        "FACE:BLOCKED" => Ok(VehicleCommand::FaceBlocked),
        "FACE:ERROR" => Ok(VehicleCommand::FaceError),
        "FACE:DIFFERENT" => Ok(VehicleCommand::FaceDifferent),
        "FACE:SAME" => Ok(VehicleCommand::FaceSame),
        other => Err(WireError::UnrecognizedLine(other.to_string())),
    }
}
