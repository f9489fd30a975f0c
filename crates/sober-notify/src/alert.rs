//! Owner alert payload

use serde::{Deserialize, Serialize};

use sober_core::{BlockAlert, Timestamp};

use crate::Location;

pub const ALERT_SUBJECT: &str = "Urgent: Alcohol Detected in Vehicle - Driver Safety Alert";

/// Everything the owner is told about a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAlert {
    pub subject: String,
    pub raised_at: Timestamp,
    pub blocked_until: Timestamp,
    pub alcohol_level: Option<i64>,
    pub location: Location,
}

impl OwnerAlert {
    pub fn new(alert: &BlockAlert, location: Location) -> Self {
        OwnerAlert {
            subject: ALERT_SUBJECT.to_string(),
            raised_at: alert.raised_at,
            blocked_until: alert.blocked_until,
            alcohol_level: alert.alcohol_level,
            location,
        }
    }

    /// Plain-text message body
    pub fn body(&self) -> String {
        let reading = match self.alcohol_level {
            Some(level) => level.to_string(),
            None => "Unknown".to_string(),
        };
        format!(
            "This is an automated alert from your vehicle's alcohol detection system.\n\n\
             Alcohol was detected in the driver's breath at {raised}. The vehicle has been \
             locked for this driver until {until}.\n\n\
             Sensor reading: {reading}\n\n\
             Current location of the vehicle:\n\
             {location}\n\
             Please take immediate action to ensure the safety of the driver and others.\n",
            raised = self.raised_at,
            until = self.blocked_until,
            location = self.location,
        )
    }
}
