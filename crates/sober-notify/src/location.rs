//! Approximate vehicle location

use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{NotifyError, NotifyResult};

const UNKNOWN: &str = "Unknown";

/// IP-derived location. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub organization: Option<String>,
    pub postal_code: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Deserialize)]
struct IpinfoResponse {
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    loc: Option<String>,
    org: Option<String>,
    postal: Option<String>,
    timezone: Option<String>,
}

impl Location {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Parse an ipinfo-style JSON object. `loc` is `"<lat>,<lon>"`.
    pub fn from_ipinfo(json: &str) -> NotifyResult<Self> {
        let raw: IpinfoResponse =
            serde_json::from_str(json).map_err(|e| NotifyError::Location(e.to_string()))?;

        let (latitude, longitude) = match raw.loc.as_deref().and_then(|loc| loc.split_once(',')) {
            Some((lat, lon)) => (non_empty(lat), non_empty(lon)),
            None => (None, None),
        };

        Ok(Location {
            ip: raw.ip,
            city: raw.city,
            region: raw.region,
            country: raw.country,
            latitude,
            longitude,
            organization: raw.org,
            postal_code: raw.postal,
            timezone: raw.timezone,
        })
    }

    /// `(label, value)` pairs in display order, with missing values as "Unknown"
    pub fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("IP Address", show(&self.ip)),
            ("City", show(&self.city)),
            ("Region", show(&self.region)),
            ("Country", show(&self.country)),
            ("Latitude", show(&self.latitude)),
            ("Longitude", show(&self.longitude)),
            ("Organization", show(&self.organization)),
            ("Postal Code", show(&self.postal_code)),
            ("Timezone", show(&self.timezone)),
        ]
    }
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.fields() {
            writeln!(f, "{label}: {value}")?;
        }
        Ok(())
    }
}

/// Source of the vehicle's current location
pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> NotifyResult<Location>;
}

/// Always reports the same location
#[derive(Clone, Debug)]
pub struct FixedLocation(pub Location);

impl LocationProvider for FixedLocation {
    fn locate(&self) -> NotifyResult<Location> {
        Ok(self.0.clone())
    }
}

/// No location source configured
#[derive(Clone, Copy, Debug, Default)]
pub struct UnknownLocation;

impl LocationProvider for UnknownLocation {
    fn locate(&self) -> NotifyResult<Location> {
        Ok(Location::unknown())
    }
}

/// Reads an ipinfo JSON document kept fresh by an external helper
#[derive(Clone, Debug)]
pub struct IpinfoFileLocation {
    path: PathBuf,
}

impl IpinfoFileLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IpinfoFileLocation { path: path.into() }
    }
}

impl LocationProvider for IpinfoFileLocation {
    fn locate(&self) -> NotifyResult<Location> {
        let json = fs::read_to_string(&self.path)?;
        Location::from_ipinfo(&json)
    }
}
