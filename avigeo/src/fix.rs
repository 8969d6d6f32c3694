use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One GPS sample in decimal degrees.
///
/// `course` is the heading in degrees (0 = North, 90 = East); a negative
/// value means the heading is unknown and disables course filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsFix {
    pub valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub speed_kmh: f64,
    pub course: f64,
}

impl GpsFix {
    pub const UNKNOWN_COURSE: f64 = -1.0;

    pub fn new(lat: f64, lon: f64, speed_kmh: f64, course: f64) -> Self {
        Self {
            valid: true,
            lat,
            lon,
            speed_kmh,
            course,
        }
    }

    /// A fix marked invalid by the receiver (no usable coordinates).
    pub fn invalid() -> Self {
        Self {
            valid: false,
            lat: 0.0,
            lon: 0.0,
            speed_kmh: 0.0,
            course: Self::UNKNOWN_COURSE,
        }
    }
}

impl fmt::Display for GpsFix {
    /// Stable track-log line format, also accepted by [`FromStr`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vld: {}, lat: {:.6}, long: {:.6}, crs: {:.2}, spd: {:.2}",
            self.valid as u8,
            self.lat,
            self.lon,
            self.course,
            self.speed_kmh
        )
    }
}

impl FromStr for GpsFix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedFix(s.to_string());

        let mut fix = GpsFix::invalid();
        let mut got_lat = false;
        let mut got_lon = false;

        for part in s.split(',') {
            let (key, value) = part.split_once(':').ok_or_else(malformed)?;
            let value = value.trim();
            match key.trim() {
                "vld" => {
                    fix.valid = value.parse::<u8>().map_err(|_| malformed())? != 0;
                }
                "lat" => {
                    fix.lat = value.parse().map_err(|_| malformed())?;
                    got_lat = true;
                }
                "long" => {
                    fix.lon = value.parse().map_err(|_| malformed())?;
                    got_lon = true;
                }
                "crs" => fix.course = value.parse().map_err(|_| malformed())?,
                "spd" => fix.speed_kmh = value.parse().map_err(|_| malformed())?,
                // Unknown keys are tolerated so the format can grow.
                _ => {}
            }
        }

        if !got_lat || !got_lon {
            return Err(malformed());
        }

        Ok(fix)
    }
}
