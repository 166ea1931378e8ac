//! The `Report` type, one decoded transmission.
//!

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::Position;

/// Key under which the free text of the comment is stored in `raw_fields`.
pub const COMMENT: &str = "comment";

/// One decoded frame: who sent it, when, where and whatever telemetry came along.
///
/// A `Report` is built once (by the parser or by `new()` and the `with_*` builders) and never
/// changes afterwards, fields are only reachable through getters.
///
/// Two reports are equal iff every field is equal, this is what de-duplication relies on.  The
/// frame path (digipeaters, igates) is not part of a report so that one transmission heard
/// through two receivers compares equal.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Callsign of the transmitting vehicle
    identity: String,
    /// Time of the report, whole seconds
    timestamp: DateTime<Utc>,
    /// Where
    position: Option<Position>,
    /// Meters
    altitude: Option<f64>,
    /// Course over ground in degrees
    course: Option<u16>,
    /// Ground speed in m/s as announced by the transmitter
    speed: Option<f64>,
    /// Comment text and `key=value` telemetry tokens, verbatim
    raw_fields: BTreeMap<String, String>,
}

impl Report {
    /// Timestamps are truncated to the second, the resolution of the wire format.
    ///
    pub fn new(identity: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Report {
            identity: identity.into(),
            timestamp: timestamp.trunc_subsecs(0),
            position: None,
            altitude: None,
            course: None,
            speed: None,
            raw_fields: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_course(mut self, course: u16) -> Self {
        self.course = Some(course);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw_fields.insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    pub fn course(&self) -> Option<u16> {
        self.course
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn raw_fields(&self) -> &BTreeMap<String, String> {
        &self.raw_fields
    }

    /// Free text part of the comment, if any.
    ///
    pub fn comment(&self) -> Option<&str> {
        self.raw_fields.get(COMMENT).map(String::as_str)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.identity, self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(pos) = self.position {
            write!(f, " ({:.5}, {:.5}", pos.longitude, pos.latitude)?;
            match self.altitude {
                Some(alt) => write!(f, ", {:.1} m)", alt)?,
                None => write!(f, ")")?,
            }
        } else if let Some(alt) = self.altitude {
            write!(f, " ({:.1} m)", alt)?;
        }
        if let Some(comment) = self.comment() {
            write!(f, " \"{}\"", comment)?;
        }
        Ok(())
    }
}
