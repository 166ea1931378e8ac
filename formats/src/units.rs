//! Unit conversions used when decoding frames.
//!
//! APRS carries altitudes in feet and speeds in knots, everything we store is metric.
//!

/// Feet to meters, exact by definition.
const FOOT: f64 = 0.3048;

/// One knot in meters per second.
const KNOT: f64 = 1852. / 3600.;

/// Convert into meters
///
#[inline]
pub fn feet_to_meters(a: f64) -> f64 {
    a * FOOT
}

/// Convert into feet
///
#[inline]
pub fn meters_to_feet(a: f64) -> f64 {
    a / FOOT
}

/// Convert knots into m/s
///
#[inline]
pub fn knots_to_mps(a: f64) -> f64 {
    a * KNOT
}

/// Convert m/s into knots
///
#[inline]
pub fn mps_to_knots(a: f64) -> f64 {
    a / KNOT
}
