//! Flight kinematics derived from two consecutive reports.
//!
//! Everything here is a pure function of its inputs: the `Track` decides which reports are
//! consecutive and keeps the resulting series.
//!
//! Rates are in m/s, altitudes in meters, times in seconds.
//!

use chrono::{DateTime, Utc};
use thiserror::Error;

use skytrack_formats::Report;

/// Value returned when there is no landing estimate.
pub const NO_ESTIMATE: f64 = -1.0;

/// Relative uncertainty of the free-fall descent rate
const FREEFALL_UNCERTAINTY: f64 = 0.2;

/// Two consecutive reports with the same (or decreasing) timestamps.
///
/// This is a warning, not a failure: the previous values are carried over.
///
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{identity}: no time elapsed between {from} and {to}, keeping previous kinematics")]
pub struct DegenerateKinematics {
    pub identity: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Derived values for one pair of reports, aligned on the later one.
///
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Step {
    /// Vertical speed in m/s, positive going up
    pub ascent_rate: f64,
    /// Horizontal speed in m/s over the great circle
    pub ground_speed: f64,
}

/// Compute the kinematics between `a` and `b` (`a` earlier).
///
/// Missing altitudes or positions carry the matching value of `prev` over, as does a pair
/// with `dt <= 0` in which case the warning is returned along with it.
///
pub fn step(a: &Report, b: &Report, prev: Step) -> (Step, Option<DegenerateKinematics>) {
    let dt = (b.timestamp() - a.timestamp()).num_seconds();
    if dt <= 0 {
        let warn = DegenerateKinematics {
            identity: b.identity().to_string(),
            from: a.timestamp(),
            to: b.timestamp(),
        };
        return (prev, Some(warn));
    }
    let dt = dt as f64;

    let ascent_rate = match (a.altitude(), b.altitude()) {
        (Some(alt_a), Some(alt_b)) => (alt_b - alt_a) / dt,
        _ => prev.ascent_rate,
    };
    let ground_speed = match (a.position(), b.position()) {
        (Some(pos_a), Some(pos_b)) => pos_a.distance_to(&pos_b) / dt,
        _ => prev.ground_speed,
    };
    (
        Step {
            ascent_rate,
            ground_speed,
        },
        None,
    )
}

/// Seconds until the ground at the current descent rate, `NO_ESTIMATE` if not descending or
/// if the altitude is unknown.
///
pub fn seconds_to_impact(altitude: Option<f64>, ascent_rate: f64) -> f64 {
    match altitude {
        Some(alt) if ascent_rate < 0. => alt / -ascent_rate,
        _ => NO_ESTIMATE,
    }
}

/// Which ascent rate feeds the landing estimate.
///
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LandingModel {
    /// Last pair only
    #[default]
    Last,
    /// Mean of the last `n` ascent rates
    Window(usize),
}

impl LandingModel {
    /// `landing_window` from the configuration, 0 and 1 both mean the last pair.
    ///
    pub fn from_window(n: usize) -> Self {
        if n <= 1 {
            LandingModel::Last
        } else {
            LandingModel::Window(n)
        }
    }

    /// Pick the ascent rate out of the whole series.
    ///
    pub fn rate(&self, rates: &[f64]) -> Option<f64> {
        match self {
            LandingModel::Last => rates.last().copied(),
            LandingModel::Window(n) => {
                let n = (*n).clamp(1, rates.len().max(1));
                let tail = &rates[rates.len().saturating_sub(n)..];
                if tail.is_empty() {
                    None
                } else {
                    Some(tail.iter().sum::<f64>() / tail.len() as f64)
                }
            }
        }
    }
}

/// Closed-form descent under parachute, fitted on historical flights.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Freefall {
    /// Descent rate in m/s (negative)
    pub descent_rate: f64,
    /// Absolute uncertainty on `descent_rate`
    pub uncertainty: f64,
    /// Seconds until the ground
    pub seconds_to_ground: f64,
}

/// Free-fall model at `altitude` meters.
///
pub fn freefall(altitude: f64) -> Freefall {
    let descent_rate = -5.8e-8 * altitude.powi(2) - 6.001;
    Freefall {
        descent_rate,
        uncertainty: (FREEFALL_UNCERTAINTY * descent_rate).abs(),
        seconds_to_ground: 1695.02 * (9.8311e-5 * altitude).atan(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use skytrack_formats::Position;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 2, 3, 14, 0, 0).unwrap()
    }

    fn report(secs: i64, pos: Option<(f64, f64)>, alt: Option<f64>) -> Report {
        let mut r = Report::new("W3EAX-8", t0() + Duration::seconds(secs));
        if let Some((lon, lat)) = pos {
            r = r.with_position(Position::new(lon, lat));
        }
        if let Some(alt) = alt {
            r = r.with_altitude(alt);
        }
        r
    }

    #[test]
    fn test_step_descent() {
        let a = report(0, Some((-76.0, 39.0)), Some(1000.));
        let b = report(10, Some((-76.0, 39.0)), Some(900.));

        let (s, warn) = step(&a, &b, Step::default());
        assert!(warn.is_none());
        assert_eq!(-10.0, s.ascent_rate);
        assert_eq!(0.0, s.ground_speed);
        assert_eq!(90.0, seconds_to_impact(b.altitude(), s.ascent_rate));
    }

    #[test]
    fn test_step_ground_speed() {
        // One degree of latitude in 100 s
        let a = report(0, Some((-76.0, 39.0)), None);
        let b = report(100, Some((-76.0, 40.0)), None);

        let (s, _) = step(&a, &b, Step::default());
        assert!((s.ground_speed - 1111.9508).abs() < 0.01, "{}", s.ground_speed);
        assert_eq!(0.0, s.ascent_rate);
    }

    #[rstest]
    #[case(0)]
    #[case(-5)]
    fn test_step_degenerate(#[case] dt: i64) {
        let a = report(10, None, Some(1000.));
        let b = report(10 + dt, None, Some(900.));
        let prev = Step {
            ascent_rate: 4.5,
            ground_speed: 2.0,
        };

        let (s, warn) = step(&a, &b, prev);
        assert_eq!(prev, s);
        let warn = warn.unwrap();
        assert_eq!("W3EAX-8", warn.identity);
        assert!(s.ascent_rate.is_finite());
    }

    #[test]
    fn test_step_carry_missing_fields() {
        let a = report(0, None, Some(1000.));
        let b = report(10, Some((-76.0, 39.0)), None);
        let prev = Step {
            ascent_rate: 4.5,
            ground_speed: 2.0,
        };

        let (s, warn) = step(&a, &b, prev);
        assert!(warn.is_none());
        assert_eq!(prev, s);
    }

    #[rstest]
    #[case(Some(900.), -10., 90.)]
    #[case(Some(900.), 0., NO_ESTIMATE)]
    #[case(Some(900.), 5., NO_ESTIMATE)]
    #[case(None, -10., NO_ESTIMATE)]
    fn test_seconds_to_impact(#[case] alt: Option<f64>, #[case] rate: f64, #[case] want: f64) {
        assert_eq!(want, seconds_to_impact(alt, rate));
    }

    #[test]
    fn test_sign_consistency() {
        let up = step(
            &report(0, None, Some(100.)),
            &report(10, None, Some(200.)),
            Step::default(),
        )
        .0;
        let down = step(
            &report(0, None, Some(200.)),
            &report(10, None, Some(100.)),
            Step::default(),
        )
        .0;
        assert!(up.ascent_rate > 0.);
        assert!(down.ascent_rate < 0.);
        assert_eq!(NO_ESTIMATE, seconds_to_impact(Some(200.), up.ascent_rate));
        assert!(seconds_to_impact(Some(100.), down.ascent_rate) > 0.);
    }

    #[rstest]
    #[case(LandingModel::Last, &[1., 2., -6.], Some(-6.))]
    #[case(LandingModel::Window(2), &[1., 2., -6.], Some(-2.))]
    #[case(LandingModel::Window(10), &[1., 2., -6.], Some(-1.))]
    #[case(LandingModel::Window(3), &[], None)]
    #[case(LandingModel::Last, &[], None)]
    fn test_landing_model(#[case] model: LandingModel, #[case] rates: &[f64], #[case] want: Option<f64>) {
        assert_eq!(want, model.rate(rates));
    }

    #[test]
    fn test_landing_model_from_window() {
        assert_eq!(LandingModel::Last, LandingModel::from_window(0));
        assert_eq!(LandingModel::Last, LandingModel::from_window(1));
        assert_eq!(LandingModel::Window(5), LandingModel::from_window(5));
    }

    #[test]
    fn test_freefall() {
        let f = freefall(0.);
        assert_eq!(-6.001, f.descent_rate);
        assert_eq!(0., f.seconds_to_ground);

        let f = freefall(30_000.);
        assert!((f.descent_rate - (-58.201)).abs() < 1e-9);
        assert!((f.uncertainty - 11.6402).abs() < 1e-9);
        assert!(f.seconds_to_ground > 0.);
    }
}
