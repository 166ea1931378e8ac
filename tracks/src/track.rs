//! One vehicle's trajectory with its derived kinematics.
//!
//! Reports are kept in arrival order, a separate index gives the chronological order which is
//! the one kinematics are computed on.  The usual case of a report newer than all the others is
//! O(1), a late report only recomputes the series from the pair it splits onwards.
//!

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::trace;

use skytrack_formats::{Position, Report};

use crate::{
    freefall, kinematics, seconds_to_impact, DedupPolicy, DegenerateKinematics, Freefall,
    LandingModel, Step, TrackError,
};

/// What happened to a report handed to a track.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Ingest {
    /// Stored, kinematics updated.  Pairs involving the new report with no elapsed time are
    /// listed in `warnings`.
    Appended { warnings: Vec<DegenerateKinematics> },
    /// Already known, nothing changed
    DuplicateSkipped,
}

impl Ingest {
    pub fn is_appended(&self) -> bool {
        matches!(self, Ingest::Appended { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Track {
    /// Callsign
    identity: String,
    /// All reports, arrival order
    reports: Vec<Report>,
    /// Indices into `reports`, chronological order (ties keep arrival order)
    order: Vec<usize>,
    /// Fingerprint to indices into `reports`
    index: HashMap<u64, Vec<usize>>,
    /// One per consecutive chronological pair, aligned on the later report
    ascent_rates: Vec<f64>,
    ground_speeds: Vec<f64>,
    policy: DedupPolicy,
    model: LandingModel,
}

impl Track {
    /// Start a new track from its first report.
    ///
    pub fn new(first: Report, policy: DedupPolicy, model: LandingModel) -> Self {
        let mut track = Track {
            identity: first.identity().to_string(),
            reports: Vec::new(),
            order: Vec::new(),
            index: HashMap::new(),
            ascent_rates: Vec::new(),
            ground_speeds: Vec::new(),
            policy,
            model,
        };
        track.store(first);
        track
    }

    /// Add a report, skipping it if it is a duplicate of one already there.
    ///
    #[tracing::instrument(skip(self, report), fields(identity = %self.identity))]
    pub fn append(&mut self, report: Report) -> Result<Ingest, TrackError> {
        if report.identity() != self.identity {
            return Err(TrackError::IdentityMismatch {
                expected: self.identity.clone(),
                got: report.identity().to_string(),
            });
        }
        Ok(self.push(report))
    }

    /// Same as `append()` for callers that already routed `report` by identity.
    ///
    pub(crate) fn push(&mut self, report: Report) -> Ingest {
        if self.contains(&report) {
            trace!("duplicate {report}");
            return Ingest::DuplicateSkipped;
        }

        let pos = self.store(report);
        let warnings = self.update(pos);
        Ingest::Appended { warnings }
    }

    /// Is there already an equal report (as per our de-duplication policy)?
    ///
    pub fn contains(&self, report: &Report) -> bool {
        let fp = fingerprint(report, self.policy);
        self.index.get(&fp).is_some_and(|candidates| {
            candidates
                .iter()
                .any(|&i| self.policy.same(&self.reports[i], report))
        })
    }

    /// Insert into storage and indices, return the position in chronological order.
    ///
    fn store(&mut self, report: Report) -> usize {
        let idx = self.reports.len();
        let ts = report.timestamp();

        self.index
            .entry(fingerprint(&report, self.policy))
            .or_default()
            .push(idx);
        self.reports.push(report);

        let pos = self
            .order
            .partition_point(|&i| self.reports[i].timestamp() <= ts);
        self.order.insert(pos, idx);
        pos
    }

    /// Bring the derived series up to date after inserting at chronological position `pos`.
    ///
    fn update(&mut self, pos: usize) -> Vec<DegenerateKinematics> {
        let last = self.order.len() - 1;

        // Pair `i` is (order[i], order[i + 1]), the new report is in pairs `pos - 1` and `pos`.
        //
        let from = pos.saturating_sub(1);
        if pos != last {
            trace!("late report, recomputing from pair {from}");
        }
        self.ascent_rates.truncate(from);
        self.ground_speeds.truncate(from);

        let mut warnings = vec![];
        for i in from..last {
            let prev = Step {
                ascent_rate: self.ascent_rates.last().copied().unwrap_or_default(),
                ground_speed: self.ground_speeds.last().copied().unwrap_or_default(),
            };
            let a = &self.reports[self.order[i]];
            let b = &self.reports[self.order[i + 1]];
            let (step, warn) = kinematics::step(a, b, prev);
            self.ascent_rates.push(step.ascent_rate);
            self.ground_speeds.push(step.ground_speed);
            if let Some(warn) = warn {
                if i + 1 == pos || i == pos {
                    warnings.push(warn);
                }
            }
        }
        warnings
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Reports in arrival order.
    ///
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Reports in chronological order.
    ///
    pub fn chronological(&self) -> impl DoubleEndedIterator<Item = &Report> + '_ {
        self.order.iter().map(|&i| &self.reports[i])
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn ascent_rates(&self) -> &[f64] {
        &self.ascent_rates
    }

    pub fn ground_speeds(&self) -> &[f64] {
        &self.ground_speeds
    }

    /// Most recent report.
    ///
    pub fn latest(&self) -> Option<&Report> {
        self.order.last().map(|&i| &self.reports[i])
    }

    /// Most recent known position.
    ///
    pub fn latest_position(&self) -> Option<Position> {
        self.chronological().rev().find_map(|r| r.position())
    }

    /// Most recent known altitude.
    ///
    pub fn latest_altitude(&self) -> Option<f64> {
        self.chronological().rev().find_map(|r| r.altitude())
    }

    pub fn ascent_rate(&self) -> Option<f64> {
        self.ascent_rates.last().copied()
    }

    pub fn ground_speed(&self) -> Option<f64> {
        self.ground_speeds.last().copied()
    }

    /// Seconds until landing, `-1.0` when there is no estimate.
    ///
    pub fn seconds_to_impact(&self) -> f64 {
        match self.model.rate(&self.ascent_rates) {
            Some(rate) => seconds_to_impact(self.latest_altitude(), rate),
            None => kinematics::NO_ESTIMATE,
        }
    }

    /// Same as `seconds_to_impact()` without the magic value.
    ///
    pub fn landing_estimate(&self) -> Option<f64> {
        Some(self.seconds_to_impact()).filter(|s| *s > 0.)
    }

    /// Descent under parachute from the current altitude.
    ///
    pub fn freefall(&self) -> Option<Freefall> {
        self.latest_altitude().map(freefall)
    }

    /// Great-circle distance in meters between the latest position and `other`.
    ///
    pub fn distance_to(&self, other: &Position) -> Option<f64> {
        self.latest_position().map(|p| p.distance_to(other))
    }
}

/// Hash of the fields compared by `policy`.  Floats are hashed by their bits with `-0.0`
/// folded into `0.0` to stay consistent with `==`.
///
fn fingerprint(report: &Report, policy: DedupPolicy) -> u64 {
    let bits = |v: f64| if v == 0. { 0u64 } else { v.to_bits() };

    let mut h = DefaultHasher::new();
    report.identity().hash(&mut h);
    if policy == DedupPolicy::Exact {
        report.timestamp().hash(&mut h);
    }
    report
        .position()
        .map(|p| (bits(p.longitude), bits(p.latitude)))
        .hash(&mut h);
    report.altitude().map(bits).hash(&mut h);
    report.course().hash(&mut h);
    report.speed().map(bits).hash(&mut h);
    report.raw_fields().hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 2, 3, 14, 0, 0).unwrap()
    }

    fn report(secs: i64, alt: f64) -> Report {
        Report::new("W3EAX-8", t0() + Duration::seconds(secs))
            .with_position(Position::new(-76.0 + secs as f64 * 1e-4, 39.0))
            .with_altitude(alt)
    }

    fn track_of(reports: &[Report]) -> Track {
        let mut t = Track::new(reports[0].clone(), DedupPolicy::Exact, LandingModel::Last);
        for r in &reports[1..] {
            t.append(r.clone()).unwrap();
        }
        t
    }

    #[test]
    fn test_track_scenario() {
        let a = Report::new("W3EAX-8", t0())
            .with_position(Position::new(-76.0, 39.0))
            .with_altitude(1000.);
        let b = Report::new("W3EAX-8", t0() + Duration::seconds(10))
            .with_position(Position::new(-76.0, 39.0))
            .with_altitude(900.);

        let mut t = Track::new(a, DedupPolicy::Exact, LandingModel::Last);
        assert_eq!(-1.0, t.seconds_to_impact());
        assert!(t.ascent_rates().is_empty());

        let r = t.append(b).unwrap();
        assert_eq!(Ingest::Appended { warnings: vec![] }, r);
        assert_eq!(&[-10.0], t.ascent_rates());
        assert_eq!(&[0.0], t.ground_speeds());
        assert_eq!(90.0, t.seconds_to_impact());
        assert_eq!(Some(90.0), t.landing_estimate());
    }

    #[test]
    fn test_track_duplicate() {
        let mut t = track_of(&[report(0, 1000.)]);
        let r = t.append(report(0, 1000.)).unwrap();

        assert_eq!(Ingest::DuplicateSkipped, r);
        assert_eq!(1, t.len());
        assert!(t.ascent_rates().is_empty());
    }

    #[test]
    fn test_track_dedup_idempotent() {
        let all: Vec<_> = (0..5).map(|i| report(i * 10, 1000. + i as f64 * 50.)).collect();
        let mut t = track_of(&all);
        let rates = t.ascent_rates().to_vec();

        for r in &all {
            assert_eq!(Ingest::DuplicateSkipped, t.append(r.clone()).unwrap());
        }
        assert_eq!(5, t.len());
        assert_eq!(rates, t.ascent_rates());
    }

    #[test]
    fn test_track_content_policy() {
        let a = report(0, 1000.);
        let b = Report::new("W3EAX-8", t0() + Duration::seconds(3))
            .with_position(a.position().unwrap())
            .with_altitude(1000.);

        let mut exact = Track::new(a.clone(), DedupPolicy::Exact, LandingModel::Last);
        assert!(exact.append(b.clone()).unwrap().is_appended());

        let mut content = Track::new(a, DedupPolicy::Content, LandingModel::Last);
        assert_eq!(Ingest::DuplicateSkipped, content.append(b).unwrap());
    }

    #[test]
    fn test_track_identity_mismatch() {
        let mut t = track_of(&[report(0, 1000.)]);
        let other = Report::new("KC3SKW-9", t0());

        let r = t.append(other);
        assert_eq!(
            Err(TrackError::IdentityMismatch {
                expected: "W3EAX-8".into(),
                got: "KC3SKW-9".into(),
            }),
            r
        );
        assert_eq!(1, t.len());
    }

    #[test]
    fn test_track_series_length() {
        let all: Vec<_> = (0..7).map(|i| report(i * 10, 100. * i as f64)).collect();
        let t = track_of(&all);

        assert_eq!(t.len() - 1, t.ascent_rates().len());
        assert_eq!(t.len() - 1, t.ground_speeds().len());
        assert!(t.ascent_rates().iter().all(|r| (*r - 10.).abs() < 1e-9));
    }

    #[test]
    fn test_track_order_independent() {
        let all: Vec<_> = [0, 10, 20, 35, 50, 70]
            .iter()
            .zip([1000., 1200., 1500., 1400., 900., 600.])
            .map(|(s, a)| report(*s, a))
            .collect();
        let forward = track_of(&all);

        let mut reversed = all.clone();
        reversed.reverse();
        let backward = track_of(&reversed);

        let mut shuffled = all.clone();
        shuffled.swap(0, 3);
        shuffled.swap(1, 5);
        let mixed = track_of(&shuffled);

        for t in [&backward, &mixed] {
            assert_eq!(forward.ascent_rates(), t.ascent_rates());
            assert_eq!(forward.ground_speeds(), t.ground_speeds());
            assert_eq!(forward.seconds_to_impact(), t.seconds_to_impact());
        }
        // Arrival order is kept as is
        assert_eq!(&reversed, backward.reports());
    }

    #[test]
    fn test_track_late_report() {
        let mut t = track_of(&[report(0, 1000.), report(20, 1200.)]);
        assert_eq!(&[10.0], t.ascent_rates());

        t.append(report(10, 1500.)).unwrap();
        assert_eq!(&[50.0, -30.0], t.ascent_rates());
        assert_eq!(Some(1200.), t.latest_altitude());
        assert_eq!(Some(20), t.latest().map(|r| (r.timestamp() - t0()).num_seconds()));
    }

    #[test]
    fn test_track_degenerate_pair() {
        let mut t = track_of(&[report(0, 1000.), report(10, 1100.)]);
        let same_time = Report::new("W3EAX-8", t0() + Duration::seconds(10)).with_altitude(500.);

        match t.append(same_time).unwrap() {
            Ingest::Appended { warnings } => assert_eq!(1, warnings.len()),
            r => panic!("{r:?}"),
        }
        assert_eq!(&[10.0, 10.0], t.ascent_rates());
        assert!(t.ascent_rates().iter().all(|r| r.is_finite()));
        assert!(t.ground_speeds().iter().all(|r| r.is_finite()));
    }

    #[test]
    fn test_track_windowed_landing() {
        let all: Vec<_> = [(0, 1000.), (10, 900.), (20, 700.)]
            .iter()
            .map(|(s, a)| report(*s, *a))
            .collect();
        let mut t = Track::new(all[0].clone(), DedupPolicy::Exact, LandingModel::Window(2));
        for r in &all[1..] {
            t.append(r.clone()).unwrap();
        }
        // mean(-10, -20) = -15, 700 / 15
        assert!((t.seconds_to_impact() - 700. / 15.).abs() < 1e-9);
    }

    #[test]
    fn test_track_ascending_no_estimate() {
        let t = track_of(&[report(0, 1000.), report(10, 1100.)]);
        assert_eq!(-1.0, t.seconds_to_impact());
        assert_eq!(None, t.landing_estimate());
    }

    #[test]
    fn test_track_distance_and_freefall() {
        let t = track_of(&[report(0, 1000.)]);
        let d = t.distance_to(&Position::new(-76.0, 40.0)).unwrap();
        assert!((d - 111_195.08).abs() < 1.0);
        assert!(t.freefall().unwrap().seconds_to_ground > 0.);

        let bare = Track::new(
            Report::new("X", t0()),
            DedupPolicy::Exact,
            LandingModel::Last,
        );
        assert_eq!(None, bare.distance_to(&Position::default()));
        assert_eq!(None, bare.freefall());
    }
}
