//! The track store: routes every report to the track of its vehicle.
//!
//! There is exactly one store per tracking session, owned by whoever drives ingestion and passed
//! around explicitly.
//!

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumString, VariantNames};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{debug, event, trace, warn, Level};

use skytrack_formats::{parse_frame, Position, Report};

use crate::{Ingest, LandingModel, Track};

/// When are two reports the same?
///
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Deserialize,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DedupPolicy {
    /// Every field, timestamp included
    #[default]
    Exact,
    /// Every field but the timestamp, for transmitters repeating the same packet
    Content,
}

impl DedupPolicy {
    pub fn same(&self, a: &Report, b: &Report) -> bool {
        match self {
            DedupPolicy::Exact => a == b,
            DedupPolicy::Content => {
                a.identity() == b.identity()
                    && a.position() == b.position()
                    && a.altitude() == b.altitude()
                    && a.course() == b.course()
                    && a.speed() == b.speed()
                    && a.raw_fields() == b.raw_fields()
            }
        }
    }
}

/// Reports are only kept when timestamped strictly after `start` and strictly before `end`.
/// A missing bound is open.
///
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        TimeWindow { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts > s) && self.end.map_or(true, |e| ts < e)
    }
}

/// Counters for one polling cycle.
///
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleStats {
    pub frames: usize,
    pub appended: usize,
    pub duplicates: usize,
    pub partial: usize,
    pub malformed: usize,
    pub degenerate: usize,
    /// Decoded but outside the time window
    pub outside: usize,
}

impl Display for CycleStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames: {} new, {} duplicate, {} partial, {} malformed, {} degenerate, {} outside",
            self.frames,
            self.appended,
            self.duplicates,
            self.partial,
            self.malformed,
            self.degenerate,
            self.outside
        )
    }
}

#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: BTreeMap<String, Track>,
    policy: DedupPolicy,
    model: LandingModel,
    window: TimeWindow,
    /// Launch site, downrange distances are computed from there
    launch: Option<Position>,
}

impl TrackStore {
    pub fn new(policy: DedupPolicy, model: LandingModel) -> Self {
        TrackStore {
            tracks: BTreeMap::new(),
            policy,
            model,
            window: TimeWindow::default(),
            launch: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_launch(mut self, launch: Position) -> Self {
        self.launch = Some(launch);
        self
    }

    pub fn launch(&self) -> Option<Position> {
        self.launch
    }

    /// Distance in km from the launch site to the latest position of `track`.
    ///
    pub fn downrange(&self, track: &Track) -> Option<f64> {
        self.launch
            .and_then(|l| track.distance_to(&l))
            .map(|d| d / 1000.)
    }

    /// Route one report to its track, creating it on first sight.
    ///
    /// Degenerate pairs are logged here and returned with the outcome.
    ///
    #[tracing::instrument(skip(self))]
    pub fn ingest(&mut self, report: Report) -> Ingest {
        let res = match self.tracks.get_mut(report.identity()) {
            Some(track) => track.push(report),
            None => {
                debug!("new track for {}", report.identity());
                let id = report.identity().to_string();
                self.tracks
                    .insert(id, Track::new(report, self.policy, self.model));
                Ingest::Appended { warnings: vec![] }
            }
        };
        if let Ingest::Appended { warnings } = &res {
            warnings.iter().for_each(|w| warn!("{w}"));
        }
        res
    }

    /// Parse and ingest one cycle worth of frames, in order.  Bad frames are logged and
    /// counted, never fatal.  So are reports outside the time window.
    ///
    #[tracing::instrument(skip(self, batch))]
    pub fn ingest_frames<'a, I>(&mut self, batch: I) -> CycleStats
    where
        I: IntoIterator<Item = (&'a str, DateTime<Utc>)>,
    {
        let mut stats = CycleStats::default();

        for (raw, received) in batch {
            stats.frames += 1;
            match parse_frame(raw, received) {
                Ok(report) if !self.window.contains(report.timestamp()) => {
                    trace!("outside window: {report}");
                    stats.outside += 1;
                }
                Ok(report) => match self.ingest(report) {
                    Ingest::Appended { warnings } => {
                        stats.appended += 1;
                        stats.degenerate += warnings.len();
                    }
                    Ingest::DuplicateSkipped => stats.duplicates += 1,
                },
                Err(e) => {
                    if e.is_partial() {
                        stats.partial += 1;
                    } else {
                        stats.malformed += 1;
                    }
                    // `event!` needs a constant level.
                    //
                    if e.level() == Level::WARN {
                        event!(Level::WARN, "skipping {e}");
                    } else {
                        event!(Level::DEBUG, "skipping {e}");
                    }
                }
            }
        }
        trace!("{stats}");
        stats
    }

    pub fn get(&self, identity: &str) -> Option<&Track> {
        self.tracks.get(identity)
    }

    /// All tracks, sorted by identity.
    ///
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current state of every track as a table.
    ///
    #[tracing::instrument(skip(self))]
    pub fn summary(&self) -> String {
        let mut header = vec![
            "Callsign",
            "Reports",
            "Last seen",
            "Position",
            "Altitude (m)",
            "Ascent (m/s)",
            "Speed (m/s)",
            "Landing in",
            "Freefall in",
        ];
        if self.launch.is_some() {
            header.push("Downrange (km)");
        }

        let mut builder = Builder::default();
        builder.push_record(header);

        self.tracks.values().for_each(|t| {
            let last = t
                .latest()
                .map(|r| r.timestamp().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            let pos = t
                .latest_position()
                .map(|p| format!("{:.5}, {:.5}", p.latitude, p.longitude))
                .unwrap_or("-".to_string());
            let alt = opt(t.latest_altitude(), 1);
            let ascent = opt(t.ascent_rate(), 2);
            let speed = opt(t.ground_speed(), 2);
            let landing = t
                .landing_estimate()
                .map(|s| format!("{:.0} s", s))
                .unwrap_or("-".to_string());
            let fall = t
                .freefall()
                .map(|f| format!("{:.0} s", f.seconds_to_ground))
                .unwrap_or("-".to_string());

            let mut row = vec![
                t.identity().to_string(),
                t.len().to_string(),
                last,
                pos,
                alt,
                ascent,
                speed,
                landing,
                fall,
            ];
            if self.launch.is_some() {
                row.push(opt(self.downrange(t), 2));
            }
            builder.push_record(row);
        });

        let all = builder.build().with(Style::modern()).to_string();
        format!("Tracks ({}):\n{all}", self.tracks.len())
    }
}

#[inline]
fn opt(v: Option<f64>, prec: usize) -> String {
    v.map(|v| format!("{:.*}", prec, v))
        .unwrap_or("-".to_string())
}
