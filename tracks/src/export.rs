//! Geospatial export of all tracks, as KML or GeoJSON.
//!
//! Every report with a position becomes a point carrying its time, callsign, altitude and the
//! kinematics aligned on it; every track with at least two positions also becomes a line with
//! the whole-track values, landing and free-fall estimates included.  A line is 3D only when
//! every one of its positions has an altitude, otherwise it is drawn flat.
//!
//! The format is chosen from the file extension.
//!

use std::fs;
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use kml::types::{AltitudeMode, Coord, Element, LineString, Placemark, Point};
use kml::{Kml, KmlDocument, KmlVersion, KmlWriter};
use serde::{Deserialize, Serialize};
use strum::{EnumString, VariantNames};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{debug, trace};

use skytrack_formats::Report;

use crate::{ExportError, Track, TrackStore};

/// Supported output formats.
///
#[derive(
    Copy,
    Clone,
    Debug,
    Deserialize,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Google Earth
    Kml,
    /// RFC 7946
    GeoJson,
}

impl ExportFormat {
    /// Pick the format from the extension of `path`.
    ///
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("kml") => Ok(ExportFormat::Kml),
            Some("geojson") | Some("json") => Ok(ExportFormat::GeoJson),
            _ => Err(ExportError::Unsupported(path.to_string_lossy().to_string())),
        }
    }

    /// Extensions recognised for this format.
    ///
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ExportFormat::Kml => &["kml"],
            ExportFormat::GeoJson => &["geojson", "json"],
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ExportFormat::Kml => "Keyhole Markup Language 2.3, one placemark per report and track",
            ExportFormat::GeoJson => "GeoJSON feature collection, points and line strings",
        }
    }

    /// List all export formats using `tabled`.
    ///
    pub fn list() -> String {
        let header = vec!["Name", "Extensions", "Description"];

        let mut builder = Builder::default();
        builder.push_record(header);

        [ExportFormat::Kml, ExportFormat::GeoJson]
            .iter()
            .for_each(|f| {
                builder.push_record(vec![
                    f.to_string(),
                    f.extensions().join(", "),
                    f.description().to_string(),
                ]);
            });
        let allf = builder.build().with(Style::modern()).to_string();
        format!("List all export formats:\n{allf}")
    }
}

/// Render every track of `store` in `format`.
///
#[tracing::instrument(skip(store))]
pub fn render(store: &TrackStore, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Kml => to_kml(store),
        ExportFormat::GeoJson => to_geojson(store),
    }
}

/// Write every track of `store` into `path`, replacing its content.
///
#[tracing::instrument(skip(store))]
pub fn write_tracks(store: &TrackStore, path: &Path) -> Result<(), ExportError> {
    let format = ExportFormat::from_path(path)?;
    let data = render(store, format)?;
    fs::write(path, data)
        .map_err(|e| ExportError::Write(path.to_string_lossy().to_string(), e))?;
    debug!("{} tracks written to {path:?} as {format}", store.len());
    Ok(())
}

/// Per-report values: the report with its kinematics (none for the first one).
///
struct Sample<'a> {
    report: &'a Report,
    ascent_rate: Option<f64>,
    ground_speed: Option<f64>,
}

fn samples(track: &Track) -> impl Iterator<Item = Sample<'_>> {
    track.chronological().enumerate().map(|(i, report)| {
        let k = i.checked_sub(1);
        Sample {
            report,
            ascent_rate: k.and_then(|k| track.ascent_rates().get(k).copied()),
            ground_speed: k.and_then(|k| track.ground_speeds().get(k).copied()),
        }
    })
}

// ----- GeoJSON

fn to_geojson(store: &TrackStore) -> Result<String, ExportError> {
    let mut features = vec![];

    for track in store.tracks() {
        let mut line = vec![];

        for s in samples(track) {
            let Some(pos) = s.report.position() else {
                continue;
            };
            let mut coords = vec![pos.longitude, pos.latitude];
            if let Some(alt) = s.report.altitude() {
                coords.push(alt);
            }
            line.push(coords.clone());

            let mut props = JsonObject::new();
            props.insert(
                "time".to_string(),
                JsonValue::from(s.report.timestamp().to_rfc3339()),
            );
            props.insert("callsign".to_string(), JsonValue::from(track.identity()));
            props.insert("altitude".to_string(), JsonValue::from(s.report.altitude()));
            props.insert("ascent_rate".to_string(), JsonValue::from(s.ascent_rate));
            props.insert("ground_speed".to_string(), JsonValue::from(s.ground_speed));

            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(coords))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            });
        }

        if line.len() < 2 {
            trace!("{}: not enough positions for a line", track.identity());
            continue;
        }
        if line.iter().any(|c| c.len() == 2) {
            line.iter_mut().for_each(|c| c.truncate(2));
        }
        let mut props = JsonObject::new();
        props.insert("callsign".to_string(), JsonValue::from(track.identity()));
        props.insert("reports".to_string(), JsonValue::from(track.len()));
        if let (Some(first), Some(last)) = (track.chronological().next(), track.latest()) {
            props.insert(
                "start".to_string(),
                JsonValue::from(first.timestamp().to_rfc3339()),
            );
            props.insert(
                "end".to_string(),
                JsonValue::from(last.timestamp().to_rfc3339()),
            );
        }
        props.insert("altitude".to_string(), JsonValue::from(track.latest_altitude()));
        props.insert("ascent_rate".to_string(), JsonValue::from(track.ascent_rate()));
        props.insert("ground_speed".to_string(), JsonValue::from(track.ground_speed()));
        props.insert(
            "seconds_to_impact".to_string(),
            JsonValue::from(track.seconds_to_impact()),
        );
        let fall = track.freefall();
        props.insert(
            "freefall_descent_rate".to_string(),
            JsonValue::from(fall.map(|f| f.descent_rate)),
        );
        props.insert(
            "freefall_seconds".to_string(),
            JsonValue::from(fall.map(|f| f.seconds_to_ground)),
        );
        if store.launch().is_some() {
            props.insert(
                "downrange_km".to_string(),
                JsonValue::from(store.downrange(track)),
            );
        }

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(line))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        });
    }

    let fc = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    Ok(serde_json::to_string_pretty(&fc)?)
}

// ----- KML

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or("-".to_string())
}

fn to_kml(store: &TrackStore) -> Result<String, ExportError> {
    let mut elements: Vec<Kml> = vec![];

    for track in store.tracks() {
        let mut coords = vec![];

        for s in samples(track) {
            let Some(pos) = s.report.position() else {
                continue;
            };
            let alt = s.report.altitude();
            coords.push(Coord::new(pos.longitude, pos.latitude, alt));

            let point = Point {
                altitude_mode: AltitudeMode::Absolute,
                ..Point::new(pos.longitude, pos.latitude, alt)
            };
            let when = Element {
                name: "TimeStamp".to_string(),
                children: vec![Element {
                    name: "when".to_string(),
                    content: Some(s.report.timestamp().to_rfc3339()),
                    ..Default::default()
                }],
                ..Default::default()
            };
            let description = format!(
                "time: {}\ncallsign: {}\naltitude: {}\nascent_rate: {}\nground_speed: {}",
                s.report.timestamp().to_rfc3339(),
                track.identity(),
                fmt_opt(alt),
                fmt_opt(s.ascent_rate),
                fmt_opt(s.ground_speed),
            );
            elements.push(Kml::Placemark(Placemark {
                name: Some(s.report.timestamp().format("%H:%M:%S").to_string()),
                description: Some(description),
                geometry: Some(kml::types::Geometry::Point(point)),
                children: vec![when],
                ..Default::default()
            }));
        }

        if coords.len() < 2 {
            trace!("{}: not enough positions for a line", track.identity());
            continue;
        }
        if coords.iter().any(|c| c.z.is_none()) {
            coords.iter_mut().for_each(|c| c.z = None);
        }
        let ls = LineString {
            tessellate: false,
            extrude: true,
            altitude_mode: AltitudeMode::Absolute,
            coords,
            ..Default::default()
        };
        let mut description = format!(
            "callsign: {}\nreports: {}\naltitude: {}\nascent_rate: {}\nground_speed: {}\nseconds_to_impact: {:.0}\nfreefall_seconds: {}",
            track.identity(),
            track.len(),
            fmt_opt(track.latest_altitude()),
            fmt_opt(track.ascent_rate()),
            fmt_opt(track.ground_speed()),
            track.seconds_to_impact(),
            fmt_opt(track.freefall().map(|f| f.seconds_to_ground)),
        );
        if store.launch().is_some() {
            description.push_str(&format!("\ndownrange_km: {}", fmt_opt(store.downrange(track))));
        }
        elements.push(Kml::Placemark(Placemark {
            name: Some(track.identity().to_string()),
            description: Some(description),
            geometry: Some(kml::types::Geometry::LineString(ls)),
            ..Default::default()
        }));
    }

    let doc = Kml::Document {
        attrs: [("name".to_string(), "Balloon tracks".to_string())].into(),
        elements,
    };
    let doc = Kml::KmlDocument(KmlDocument {
        attrs: Default::default(),
        elements: vec![doc],
        version: KmlVersion::V23,
    });

    let mut buf = vec![];
    KmlWriter::from_writer(&mut buf)
        .write(&doc)
        .map_err(|e| ExportError::Kml(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| ExportError::Kml(e.to_string()))
}
