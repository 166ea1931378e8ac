//! Error module
//!

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("report for {got} can not go into the track of {expected}")]
    IdentityMismatch { expected: String, got: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format for {0:?}, use .kml, .geojson or .json")]
    Unsupported(String),
    #[error("can not write {0}: {1}")]
    Write(String, std::io::Error),
    #[error("KML generation failed: {0}")]
    Kml(String),
    #[error("GeoJSON generation failed: {0}")]
    GeoJson(#[from] serde_json::Error),
}
