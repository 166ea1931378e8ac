//! Per-vehicle trajectories built from decoded reports.
//!
//! - `TrackStore` routes reports to the `Track` of their vehicle and drops duplicates,
//! - `Track` keeps the reports and the derived ascent rate / ground speed series,
//! - `kinematics` holds the pure computations (rates, landing estimate, free-fall model),
//! - `export` writes all tracks as KML or GeoJSON.
//!

pub use error::*;
pub use export::*;
pub use kinematics::*;
pub use store::*;
pub use track::*;

mod error;
mod export;
pub mod kinematics;
mod store;
mod track;

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
