//! Decoding of the frames sent by high-altitude balloons and other APRS trackers.
//!
//! One frame in TNC2 text form goes in, one [`Report`] comes out:
//!
//! - [`parse_frame()`] and [`parse()`] do the decoding, they have no state,
//! - [`FrameError`] tells partial frames (cut short in transit) from malformed ones,
//! - [`Position`] and the unit helpers are shared with the track store.
//!

// Re-export for convenience
//
pub use error::*;
pub use parser::*;
pub use position::*;
pub use report::*;
pub use units::*;

mod aprs;
mod error;
mod parser;
mod position;
mod report;
mod units;

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
