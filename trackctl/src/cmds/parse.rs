//! `parse`: decode frames given by hand, one output line per frame.
//!

use std::io::{self, BufRead};

use eyre::{eyre, Result};
use tracing::trace;

use skytrack_formats::{meters_to_feet, mps_to_knots, parse, COMMENT};

use crate::ParseOpts;

/// Decode one frame into a printable line, `Err` carries the reason it was rejected.
///
/// Altitude and speed are also given in the units the frame carries them in (feet, knots).
///
pub fn describe(raw: &str) -> Result<String, String> {
    let r = parse(raw).map_err(|e| e.to_string())?;

    let mut line = r.to_string();
    if let Some(alt) = r.altitude() {
        line.push_str(&format!(" alt={:.0} ft", meters_to_feet(alt)));
    }
    if let Some(course) = r.course() {
        line.push_str(&format!(" course={course}"));
    }
    if let Some(speed) = r.speed() {
        line.push_str(&format!(" speed={speed:.1} m/s ({:.0} kn)", mps_to_knots(speed)));
    }
    for (k, v) in r.raw_fields().iter().filter(|(k, _)| k.as_str() != COMMENT) {
        line.push_str(&format!(" {k}={v}"));
    }
    Ok(line)
}

/// Decode every frame and print it, fail if any of them was rejected.
///
#[tracing::instrument]
pub fn parse_frames(opts: &ParseOpts) -> Result<()> {
    let frames = if opts.frames.is_empty() {
        trace!("reading stdin");
        io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
    } else {
        opts.frames.clone()
    };

    let mut bad = 0;
    for raw in frames.iter().filter(|f| !f.trim().is_empty()) {
        match describe(raw) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                bad += 1;
                eprintln!("{e}");
            }
        }
    }
    if bad > 0 {
        return Err(eyre!("{bad} frame(s) rejected"));
    }
    Ok(())
}
