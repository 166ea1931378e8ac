//! Frame parser: one raw APRS frame in, one `Result<Report, FrameError>` out.
//!
//! Frames are in TNC2 text form:
//!
//! ```text
//! W3EAX-8>APRS,WIDE1-1,WIDE2-1,qAR,K3DO-11:!/:Gh=:j)#O   /A=026909|!Q|  /W3EAX,262,0,18'C
//! ^^^^^^^ ^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! source  dest path                        information field
//! ```
//!
//! Parsing is done in two phases: the structural one splits the header from the information
//! field and extracts the identity, the content one decodes position, altitude and telemetry
//! (see `aprs`).
//!
//! The parser has no state and no side effects, it never panics on bad input.
//!

use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::char,
    combinator::{all_consuming, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};
use tracing::trace;

use crate::aprs::{decode_info, Fault};
use crate::{FrameError, Report};

/// Separator between header and information field
const SEP: char = ':';

/// Parse a callsign, 1 to 9 characters with SSID.
///
fn callsign(input: &str) -> IResult<&str, &str> {
    take_while_m_n(1, 9, |c: char| c.is_ascii_alphanumeric() || c == '-')(input)
}

/// Parse a path element, a callsign maybe marked as already repeated.
///
fn path_element(input: &str) -> IResult<&str, &str> {
    recognize(pair(callsign, opt(char('*'))))(input)
}

/// Parse the whole header: `SRC>DEST,PATH1,PATH2...`
///
fn header(input: &str) -> IResult<&str, (&str, &str, Vec<&str>)> {
    all_consuming(tuple((
        callsign,
        preceded(char('>'), callsign),
        many0(preceded(char(','), path_element)),
    )))(input)
}

/// Parse `raw` received now.
///
pub fn parse(raw: &str) -> Result<Report, FrameError> {
    parse_frame(raw, Utc::now())
}

/// Parse one raw frame.  `received` is used as the report time unless the frame carries its
/// own timestamp, and to resolve the date of those timestamps.
///
/// ```
/// use chrono::Utc;
/// use skytrack_formats::parse_frame;
///
/// let r = parse_frame("W3EAX-8>APRS,WIDE1-1:!3900.00N/07600.00WO/A=003281", Utc::now()).unwrap();
/// assert_eq!("W3EAX-8", r.identity());
/// assert_eq!(Some(39.0), r.position().map(|p| p.latitude));
/// ```
///
#[tracing::instrument(level = "trace")]
pub fn parse_frame(raw: &str, received: DateTime<Utc>) -> Result<Report, FrameError> {
    let line = raw.trim_end_matches(['\r', '\n']);

    // Structural phase
    //
    let Some((head, info)) = line.split_once(SEP) else {
        return Err(FrameError::Malformed {
            raw: line.to_string(),
            reason: "missing separator between header and information field".into(),
        });
    };
    let (source, dest, path) = match header(head) {
        Ok((_, h)) => h,
        Err(_) => {
            return Err(FrameError::Malformed {
                raw: line.to_string(),
                reason: format!("invalid header {head:?}"),
            })
        }
    };
    trace!("from={source} to={dest} path={path:?}");

    // Content phase
    //
    let start = head.len() + SEP.len_utf8();
    let decoded = decode_info(info, received).map_err(|fault| match fault {
        Fault::Short { rest, what } => FrameError::Partial {
            raw: line.to_string(),
            offset: start + info.len() - rest,
            reason: format!("truncated {what}"),
        },
        Fault::Bad(reason) => FrameError::Malformed {
            raw: line.to_string(),
            reason,
        },
    })?;

    let mut report = Report::new(
        source.to_ascii_uppercase(),
        decoded.timestamp.unwrap_or(received),
    );
    if let Some(position) = decoded.position {
        report = report.with_position(position);
    }
    if let Some(altitude) = decoded.altitude {
        report = report.with_altitude(altitude);
    }
    if let Some(course) = decoded.course {
        report = report.with_course(course);
    }
    if let Some(speed) = decoded.speed {
        report = report.with_speed(speed);
    }
    let report = decoded
        .fields
        .into_iter()
        .fold(report, |r, (k, v)| r.with_field(k, v));
    Ok(report)
}
