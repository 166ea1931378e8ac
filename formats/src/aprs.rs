//! Decoders for the fields of an APRS information field.
//!
//! Fixed-width fields are cut with `nom` *streaming* parsers: when the input ends before a field
//! is complete we get `Incomplete` and report a `Fault::Short`, which the parser turns into a
//! partial frame.  Anything present but invalid is a `Fault::Bad`.
//!
//! Formats implemented (see [APRS101]):
//!
//! - uncompressed position `DDMM.hhN/DDDMM.hhW$` with optional `CCC/SSS` course/speed,
//! - compressed position `/YYYYXXXX$csT` (base 91),
//! - timestamps `DDHHMMz`, `DDHHMM/` and `HHMMSSh`,
//! - `/A=nnnnnn` altitude and `key=value` tokens in the comment.
//!
//! [APRS101]: http://www.aprs.org/doc/APRS101.PDF

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use nom::bytes::streaming::take;

use crate::{feet_to_meters, knots_to_mps, Position, COMMENT};

/// Divisor for compressed latitudes
const LAT_DIV: f64 = 380_926.;
/// Divisor for compressed longitudes
const LON_DIV: f64 = 190_463.;
/// Marker for the altitude in comments
const ALT_TAG: &str = "/A=";
/// Width of the altitude value
const ALT_WIDTH: usize = 6;

/// Failure while decoding one field.
///
#[derive(Debug, PartialEq)]
pub(crate) enum Fault {
    /// Input ended, `rest` is the length of the input left when the field started
    Short { rest: usize, what: &'static str },
    /// Field is there but invalid
    Bad(String),
}

impl Fault {
    fn bad(msg: impl Into<String>) -> Self {
        Fault::Bad(msg.into())
    }
}

/// Everything we pull out of the information field.
///
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Decoded {
    pub timestamp: Option<DateTime<Utc>>,
    pub position: Option<Position>,
    pub altitude: Option<f64>,
    pub course: Option<u16>,
    pub speed: Option<f64>,
    pub fields: BTreeMap<String, String>,
}

/// Cut `n` characters off `input`.
///
fn field<'a>(input: &'a str, n: usize, what: &'static str) -> Result<(&'a str, &'a str), Fault> {
    match take::<usize, &str, nom::error::Error<&str>>(n)(input) {
        Ok(r) => Ok(r),
        Err(nom::Err::Incomplete(_)) => Err(Fault::Short {
            rest: input.len(),
            what,
        }),
        Err(_) => Err(Fault::bad(format!("invalid {what}"))),
    }
}

/// Decode a whole information field (data type identifier included).
///
pub(crate) fn decode_info(info: &str, received: DateTime<Utc>) -> Result<Decoded, Fault> {
    let mut out = Decoded::default();

    let (rest, dti) = field(info, 1, "data type")?;
    let rest = match dti {
        "!" | "=" => position(rest, &mut out)?,
        "/" | "@" => {
            let (rest, ts) = field(rest, 7, "timestamp")?;
            out.timestamp = Some(timestamp(ts, received)?);
            position(rest, &mut out)?
        }
        // Status, only text
        ">" => rest,
        other => return Err(Fault::bad(format!("unsupported data type {other:?}"))),
    };
    comment(rest, &mut out)?;
    Ok(out)
}

/// Dispatch between compressed and uncompressed positions on the first character.
///
fn position<'a>(input: &'a str, out: &mut Decoded) -> Result<&'a str, Fault> {
    match input.chars().next() {
        None => Err(Fault::Short {
            rest: 0,
            what: "position",
        }),
        Some(c) if c.is_ascii_digit() || c == ' ' => uncompressed(input, out),
        Some(c) if is_compressed_table(c) => compressed(input, out),
        Some(c) => Err(Fault::bad(format!("invalid position start {c:?}"))),
    }
}

#[inline]
fn is_compressed_table(c: char) -> bool {
    matches!(c, '/' | '\\' | 'A'..='Z' | 'a'..='j')
}

#[inline]
fn is_table(c: char) -> bool {
    matches!(c, '/' | '\\' | 'A'..='Z' | '0'..='9')
}

/// `DDMM.hhN/DDDMM.hhW$` then maybe `CCC/SSS`.
///
fn uncompressed<'a>(input: &'a str, out: &mut Decoded) -> Result<&'a str, Fault> {
    let (rest, lat) = field(input, 8, "latitude")?;
    let latitude = degrees_minutes(lat, 2, ('N', 'S'), 90.)?;

    let (rest, table) = field(rest, 1, "symbol table")?;
    if !table.chars().all(is_table) {
        return Err(Fault::bad(format!("invalid symbol table {table:?}")));
    }

    let (rest, lon) = field(rest, 9, "longitude")?;
    let longitude = degrees_minutes(lon, 3, ('E', 'W'), 180.)?;

    let (rest, _symbol) = field(rest, 1, "symbol code")?;
    out.position = Some(Position::new(longitude, latitude));

    // Course/speed extension is optional, a truncated one is just comment text.
    //
    let rest = match course_speed(rest) {
        Some((course, knots)) => {
            if course > 0 {
                out.course = Some(course % 360);
            }
            out.speed = Some(knots_to_mps(knots as f64));
            &rest[7..]
        }
        None => rest,
    };
    Ok(rest)
}

/// Decode `DDMM.hhH` (or `DDDMM.hhH`) as `sign * (degrees + minutes / 60)`.
///
/// Position ambiguity replaces trailing digits by spaces, we read them as zeroes.
///
fn degrees_minutes(s: &str, width: usize, hemis: (char, char), max: f64) -> Result<f64, Fault> {
    let mut chars = s.chars();
    let sign = match chars.next_back().map(|c| c.to_ascii_uppercase()) {
        Some(c) if c == hemis.0 => 1.,
        Some(c) if c == hemis.1 => -1.,
        _ => return Err(Fault::bad(format!("invalid hemisphere in {s:?}"))),
    };

    let body: String = chars.map(|c| if c == ' ' { '0' } else { c }).collect();
    if body.len() != width + 5 || !body.is_ascii() {
        return Err(Fault::bad(format!("invalid coordinate {s:?}")));
    }
    let (deg, min) = body.split_at(width);
    let (whole, frac) = min.split_at(2);
    let frac = frac
        .strip_prefix('.')
        .ok_or_else(|| Fault::bad(format!("missing decimal point in {s:?}")))?;
    if ![deg, whole, frac]
        .iter()
        .all(|p| p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(Fault::bad(format!("invalid digits in {s:?}")));
    }

    let deg: f64 = deg
        .parse::<u32>()
        .map_err(|e| Fault::bad(format!("{s:?}: {e}")))?
        .into();
    let min: f64 = format!("{whole}.{frac}")
        .parse()
        .map_err(|e| Fault::bad(format!("{s:?}: {e}")))?;
    if min >= 60. {
        return Err(Fault::bad(format!("minutes out of range in {s:?}")));
    }
    let value = deg + min / 60.;
    if value > max {
        return Err(Fault::bad(format!("degrees out of range in {s:?}")));
    }
    Ok(sign * value)
}

/// `CCC/SSS`, course in degrees and speed in knots.
///
fn course_speed(input: &str) -> Option<(u16, u16)> {
    let b = input.as_bytes();
    if b.len() < 7 || b[3] != b'/' {
        return None;
    }
    if !b[..3].iter().chain(&b[4..7]).all(u8::is_ascii_digit) {
        return None;
    }
    let course = input[..3].parse().ok()?;
    let speed = input[4..7].parse().ok()?;
    Some((course, speed))
}

/// `/YYYYXXXX$csT`
///
fn compressed<'a>(input: &'a str, out: &mut Decoded) -> Result<&'a str, Fault> {
    let (rest, _table) = field(input, 1, "symbol table")?;
    let (rest, y) = field(rest, 4, "compressed latitude")?;
    let latitude = 90. - base91(y)? / LAT_DIV;
    let (rest, x) = field(rest, 4, "compressed longitude")?;
    let longitude = -180. + base91(x)? / LON_DIV;
    if !(-90. ..=90.).contains(&latitude) || !(-180. ..=180.).contains(&longitude) {
        return Err(Fault::bad(format!("compressed position out of range {y:?}{x:?}")));
    }
    let (rest, _symbol) = field(rest, 1, "symbol code")?;
    out.position = Some(Position::new(longitude, latitude));

    let (rest, cst) = field(rest, 3, "compressed extension")?;
    let b = cst.as_bytes();
    if b.len() != 3 || !b.iter().all(|c| (b' '..=b'~').contains(c)) {
        return Err(Fault::bad(format!("invalid compressed extension {cst:?}")));
    }
    let (c, s, t) = (b[0], b[1], b[2]);
    if c != b' ' {
        if c < b'!' || s < b'!' || t < b'!' {
            return Err(Fault::bad(format!("invalid compressed extension {cst:?}")));
        }
        let (c, s, t) = ((c - 33) as i32, (s - 33) as i32, t - 33);
        if t & 0x18 == 0x10 {
            // GGA-sourced: cs is an altitude in feet
            out.altitude = Some(feet_to_meters(1.002_f64.powi(c * 91 + s)));
        } else if c == (b'{' - 33) as i32 {
            let miles = 2. * 1.08_f64.powi(s);
            out.fields.insert("range".into(), format!("{miles:.1}"));
        } else {
            out.course = Some((c * 4) as u16 % 360);
            out.speed = Some(knots_to_mps(1.08_f64.powi(s) - 1.));
        }
    }
    Ok(rest)
}

/// Base-91 decoding of the compressed coordinates.
///
fn base91(s: &str) -> Result<f64, Fault> {
    s.bytes().try_fold(0., |acc, b| {
        if (b'!'..=b'{').contains(&b) {
            Ok(acc * 91. + (b - 33) as f64)
        } else {
            Err(Fault::bad(format!("invalid base-91 character in {s:?}")))
        }
    })
}

/// Decode a 7-character timestamp relative to the time we received the frame.
///
/// Day/hour/minute stamps pick the most recent month that does not put the stamp more than a
/// day after `received`, hour/minute/second stamps the most recent day within one hour.
///
pub(crate) fn timestamp(ts: &str, received: DateTime<Utc>) -> Result<DateTime<Utc>, Fault> {
    let mut chars = ts.chars();
    let kind = chars.next_back();
    let digits = chars.as_str();
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Fault::bad(format!("invalid timestamp {ts:?}")));
    }
    let n = |i: usize| -> u32 {
        digits[i..i + 2]
            .bytes()
            .fold(0, |acc, b| acc * 10 + (b - b'0') as u32)
    };
    let (a, b, c) = (n(0), n(2), n(4));

    match kind {
        // `/` is local time, we have no way to know which so take it as UTC.
        Some('z') | Some('/') => {
            let (year, month) = (received.year(), received.month());
            let (prev_year, prev_month) = if month == 1 {
                (year - 1, 12)
            } else {
                (year, month - 1)
            };
            [(year, month), (prev_year, prev_month)]
                .into_iter()
                .filter_map(|(y, m)| Utc.with_ymd_and_hms(y, m, a, b, c, 0).single())
                .find(|t| *t <= received + Duration::days(1))
                .ok_or_else(|| Fault::bad(format!("invalid timestamp {ts:?}")))
        }
        Some('h') => {
            let time = NaiveTime::from_hms_opt(a, b, c)
                .ok_or_else(|| Fault::bad(format!("invalid timestamp {ts:?}")))?;
            let t = received.date_naive().and_time(time).and_utc();
            if t > received + Duration::hours(1) {
                Ok(t - Duration::days(1))
            } else {
                Ok(t)
            }
        }
        _ => Err(Fault::bad(format!("invalid timestamp kind in {ts:?}"))),
    }
}

/// Pull the altitude out of the comment and collect telemetry tokens.
///
/// Every `key=value` token is kept verbatim, the remaining text is stored under `comment`.
///
fn comment(input: &str, out: &mut Decoded) -> Result<(), Fault> {
    let mut text = input.to_string();

    if let Some(idx) = input.find(ALT_TAG) {
        let tail = &input[idx + ALT_TAG.len()..];
        let (after, value) = field(tail, ALT_WIDTH, "altitude")?;
        let feet: i32 = value
            .parse()
            .map_err(|_| Fault::bad(format!("invalid altitude {value:?}")))?;
        out.altitude = Some(feet_to_meters(feet as f64));
        text = format!("{}{}", &input[..idx], after);
    }

    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|tok| tok.split_once('='))
        .filter(|(k, _)| !k.is_empty())
        .for_each(|(k, v)| {
            out.fields.insert(k.to_string(), v.to_string());
        });

    let text = text.trim();
    if !text.is_empty() {
        out.fields.insert(COMMENT.to_string(), text.to_string());
    }
    Ok(())
}
