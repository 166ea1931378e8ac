//! Client for the [aprs.fi] location API.
//!
//! aprs.fi does the decoding itself and only gives us the resulting fields, we turn every
//! location entry back into a *compressed* APRS position frame so that everything goes through
//! the same parser.  Base-91 keeps the position within a third of a meter, a position decoded
//! from a radio frame and written back by aprs.fi lands on the very same value.  Altitude goes
//! through `/A=` in whole feet, which is what radio frames carry in the first place.  The
//! reception time of such a frame is the time aprs.fi has for the position.
//!
//! API failures (network, quota, bad key) are logged and give an empty batch, the next cycle
//! will try again.
//!
//! [aprs.fi]: https://aprs.fi/page/api
//!

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::{RawFrame, Receivable, SourceError};

/// Feet in one meter
const FEET_PER_METER: f64 = 1. / 0.3048;
/// km/h in one knot
const KMH_PER_KNOT: f64 = 1.852;
/// Used when the entry has no (usable) symbol, a balloon
const DEFAULT_SYMBOL: (char, char) = ('/', 'O');
/// Compressed latitude units per degree
const LAT_MUL: f64 = 380_926.;
/// Compressed longitude units per degree
const LON_MUL: f64 = 190_463.;
/// Largest 4-character base-91 value
const BASE91_MAX: f64 = 68_574_960.;
/// Compression type byte: current fix, not from GGA
const COMPRESSION_TYPE: char = '!';

/// Answer to `what=loc`, every value is a string.
///
#[derive(Debug, Deserialize)]
struct Response {
    result: String,
    code: Option<String>,
    description: Option<String>,
    #[serde(default)]
    entries: Vec<Entry>,
}

/// One location.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Entry {
    pub name: Option<String>,
    /// Unix time of the position
    pub time: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    /// Meters
    pub altitude: Option<String>,
    /// Degrees
    pub course: Option<String>,
    /// km/h
    pub speed: Option<String>,
    /// Table and code
    pub symbol: Option<String>,
    pub srccall: Option<String>,
    pub dstcall: Option<String>,
    pub comment: Option<String>,
}

impl Entry {
    /// Re-encode as `SRC>DST:!/YYYYXXXX$csT/A=nnnnnn comment`.
    ///
    pub fn to_frame(&self) -> Option<RawFrame> {
        let src = self.srccall.as_deref().or(self.name.as_deref())?;
        let dst = self.dstcall.as_deref().unwrap_or("APRS");
        let lat: f64 = self.lat.as_deref()?.parse().ok()?;
        let lon: f64 = self.lng.as_deref()?.parse().ok()?;
        if !(-90. ..=90.).contains(&lat) || !(-180. ..=180.).contains(&lon) {
            return None;
        }
        let time: i64 = self.time.as_deref()?.parse().ok()?;
        let received = DateTime::<Utc>::from_timestamp(time, 0)?;

        let (table, code) = self
            .symbol
            .as_deref()
            .and_then(|s| {
                let mut c = s.chars();
                match (c.next(), c.next()) {
                    (Some(t), Some(c)) if matches!(t, '/' | '\\' | 'A'..='Z') => Some((t, c)),
                    // Numeric overlays are `a`..`j` once compressed
                    (Some(t @ '0'..='9'), Some(c)) => {
                        Some(((b'a' + (t as u8 - b'0')) as char, c))
                    }
                    _ => None,
                }
            })
            .unwrap_or(DEFAULT_SYMBOL);

        let mut info = format!(
            "!{table}{}{}{code}",
            base91((90. - lat) * LAT_MUL),
            base91((180. + lon) * LON_MUL)
        );

        let course = self.course.as_deref().and_then(|c| c.parse::<f64>().ok());
        let speed = self.speed.as_deref().and_then(|s| s.parse::<f64>().ok());
        match (course, speed) {
            (Some(course), Some(speed)) => {
                let c = (course.round() as i64).rem_euclid(360) / 4;
                let knots = (speed / KMH_PER_KNOT).max(0.);
                let s = ((knots + 1.).ln() / 1.08_f64.ln()).round().clamp(0., 89.) as i64;
                info.push(char::from(33 + c as u8));
                info.push(char::from(33 + s as u8));
                info.push(COMPRESSION_TYPE);
            }
            _ => info.push_str("   "),
        }

        if let Some(alt) = self.altitude.as_deref().and_then(|a| a.parse::<f64>().ok()) {
            let feet = (alt * FEET_PER_METER).round().clamp(-99_999., 999_999.) as i64;
            info.push_str(&format!("/A={feet:06}"));
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            info.push(' ');
            info.push_str(comment);
        }

        Some(RawFrame::new(format!("{src}>{dst}:{info}"), received))
    }
}

/// Four base-91 digits, `v` is rounded and kept in range.
///
fn base91(v: f64) -> String {
    let mut v = v.round().clamp(0., BASE91_MAX) as u32;
    let mut digits = ['!'; 4];
    for d in digits.iter_mut().rev() {
        *d = char::from(33 + (v % 91) as u8);
        v /= 91;
    }
    digits.iter().collect()
}

#[derive(Debug)]
pub struct AprsFi {
    client: Client,
    url: String,
    api_key: String,
    callsigns: Vec<String>,
}

impl AprsFi {
    /// Prepare the client, nothing is sent yet.
    ///
    #[tracing::instrument(skip(api_key))]
    pub fn new(
        url: &str,
        api_key: Option<String>,
        callsigns: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let api_key =
            api_key.ok_or_else(|| SourceError::BadParam("no aprs.fi API key".to_string()))?;
        if callsigns.is_empty() {
            return Err(SourceError::BadParam(
                "no callsign to follow on aprs.fi".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("skytrack/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(AprsFi {
            client,
            url: url.to_string(),
            api_key,
            callsigns,
        })
    }

    fn fetch(&self) -> Result<Vec<Entry>, SourceError> {
        let names = self.callsigns.join(",");
        trace!("Fetching {names} from {}…", self.url);

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("name", names.as_str()),
                ("what", "loc"),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()?;

        // Check status
        //
        match resp.status() {
            StatusCode::OK => trace!("OK"),
            code => {
                warn!("aprs.fi: HTTP {code}");
                return Ok(vec![]);
            }
        }

        let resp: Response = resp.json()?;
        Ok(entries(resp))
    }
}

/// Entries of a successful answer, nothing from a failed one.
///
fn entries(resp: Response) -> Vec<Entry> {
    if resp.result != "ok" {
        warn!(
            "aprs.fi query failure {}: {}",
            resp.code.unwrap_or_default(),
            resp.description.unwrap_or_default()
        );
        return vec![];
    }
    resp.entries
}

impl Receivable for AprsFi {
    fn name(&self) -> String {
        "aprs.fi".to_string()
    }

    /// One API call, bounded by the client timeout.
    ///
    #[tracing::instrument(skip(self))]
    fn receive(&mut self, _wait: Duration) -> Result<Vec<RawFrame>, SourceError> {
        let entries = match self.fetch() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("aprs.fi: {e}");
                return Ok(vec![]);
            }
        };
        let frames: Vec<_> = entries
            .iter()
            .filter_map(|e| {
                let f = e.to_frame();
                if f.is_none() {
                    debug!("unusable entry {e:?}");
                }
                f
            })
            .collect();
        trace!("{} frames", frames.len());
        Ok(frames)
    }

    /// There is always a next poll.
    ///
    fn is_exhausted(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use skytrack_formats::parse_frame;

    use super::*;

    const ANSWER: &str = r##"{
  "command": "get",
  "result": "ok",
  "what": "loc",
  "found": 1,
  "entries": [
    {
      "class": "a",
      "name": "W3EAX-8",
      "type": "l",
      "time": "1549204576",
      "lasttime": "1549204576",
      "lat": "39.70036",
      "lng": "-77.90921",
      "altitude": "8201.86",
      "course": "188",
      "speed": "24",
      "symbol": "/O",
      "srccall": "W3EAX-8",
      "dstcall": "APRS",
      "comment": "nearspace.umd.edu",
      "path": "WIDE1-1,WIDE2-1,qAR,K3DO-11"
    }
  ]
}"##;

    /// Compressed position from a real flight, as heard on the radio.
    const RADIO: &str = "W3EAX-8>APRS,WIDE1-1,WIDE2-1,qAR,K3DO-11:!/:Gh=:j)#O   /A=026909 nearspace.umd.edu";

    #[rstest]
    #[case(0., "!!!!")]
    #[case(-5., "!!!!")]
    #[case(BASE91_MAX, "{{{{")]
    #[case(1e9, "{{{{")]
    #[case((90. - 39.70036) * LAT_MUL, ":Gh<")]
    #[case((180. - 77.90921) * LON_MUL, ":j)#")]
    fn test_base91(#[case] v: f64, #[case] want: &str) {
        assert_eq!(want, base91(v));
    }

    fn entry() -> Entry {
        Entry {
            name: Some("W3EAX-8".into()),
            time: Some("1549204576".into()),
            lat: Some("39.70036".into()),
            lng: Some("-77.90921".into()),
            altitude: Some("8201.86".into()),
            course: Some("188".into()),
            speed: Some("24".into()),
            symbol: Some("/O".into()),
            srccall: Some("W3EAX-8".into()),
            dstcall: Some("APRS".into()),
            comment: Some("nearspace.umd.edu".into()),
        }
    }

    #[test]
    fn test_entry_to_frame() {
        let f = entry().to_frame().unwrap();
        assert_eq!(
            "W3EAX-8>APRS:!/:Gh<:j)#OPC!/A=026909 nearspace.umd.edu",
            f.text
        );
        assert_eq!(
            Utc.with_ymd_and_hms(2019, 2, 3, 14, 36, 16).unwrap(),
            f.received
        );
    }

    #[test]
    fn test_entry_frame_parses() {
        let f = entry().to_frame().unwrap();
        let r = parse_frame(&f.text, f.received).unwrap();

        assert_eq!("W3EAX-8", r.identity());
        assert_eq!(f.received, r.timestamp());
        let pos = r.position().unwrap();
        assert!((pos.latitude - 39.70036).abs() < 1e-5);
        assert!((pos.longitude + 77.90921).abs() < 1e-5);
        assert!((r.altitude().unwrap() - 8201.86).abs() < 0.5);
        assert_eq!(Some(188), r.course());
        assert_eq!(Some("nearspace.umd.edu"), r.comment());
    }

    #[test]
    fn test_entry_minimal() {
        let e = Entry {
            name: Some("KC3SKW-9".into()),
            time: Some("1549204576".into()),
            lat: Some("-39.5".into()),
            lng: Some("76.25".into()),
            symbol: Some("??".into()),
            ..Default::default()
        };
        assert_eq!(
            "KC3SKW-9>APRS:!/bK!!afe8O   ",
            e.to_frame().unwrap().text
        );
    }

    #[test]
    fn test_entry_overlay() {
        let e = Entry {
            symbol: Some("1&".into()),
            course: None,
            ..entry()
        };
        let f = e.to_frame().unwrap();
        assert!(f.text.starts_with("W3EAX-8>APRS:!b:Gh<:j)#&   /A="));
        assert!(parse_frame(&f.text, f.received).is_ok());
    }

    #[test]
    fn test_entry_same_fix_as_radio() {
        let t = Utc.with_ymd_and_hms(2019, 2, 3, 14, 36, 16).unwrap();
        let radio = parse_frame(RADIO, t).unwrap();
        let pos = radio.position().unwrap();

        // Values aprs.fi decoded from that very frame
        let e = Entry {
            lat: Some(pos.latitude.to_string()),
            lng: Some(pos.longitude.to_string()),
            course: None,
            speed: None,
            ..entry()
        };
        let f = e.to_frame().unwrap();
        let via_api = parse_frame(&f.text, f.received).unwrap();

        assert_eq!(radio.position(), via_api.position());
        assert_eq!(radio.altitude(), via_api.altitude());
        assert_eq!(radio.raw_fields(), via_api.raw_fields());

        // aprs.fi only gives 5 decimals, we stay on the neighbouring grid point at worst
        let f = Entry {
            course: None,
            speed: None,
            ..entry()
        }
        .to_frame()
        .unwrap();
        let rounded = parse_frame(&f.text, f.received).unwrap();
        assert!(pos.distance_to(&rounded.position().unwrap()) < 1.);
        assert_eq!(radio.altitude(), rounded.altitude());
    }

    #[test]
    fn test_entry_unusable() {
        let e = Entry {
            lat: None,
            ..entry()
        };
        assert!(e.to_frame().is_none());
        let e = Entry {
            time: Some("yesterday".into()),
            ..entry()
        };
        assert!(e.to_frame().is_none());
        let e = Entry {
            lat: Some("91.0".into()),
            ..entry()
        };
        assert!(e.to_frame().is_none());
    }

    #[test]
    fn test_entries_fail() {
        let resp: Response = serde_json::from_str(
            r#"{"command":"get","result":"fail","code":"apikey-wrong","description":"wrong apikey"}"#,
        )
        .unwrap();
        assert!(entries(resp).is_empty());
    }

    #[test]
    fn test_entries_ok() {
        let resp: Response = serde_json::from_str(ANSWER).unwrap();
        let e = entries(resp);
        assert_eq!(1, e.len());
        assert_eq!(entry(), e[0]);
    }

    #[test]
    fn test_new_needs_key_and_callsigns() {
        let r = AprsFi::new(
            "https://api.aprs.fi/api/get",
            None,
            vec!["W3EAX-8".into()],
            Duration::from_secs(1),
        );
        assert!(matches!(r, Err(SourceError::BadParam(_))));

        let r = AprsFi::new(
            "https://api.aprs.fi/api/get",
            Some("key".into()),
            vec![],
            Duration::from_secs(1),
        );
        assert!(matches!(r, Err(SourceError::BadParam(_))));
    }
}
