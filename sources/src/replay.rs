//! Replay of a frame log.
//!
//! Each line is `YYYY-MM-DD HH:MM:SS[ ZONE]: FRAME`, the leading time is when the frame was
//! received.  `ZONE` may be `UTC`/`GMT`/`Z` or a numeric offset like `+0100`; other names
//! can not be resolved and are read as UTC.
//!
//! Without `follow` the whole file is delivered and the source is exhausted at its end.  With
//! `follow` we behave like `tail -f` and pick up lines as they are appended.
//!

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, trace, warn};

use crate::{RawFrame, Receivable, SourceError};

/// Format of the timestamp at the start of each line
pub const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Length of the formatted timestamp
const TIME_LEN: usize = 19;

/// Separator between time and frame
const SEP: &str = ": ";

#[derive(Debug)]
pub struct Replay {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    /// Keep reading after the end of file
    follow: bool,
    /// Incomplete last line, waiting for its end
    pending: String,
    /// Line counter for messages
    lineno: usize,
    done: bool,
}

impl Replay {
    #[tracing::instrument]
    pub fn open(path: &Path, follow: bool) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::Open(path.to_path_buf(), e))?;
        Ok(Replay {
            path: path.to_path_buf(),
            reader: Some(BufReader::new(file)),
            follow,
            pending: String::new(),
            lineno: 0,
            done: false,
        })
    }

    fn line(&mut self, line: &str) -> Option<RawFrame> {
        self.lineno += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        match parse_line(line) {
            Some(f) => Some(f),
            None => {
                warn!("{}:{}: invalid line {line:?}", self.path.display(), self.lineno);
                None
            }
        }
    }
}

/// Split one log line into its frame and reception time.
///
pub fn parse_line(line: &str) -> Option<RawFrame> {
    let ts = line.get(..TIME_LEN)?;
    let rest = &line[TIME_LEN..];

    let (zone, frame) = if let Some(frame) = rest.strip_prefix(SEP) {
        ("", frame)
    } else {
        let rest = rest.strip_prefix(' ')?;
        rest.split_once(SEP)?
    };
    if !zone
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | ':'))
    {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(ts, TIME_FMT).ok()?;
    let received = match zone {
        "" | "UTC" | "GMT" | "Z" => naive.and_utc(),
        zone => match DateTime::parse_from_str(&format!("{ts} {zone}"), "%Y-%m-%d %H:%M:%S %z") {
            Ok(t) => t.with_timezone(&Utc),
            Err(_) => {
                trace!("unknown zone {zone:?}, using UTC");
                naive.and_utc()
            }
        },
    };
    Some(RawFrame::new(frame, received))
}

impl Receivable for Replay {
    fn name(&self) -> String {
        format!("replay:{}", self.path.to_string_lossy())
    }

    /// Every complete line available now, `wait` is not used as reading a file never blocks.
    ///
    #[tracing::instrument(skip(self))]
    fn receive(&mut self, _wait: Duration) -> Result<Vec<RawFrame>, SourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(vec![]);
        };

        let mut lines = vec![];
        let mut eof = false;
        loop {
            let mut buf = String::new();
            let n = reader
                .read_line(&mut buf)
                .map_err(|e| SourceError::Read(self.path.to_string_lossy().to_string(), e))?;
            if n == 0 {
                eof = true;
                break;
            }
            self.pending.push_str(&buf);
            if self.pending.ends_with('\n') {
                lines.push(std::mem::take(&mut self.pending));
            }
        }

        // A last line without terminator is complete only if nobody is going to append to it.
        //
        if eof && !self.follow {
            if !self.pending.is_empty() {
                lines.push(std::mem::take(&mut self.pending));
            }
            debug!("{}: end of replay", self.path.display());
            self.done = true;
            self.reader = None;
        }

        let frames: Vec<_> = lines.iter().filter_map(|l| self.line(l)).collect();
        trace!("{} frames", frames.len());
        Ok(frames)
    }

    fn is_exhausted(&self) -> bool {
        self.done
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.reader = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;

    use chrono::TimeZone;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    const FRAME: &str = "W3EAX-8>APRS,WIDE1-1,WIDE2-1,qAR,K3DO-11:!/:Gh=:j)#O   /A=026909|!Q|";

    #[rstest]
    #[case("2019-02-03 14:36:16: ", (14, 36, 16))]
    #[case("2019-02-03 14:36:16 UTC: ", (14, 36, 16))]
    #[case("2019-02-03 14:36:16 +0100: ", (13, 36, 16))]
    #[case("2019-02-03 14:36:16 -05:00: ", (19, 36, 16))]
    #[case("2019-02-03 14:36:16 EST: ", (14, 36, 16))]
    fn test_parse_line(#[case] prefix: &str, #[case] hms: (u32, u32, u32)) {
        let f = parse_line(&format!("{prefix}{FRAME}")).unwrap();
        assert_eq!(FRAME, f.text);
        assert_eq!(
            Utc.with_ymd_and_hms(2019, 2, 3, hms.0, hms.1, hms.2).unwrap(),
            f.received
        );
    }

    #[rstest]
    #[case("")]
    #[case("2019-02-03")]
    #[case("2019-02-03 14:36:16")]
    #[case("2019-02-03 14:36:16 W3EAX-8>APRS:>x")]
    #[case("2019-02-33 14:36:16: W3EAX-8>APRS:>x")]
    #[case("W3EAX-8>APRS,WIDE1-1,WIDE2-1,qAR,K3DO-11:!/:Gh=:j)#O")]
    fn test_parse_line_bad(#[case] line: &str) {
        assert!(parse_line(line).is_none(), "{line}");
    }

    #[test]
    fn test_replay_whole_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "2019-02-03 14:36:16 UTC: {FRAME}").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "garbage").unwrap();
        write!(f, "2019-02-03 14:37:16 UTC: W3EAX-8>APRS:>last").unwrap();
        f.flush().unwrap();

        let mut r = Replay::open(f.path(), false).unwrap();
        assert!(!r.is_exhausted());

        let frames = r.receive(Duration::ZERO).unwrap();
        assert_eq!(2, frames.len());
        assert_eq!(FRAME, frames[0].text);
        assert_eq!("W3EAX-8>APRS:>last", frames[1].text);
        assert!(r.is_exhausted());
        assert!(r.receive(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_replay_follow() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "2019-02-03 14:36:16 UTC: {FRAME}").unwrap();
        write!(f, "2019-02-03 14:37:16 UTC: W3EAX-8").unwrap();
        f.flush().unwrap();

        let mut r = Replay::open(f.path(), true).unwrap();
        let frames = r.receive(Duration::ZERO).unwrap();
        assert_eq!(1, frames.len());
        assert!(!r.is_exhausted());

        let mut w = OpenOptions::new().append(true).open(f.path()).unwrap();
        writeln!(w, ">APRS:>appended").unwrap();
        w.flush().unwrap();

        let frames = r.receive(Duration::ZERO).unwrap();
        assert_eq!(1, frames.len());
        assert_eq!("W3EAX-8>APRS:>appended", frames[0].text);
        assert!(!r.is_exhausted());

        r.close().unwrap();
        assert!(r.receive(Duration::ZERO).unwrap().is_empty());
    }
}
