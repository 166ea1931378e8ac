//! Raw frame recorder.
//!
//! Every frame received is appended to a log in the format `Replay` reads back, so that any
//! session can be replayed later.
//!

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::{RawFrame, SourceError, TIME_FMT};

#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Recorder {
    /// Open `path` for appending, creating it if needed.
    ///
    #[tracing::instrument]
    pub fn create(path: &Path) -> Result<Self, SourceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SourceError::Open(path.to_path_buf(), e))?;
        Ok(Recorder {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    /// Append `frames` and flush, a crash should not lose a whole cycle.
    ///
    pub fn record(&mut self, frames: &[RawFrame]) -> Result<(), SourceError> {
        let err = |e| SourceError::Write(self.path.clone(), e);

        for f in frames {
            writeln!(self.out, "{} UTC: {}", f.received.format(TIME_FMT), f.text).map_err(err)?;
        }
        self.out.flush().map_err(err)?;
        trace!("{} frames recorded", frames.len());
        Ok(())
    }
}
