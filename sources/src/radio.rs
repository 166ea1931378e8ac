//! Serial radio: a TNC in text (KISS-less) mode attached as a device file.
//!
//! The line discipline (speed, raw mode) is set outside, e.g. `stty -F /dev/ttyUSB0 9600 raw`.
//! A reader thread turns lines into `RawFrame`s stamped with the reception time and pushes them
//! into a channel, `receive()` drains it with a timeout so the polling loop never blocks for
//! longer than asked.
//!

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::{RawFrame, Receivable, SourceError};

#[derive(Debug)]
pub struct Radio {
    /// Device path
    path: PathBuf,
    /// Frames from the reader thread
    rx: Receiver<RawFrame>,
    /// Tell the reader thread to stop
    stop: Arc<AtomicBool>,
    /// Reader thread is gone
    done: bool,
}

impl Radio {
    /// Open the device and start reading from it.
    ///
    #[tracing::instrument]
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let dev = File::open(path).map_err(|e| SourceError::Open(path.to_path_buf(), e))?;

        let (tx, rx) = channel::<RawFrame>();
        let stop = Arc::new(AtomicBool::new(false));

        let name = path.to_string_lossy().to_string();
        let flag = Arc::clone(&stop);
        thread::Builder::new()
            .name("radio".to_string())
            .spawn(move || {
                trace!("Starting reader thread on {name}");

                let mut reader = BufReader::new(dev);
                let mut buf = vec![];
                loop {
                    if flag.load(Ordering::Relaxed) {
                        break;
                    }
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => {
                            debug!("{name}: end of file");
                            break;
                        }
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            let line = line.trim_end_matches(['\r', '\n']);
                            if line.is_empty() {
                                continue;
                            }
                            if tx.send(RawFrame::new(line, Utc::now())).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("{name}: {e}");
                            break;
                        }
                    }
                }
                trace!("end of reader thread");
            })
            .map_err(|e| SourceError::Read(path.to_string_lossy().to_string(), e))?;

        Ok(Radio {
            path: path.to_path_buf(),
            rx,
            stop,
            done: false,
        })
    }
}

impl Receivable for Radio {
    fn name(&self) -> String {
        format!("radio:{}", self.path.to_string_lossy())
    }

    /// Wait up to `wait` for a first frame then take whatever else is already queued.
    ///
    #[tracing::instrument(skip(self))]
    fn receive(&mut self, wait: Duration) -> Result<Vec<RawFrame>, SourceError> {
        if self.done {
            return Ok(vec![]);
        }

        let mut frames = vec![];
        match self.rx.recv_timeout(wait) {
            Ok(f) => frames.push(f),
            Err(RecvTimeoutError::Timeout) => return Ok(frames),
            Err(RecvTimeoutError::Disconnected) => {
                self.done = true;
                return Ok(frames);
            }
        }
        loop {
            match self.rx.try_recv() {
                Ok(f) => frames.push(f),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.done = true;
                    break;
                }
            }
        }
        trace!("{} frames", frames.len());
        Ok(frames)
    }

    fn is_exhausted(&self) -> bool {
        self.done
    }

    /// The reader thread notices at its next line, a blocked `read()` can not be interrupted.
    ///
    fn close(&mut self) -> Result<(), SourceError> {
        self.stop.store(true, Ordering::Relaxed);
        Ok(())
    }
}
