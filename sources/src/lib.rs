//! Module to deal with the different kind of sources we can receive frames from.
//!
//! Every source hands over raw text frames along with the time they were received, decoding is
//! done elsewhere:
//!
//! - `Radio`: a serial TNC (or anything that looks like a device file),
//! - `Replay`: a text log written by `Recorder` (or by older tools, same line format),
//! - `AprsFi`: the <https://aprs.fi> API, polled for a list of callsigns.
//!

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;

// Re-export these modules for a shorter import path.
//
pub use aprsfi::*;
pub use error::*;
pub use radio::*;
pub use record::*;
pub use replay::*;

mod aprsfi;
mod error;
mod radio;
mod record;
mod replay;

/// One frame as it came out of a source.
///
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    /// Frame text, no line terminator
    pub text: String,
    /// When we got it
    pub received: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(text: impl Into<String>, received: DateTime<Utc>) -> Self {
        RawFrame {
            text: text.into(),
            received,
        }
    }
}

/// This trait enables us to manage different ways of receiving frames under a single interface.
///
#[enum_dispatch(Source)]
pub trait Receivable: Debug {
    /// Return source's name
    fn name(&self) -> String;
    /// Everything available now, waiting at most `wait` for live sources
    fn receive(&mut self, wait: Duration) -> Result<Vec<RawFrame>, SourceError>;
    /// Nothing more will ever come out of this source
    fn is_exhausted(&self) -> bool;
    /// Release the underlying device, file or connection
    fn close(&mut self) -> Result<(), SourceError>;
}

#[enum_dispatch]
#[derive(Debug)]
pub enum Source {
    Radio(Radio),
    Replay(Replay),
    AprsFi(AprsFi),
}

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
