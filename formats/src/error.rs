//! Frame decoding errors.
//!

use thiserror::Error;
use tracing::Level;

/// Why a raw frame could not be turned into a `Report`.
///
/// Both variants are recoverable: the caller skips the frame and logs it.  Partial frames are
/// ordinary radio noise and are logged quietly, malformed ones may point at a broken payload or
/// receiver and are logged louder (see `level()`).
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameError {
    /// Frame cut short, `offset` is the byte where the missing field starts
    #[error("partial frame, {reason} at byte {offset}: {raw:?}")]
    Partial {
        raw: String,
        offset: usize,
        reason: String,
    },
    /// Complete but syntactically invalid
    #[error("malformed frame, {reason}: {raw:?}")]
    Malformed { raw: String, reason: String },
}

impl FrameError {
    /// Severity to log this error at.
    ///
    pub fn level(&self) -> Level {
        match self {
            FrameError::Partial { .. } => Level::DEBUG,
            FrameError::Malformed { .. } => Level::WARN,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, FrameError::Partial { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        let p = FrameError::Partial {
            raw: "A>B:!".into(),
            offset: 5,
            reason: "latitude".into(),
        };
        let m = FrameError::Malformed {
            raw: "A>B".into(),
            reason: "no separator".into(),
        };
        assert_eq!(Level::DEBUG, p.level());
        assert_eq!(Level::WARN, m.level());
        assert!(p.is_partial());
        assert!(!m.is_partial());
    }

    #[test]
    fn test_display() {
        let p = FrameError::Partial {
            raw: "A>B:!".into(),
            offset: 5,
            reason: "truncated latitude".into(),
        };
        assert_eq!(
            "partial frame, truncated latitude at byte 5: \"A>B:!\"",
            p.to_string()
        );
    }
}
