use std::path::PathBuf;

use thiserror::Error;

/// Custom error type for the sources, allow us to differentiate between errors.
///
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Can not open {0:?}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("Read error on {0}: {1}")]
    Read(String, std::io::Error),
    #[error("Can not write to {0:?}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("Bad configuration parameter: {0}")]
    BadParam(String),
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),
}
