//! This is the `Config` struct.
//!
//! The configuration file is `config.hcl` in `$HOME/.config/skytrack` (or `%LOCALAPPDATA%` on
//! Windows), another file can be given on the command-line.  When there is no file at the
//! default location, the built-in defaults are used.
//!
//! Example:
//! ```hcl
//! version = 1
//!
//! interval       = 5
//! callsigns      = ["W3EAX-8", "W3EAX-13"]
//! dedup          = "exact"
//! landing_window = 3
//!
//! radio {
//!   timeout = 1
//! }
//!
//! aprsfi {
//!   api_key = "123456.abcdef"
//!   timeout = 10
//! }
//! ```
//!

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

/// Config filename
const CONFIG: &str = "config.hcl";

/// Main name for the directory base
const TAG: &str = "skytrack";

/// Current version of the file
pub const CVERSION: usize = 1;

/// Default aprs.fi endpoint
const APRSFI_URL: &str = "https://api.aprs.fi/api/get";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Bad file version {0}, expected {CVERSION}")]
    BadFileVersion(usize),
    #[error("Unknown config file {0:?}")]
    UnknownFile(PathBuf),
    #[error("Can not read {0:?}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] hcl::Error),
}

/// Serial radio settings.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RadioConfig {
    /// Seconds to wait for frames in each cycle
    #[serde(default = "default_radio_timeout")]
    pub timeout: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            timeout: default_radio_timeout(),
        }
    }
}

/// aprs.fi API settings.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AprsFiConfig {
    #[serde(default = "default_aprsfi_url")]
    pub url: String,
    pub api_key: Option<String>,
    /// Seconds, for the whole HTTP request
    #[serde(default = "default_aprsfi_timeout")]
    pub timeout: u64,
}

impl Default for AprsFiConfig {
    fn default() -> Self {
        AprsFiConfig {
            url: default_aprsfi_url(),
            api_key: None,
            timeout: default_aprsfi_timeout(),
        }
    }
}

/// Whole configuration.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Version number for safety
    pub version: usize,
    /// Seconds between two polling cycles
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Vehicles to follow on aprs.fi
    #[serde(default)]
    pub callsigns: Vec<String>,
    /// `exact` or `content`
    #[serde(default = "default_dedup")]
    pub dedup: String,
    /// Number of ascent rates averaged for the landing estimate
    #[serde(default = "default_landing_window")]
    pub landing_window: usize,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub aprsfi: AprsFiConfig,
}

fn default_interval() -> u64 {
    5
}

fn default_dedup() -> String {
    "exact".to_string()
}

fn default_landing_window() -> usize {
    1
}

fn default_radio_timeout() -> u64 {
    1
}

fn default_aprsfi_url() -> String {
    APRSFI_URL.to_string()
}

fn default_aprsfi_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: CVERSION,
            interval: default_interval(),
            callsigns: vec![],
            dedup: default_dedup(),
            landing_window: default_landing_window(),
            radio: RadioConfig::default(),
            aprsfi: AprsFiConfig::default(),
        }
    }
}

impl Config {
    /// Returns the path of the default config directory
    ///
    pub fn config_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;

        #[cfg(unix)]
        let base = base.home_dir().join(".config");

        #[cfg(windows)]
        let base = base.data_local_dir().to_path_buf();

        Some(base.join(TAG))
    }

    /// Returns the path of the default config file
    ///
    pub fn default_file() -> Option<PathBuf> {
        let cfg = Self::config_path().map(|p| p.join(CONFIG));
        debug!("default = {cfg:?}");
        cfg
    }

    /// Load the given file or the default one.
    ///
    /// A file given explicitly must exist, a missing default file means built-in defaults.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<Config, ConfigError> {
        let fname = match fname {
            Some(fname) => {
                if !fname.exists() {
                    return Err(ConfigError::UnknownFile(fname.to_path_buf()));
                }
                fname.to_path_buf()
            }
            None => match Self::default_file() {
                Some(def) if def.exists() => def,
                def => {
                    debug!("no config file in {def:?}, using defaults");
                    return Ok(Config::default());
                }
            },
        };

        trace!("Loading config file {fname:?}");
        let data = fs::read_to_string(&fname).map_err(|e| ConfigError::Read(fname.clone(), e))?;
        Self::from_hcl(&data)
    }

    /// Parse and check the content of a configuration file.
    ///
    pub fn from_hcl(data: &str) -> Result<Config, ConfigError> {
        let cfg: Config = hcl::from_str(data)?;
        debug!("struct data = {cfg:?}");

        if cfg.version != CVERSION {
            return Err(ConfigError::BadFileVersion(cfg.version));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = Config::from_hcl("version = 1").unwrap();
        assert_eq!(Config::default(), cfg);
        assert_eq!(5, cfg.interval);
        assert_eq!("exact", cfg.dedup);
        assert_eq!(APRSFI_URL, cfg.aprsfi.url);
    }

    #[test]
    fn test_config_full() {
        let data = r##"
version = 1
interval = 30
callsigns = ["W3EAX-8", "W3EAX-13"]
dedup = "content"
landing_window = 3

radio {
  timeout = 2
}

aprsfi {
  api_key = "123456.abcdef"
}
"##;
        let cfg = Config::from_hcl(data).unwrap();
        assert_eq!(30, cfg.interval);
        assert_eq!(vec!["W3EAX-8", "W3EAX-13"], cfg.callsigns);
        assert_eq!("content", cfg.dedup);
        assert_eq!(3, cfg.landing_window);
        assert_eq!(2, cfg.radio.timeout);
        assert_eq!(Some("123456.abcdef".to_string()), cfg.aprsfi.api_key);
        assert_eq!(10, cfg.aprsfi.timeout);
    }

    #[test]
    fn test_config_bad_version() {
        let r = Config::from_hcl("version = 2");
        assert!(matches!(r, Err(ConfigError::BadFileVersion(2))));
    }

    #[test]
    fn test_config_no_version() {
        let r = Config::from_hcl("interval = 2");
        assert!(matches!(r, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_load_file() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "version = 1\ninterval = 7").unwrap();

        let cfg = Config::load(Some(f.path())).unwrap();
        assert_eq!(7, cfg.interval);
    }

    #[test]
    fn test_config_load_unknown() {
        let r = Config::load(Some(Path::new("/nonexistent/skytrack.hcl")));
        assert!(matches!(r, Err(ConfigError::UnknownFile(_))));
    }
}
