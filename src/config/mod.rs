//! Configuration management.
//!
//! Settings come from, in increasing priority: built-in defaults, a TOML file
//! (explicit path or `<config dir>/ticketcleaner/config.toml`), and
//! `TICKETCLEANER_*` environment variables.
//!
//! ```toml
//! data_dir = "/var/lib/ticketcleaner"
//! pictures_dir = "/var/lib/glpi/files/_plugins/ticketcleaner/pictures"
//! staging_dir = "/var/lib/glpi/files/_tmp"
//!
//! [logging]
//! format = "json"
//! file = "/var/log/ticketcleaner.log"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Application directory name under the platform data and config dirs.
const APP_DIR: &str = "ticketcleaner";

/// Database file name inside the data directory.
const DB_FILE: &str = "ticketcleaner.db";

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Directory holding the database and, by default, the pictures.
    pub data_dir: PathBuf,
    /// Database path; `data_dir/ticketcleaner.db` when unset.
    pub db_path: Option<PathBuf>,
    /// Directory of known signature images; `data_dir/pictures` when unset.
    pub pictures_dir: Option<PathBuf>,
    /// Directory where the host stages mail attachments; `data_dir/tmp` when unset.
    pub staging_dir: Option<PathBuf>,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `ticketcleaner=debug`.
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub db_path: Option<String>,
    /// Pictures directory.
    pub pictures_dir: Option<String>,
    /// Attachment staging directory.
    pub staging_dir: Option<String>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".").join(".ticketcleaner"),
            |b| b.data_local_dir().join(APP_DIR),
        );
        Self {
            data_dir,
            db_path: None,
            pictures_dir: None,
            staging_dir: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl CleanerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from the platform config directory if a file is
    /// there, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a config file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        let config_file = directories::BaseDirs::new()
            .map(|b| b.config_dir().join(APP_DIR).join("config.toml"))
            .filter(|path| path.exists());
        match config_file {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Parses a TOML document on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is not valid.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self::from_config_file(file))
    }

    /// Converts a `ConfigFile` to `CleanerConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.db_path = file.db_path.map(PathBuf::from);
        config.pictures_dir = file.pictures_dir.map(PathBuf::from);
        config.staging_dir = file.staging_dir.map(PathBuf::from);
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies `TICKETCLEANER_*` variables from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    /// Empty values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TICKETCLEANER_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TICKETCLEANER_DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TICKETCLEANER_PICTURES_DIR") {
            self.pictures_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TICKETCLEANER_STAGING_DIR") {
            self.staging_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TICKETCLEANER_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if let Some(v) = get("TICKETCLEANER_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the pictures directory.
    #[must_use]
    pub fn with_pictures_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.pictures_dir = Some(path.into());
        self
    }

    /// Sets the staging directory.
    #[must_use]
    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(path.into());
        self
    }

    /// Effective database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DB_FILE))
    }

    /// Effective pictures directory.
    #[must_use]
    pub fn pictures_dir(&self) -> PathBuf {
        self.pictures_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("pictures"))
    }

    /// Effective staging directory.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("tmp"))
    }
}
