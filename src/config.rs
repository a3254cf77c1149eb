//! Application configuration.
//!
//! Settings come from a TOML file and may be overridden by environment
//! variables, which take precedence over the file.  Every key has a default
//! except the database credentials and the facility list; those must be
//! supplied by one of the two sources.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::builder::DEFAULT_BLANK_LAYOUT_INDEX;
use crate::error::{ReportError, Result};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "case-review.toml";

/// Contact line printed at the bottom of every generated slide.
pub const DEFAULT_FOOTER_TEXT: &str = "contact@gopathlabs.com \u{2219} 855-GOPATH9  www.gopathdx.com   1000 Corporate Grove Dr, Buffalo Grove, IL 60089";

const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_BIND: &str = "127.0.0.1:8501";

/// Connection parameters of the case database.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host name or address.
    pub host: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Schema holding the case tables.
    pub name: String,
    /// Server port.
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            name: String::new(),
            port: DEFAULT_DB_PORT,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("port", &self.port)
            .finish()
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Case database connection.
    pub database: DatabaseConfig,
    /// Facility names offered for selection.
    pub facilities: Vec<String>,
    /// Slide template; see [`crate::template::resolve_template_path`] for fallbacks.
    pub template_path: Option<PathBuf>,
    /// Directory receiving generated reports.
    pub output_dir: PathBuf,
    /// Contact line printed on generated slides.
    pub footer_text: String,
    /// Layout of the first slide master used for generated slides.
    pub blank_layout_index: usize,
    /// Socket address of the web front end.
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            facilities: Vec::new(),
            template_path: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            footer_text: DEFAULT_FOOTER_TEXT.to_owned(),
            blank_layout_index: DEFAULT_BLANK_LAYOUT_INDEX,
            bind: DEFAULT_BIND.to_owned(),
        }
    }
}

impl AppConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| ReportError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads the configuration file at `path` and applies environment overrides.
    ///
    /// A missing file is tolerated only when `path` is the default location;
    /// an explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&text, path)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
                debug!("No configuration file at {}; using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ReportError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and
    /// `FACILITY_LIST` overrides obtained through `lookup`.
    ///
    /// `FACILITY_LIST` is a comma-separated list; blank entries are dropped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = &mut self.database;
        for (key, slot) in [
            ("DB_HOST", &mut database.host),
            ("DB_USER", &mut database.user),
            ("DB_PASSWORD", &mut database.password),
            ("DB_NAME", &mut database.name),
        ] {
            if let Some(value) = lookup(key) {
                debug!("Configuration key {key} taken from the environment");
                *slot = value;
            }
        }

        if let Some(list) = lookup("FACILITY_LIST") {
            self.facilities = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect();
        }
    }

    /// Checks that the settings needed to query the database are present.
    pub fn validate_database(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("database.host", self.database.host.as_str()),
            ("database.user", self.database.user.as_str()),
            ("database.name", self.database.name.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReportError::Config(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Checks that at least one facility can be offered.
    pub fn validate_facilities(&self) -> Result<()> {
        if self.facilities.is_empty() {
            Err(ReportError::Config(
                "no facilities configured; set `facilities` or FACILITY_LIST".to_owned(),
            ))
        } else {
            Ok(())
        }
    }
}
