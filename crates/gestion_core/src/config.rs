//! Application configuration resolution.
//!
//! # Responsibility
//! - Resolve data, log and export directories plus the log level.
//!
//! # Invariants
//! - Priority per field: command line > environment > TOML file > default.
//! - Resolved directories are absolute.
//! - A missing default config file is not an error; a missing file named on
//!   the command line is.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "GESTION_DATA_DIR";
pub const ENV_LOG_DIR: &str = "GESTION_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "GESTION_LOG_LEVEL";

const APP_DIR_NAME: &str = "gestion";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    MissingConfigFile(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config file `{}`: {source}", path.display())
            }
            Self::MissingConfigFile(path) => {
                write!(f, "config file `{}` does not exist", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::MissingConfigFile(_) => None,
        }
    }
}

/// Values read from `config.toml`; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub data_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub export_dir: Option<PathBuf>,
}

impl ConfigFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Command line overrides, highest priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding one database file per store.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    /// Default directory for export files given as bare names.
    pub export_dir: PathBuf,
}

impl AppConfig {
    /// Resolves configuration from overrides, process environment, the
    /// config file and platform defaults.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::resolve`] with an injectable environment lookup.
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = load_config_file(overrides.config_file.as_deref())?;
        let env_path = |name: &str| env(name).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let data_dir = overrides
            .data_dir
            .clone()
            .or_else(|| env_path(ENV_DATA_DIR))
            .or_else(|| file.data_dir.clone())
            .unwrap_or_else(default_data_dir);
        let data_dir = absolutize(&data_dir)?;

        let log_dir = overrides
            .log_dir
            .clone()
            .or_else(|| env_path(ENV_LOG_DIR))
            .or_else(|| file.log_dir.clone())
            .unwrap_or_else(|| data_dir.join("logs"));
        let log_dir = absolutize(&log_dir)?;

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| env(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()))
            .or_else(|| file.log_level.clone())
            .unwrap_or_else(|| crate::logging::default_log_level().to_string());

        let export_dir = overrides
            .export_dir
            .clone()
            .or_else(|| file.export_dir.clone())
            .unwrap_or_else(|| data_dir.join("exports"));
        let export_dir = absolutize(&export_dir)?;

        Ok(Self {
            data_dir,
            log_dir,
            log_level,
            export_dir,
        })
    }

    /// Places a bare export file name under `export_dir`; paths with a
    /// directory component are kept as given.
    pub fn export_path(&self, output: &Path) -> PathBuf {
        let has_dir = output
            .parent()
            .is_some_and(|parent| !parent.as_os_str().is_empty());
        if output.is_absolute() || has_dir {
            output.to_path_buf()
        } else {
            self.export_dir.join(output)
        }
    }
}

/// `<config_dir>/gestion/config.toml` when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Platform data directory for the application.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("gestion_data"))
}

fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(ConfigFile::default()),
        },
    };
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    ConfigFile::parse(&text, &path)
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}
