//! Bootstrap configuration for wkmp-rec
//!
//! Settings come from an optional TOML file; everything has a built-in
//! default so the service starts with no file at all.
//!
//! ```toml
//! port = 5726
//! root_folder = "/var/lib/wkmp"
//! database_path = "wkmp-rec.db"     # relative to root_folder
//! model_dir = "models"              # relative to root_folder
//! retrain_interval_secs = 21600
//! default_count = 10
//!
//! [training]
//! factors = 16
//! epochs = 40
//!
//! [logging]
//! level = "debug"
//! ```

use crate::engine::TrainingConfig;
use crate::types::DEFAULT_RECOMMENDATION_COUNT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wkmp_common::config::{find_config_file, load_toml, LoggingConfig};
use wkmp_common::{Error, Result};

/// Module name used to locate `wkmp-rec.toml`
pub const MODULE_NAME: &str = "wkmp-rec";

#[derive(Debug, Clone, Deserialize)]
pub struct RecConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database; relative paths are resolved against the root folder
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Persisted models; relative paths are resolved against the root folder
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Seconds between retrain triggers (first trigger fires at startup)
    #[serde(default = "default_retrain_interval_secs")]
    pub retrain_interval_secs: u64,

    /// Songs returned when a request omits `count`
    #[serde(default = "default_count")]
    pub default_count: usize,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_port() -> u16 {
    5726
}

fn default_database_path() -> PathBuf {
    PathBuf::from("wkmp-rec.db")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_retrain_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_count() -> usize {
    DEFAULT_RECOMMENDATION_COUNT
}

impl Default for RecConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_folder: None,
            database_path: default_database_path(),
            model_dir: default_model_dir(),
            retrain_interval_secs: default_retrain_interval_secs(),
            default_count: default_count(),
            training: TrainingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RecConfig {
    /// Bootstrap file to read: `explicit` if given, else the first one found
    /// in the standard config locations
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(MODULE_NAME),
        }
    }

    /// Load and validate `path`, or the defaults when `None`
    ///
    /// Runs before logging is set up, so callers report the source.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => load_toml(path)?,
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.default_count == 0 {
            return Err(Error::Config("default_count must be at least 1".to_string()));
        }
        if self.retrain_interval_secs == 0 {
            return Err(Error::Config(
                "retrain_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.training.factors == 0 {
            return Err(Error::Config("training.factors must be at least 1".to_string()));
        }
        if !(self.training.learning_rate.is_finite() && self.training.learning_rate > 0.0) {
            return Err(Error::Config(
                "training.learning_rate must be a positive number".to_string(),
            ));
        }
        if !(self.training.regularization.is_finite() && self.training.regularization >= 0.0) {
            return Err(Error::Config(
                "training.regularization must be zero or positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }

    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        resolve_under(root_folder, &self.database_path)
    }

    pub fn model_dir(&self, root_folder: &Path) -> PathBuf {
        resolve_under(root_folder, &self.model_dir)
    }
}

fn resolve_under(root_folder: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root_folder.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = RecConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 5726);
        assert_eq!(config.retrain_interval(), Duration::from_secs(21600));
        assert_eq!(config.default_count, 10);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port = 6000\nretrain_interval_secs = 60\n\n[training]\nepochs = 5\n\n[logging]\nlevel = \"warn\""
        )
        .unwrap();

        let config = RecConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.retrain_interval_secs, 60);
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.factors, 16);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.default_count, 10);
    }

    #[test]
    fn zero_default_count_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_count = 0").unwrap();

        assert!(matches!(
            RecConfig::load(Some(file.path())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(RecConfig::load(Some(Path::new("/nonexistent/wkmp-rec.toml"))).is_err());
    }

    #[test]
    fn explicit_path_is_located_as_given() {
        let explicit = Path::new("/opt/wkmp/custom.toml");
        assert_eq!(RecConfig::locate(Some(explicit)), Some(explicit.to_path_buf()));
    }

    #[test]
    fn no_path_loads_defaults() {
        let config = RecConfig::load(None).unwrap();
        assert_eq!(config.port, 5726);
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let config = RecConfig {
            model_dir: PathBuf::from("/srv/models"),
            ..RecConfig::default()
        };
        let root = Path::new("/data/wkmp");

        assert_eq!(config.database_path(root), PathBuf::from("/data/wkmp/wkmp-rec.db"));
        assert_eq!(config.model_dir(root), PathBuf::from("/srv/models"));
    }
}
