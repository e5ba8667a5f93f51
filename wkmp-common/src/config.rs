//! Bootstrap configuration helpers shared by WKMP services
//!
//! Services read a small TOML bootstrap file (port, paths, logging) and resolve
//! their root folder in this priority order:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Logging section of a bootstrap file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error) when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the service root folder
///
/// `toml_root` is the `root_folder` value from an already parsed bootstrap file.
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_root: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_root {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Locate `<module>.toml` in the user config dir, then /etc/wkmp on Linux
pub fn find_config_file(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{module_name}.toml");

    let user_config = dirs::config_dir().map(|d| d.join("wkmp").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/wkmp").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and deserialize a TOML bootstrap file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    debug!("Loaded bootstrap config from {}", path.display());
    Ok(toml::from_str(&content)?)
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/wkmp"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wkmp"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("wkmp"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wkmp"))
    } else {
        PathBuf::from("./wkmp_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn cli_argument_wins() {
        std::env::set_var("WKMP_TEST_ROOT", "/from/env");
        let root = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "WKMP_TEST_ROOT",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(root, PathBuf::from("/from/cli"));
        std::env::remove_var("WKMP_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn env_beats_toml() {
        std::env::set_var("WKMP_TEST_ROOT", "/from/env");
        let root = resolve_root_folder(None, "WKMP_TEST_ROOT", Some(Path::new("/from/toml")));
        assert_eq!(root, PathBuf::from("/from/env"));
        std::env::remove_var("WKMP_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn toml_used_when_nothing_else_set() {
        std::env::remove_var("WKMP_TEST_ROOT");
        let root = resolve_root_folder(None, "WKMP_TEST_ROOT", Some(Path::new("/from/toml")));
        assert_eq!(root, PathBuf::from("/from/toml"));
    }

    #[test]
    fn load_toml_reads_logging_section() {
        #[derive(Deserialize)]
        struct Bootstrap {
            #[serde(default)]
            logging: LoggingConfig,
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let parsed: Bootstrap = load_toml(file.path()).unwrap();
        assert_eq!(parsed.logging.level, "debug");
    }

    #[test]
    fn load_toml_reports_missing_file() {
        let result: Result<LoggingConfig> = load_toml(Path::new("/nonexistent/wkmp-rec.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
