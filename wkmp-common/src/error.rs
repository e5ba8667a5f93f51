//! Bootstrap errors shared by WKMP services
//!
//! Covers what can go wrong before a service is up: opening the database,
//! touching the filesystem and reading the TOML bootstrap file.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Pool connect, pragma or schema statement failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap file is not valid TOML for the expected shape
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Bootstrap file missing or a setting out of range
    #[error("Configuration error: {0}")]
    Config(String),
}
