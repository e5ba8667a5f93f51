//! # WKMP Common Library
//!
//! Shared code for WKMP services:
//! - Error type
//! - Bootstrap configuration and root folder resolution
//! - SQLite initialization for the recommendation tables
//! - Event types and the broadcast event bus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
