//! # Store Configuration
//!
//! The store reads exactly one environment variable. Everything else
//! (clock, id generator, secret cipher key) is injected through
//! [`crate::runtime::StoreRuntime`].
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MEALPLAN_DATABASE_URL` | Datastore selector (`:memory:`, `sqlite::memory:`, `sqlite://<path>`, `file:<path>`, or a bare path) | Required |

use crate::error::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Environment variable name for the datastore connection string.
pub const DATABASE_URL_ENV: &str = "MEALPLAN_DATABASE_URL";

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    location: DatabaseLocation,
}

impl StoreConfig {
    pub fn new(location: DatabaseLocation) -> Self {
        Self { location }
    }

    pub fn in_memory() -> Self {
        Self::new(DatabaseLocation::Memory)
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(DatabaseLocation::File(path.as_ref().to_path_buf()))
    }

    /// Loads the configuration from the process environment.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup(DATABASE_URL_ENV).ok_or_else(|| {
            StoreError::invalid_input(format!("{DATABASE_URL_ENV} is not set"))
        })?;
        Self::parse_url(&raw)
    }

    /// Parses a connection string into a location.
    pub fn parse_url(raw: &str) -> StoreResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(StoreError::invalid_input(format!(
                "{DATABASE_URL_ENV} must not be empty"
            )));
        }

        if matches!(value, ":memory:" | "sqlite::memory:" | "sqlite://:memory:") {
            return Ok(Self::in_memory());
        }

        let path = value
            .strip_prefix("sqlite://")
            .or_else(|| value.strip_prefix("sqlite:"))
            .or_else(|| value.strip_prefix("file:"))
            .unwrap_or(value);
        if path.is_empty() {
            return Err(StoreError::invalid_input(format!(
                "{DATABASE_URL_ENV} has no database path"
            )));
        }

        Ok(Self::file(path))
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }
}
