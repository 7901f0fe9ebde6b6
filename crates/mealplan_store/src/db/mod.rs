//! SQLite storage bootstrap, schema migrations and the query executor.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the meal-planning store.
//! - Apply schema migrations in deterministic order.
//! - Expose the executor/session capability every repository issues SQL through.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Repositories must not read/write application data before migrations succeed.

use thiserror::Error;

pub mod executor;
pub mod migrations;
mod open;

pub use executor::{
    run_in_session, QueryContext, QueryExecutor, Session, TransactionalSession,
};
pub use open::{open_db, open_db_from_config, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: u32,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
