//! SQLite persistence for meal planning.
//! Households and invitations, tokens, valid enumerations, recipes and
//! advanced prep steps, all behind repository traits.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod ids;
pub mod logging;
pub mod model;
pub mod repo;
pub mod runtime;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DatabaseLocation, StoreConfig};
pub use crypto::{AesGcmSecretCipher, SecretCipher};
pub use db::{
    open_db, open_db_from_config, open_db_in_memory, run_in_session, QueryContext, QueryExecutor,
    Session, TransactionalSession,
};
pub use error::{ErrorKind, ResultExt, StoreError, StoreResult};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::{ListPage, QueryFilter, SortDirection};
pub use runtime::StoreRuntime;

/// Returns the store crate version.
pub fn store_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
