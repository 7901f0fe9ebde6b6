//! Query executor and transactional session capability.
//!
//! # Responsibility
//! - Give plain connections and open transactions one query surface.
//! - Provide scoped sessions that commit exactly once or roll back exactly once.
//! - Honor caller cancellation and deadlines before every statement.
//!
//! # Invariants
//! - A `Session` is never shared across threads (`Transaction` is `!Sync`).
//! - Dropping a `Session` without committing rolls it back.
//! - `run_in_session` rolls back on every error path, including cancellation.

use crate::error::{StoreError, StoreResult};
use log::{debug, warn};
use rusqlite::{Connection, Params, Row, Transaction, TransactionBehavior};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation and deadline carried by every repository call.
///
/// Clones share the cancellation flag, so a handle kept by another thread can
/// abort work running on this one at its next statement boundary.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context with no deadline that is only cancelled explicitly.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails with `Cancelled` when the context is no longer live.
    pub fn check(&self, stage: &'static str) -> StoreResult<()> {
        if self.is_cancelled() {
            debug!("event=query_cancelled module=db status=error stage={stage}");
            return Err(StoreError::Cancelled(stage));
        }
        Ok(())
    }
}

/// Anything SQL can be issued against: a connection or an open session.
///
/// Helpers written against `QueryExecutor` run identically inside and outside
/// a transaction.
pub trait QueryExecutor {
    fn connection(&self) -> &Connection;

    /// Runs one write statement and returns the affected row count.
    fn execute_write<P: Params>(
        &self,
        ctx: &QueryContext,
        description: &'static str,
        sql: &str,
        params: P,
    ) -> StoreResult<usize> {
        ctx.check(description)?;
        let changed = self.connection().execute(sql, params)?;
        debug!("event=query_write module=db status=ok query={description} rows={changed}");
        Ok(changed)
    }

    /// Reads exactly one row; an empty result is `NotFound(description)`.
    fn read_one<T, P, F>(
        &self,
        ctx: &QueryContext,
        description: &'static str,
        sql: &str,
        params: P,
        map: F,
    ) -> StoreResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> StoreResult<T>,
    {
        ctx.check(description)?;
        let mut stmt = self.connection().prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => map(row),
            None => Err(StoreError::NotFound(description)),
        }
    }

    /// Reads every row, checking the context between rows.
    fn read_many<T, P, F>(
        &self,
        ctx: &QueryContext,
        description: &'static str,
        sql: &str,
        params: P,
        mut map: F,
    ) -> StoreResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> StoreResult<T>,
    {
        ctx.check(description)?;
        let mut stmt = self.connection().prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            ctx.check(description)?;
            items.push(map(row)?);
        }
        debug!(
            "event=query_read module=db status=ok query={description} rows={}",
            items.len()
        );
        Ok(items)
    }

    /// Runs a `SELECT EXISTS (...)` style query.
    fn read_exists<P: Params>(
        &self,
        ctx: &QueryContext,
        description: &'static str,
        sql: &str,
        params: P,
    ) -> StoreResult<bool> {
        self.read_one(ctx, description, sql, params, |row| Ok(row.get::<_, bool>(0)?))
    }
}

impl QueryExecutor for Connection {
    fn connection(&self) -> &Connection {
        self
    }
}

/// Executor with an explicit end: exactly one of `commit` or `rollback`.
pub trait TransactionalSession: QueryExecutor {
    fn commit(self) -> StoreResult<()>;
    fn rollback(self) -> StoreResult<()>;
}

/// An immediate-mode SQLite transaction labelled for logging.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    label: &'static str,
    started_at: Instant,
}

impl<'conn> Session<'conn> {
    /// Opens a session with `BEGIN IMMEDIATE` so the write lock is held up front.
    pub fn begin(
        conn: &'conn Connection,
        ctx: &QueryContext,
        label: &'static str,
    ) -> StoreResult<Self> {
        ctx.check(label)?;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|source| StoreError::Transaction {
                stage: "begin",
                source,
            })?;
        debug!("event=session_begin module=db status=ok session={label}");
        Ok(Self {
            tx,
            label,
            started_at: Instant::now(),
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl QueryExecutor for Session<'_> {
    fn connection(&self) -> &Connection {
        &self.tx
    }
}

impl TransactionalSession for Session<'_> {
    fn commit(self) -> StoreResult<()> {
        let Self {
            tx,
            label,
            started_at,
        } = self;
        tx.commit().map_err(|source| {
            warn!("event=session_commit module=db status=error session={label} error={source}");
            StoreError::Transaction {
                stage: "commit",
                source,
            }
        })?;
        debug!(
            "event=session_commit module=db status=ok session={label} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn rollback(self) -> StoreResult<()> {
        let Self { tx, label, .. } = self;
        tx.rollback().map_err(|source| StoreError::Transaction {
            stage: "rollback",
            source,
        })?;
        debug!("event=session_rollback module=db status=ok session={label}");
        Ok(())
    }
}

/// Runs `work` inside a fresh session, committing on success.
///
/// Any error from `work`, a cancelled context, or a failed commit leaves the
/// database unchanged. A rollback failure is logged and the original error is
/// returned.
pub fn run_in_session<T, F>(
    conn: &Connection,
    ctx: &QueryContext,
    label: &'static str,
    work: F,
) -> StoreResult<T>
where
    F: FnOnce(&Session<'_>) -> StoreResult<T>,
{
    let session = Session::begin(conn, ctx, label)?;
    let outcome = work(&session).and_then(|value| ctx.check(label).map(|()| value));
    match outcome {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                warn!(
                    "event=session_rollback module=db status=error session={label} error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run_in_session, QueryContext, QueryExecutor, Session, TransactionalSession};
    use crate::error::{ErrorKind, StoreError};
    use rusqlite::Connection;
    use std::time::{Duration, Instant};

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE things (id TEXT PRIMARY KEY NOT NULL);")
            .unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM things;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn expired_deadline_is_cancelled() {
        let ctx = QueryContext::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.is_cancelled());
        let err = ctx.check("expired read").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let ctx = QueryContext::background();
        let handle = ctx.clone();
        handle.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn session_commits_on_success() {
        let conn = scratch();
        let ctx = QueryContext::background();
        run_in_session(&conn, &ctx, "insert things", |session| {
            session.execute_write(&ctx, "insert thing", "INSERT INTO things (id) VALUES ('a');", [])?;
            session.execute_write(&ctx, "insert thing", "INSERT INTO things (id) VALUES ('b');", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(count(&conn), 2);
    }

    #[test]
    fn session_rolls_back_on_error() {
        let conn = scratch();
        let ctx = QueryContext::background();
        let err = run_in_session(&conn, &ctx, "insert things", |session| {
            session.execute_write(&ctx, "insert thing", "INSERT INTO things (id) VALUES ('a');", [])?;
            Err::<(), _>(StoreError::conflict("stop"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn cancellation_inside_session_rolls_back() {
        let conn = scratch();
        let ctx = QueryContext::background();
        let err = run_in_session(&conn, &ctx, "insert things", |session| {
            session.execute_write(&ctx, "insert thing", "INSERT INTO things (id) VALUES ('a');", [])?;
            ctx.cancel();
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn read_one_reports_not_found_with_description() {
        let conn = scratch();
        let ctx = QueryContext::background();
        let err = conn
            .read_one(&ctx, "thing", "SELECT id FROM things WHERE id = ?1;", ["zzz"], |row| {
                Ok(row.get::<_, String>(0)?)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("thing")));
    }

    #[test]
    fn session_debug_shows_only_its_label() {
        let conn = scratch();
        let ctx = QueryContext::background();
        let session = Session::begin(&conn, &ctx, "debug things").unwrap();
        let rendered = format!("{session:?}");
        assert!(rendered.contains("debug things"));
        assert!(rendered.starts_with("Session"));
        session.rollback().unwrap();
    }
}
