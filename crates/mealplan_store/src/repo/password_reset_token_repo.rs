//! Password-reset token storage.
//!
//! # Invariants
//! - The token secret is encrypted before it reaches SQL; lookups encrypt
//!   the argument and compare ciphertext.
//! - A token is returned only while live: unredeemed and unexpired.
//! - `redeemed_at` is written at most once.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{password_reset_token_lifetime, PasswordResetToken};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::runtime::StoreRuntime;
use log::info;
use rusqlite::{params, Connection, Row};

pub trait PasswordResetTokenRepository {
    /// Stores `token` for `user_id`, live for the standard reset window.
    fn create_password_reset_token(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        token: &str,
    ) -> StoreResult<PasswordResetToken>;

    /// Returns the live token matching `token`, else `NotFound`.
    fn get_password_reset_token_by_token(
        &self,
        ctx: &QueryContext,
        token: &str,
    ) -> StoreResult<PasswordResetToken>;

    /// Marks the token redeemed; redeeming twice keeps the first instant.
    fn redeem_password_reset_token(&self, ctx: &QueryContext, token_id: &str) -> StoreResult<()>;
}

pub struct SqlitePasswordResetTokenRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqlitePasswordResetTokenRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "password_reset_tokens",
                &["token", "expires_at", "redeemed_at", "belongs_to_user"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn token_from_row(&self, row: &Row<'_>) -> StoreResult<PasswordResetToken> {
        let stored: String = row.get("token")?;
        Ok(PasswordResetToken {
            id: row.get("id")?,
            token: self.runtime.cipher().decrypt(&stored)?,
            belongs_to_user: row.get("belongs_to_user")?,
            expires_at: get_time(row, "expires_at")?,
            redeemed_at: get_opt_time(row, "redeemed_at")?,
            created_at: get_time(row, "created_at")?,
            last_updated_at: get_opt_time(row, "last_updated_at")?,
        })
    }
}

impl PasswordResetTokenRepository for SqlitePasswordResetTokenRepository<'_> {
    fn create_password_reset_token(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        token: &str,
    ) -> StoreResult<PasswordResetToken> {
        require_id(user_id, "user id")?;
        if token.is_empty() {
            return Err(StoreError::invalid_input("password reset token must not be empty"));
        }

        let now = self.runtime.now();
        let record = PasswordResetToken {
            id: self.runtime.new_id(),
            token: token.to_string(),
            belongs_to_user: user_id.to_string(),
            expires_at: now + password_reset_token_lifetime(),
            redeemed_at: None,
            created_at: now,
            last_updated_at: None,
        };
        let encrypted = self.runtime.cipher().encrypt(token)?;

        self.conn
            .execute_write(
                ctx,
                "password reset token creation",
                "INSERT INTO password_reset_tokens (
                    id, token, expires_at, belongs_to_user, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    record.id,
                    encrypted,
                    time_to_db(record.expires_at),
                    record.belongs_to_user,
                    time_to_db(now),
                ],
            )
            .annotate("create password reset token", &record.id)?;

        info!(
            "event=password_reset_token_create module=repo status=ok id={} user_id={user_id}",
            record.id
        );
        Ok(record)
    }

    fn get_password_reset_token_by_token(
        &self,
        ctx: &QueryContext,
        token: &str,
    ) -> StoreResult<PasswordResetToken> {
        if token.is_empty() {
            return Err(StoreError::invalid_input("password reset token must not be empty"));
        }
        let encrypted = self.runtime.cipher().encrypt(token)?;
        self.conn
            .read_one(
                ctx,
                "password reset token",
                "SELECT id, token, belongs_to_user, expires_at, redeemed_at, created_at, last_updated_at
                 FROM password_reset_tokens
                 WHERE token = ?1
                   AND redeemed_at IS NULL
                   AND expires_at > ?2;",
                params![encrypted, time_to_db(self.runtime.now())],
                |row| self.token_from_row(row),
            )
            .annotate("get password reset token by token", "<redacted>")
    }

    fn redeem_password_reset_token(&self, ctx: &QueryContext, token_id: &str) -> StoreResult<()> {
        require_id(token_id, "password reset token id")?;
        let now = time_to_db(self.runtime.now());
        let redeemed = self
            .conn
            .execute_write(
                ctx,
                "password reset token redemption",
                "UPDATE password_reset_tokens
                 SET redeemed_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND redeemed_at IS NULL;",
                params![token_id, now],
            )
            .annotate("redeem password reset token", token_id)?;
        if redeemed == 1 {
            info!("event=password_reset_token_redeem module=repo status=ok id={token_id}");
            return Ok(());
        }

        let exists = self
            .conn
            .read_exists(
                ctx,
                "password reset token existence",
                "SELECT EXISTS (SELECT 1 FROM password_reset_tokens WHERE id = ?1);",
                [token_id],
            )
            .annotate("redeem password reset token", token_id)?;
        if !exists {
            return Err(StoreError::NotFound("password reset token"))
                .annotate("redeem password reset token", token_id);
        }
        Ok(())
    }
}
