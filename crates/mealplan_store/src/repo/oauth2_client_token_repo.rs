//! OAuth2 client token storage keyed by any of its three secrets.
//!
//! # Invariants
//! - Code, access and refresh secrets are encrypted at rest; an empty secret
//!   is stored as the empty string so it can never match a lookup.
//! - All three expiries are measured from one shared creation instant.
//! - Archiving by any one secret hides the whole row from every lookup.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{ResultExt, StoreError, StoreResult};
use crate::model::{OAuth2ClientToken, OAuth2ClientTokenCreationInput};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{get_opt_enum, get_time, time_to_db};
use crate::runtime::StoreRuntime;
use chrono::{DateTime, Duration, Utc};
use log::info;
use rusqlite::{params, Connection, Row};

const TOKEN_COLUMNS: &str = "id,
    client_id,
    belongs_to_user,
    redirect_uri,
    scope,
    code,
    code_challenge,
    code_challenge_method,
    code_created_at,
    code_expires_at,
    access,
    access_created_at,
    access_expires_at,
    refresh,
    refresh_created_at,
    refresh_expires_at";

/// Which secret column a lookup or archive is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretField {
    Code,
    Access,
    Refresh,
}

impl SecretField {
    fn column(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

pub trait OAuth2ClientTokenRepository {
    fn create_oauth2_client_token(
        &self,
        ctx: &QueryContext,
        input: &OAuth2ClientTokenCreationInput,
    ) -> StoreResult<OAuth2ClientToken>;
    fn get_oauth2_client_token_by_code(
        &self,
        ctx: &QueryContext,
        code: &str,
    ) -> StoreResult<OAuth2ClientToken>;
    fn get_oauth2_client_token_by_access(
        &self,
        ctx: &QueryContext,
        access: &str,
    ) -> StoreResult<OAuth2ClientToken>;
    fn get_oauth2_client_token_by_refresh(
        &self,
        ctx: &QueryContext,
        refresh: &str,
    ) -> StoreResult<OAuth2ClientToken>;
    fn archive_oauth2_client_token_by_code(&self, ctx: &QueryContext, code: &str)
        -> StoreResult<()>;
    fn archive_oauth2_client_token_by_access(
        &self,
        ctx: &QueryContext,
        access: &str,
    ) -> StoreResult<()>;
    fn archive_oauth2_client_token_by_refresh(
        &self,
        ctx: &QueryContext,
        refresh: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteOAuth2ClientTokenRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteOAuth2ClientTokenRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "oauth2_client_tokens",
                &["code", "access", "refresh", "code_challenge_method", "archived_at"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn seal(&self, secret: &str) -> StoreResult<String> {
        if secret.is_empty() {
            return Ok(String::new());
        }
        self.runtime.cipher().encrypt(secret)
    }

    fn open(&self, stored: &str) -> StoreResult<String> {
        if stored.is_empty() {
            return Ok(String::new());
        }
        self.runtime.cipher().decrypt(stored)
    }

    fn get_by(
        &self,
        ctx: &QueryContext,
        field: SecretField,
        secret: &str,
    ) -> StoreResult<OAuth2ClientToken> {
        if secret.is_empty() {
            return Err(StoreError::invalid_input(format!(
                "oauth2 {} must not be empty",
                field.column()
            )));
        }
        let sealed = self.seal(secret)?;
        let sql = format!(
            "SELECT {TOKEN_COLUMNS}
             FROM oauth2_client_tokens
             WHERE {} = ?1 AND archived_at IS NULL;",
            field.column()
        );
        self.conn.read_one(ctx, "oauth2 client token", &sql, [sealed], |row| {
            self.token_from_row(row)
        })
    }

    fn archive_by(&self, ctx: &QueryContext, field: SecretField, secret: &str) -> StoreResult<()> {
        if secret.is_empty() {
            return Err(StoreError::invalid_input(format!(
                "oauth2 {} must not be empty",
                field.column()
            )));
        }
        let sealed = self.seal(secret)?;
        let sql = format!(
            "UPDATE oauth2_client_tokens
             SET archived_at = ?2
             WHERE {} = ?1 AND archived_at IS NULL;",
            field.column()
        );
        let archived = self.conn.execute_write(
            ctx,
            "oauth2 client token archive",
            &sql,
            params![sealed, time_to_db(self.runtime.now())],
        )?;
        if archived == 0 {
            return Err(StoreError::NotFound("oauth2 client token"));
        }
        info!(
            "event=oauth2_token_archive module=repo status=ok keyed_by={} count={archived}",
            field.column()
        );
        Ok(())
    }

    fn token_from_row(&self, row: &Row<'_>) -> StoreResult<OAuth2ClientToken> {
        let code: String = row.get("code")?;
        let access: String = row.get("access")?;
        let refresh: String = row.get("refresh")?;
        Ok(OAuth2ClientToken {
            id: row.get("id")?,
            client_id: row.get("client_id")?,
            belongs_to_user: row.get("belongs_to_user")?,
            redirect_uri: row.get("redirect_uri")?,
            scope: row.get("scope")?,
            code: self.open(&code)?,
            code_challenge: row.get("code_challenge")?,
            code_challenge_method: get_opt_enum(row, "code_challenge_method")?,
            code_created_at: get_time(row, "code_created_at")?,
            code_expires_at: get_time(row, "code_expires_at")?,
            access: self.open(&access)?,
            access_created_at: get_time(row, "access_created_at")?,
            access_expires_at: get_time(row, "access_expires_at")?,
            refresh: self.open(&refresh)?,
            refresh_created_at: get_time(row, "refresh_created_at")?,
            refresh_expires_at: get_time(row, "refresh_expires_at")?,
        })
    }
}

fn expiry_after(
    now: DateTime<Utc>,
    seconds: i64,
    secret: &'static str,
) -> StoreResult<DateTime<Utc>> {
    Duration::try_seconds(seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            StoreError::invalid_input(format!("oauth2 {secret} lifetime is out of range"))
        })
}

impl OAuth2ClientTokenRepository for SqliteOAuth2ClientTokenRepository<'_> {
    fn create_oauth2_client_token(
        &self,
        ctx: &QueryContext,
        input: &OAuth2ClientTokenCreationInput,
    ) -> StoreResult<OAuth2ClientToken> {
        input.validate()?;
        let now = self.runtime.now();
        let token = OAuth2ClientToken {
            id: input.id.clone(),
            client_id: input.client_id.clone(),
            belongs_to_user: input.belongs_to_user.clone(),
            redirect_uri: input.redirect_uri.clone(),
            scope: input.scope.clone(),
            code: input.code.clone(),
            code_challenge: input.code_challenge.clone(),
            code_challenge_method: input.code_challenge_method,
            code_created_at: now,
            code_expires_at: expiry_after(now, input.code_expires_in_seconds, "code")?,
            access: input.access.clone(),
            access_created_at: now,
            access_expires_at: expiry_after(now, input.access_expires_in_seconds, "access")?,
            refresh: input.refresh.clone(),
            refresh_created_at: now,
            refresh_expires_at: expiry_after(now, input.refresh_expires_in_seconds, "refresh")?,
        };

        let sealed_code = self.seal(&token.code)?;
        let sealed_access = self.seal(&token.access)?;
        let sealed_refresh = self.seal(&token.refresh)?;
        let created = time_to_db(now);

        self.conn
            .execute_write(
                ctx,
                "oauth2 client token creation",
                "INSERT INTO oauth2_client_tokens (
                    id,
                    client_id,
                    belongs_to_user,
                    redirect_uri,
                    scope,
                    code,
                    code_challenge,
                    code_challenge_method,
                    code_created_at,
                    code_expires_at,
                    access,
                    access_created_at,
                    access_expires_at,
                    refresh,
                    refresh_created_at,
                    refresh_expires_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?9, ?12, ?13, ?9, ?14);",
                params![
                    token.id,
                    token.client_id,
                    token.belongs_to_user,
                    token.redirect_uri,
                    token.scope,
                    sealed_code,
                    token.code_challenge,
                    token.code_challenge_method.map(|method| method.as_str()),
                    created,
                    time_to_db(token.code_expires_at),
                    sealed_access,
                    time_to_db(token.access_expires_at),
                    sealed_refresh,
                    time_to_db(token.refresh_expires_at),
                ],
            )
            .annotate("create oauth2 client token", &input.id)?;

        info!(
            "event=oauth2_token_create module=repo status=ok id={} client_id={}",
            token.id, token.client_id
        );
        Ok(token)
    }

    fn get_oauth2_client_token_by_code(
        &self,
        ctx: &QueryContext,
        code: &str,
    ) -> StoreResult<OAuth2ClientToken> {
        self.get_by(ctx, SecretField::Code, code)
            .annotate("get oauth2 client token by code", "<redacted>")
    }

    fn get_oauth2_client_token_by_access(
        &self,
        ctx: &QueryContext,
        access: &str,
    ) -> StoreResult<OAuth2ClientToken> {
        self.get_by(ctx, SecretField::Access, access)
            .annotate("get oauth2 client token by access", "<redacted>")
    }

    fn get_oauth2_client_token_by_refresh(
        &self,
        ctx: &QueryContext,
        refresh: &str,
    ) -> StoreResult<OAuth2ClientToken> {
        self.get_by(ctx, SecretField::Refresh, refresh)
            .annotate("get oauth2 client token by refresh", "<redacted>")
    }

    fn archive_oauth2_client_token_by_code(
        &self,
        ctx: &QueryContext,
        code: &str,
    ) -> StoreResult<()> {
        self.archive_by(ctx, SecretField::Code, code)
            .annotate("archive oauth2 client token by code", "<redacted>")
    }

    fn archive_oauth2_client_token_by_access(
        &self,
        ctx: &QueryContext,
        access: &str,
    ) -> StoreResult<()> {
        self.archive_by(ctx, SecretField::Access, access)
            .annotate("archive oauth2 client token by access", "<redacted>")
    }

    fn archive_oauth2_client_token_by_refresh(
        &self,
        ctx: &QueryContext,
        refresh: &str,
    ) -> StoreResult<()> {
        self.archive_by(ctx, SecretField::Refresh, refresh)
            .annotate("archive oauth2 client token by refresh", "<redacted>")
    }
}
