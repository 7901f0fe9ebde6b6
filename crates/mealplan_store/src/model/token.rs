//! Password-reset and OAuth2 client token records.
//!
//! Secrets on these records are plaintext; repositories encrypt them before
//! they reach the database and never log them.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifetime of a password-reset token from its creation.
pub const PASSWORD_RESET_TOKEN_LIFETIME_MINUTES: i64 = 30;

pub fn password_reset_token_lifetime() -> Duration {
    Duration::minutes(PASSWORD_RESET_TOKEN_LIFETIME_MINUTES)
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub id: String,
    pub token: String,
    pub belongs_to_user: String,
    pub expires_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.redeemed_at.is_none() && now < self.expires_at
    }
}

impl fmt::Debug for PasswordResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetToken")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("belongs_to_user", &self.belongs_to_user)
            .field("expires_at", &self.expires_at)
            .field("redeemed_at", &self.redeemed_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "S256")]
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(StoreError::invalid_input(format!(
                "unknown code challenge method `{other}`"
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2ClientToken {
    pub id: String,
    pub client_id: String,
    pub belongs_to_user: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code: String,
    pub code_challenge: String,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    pub code_created_at: DateTime<Utc>,
    pub code_expires_at: DateTime<Utc>,
    pub access: String,
    pub access_created_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh: String,
    pub refresh_created_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl fmt::Debug for OAuth2ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ClientToken")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("belongs_to_user", &self.belongs_to_user)
            .field("scope", &self.scope)
            .field("code_expires_at", &self.code_expires_at)
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

/// Expiries are lifetimes measured from one shared creation instant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2ClientTokenCreationInput {
    pub id: String,
    pub client_id: String,
    pub belongs_to_user: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code: String,
    pub code_challenge: String,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    pub code_expires_in_seconds: i64,
    pub access: String,
    pub access_expires_in_seconds: i64,
    pub refresh: String,
    pub refresh_expires_in_seconds: i64,
}

impl OAuth2ClientTokenCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty()
            || self.client_id.trim().is_empty()
            || self.belongs_to_user.trim().is_empty()
        {
            return Err(StoreError::invalid_input(
                "oauth2 token id, client id and owner are required",
            ));
        }
        if self.code.is_empty() && self.access.is_empty() && self.refresh.is_empty() {
            return Err(StoreError::invalid_input(
                "oauth2 token needs at least one of code, access or refresh",
            ));
        }
        let lifetimes = [
            self.code_expires_in_seconds,
            self.access_expires_in_seconds,
            self.refresh_expires_in_seconds,
        ];
        if lifetimes.iter().any(|seconds| *seconds < 0) {
            return Err(StoreError::invalid_input("oauth2 token lifetimes must not be negative"));
        }
        if !self.code_challenge.is_empty() && self.code_challenge_method.is_none() {
            return Err(StoreError::invalid_input(
                "code challenge requires a code challenge method",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for OAuth2ClientTokenCreationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ClientTokenCreationInput")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("belongs_to_user", &self.belongs_to_user)
            .finish_non_exhaustive()
    }
}
