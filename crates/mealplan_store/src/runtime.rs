//! Services injected into every repository.

use crate::clock::{Clock, SystemClock};
use crate::crypto::{AesGcmSecretCipher, SecretCipher};
use crate::error::StoreResult;
use crate::ids::{IdGenerator, UuidIdGenerator};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock, id generator and secret cipher shared by the repositories.
#[derive(Clone)]
pub struct StoreRuntime {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    cipher: Arc<dyn SecretCipher>,
}

impl StoreRuntime {
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        cipher: Arc<dyn SecretCipher>,
    ) -> Self {
        Self { clock, ids, cipher }
    }

    /// Wall clock, random UUIDs and an AES-GCM cipher keyed by `secret_key`.
    pub fn production(secret_key: &[u8]) -> StoreResult<Self> {
        Ok(Self::new(
            Arc::new(SystemClock),
            Arc::new(UuidIdGenerator),
            Arc::new(AesGcmSecretCipher::new(secret_key)?),
        ))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn new_id(&self) -> String {
        self.ids.new_id()
    }

    pub fn cipher(&self) -> &dyn SecretCipher {
        self.cipher.as_ref()
    }
}

impl std::fmt::Debug for StoreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRuntime").finish_non_exhaustive()
    }
}
