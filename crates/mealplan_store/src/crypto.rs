//! Encryption of token secrets at rest.
//!
//! # Responsibility
//! - Turn plaintext secrets (reset tokens, OAuth2 code/access/refresh) into
//!   stored ciphertext and back.
//!
//! # Invariants
//! - Encryption is deterministic for a given key: equal plaintexts produce
//!   equal ciphertexts, so lookups can match on ciphertext.
//! - Decryption authenticates the ciphertext and rejects a nonce that does not
//!   belong to the recovered plaintext.
//! - Neither plaintext nor key material is ever logged.

use crate::error::{StoreError, StoreResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const MIN_KEY_LEN: usize = 32;
const ENCRYPTION_KEY_LABEL: &[u8] = b"mealplan_store/secret-cipher/aes-256-gcm";
const NONCE_KEY_LABEL: &[u8] = b"mealplan_store/secret-cipher/nonce";

/// Encryptor/decryptor capability injected into the token repositories.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> StoreResult<String>;
    fn decrypt(&self, stored: &str) -> StoreResult<String>;
}

/// AES-256-GCM with an HMAC-SHA256 synthetic nonce.
pub struct AesGcmSecretCipher {
    encryption_key: [u8; 32],
    nonce_key: [u8; 32],
}

impl AesGcmSecretCipher {
    /// Derives the working keys from `master_key` (at least 32 bytes).
    pub fn new(master_key: &[u8]) -> StoreResult<Self> {
        if master_key.len() < MIN_KEY_LEN {
            return Err(StoreError::invalid_input(format!(
                "secret cipher key must be at least {MIN_KEY_LEN} bytes"
            )));
        }
        Ok(Self {
            encryption_key: hmac_sha256(master_key, ENCRYPTION_KEY_LABEL)?,
            nonce_key: hmac_sha256(master_key, NONCE_KEY_LABEL)?,
        })
    }

    fn cipher(&self) -> StoreResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|err| StoreError::Cipher(err.to_string()))
    }

    fn nonce_for(&self, plaintext: &[u8]) -> StoreResult<[u8; NONCE_LEN]> {
        let digest = hmac_sha256(&self.nonce_key, plaintext)?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(nonce)
    }
}

impl std::fmt::Debug for AesGcmSecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher for AesGcmSecretCipher {
    fn encrypt(&self, plaintext: &str) -> StoreResult<String> {
        let nonce_bytes = self.nonce_for(plaintext.as_bytes())?;
        let nonce = Nonce::from(nonce_bytes);
        let ciphertext = self
            .cipher()?
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|err| StoreError::Cipher(err.to_string()))?;

        let mut stored = nonce_bytes.to_vec();
        stored.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(stored))
    }

    fn decrypt(&self, stored: &str) -> StoreResult<String> {
        let data = URL_SAFE_NO_PAD
            .decode(stored)
            .map_err(|err| StoreError::Cipher(format!("stored secret is not base64: {err}")))?;
        if data.len() <= NONCE_LEN {
            return Err(StoreError::Cipher("stored secret is too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| StoreError::Cipher("invalid nonce length".to_string()))?;
        let plaintext = self
            .cipher()?
            .decrypt(&Nonce::from(nonce_array), ciphertext)
            .map_err(|err| StoreError::Cipher(err.to_string()))?;

        if self.nonce_for(&plaintext)? != nonce_array {
            return Err(StoreError::Cipher("nonce does not match secret".to_string()));
        }

        String::from_utf8(plaintext).map_err(|err| StoreError::Cipher(err.to_string()))
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> StoreResult<[u8; 32]> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|err| StoreError::Cipher(err.to_string()))?;
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{AesGcmSecretCipher, SecretCipher};
    use crate::error::ErrorKind;

    fn cipher() -> AesGcmSecretCipher {
        AesGcmSecretCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn short_keys_are_rejected() {
        let err = AesGcmSecretCipher::new(&[1u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn encryption_is_deterministic_and_reversible() {
        let cipher = cipher();
        let first = cipher.encrypt("reset-token-1").unwrap();
        let second = cipher.encrypt("reset-token-1").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, "reset-token-1");
        assert_ne!(first, cipher.encrypt("reset-token-2").unwrap());
        assert_eq!(cipher.decrypt(&first).unwrap(), "reset-token-1");
    }

    #[test]
    fn different_keys_produce_different_ciphertext() {
        let other = AesGcmSecretCipher::new(&[9u8; 32]).unwrap();
        let stored = cipher().encrypt("access").unwrap();
        assert_ne!(stored, other.encrypt("access").unwrap());
        assert_eq!(other.decrypt(&stored).unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = cipher();
        let mut stored = cipher.encrypt("refresh").unwrap().into_bytes();
        let last = stored.len() - 1;
        stored[last] = if stored[last] == b'A' { b'B' } else { b'A' };
        let stored = String::from_utf8(stored).unwrap();
        assert!(cipher.decrypt(&stored).is_err());
        assert!(cipher.decrypt("not base64 !!").is_err());
    }
}
