//! AEAD sealing primitive shared by the key-value-store and encrypted-YAML
//! secrets providers. Grounded on the teacher's vault module: Argon2 key
//! derivation into an AES-256-GCM key, salt/nonce carried alongside the
//! ciphertext.

use aes_gcm::aead::generic_array::{typenum, GenericArray};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;

use crate::error::{Error, Result};

const HEADER: &str = "$SPOT_VAULT;1.0;AES256";

/// Symmetric seal/open over a single passphrase.
pub struct Seal {
    password: String,
}

impl Seal {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new(&key);
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(format!("seal failed: {e}")))?;

        let mut blob = Vec::new();
        blob.extend_from_slice(salt.as_str().as_bytes());
        blob.push(b'\n');
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{HEADER}\n{}", BASE64.encode(blob)))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let mut lines = sealed.lines();
        let header = lines.next().unwrap_or_default();
        if header != HEADER {
            return Err(Error::Internal("not a recognized sealed value".into()));
        }
        let body: String = lines.collect::<Vec<_>>().join("");
        let blob = BASE64
            .decode(body)
            .map_err(|e| Error::Internal(format!("base64 decode failed: {e}")))?;

        let salt_end = blob
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::Internal("malformed sealed value".into()))?;
        let salt_str = std::str::from_utf8(&blob[..salt_end])
            .map_err(|_| Error::Internal("malformed salt".into()))?;
        let salt = SaltString::from_b64(salt_str)
            .map_err(|_| Error::Internal("malformed salt".into()))?;

        let nonce_start = salt_end + 1;
        if blob.len() < nonce_start + 12 {
            return Err(Error::Internal("malformed sealed value".into()));
        }
        let nonce = GenericArray::from_slice(&blob[nonce_start..nonce_start + 12]);
        let ciphertext = &blob[nonce_start + 12..];

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new(&key);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Internal("decryption failed: wrong password?".into()))?;
        String::from_utf8(plaintext).map_err(|_| Error::Internal("invalid utf-8 plaintext".into()))
    }

    pub fn is_sealed(content: &str) -> bool {
        content.starts_with(HEADER)
    }

    fn derive_key(&self, salt: &SaltString) -> Result<GenericArray<u8, typenum::U32>> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(self.password.as_bytes(), salt.as_str().as_bytes(), &mut key)
            .map_err(|e| Error::Internal(format!("key derivation failed: {e}")))?;
        Ok(GenericArray::clone_from_slice(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_roundtrips() {
        let seal = Seal::new("hunter2");
        let sealed = seal.seal("s3cr3t-value").unwrap();
        assert!(Seal::is_sealed(&sealed));
        assert_eq!(seal.open(&sealed).unwrap(), "s3cr3t-value");
    }

    #[test]
    fn wrong_password_fails() {
        let sealed = Seal::new("right").seal("value").unwrap();
        assert!(Seal::new("wrong").open(&sealed).is_err());
    }
}
