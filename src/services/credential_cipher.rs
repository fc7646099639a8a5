//! Sealing of credentials stored at rest.
//!
//! Tokens are sealed with AES-256-GCM under a key expanded with HKDF-SHA256
//! from an application constant. The sealed form is
//! `base64(nonce || ciphertext || tag)` so it fits a TEXT column.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::types::errors::CryptoError;

const KEY_MATERIAL: &[u8] = b"promptbook-credential-key-v1";
const KEY_SALT: &[u8] = b"promptbook-cred";
const KEY_INFO: &[u8] = b"promptbook token sealing";

/// Trait defining credential sealing operations.
pub trait CredentialCipherTrait {
    fn seal(&self, plaintext: &str) -> Result<String, CryptoError>;
    fn open(&self, sealed: &str) -> Result<String, CryptoError>;
}

/// AES-256-GCM credential cipher backed by `ring`.
pub struct CredentialCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialCipher {
    pub fn new() -> Result<Self, CryptoError> {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, KEY_SALT);
        let prk = salt.extract(KEY_MATERIAL);
        let okm = prk
            .expand(&[KEY_INFO], &AES_256_GCM)
            .map_err(|_| CryptoError::KeyDerivation("HKDF expand failed".to_string()))?;
        let key = LessSafeKey::new(UnboundKey::from(okm));
        Ok(Self {
            key,
            rng: SystemRandom::new(),
        })
    }
}

impl CredentialCipherTrait for CredentialCipher {
    fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::RandomGeneration("Failed to generate nonce".to_string()))?;

        let mut in_out = Zeroizing::new(plaintext.as_bytes().to_vec());
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut *in_out,
            )
            .map_err(|_| CryptoError::Encryption("Seal operation failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(BASE64.encode(sealed))
    }

    fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let raw = BASE64
            .decode(sealed)
            .map_err(|e| CryptoError::Decryption(format!("Invalid encoding: {}", e)))?;
        if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CryptoError::Decryption("Sealed value too short".to_string()));
        }

        let (nonce_part, body) = raw.split_at(NONCE_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce_part);

        let mut in_out = Zeroizing::new(body.to_vec());
        let plaintext = self
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut *in_out,
            )
            .map_err(|_| CryptoError::Decryption("Authentication failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}
