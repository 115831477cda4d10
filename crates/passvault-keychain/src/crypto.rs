//! Cryptographic capability interface and its `ring`-backed implementation.
//!
//! The keychain engine never touches a primitive library directly. It goes
//! through [`CryptoProvider`], which exposes exactly the operations the
//! engine needs:
//!
//! - **derive_bits**: PBKDF2 key stretching.
//! - **import_lookup_key / import_cipher_key**: turn raw key material into a
//!   key usable for one algorithm only. The two key kinds are distinct
//!   associated types, so a lookup key cannot be handed to the cipher.
//! - **sign**: keyed hash used as the obfuscated store index.
//! - **encrypt / decrypt**: authenticated encryption with a caller-supplied
//!   96-bit nonce.
//! - **digest**: one-way hash for the representation checksum.
//! - **random_bytes**: CSPRNG output for salts and nonces.
//!
//! [`RingProvider`] implements the interface with PBKDF2-HMAC-SHA256,
//! HMAC-SHA256, AES-256-GCM and SHA-256. These choices are part of the
//! persisted format: a different provider must produce bit-identical output
//! to read existing keychains.

use std::num::NonZeroU32;

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, hmac, pbkdf2};

use crate::error::{KeychainError, Result};

/// Length of each imported key in bytes (HMAC-SHA256 and AES-256-GCM).
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = aead::NONCE_LEN;

/// Length of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Length of the HMAC-SHA256 output in bytes.
pub const LOOKUP_TAG_LEN: usize = 32;

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Narrow abstraction over the process-wide primitive library.
pub trait CryptoProvider: Send + Sync {
    /// Key usable only for [`sign`](Self::sign).
    type LookupKey: Send + Sync;

    /// Key usable only for [`encrypt`](Self::encrypt) and
    /// [`decrypt`](Self::decrypt).
    type CipherKey: Send + Sync;

    /// Fill `out` with PBKDF2 output for `password` and `salt`.
    fn derive_bits(&self, password: &[u8], salt: &[u8], iterations: NonZeroU32, out: &mut [u8]);

    /// Import raw material as a keyed-hash key.
    fn import_lookup_key(&self, material: &[u8]) -> Result<Self::LookupKey>;

    /// Import raw material as an authenticated-encryption key.
    fn import_cipher_key(&self, material: &[u8]) -> Result<Self::CipherKey>;

    /// Keyed hash of `data`. Deterministic for a given key.
    fn sign(&self, key: &Self::LookupKey, data: &[u8]) -> Vec<u8>;

    /// Seal `plaintext`; the returned ciphertext has the tag appended.
    fn encrypt(
        &self,
        key: &Self::CipherKey,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Open `ciphertext` (tag included).
    ///
    /// Any failure is reported as [`KeychainError::Authentication`].
    fn decrypt(
        &self,
        key: &Self::CipherKey,
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// One-way hash of `data`.
    fn digest(&self, data: &[u8]) -> Vec<u8>;

    /// Fill `out` with cryptographically secure random bytes.
    fn random_bytes(&self, out: &mut [u8]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ring implementation
// ---------------------------------------------------------------------------

/// [`CryptoProvider`] backed by `ring`.
#[derive(Debug, Clone)]
pub struct RingProvider {
    rng: SystemRandom,
}

impl RingProvider {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for RingProvider {
    type LookupKey = hmac::Key;
    type CipherKey = LessSafeKey;

    fn derive_bits(&self, password: &[u8], salt: &[u8], iterations: NonZeroU32, out: &mut [u8]) {
        pbkdf2::derive(PBKDF2_ALG, iterations, salt, password, out);
    }

    fn import_lookup_key(&self, material: &[u8]) -> Result<hmac::Key> {
        if material.len() != KEY_LEN {
            return Err(KeychainError::crypto(format!(
                "lookup key must be {} bytes, got {}",
                KEY_LEN,
                material.len()
            )));
        }
        Ok(hmac::Key::new(hmac::HMAC_SHA256, material))
    }

    fn import_cipher_key(&self, material: &[u8]) -> Result<LessSafeKey> {
        let unbound = UnboundKey::new(AEAD_ALG, material).map_err(|_| {
            KeychainError::crypto(format!(
                "cipher key must be {} bytes, got {}",
                KEY_LEN,
                material.len()
            ))
        })?;
        Ok(LessSafeKey::new(unbound))
    }

    fn sign(&self, key: &hmac::Key, data: &[u8]) -> Vec<u8> {
        hmac::sign(key, data).as_ref().to_vec()
    }

    fn encrypt(
        &self,
        key: &LessSafeKey,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        // `ring` encrypts in-place and appends the authentication tag.
        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(*nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| KeychainError::crypto("seal_in_place failed"))?;

        tracing::trace!(
            plaintext_len = plaintext.len(),
            ciphertext_len = in_out.len(),
            "encrypted entry"
        );

        Ok(in_out)
    }

    fn decrypt(
        &self,
        key: &LessSafeKey,
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(
                Nonce::assume_unique_for_key(*nonce),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| KeychainError::Authentication)?;

        Ok(plaintext.to_vec())
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        digest::digest(&digest::SHA256, data).as_ref().to_vec()
    }

    fn random_bytes(&self, out: &mut [u8]) -> Result<()> {
        self.rng
            .fill(out)
            .map_err(|_| KeychainError::crypto("system CSPRNG failed"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
