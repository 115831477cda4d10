//! Persisted keychain representation and checksum.
//!
//! A dumped keychain is compact JSON with exactly two fields:
//!
//! ```text
//! {"kvs":{"<base64 HMAC>":{"iv":"<base64>","data":"<base64>"}, ...},"salt":"<base64>"}
//! ```
//!
//! Keys of `kvs` are emitted in sorted order, so an unchanged store always
//! serializes to the same bytes and therefore the same checksum. Derived keys
//! are never part of the representation.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::crypto::{CryptoProvider, LOOKUP_TAG_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{KeychainError, Result};
use crate::kdf::{SALT_LEN, Salt};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One encrypted credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Per-entry random AES-GCM nonce.
    pub iv: [u8; NONCE_LEN],
    /// AES-256-GCM ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

/// Obfuscated key to encrypted entry.
pub type Store = BTreeMap<String, Entry>;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersistedEntry {
    iv: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Persisted {
    kvs: BTreeMap<String, PersistedEntry>,
    salt: String,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Text form of a keyed-hash output used as a store index.
pub fn encode_lookup_key(tag: &[u8]) -> String {
    BASE64.encode(tag)
}

/// Serialize the store and salt into the canonical representation.
pub fn encode(store: &Store, salt: &Salt) -> Result<String> {
    let kvs = store
        .iter()
        .map(|(key, entry)| {
            (
                key.clone(),
                PersistedEntry {
                    iv: BASE64.encode(entry.iv),
                    data: BASE64.encode(&entry.ciphertext),
                },
            )
        })
        .collect();

    let persisted = Persisted {
        kvs,
        salt: BASE64.encode(salt),
    };

    Ok(serde_json::to_string(&persisted)?)
}

/// Parse a representation back into its store and salt.
///
/// # Errors
///
/// Returns [`KeychainError::Parse`] if the JSON shape is wrong or any field
/// does not decode to the expected length.
pub fn decode(repr: &str) -> Result<(Store, Salt)> {
    let persisted: Persisted = serde_json::from_str(repr)
        .map_err(|e| KeychainError::parse(format!("invalid JSON: {e}")))?;

    let salt_bytes = decode_field(&persisted.salt, "salt")?;
    let salt: Salt = salt_bytes.try_into().map_err(|bytes: Vec<u8>| {
        KeychainError::parse(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;

    let mut store = Store::new();
    for (key, entry) in persisted.kvs {
        let tag = decode_field(&key, "entry key")?;
        if tag.len() != LOOKUP_TAG_LEN {
            return Err(KeychainError::parse(format!(
                "entry key must encode {LOOKUP_TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }

        let iv: [u8; NONCE_LEN] = decode_field(&entry.iv, "iv")?
            .try_into()
            .map_err(|bytes: Vec<u8>| {
                KeychainError::parse(format!("iv must be {NONCE_LEN} bytes, got {}", bytes.len()))
            })?;

        let ciphertext = decode_field(&entry.data, "data")?;
        if ciphertext.len() < TAG_LEN {
            return Err(KeychainError::parse(format!(
                "ciphertext shorter than the {TAG_LEN}-byte tag"
            )));
        }

        store.insert(key, Entry { iv, ciphertext });
    }

    Ok((store, salt))
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| KeychainError::parse(format!("invalid base64 in {field}: {e}")))
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Base64 SHA-256 of the representation bytes, exactly as given.
pub fn checksum<P: CryptoProvider>(provider: &P, repr: &str) -> String {
    BASE64.encode(provider.digest(repr.as_bytes()))
}
