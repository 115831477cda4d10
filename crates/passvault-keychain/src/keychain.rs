//! The keychain engine.
//!
//! A [`Keychain`] owns the keys derived from the master password and a store
//! mapping obfuscated domain keys to encrypted entries. Domains are never
//! stored: each one is replaced by the base64 HMAC-SHA256 of its name under
//! the lookup key. Credentials are sealed with AES-256-GCM under the cipher
//! key, with a fresh random nonce on every write.
//!
//! A keychain only exists in the ready state. [`Keychain::init`] and
//! [`Keychain::load`] either return a usable instance or an error; there is
//! no half-initialized value to call entry operations on.
//!
//! # Load protocol
//!
//! 1. If a trusted checksum is supplied, the representation is hashed as
//!    received and compared against it. A mismatch is
//!    [`KeychainError::Integrity`].
//! 2. The representation is parsed ([`KeychainError::Parse`] on failure).
//! 3. Keys are re-derived from the password and the stored salt.
//! 4. The first entry (in sorted key order) is trial-decrypted. Failure is
//!    [`KeychainError::Authentication`]. An empty store cannot be checked
//!    this way and is accepted for any password.

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto::{CryptoProvider, NONCE_LEN, RingProvider};
use crate::error::{KeychainError, Result};
use crate::kdf::{self, DerivedKeys, Salt};
use crate::repr::{self, Entry, Store};

/// In-memory password keychain.
///
/// Mutating operations take `&mut self`; share across threads behind a lock
/// that serializes writers.
pub struct Keychain<P: CryptoProvider = RingProvider> {
    provider: P,
    salt: Salt,
    keys: DerivedKeys<P>,
    store: Store,
}

impl<P: CryptoProvider> fmt::Debug for Keychain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("entries", &self.store.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Construction with the default provider
// ---------------------------------------------------------------------------

impl Keychain<RingProvider> {
    /// Create an empty keychain protected by `password`.
    ///
    /// Runs the full PBKDF2 derivation.
    pub fn init(password: &str) -> Result<Self> {
        Self::init_with(RingProvider::new(), password)
    }

    /// Restore a keychain from a representation produced by [`dump`](Self::dump).
    ///
    /// See the module docs for the verification order.
    pub fn load(password: &str, repr: &str, trusted_checksum: Option<&str>) -> Result<Self> {
        Self::load_with(RingProvider::new(), password, repr, trusted_checksum)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

impl<P: CryptoProvider> Keychain<P> {
    /// [`Keychain::init`] with an explicit crypto provider.
    pub fn init_with(provider: P, password: &str) -> Result<Self> {
        let salt = kdf::generate_salt(&provider)?;
        let keys = kdf::derive(&provider, password, &salt)?;

        tracing::debug!("initialized empty keychain");

        Ok(Self {
            provider,
            salt,
            keys,
            store: Store::new(),
        })
    }

    /// [`Keychain::load`] with an explicit crypto provider.
    pub fn load_with(
        provider: P,
        password: &str,
        repr: &str,
        trusted_checksum: Option<&str>,
    ) -> Result<Self> {
        if let Some(expected) = trusted_checksum {
            let actual = repr::checksum(&provider, repr);
            if actual.as_bytes() != expected.as_bytes() {
                tracing::warn!("keychain representation failed checksum verification");
                return Err(KeychainError::Integrity);
            }
        }

        let (store, salt) = repr::decode(repr)?;
        let keys = kdf::derive(&provider, password, &salt)?;

        if let Some(entry) = store.values().next() {
            provider
                .decrypt(&keys.cipher, &entry.iv, &entry.ciphertext)
                .map(Zeroizing::new)
                .map_err(|_| KeychainError::Authentication)?;
        } else {
            tracing::debug!("loaded keychain has no entries; password not verified");
        }

        tracing::debug!(entries = store.len(), "loaded keychain");

        Ok(Self {
            provider,
            salt,
            keys,
            store,
        })
    }

    /// Serialize the store and salt.
    ///
    /// Returns `(representation, checksum)`. Read-only: calling it twice on
    /// an unchanged keychain yields identical output.
    pub fn dump(&self) -> Result<(String, String)> {
        let repr = repr::encode(&self.store, &self.salt)?;
        let checksum = repr::checksum(&self.provider, &repr);
        Ok((repr, checksum))
    }

    /// Look up the credential for `domain`.
    ///
    /// Returns `Ok(None)` if nothing is stored for it.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::Authentication`] if the stored entry no longer
    /// decrypts to valid UTF-8 under this keychain's key.
    pub fn get(&self, domain: &str) -> Result<Option<String>> {
        let key = self.lookup_key(domain);
        let Some(entry) = self.store.get(&key) else {
            return Ok(None);
        };

        let plaintext = self
            .provider
            .decrypt(&self.keys.cipher, &entry.iv, &entry.ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| KeychainError::Authentication)?;

        let credential = std::str::from_utf8(&plaintext)
            .map_err(|_| KeychainError::Authentication)?
            .to_owned();

        Ok(Some(credential))
    }

    /// Store `credential` for `domain`, replacing any previous value.
    ///
    /// Every call seals under a freshly drawn nonce. On error the store is
    /// left unchanged.
    pub fn set(&mut self, domain: &str, credential: &str) -> Result<()> {
        let key = self.lookup_key(domain);

        let mut iv = [0u8; NONCE_LEN];
        self.provider.random_bytes(&mut iv)?;
        let ciphertext = self
            .provider
            .encrypt(&self.keys.cipher, &iv, credential.as_bytes())?;

        let replaced = self.store.insert(key, Entry { iv, ciphertext }).is_some();
        tracing::trace!(replaced, entries = self.store.len(), "wrote keychain entry");

        Ok(())
    }

    /// Delete the entry for `domain`. Returns whether one existed.
    pub fn remove(&mut self, domain: &str) -> bool {
        let key = self.lookup_key(domain);
        let removed = self.store.remove(&key).is_some();
        tracing::trace!(removed, entries = self.store.len(), "removed keychain entry");
        removed
    }

    /// Whether an entry exists for `domain`, without decrypting it.
    pub fn contains(&self, domain: &str) -> bool {
        self.store.contains_key(&self.lookup_key(domain))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The crypto provider this keychain was built with.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lookup_key(&self, domain: &str) -> String {
        repr::encode_lookup_key(&self.provider.sign(&self.keys.lookup, domain.as_bytes()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn init_starts_empty() {
        let keychain = Keychain::init("master").unwrap();
        assert!(keychain.is_empty());
        assert_eq!(keychain.get("example.com").unwrap(), None);
    }

    #[test]
    fn set_get_remove() {
        let mut keychain = Keychain::init("master").unwrap();

        keychain.set("example.com", "hunter2").unwrap();
        assert!(keychain.contains("example.com"));
        assert_eq!(keychain.get("example.com").unwrap().as_deref(), Some("hunter2"));

        assert!(keychain.remove("example.com"));
        assert!(!keychain.remove("example.com"));
        assert_eq!(keychain.get("example.com").unwrap(), None);
    }

    #[test]
    fn store_never_holds_plaintext() {
        let mut keychain = Keychain::init("master").unwrap();
        keychain.set("bank.example", "correct-horse").unwrap();

        let (key, entry) = keychain.store.iter().next().unwrap();
        assert_ne!(key, "bank.example");
        assert_eq!(key.len(), 44);
        assert!(!entry
            .ciphertext
            .windows(b"correct-horse".len())
            .any(|w| w == b"correct-horse"));
    }

    #[test]
    fn overwrite_uses_fresh_nonce() {
        let mut keychain = Keychain::init("master").unwrap();

        keychain.set("example.com", "v1").unwrap();
        let first = keychain.store.values().next().unwrap().iv;

        keychain.set("example.com", "v2").unwrap();
        let second = keychain.store.values().next().unwrap().iv;

        assert_eq!(keychain.len(), 1);
        assert_ne!(first, second);
        assert_eq!(keychain.get("example.com").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn nonces_are_pairwise_distinct() {
        let mut keychain = Keychain::init("master").unwrap();
        let mut seen = HashSet::new();

        for i in 0..200 {
            let domain = format!("site-{}.example", i % 20);
            keychain.set(&domain, "pw").unwrap();
            let key = keychain.lookup_key(&domain);
            assert!(seen.insert(keychain.store[&key].iv), "nonce reused");
        }
    }

    #[test]
    fn corrupted_entry_is_distinct_from_absent() {
        let mut keychain = Keychain::init("master").unwrap();
        keychain.set("example.com", "secret").unwrap();

        let key = keychain.lookup_key("example.com");
        keychain.store.get_mut(&key).unwrap().ciphertext[0] ^= 0xff;

        assert!(matches!(
            keychain.get("example.com"),
            Err(KeychainError::Authentication)
        ));
        assert_eq!(keychain.get("other.com").unwrap(), None);
    }

    #[test]
    fn checksum_gate_runs_before_parsing() {
        let result = Keychain::load("master", "not json at all", Some("bogus"));
        assert!(matches!(result, Err(KeychainError::Integrity)));

        let result = Keychain::load("master", "not json at all", None);
        assert!(matches!(result, Err(KeychainError::Parse { .. })));
    }

    #[test]
    fn debug_does_not_leak() {
        let mut keychain = Keychain::init("master-secret").unwrap();
        keychain.set("example.com", "hunter2").unwrap();

        let rendered = format!("{keychain:?}");
        assert!(rendered.contains("entries: 1"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("master-secret"));
    }

    #[test]
    fn dump_is_stable() {
        let mut keychain = Keychain::init("master").unwrap();
        keychain.set("a.example", "1").unwrap();
        keychain.set("b.example", "2").unwrap();

        assert_eq!(keychain.dump().unwrap(), keychain.dump().unwrap());
    }
}
