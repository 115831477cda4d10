//! Master password key derivation.
//!
//! A single PBKDF2-HMAC-SHA256 run over `(password, salt)` yields 512 bits.
//! The first half becomes the HMAC-SHA256 lookup key, the second half the
//! AES-256-GCM cipher key. The iteration count and hash are fixed: changing
//! either makes every existing keychain unreadable.

use std::fmt;
use std::num::NonZeroU32;

use zeroize::Zeroizing;

use crate::crypto::{CryptoProvider, KEY_LEN};
use crate::error::{KeychainError, Result};

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length of the per-keychain salt in bytes.
pub const SALT_LEN: usize = 16;

/// Total PBKDF2 output length: one lookup key plus one cipher key.
pub const DERIVED_LEN: usize = 2 * KEY_LEN;

/// Upper bound on the master password, in characters.
pub const MAX_PASSWORD_LENGTH: usize = 64;

/// Per-keychain random salt.
pub type Salt = [u8; SALT_LEN];

/// The pair of keys derived from a master password.
pub struct DerivedKeys<P: CryptoProvider> {
    pub(crate) lookup: P::LookupKey,
    pub(crate) cipher: P::CipherKey,
}

impl<P: CryptoProvider> fmt::Debug for DerivedKeys<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKeys { .. }")
    }
}

/// Reject passwords longer than [`MAX_PASSWORD_LENGTH`] characters.
///
/// Length is counted in Unicode scalar values. Passwords are never truncated.
pub fn check_password(password: &str) -> Result<()> {
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(KeychainError::PasswordTooLong {
            max: MAX_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Draw a fresh salt from the provider's CSPRNG.
pub fn generate_salt<P: CryptoProvider>(provider: &P) -> Result<Salt> {
    let mut salt = [0u8; SALT_LEN];
    provider.random_bytes(&mut salt)?;
    Ok(salt)
}

/// Derive the lookup and cipher keys for `password` under `salt`.
///
/// Deterministic: the same inputs always produce the same keys.
pub fn derive<P: CryptoProvider>(
    provider: &P,
    password: &str,
    salt: &Salt,
) -> Result<DerivedKeys<P>> {
    check_password(password)?;

    let iterations =
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");

    let mut bits = Zeroizing::new([0u8; DERIVED_LEN]);
    provider.derive_bits(password.as_bytes(), salt, iterations, &mut bits[..]);

    let (lookup_material, cipher_material) = bits.split_at(KEY_LEN);
    let lookup = provider.import_lookup_key(lookup_material)?;
    let cipher = provider.import_cipher_key(cipher_material)?;

    tracing::debug!(iterations = PBKDF2_ITERATIONS, "derived keychain keys via PBKDF2");

    Ok(DerivedKeys { lookup, cipher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{NONCE_LEN, RingProvider};

    /// Fingerprint both keys by using them, since imported keys are opaque.
    fn fingerprint(provider: &RingProvider, keys: &DerivedKeys<RingProvider>) -> (Vec<u8>, Vec<u8>) {
        let tag = provider.sign(&keys.lookup, b"probe");
        let sealed = provider
            .encrypt(&keys.cipher, &[0u8; NONCE_LEN], b"probe")
            .unwrap();
        (tag, sealed)
    }

    #[test]
    fn derivation_is_deterministic() {
        let provider = RingProvider::new();
        let salt = [0x5a; SALT_LEN];

        let a = derive(&provider, "correct horse battery staple", &salt).unwrap();
        let b = derive(&provider, "correct horse battery staple", &salt).unwrap();

        assert_eq!(fingerprint(&provider, &a), fingerprint(&provider, &b));
    }

    #[test]
    fn different_password_gives_unrelated_keys() {
        let provider = RingProvider::new();
        let salt = generate_salt(&provider).unwrap();

        let a = derive(&provider, "password-one", &salt).unwrap();
        let b = derive(&provider, "password-two", &salt).unwrap();
        let (tag_a, sealed_a) = fingerprint(&provider, &a);
        let (tag_b, sealed_b) = fingerprint(&provider, &b);

        assert_ne!(tag_a, tag_b);
        assert_ne!(sealed_a, sealed_b);
        assert!(provider
            .decrypt(&b.cipher, &[0u8; NONCE_LEN], &sealed_a)
            .is_err());
    }

    #[test]
    fn different_salt_gives_unrelated_keys() {
        let provider = RingProvider::new();

        let a = derive(&provider, "same", &[1u8; SALT_LEN]).unwrap();
        let b = derive(&provider, "same", &[2u8; SALT_LEN]).unwrap();

        assert_ne!(fingerprint(&provider, &a).0, fingerprint(&provider, &b).0);
    }

    #[test]
    fn halves_are_independent_keys() {
        let provider = RingProvider::new();
        let salt = [3u8; SALT_LEN];
        let keys = derive(&provider, "split", &salt).unwrap();

        let mut bits = [0u8; DERIVED_LEN];
        provider.derive_bits(
            b"split",
            &salt,
            NonZeroU32::new(PBKDF2_ITERATIONS).unwrap(),
            &mut bits,
        );
        let expected_lookup = provider.import_lookup_key(&bits[..KEY_LEN]).unwrap();

        assert_eq!(
            provider.sign(&keys.lookup, b"probe"),
            provider.sign(&expected_lookup, b"probe")
        );
        assert_ne!(&bits[..KEY_LEN], &bits[KEY_LEN..]);
    }

    #[test]
    fn password_length_bound() {
        assert!(check_password(&"a".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert!(matches!(
            check_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(KeychainError::PasswordTooLong { max: 64 })
        ));
        // Counted in characters, not bytes.
        assert!(check_password(&"é".repeat(MAX_PASSWORD_LENGTH)).is_ok());
    }

    #[test]
    fn overlong_password_is_not_truncated_into_a_key() {
        let provider = RingProvider::new();
        let result = derive(&provider, &"x".repeat(65), &[0u8; SALT_LEN]);
        assert!(matches!(result, Err(KeychainError::PasswordTooLong { .. })));
    }

    #[test]
    fn salts_are_random() {
        let provider = RingProvider::new();
        assert_ne!(
            generate_salt(&provider).unwrap(),
            generate_salt(&provider).unwrap()
        );
    }
}
