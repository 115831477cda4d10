//! Encrypted password keychain for PassVault.
//!
//! A keychain turns one master password into two keys and uses them to keep
//! per-domain credentials confidential, hide which domains are stored, and
//! detect tampering or a wrong password when a dumped keychain is reloaded.
//!
//! # Modules
//!
//! - [`crypto`] — the [`CryptoProvider`] capability interface and its `ring`
//!   implementation (PBKDF2, HMAC-SHA256, AES-256-GCM, SHA-256).
//! - [`kdf`] — master password to `(lookup key, cipher key)` derivation.
//! - [`repr`] — the persisted JSON representation and its checksum.
//! - [`keychain`] — the engine: init, load, dump, get, set, remove.
//! - [`error`] — unified error type.
//!
//! Persistence is the caller's job: [`Keychain::dump`] hands back text to
//! store, and [`Keychain::load`] takes it back.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use passvault_keychain::Keychain;
//!
//! # fn example() -> passvault_keychain::Result<()> {
//! let mut keychain = Keychain::init("correct horse battery staple")?;
//! keychain.set("github.com", "gh-password")?;
//!
//! let (repr, checksum) = keychain.dump()?;
//!
//! // Later, possibly in another process.
//! let keychain = Keychain::load("correct horse battery staple", &repr, Some(&checksum))?;
//! assert_eq!(keychain.get("github.com")?.as_deref(), Some("gh-password"));
//! assert_eq!(keychain.get("gitlab.com")?, None);
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod kdf;
pub mod keychain;
pub mod repr;

pub use crypto::{CryptoProvider, RingProvider};
pub use error::{KeychainError, Result};
pub use kdf::MAX_PASSWORD_LENGTH;
pub use keychain::Keychain;
