//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization, secret input, the bridge between the
//! synchronous keychain API and the async runtime, and the load-modify-save
//! flows behind `set` and `remove`.

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use passvault_keychain::{Keychain, KeychainError, kdf};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::storage::{KeychainFiles, Persisted};

/// Environment variable holding the master password.
pub const ENV_PASSWORD: &str = "PASSVAULT_PASSWORD";

/// Environment variable holding the credential for `set`.
pub const ENV_CREDENTIAL: &str = "PASSVAULT_CREDENTIAL";

/// A secret string wiped from memory on drop.
pub type Secret = Zeroizing<String>;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Secret input
// ---------------------------------------------------------------------------

/// Secrets supplied for one command.
pub struct Secrets {
    pub password: Secret,
    /// Present only when requested.
    pub credential: Option<Secret>,
}

/// Read the master password and, if `with_credential`, the credential.
///
/// Each comes from its environment variable when set, otherwise from the
/// next line of stdin: password first, then credential. Neither is ever
/// taken from the command line.
pub fn read_secrets(with_credential: bool) -> Result<Secrets> {
    read_secrets_from(&mut std::io::stdin().lock(), env_non_empty, with_credential)
}

pub fn read_secrets_from(
    input: &mut impl BufRead,
    lookup: impl Fn(&str) -> Option<String>,
    with_credential: bool,
) -> Result<Secrets> {
    let password = match lookup(ENV_PASSWORD) {
        Some(password) => Zeroizing::new(password),
        None => read_secret_line(input, "master password")?,
    };
    validate_password(&password)?;

    let credential = if with_credential {
        Some(match lookup(ENV_CREDENTIAL) {
            Some(credential) => Zeroizing::new(credential),
            None => read_secret_line(input, "credential")?,
        })
    } else {
        None
    };

    Ok(Secrets {
        password,
        credential,
    })
}

fn read_secret_line(input: &mut impl BufRead, what: &str) -> Result<Secret> {
    let mut line = Zeroizing::new(String::new());
    let read = input
        .read_line(&mut line)
        .with_context(|| format!("failed to read {what} from stdin"))?;
    if read == 0 {
        bail!("no {what} provided on stdin");
    }
    Ok(Zeroizing::new(strip_line_ending(&line).to_string()))
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        bail!("master password must not be empty");
    }
    kdf::check_password(password)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Keychain lifecycle
// ---------------------------------------------------------------------------

/// Create a fresh keychain. Derivation runs on the blocking pool.
pub async fn create_keychain(password: Secret) -> Result<Keychain> {
    let keychain = tokio::task::spawn_blocking(move || Keychain::init(&password))
        .await
        .context("key derivation task panicked")??;
    Ok(keychain)
}

/// Restore a keychain from `persisted`.
///
/// When `verify_checksum` is set, a missing checksum is an error rather
/// than a silent downgrade to unchecked loading.
pub async fn open_keychain(
    password: Secret,
    persisted: Persisted,
    verify_checksum: bool,
) -> Result<Keychain> {
    let trusted = if verify_checksum {
        match persisted.checksum {
            Some(sum) => Some(sum),
            None => bail!("checksum missing; refusing to load unverified keychain"),
        }
    } else {
        None
    };

    let result = tokio::task::spawn_blocking(move || {
        Keychain::load(&password, &persisted.repr, trusted.as_deref())
    })
    .await
    .context("key derivation task panicked")?;

    result.map_err(|e| match e {
        KeychainError::Authentication => {
            anyhow::Error::new(e).context("could not unlock keychain")
        }
        KeychainError::Integrity => {
            anyhow::Error::new(e).context("keychain file does not match its checksum")
        }
        other => anyhow::Error::new(other).context("failed to load keychain"),
    })
}

/// Read, unlock, and return the keychain stored under `files`.
pub async fn unlock(files: &KeychainFiles, password: Secret, verify: bool) -> Result<Keychain> {
    let persisted = files.read().await?;
    open_keychain(password, persisted, verify).await
}

/// Dump `keychain` and write it to `files`.
pub async fn save(keychain: &Keychain, files: &KeychainFiles) -> Result<()> {
    let (repr, checksum) = keychain.dump().context("failed to serialize keychain")?;
    files.write(&repr, &checksum).await
}

/// Unlock, store `credential` for `domain`, and write the keychain back.
pub async fn set_entry(
    files: &KeychainFiles,
    password: Secret,
    verify: bool,
    domain: &str,
    credential: &str,
) -> Result<()> {
    let mut keychain = unlock(files, password, verify).await?;
    keychain.set(domain, credential)?;
    save(&keychain, files).await
}

/// Unlock and delete `domain`. The file is rewritten only if an entry was
/// removed.
pub async fn remove_entry(
    files: &KeychainFiles,
    password: Secret,
    verify: bool,
    domain: &str,
) -> Result<bool> {
    let mut keychain = unlock(files, password, verify).await?;
    if !keychain.remove(domain) {
        return Ok(false);
    }
    save(&keychain, files).await?;
    Ok(true)
}
