//! On-disk persistence of a dumped keychain.
//!
//! The keychain crate never touches the filesystem. This module stores its
//! output as a single file, `keychain.vault`, under the data directory:
//!
//! ```text
//! <checksum>\n
//! <representation>
//! ```
//!
//! The representation is compact JSON and contains no raw newline, so the
//! first line break always separates the two parts. An empty first line
//! means no checksum was stored.
//!
//! The file is written to a temporary sibling and renamed into place in one
//! step, so the representation and its checksum are always replaced
//! together. On Unix it is restricted to mode 0600.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File name of the persisted keychain.
pub const KEYCHAIN_FILE: &str = "keychain.vault";

/// Location of a persisted keychain.
#[derive(Debug, Clone)]
pub struct KeychainFiles {
    path: PathBuf,
}

/// What was read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    pub repr: String,
    /// `None` if the stored checksum line is empty.
    pub checksum: Option<String>,
}

impl KeychainFiles {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(KEYCHAIN_FILE),
        }
    }

    pub fn repr_path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Read the representation and its checksum.
    pub async fn read(&self) -> Result<Persisted> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        parse_file(&contents)
            .with_context(|| format!("malformed keychain file {}", self.path.display()))
    }

    /// Atomically replace the file with `repr` and `checksum`.
    pub async fn write(&self, repr: &str, checksum: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, format_file(repr, checksum)?)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;

        // Restrict file permissions on Unix (owner read/write only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp, perms).await?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;

        tracing::debug!(path = %self.path.display(), "wrote keychain file");
        Ok(())
    }
}

fn format_file(repr: &str, checksum: &str) -> Result<String> {
    if checksum.contains('\n') || repr.contains('\n') {
        bail!("keychain representation and checksum must be single-line");
    }
    Ok(format!("{checksum}\n{repr}"))
}

fn parse_file(contents: &str) -> Result<Persisted> {
    let Some((checksum, repr)) = contents.split_once('\n') else {
        bail!("missing checksum line");
    };
    let checksum = checksum.trim();

    Ok(Persisted {
        repr: repr.to_string(),
        checksum: (!checksum.is_empty()).then(|| checksum.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let files = KeychainFiles::new(&dir.path().join("nested"));
        assert!(!files.exists().await);

        files.write(r#"{"kvs":{},"salt":"x"}"#, "abc=").await.unwrap();
        assert!(files.exists().await);

        let persisted = files.read().await.unwrap();
        assert_eq!(persisted.repr, r#"{"kvs":{},"salt":"x"}"#);
        assert_eq!(persisted.checksum.as_deref(), Some("abc="));
    }

    #[test]
    fn empty_checksum_line_reads_as_none() {
        let persisted = parse_file("\n{}").unwrap();
        assert_eq!(persisted.checksum, None);
        assert_eq!(persisted.repr, "{}");

        assert!(parse_file("{}").is_err());
    }

    #[test]
    fn multiline_parts_are_rejected() {
        assert!(format_file("{\n}", "sum").is_err());
        assert!(format_file("{}", "s\num").is_err());
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = KeychainFiles::new(dir.path());
        files.write("one", "1").await.unwrap();
        files.write("two", "2").await.unwrap();

        assert_eq!(files.read().await.unwrap().repr, "two");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![KEYCHAIN_FILE]);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let files = KeychainFiles::new(dir.path());
        files.write("first", "sum-1").await.unwrap();

        // A directory in the temp file's place makes the next write fail.
        std::fs::create_dir(files.tmp_path()).unwrap();
        assert!(files.write("second", "sum-2").await.is_err());

        let persisted = files.read().await.unwrap();
        assert_eq!(persisted.repr, "first");
        assert_eq!(persisted.checksum.as_deref(), Some("sum-1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let files = KeychainFiles::new(dir.path());
        files.write("{}", "sum").await.unwrap();

        let mode = std::fs::metadata(files.repr_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn read_without_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(KeychainFiles::new(dir.path()).read().await.is_err());
    }
}
