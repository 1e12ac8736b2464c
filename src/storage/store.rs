use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

pub const ACCOUNTS_FILE: &str = "accounts.json";

/// The on-disk account list plus its `.backup` and `.old` siblings.
#[derive(Debug, Clone)]
pub struct AccountFile {
    path: PathBuf,
}

impl AccountFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `accounts.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ACCOUNTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.sibling(".backup")
    }

    pub fn aside_path(&self) -> PathBuf {
        self.sibling(".old")
    }

    /// Returns the file contents, or `None` when there is no file yet.
    pub fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Replaces the file through a temporary sibling, readable by the owner only.
    pub fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }

        let tmp = self.sibling(".tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
                .map_err(|e| StoreError::io(&tmp, e))?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "wrote account list");
        Ok(())
    }

    /// Copies the current file to `.backup`. An existing backup is kept as is.
    pub fn backup(&self) -> Result<PathBuf, StoreError> {
        let target = self.backup_path();
        if target.exists() {
            warn!(path = %target.display(), "backup already exists, keeping it");
            return Ok(target);
        }
        fs::copy(&self.path, &target).map_err(|e| StoreError::Backup {
            target: target.clone(),
            reason: e.to_string(),
        })?;
        Ok(target)
    }

    /// Renames the current file to `.old` so a fresh list can take its place.
    /// Fails rather than replace an `.old` file that is already there.
    pub fn move_aside(&self) -> Result<PathBuf, StoreError> {
        let target = self.aside_path();
        if fs::symlink_metadata(&target).is_ok() {
            return Err(StoreError::MoveAside {
                target,
                reason: "destination already exists".to_string(),
            });
        }
        fs::rename(&self.path, &target).map_err(|e| StoreError::MoveAside {
            target: target.clone(),
            reason: e.to_string(),
        })?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(AccountFile::in_dir(dir.path()).read().unwrap().is_none());
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let file = AccountFile::in_dir(&dir.path().join("nested"));
        file.write(b"{}").unwrap();
        assert_eq!(file.read().unwrap().unwrap(), b"{}");
        assert!(!file.path().with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let file = AccountFile::in_dir(dir.path());
        file.write(b"{}").unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn backup_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let file = AccountFile::in_dir(dir.path());
        file.write(b"first").unwrap();
        let backup = file.backup().unwrap();
        file.write(b"second").unwrap();
        file.backup().unwrap();
        assert_eq!(fs::read(backup).unwrap(), b"first");
    }

    #[test]
    fn move_aside_renames() {
        let dir = TempDir::new().unwrap();
        let file = AccountFile::in_dir(dir.path());
        file.write(b"old").unwrap();
        let moved = file.move_aside().unwrap();
        assert!(moved.ends_with("accounts.json.old"));
        assert!(file.read().unwrap().is_none());
        assert_eq!(fs::read(moved).unwrap(), b"old");
    }

    #[test]
    fn move_aside_keeps_an_earlier_old_file() {
        let dir = TempDir::new().unwrap();
        let file = AccountFile::in_dir(dir.path());
        fs::write(file.aside_path(), "earlier").unwrap();
        file.write(b"newer").unwrap();

        let err = file.move_aside().unwrap_err();
        assert!(matches!(err, StoreError::MoveAside { .. }));
        assert_eq!(fs::read(file.aside_path()).unwrap(), b"earlier");
        assert_eq!(file.read().unwrap().unwrap(), b"newer");
    }

    #[test]
    fn move_aside_without_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = AccountFile::in_dir(dir.path()).move_aside().unwrap_err();
        assert!(matches!(err, StoreError::MoveAside { .. }));
    }
}
