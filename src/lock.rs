//! Per-site mutual exclusion for mutating operations.
//!
//! Backup and restore hold a lockfile for the duration of the run so two
//! invocations against the same site cannot interleave. The guard removes the
//! lockfile on drop; a crash can leave a stale file behind, which the error
//! message names so the operator can remove it.

use crate::utils::errors::{Result, StackError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub struct SiteLock {
    path: PathBuf,
}

impl SiteLock {
    /// Acquire the lock for `site`, creating `.quickstart-<site>.lock` in
    /// `dir`. Fails if the lockfile already exists.
    pub fn acquire(dir: &std::path::Path, site: &str) -> Result<Self> {
        let path = dir.join(format!(".quickstart-{site}.lock"));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StackError::Locked {
                    site: site.to_string(),
                    lock_path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let _ = writeln!(file, "{}", std::process::id());
        Ok(SiteLock { path })
    }
}

impl Drop for SiteLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock file {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_excludes_same_site() -> std::io::Result<()> {
        let dir = TempDir::new()?;

        let first = SiteLock::acquire(dir.path(), "frontend").unwrap();
        let second = SiteLock::acquire(dir.path(), "frontend");
        assert!(matches!(second, Err(StackError::Locked { .. })));

        drop(first);
        // Released on drop; a new acquire succeeds.
        let third = SiteLock::acquire(dir.path(), "frontend");
        assert!(third.is_ok());
        Ok(())
    }

    #[test]
    fn test_lock_independent_sites() -> std::io::Result<()> {
        let dir = TempDir::new()?;

        let _a = SiteLock::acquire(dir.path(), "frontend").unwrap();
        let b = SiteLock::acquire(dir.path(), "other-site");
        assert!(b.is_ok());
        Ok(())
    }
}
