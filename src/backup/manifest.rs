//! Backup manifest types.
//!
//! A manifest describes one backup run — written once as `manifest.json` in
//! the backup directory, immutable thereafter, consumed by exactly one
//! restore.

use crate::utils::errors::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Logical artifact names used as `files` keys.
pub const KEY_DATABASE: &str = "database";
pub const KEY_FILES: &str = "files";
pub const KEY_PRIVATE_FILES: &str = "private_files";
pub const KEY_SITE_CONFIG: &str = "site_config";
pub const KEY_APPS_CONFIG: &str = "apps_config";
pub const KEY_ENV_CONFIG: &str = "env_config";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// ISO-8601 UTC creation time.
    pub timestamp: String,
    pub site_name: String,
    pub framework_version: String,
    /// Comma-joined installed app names.
    pub apps: String,
    pub size_bytes: u64,
    pub size_human: String,
    /// Logical artifact name -> relative filename in the backup directory.
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn load(backup_dir: &Path) -> Result<Self> {
        let path = backup_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, backup_dir: &Path) -> Result<()> {
        let path = backup_dir.join(MANIFEST_FILE);
        if path.exists() {
            return Err(StackError::Config(format!(
                "refusing to overwrite existing manifest {}",
                path.display()
            )));
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Names of listed artifacts that are missing or empty on disk.
    pub fn missing_files(&self, backup_dir: &Path) -> Vec<String> {
        self.files
            .iter()
            .filter(|(_, filename)| {
                let path = backup_dir.join(filename.as_str());
                !std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Human-readable size with binary multiples and truncating division.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes < KIB {
        format!("{bytes}B")
    } else if bytes < MIB {
        format!("{}KB", bytes / KIB)
    } else if bytes < GIB {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{}GB", bytes / GIB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_manifest() -> Manifest {
        let mut files = BTreeMap::new();
        files.insert(KEY_DATABASE.to_string(), "database.sql.gz".to_string());
        files.insert(KEY_SITE_CONFIG.to_string(), "site_config.json".to_string());
        Manifest {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            site_name: "frontend".to_string(),
            framework_version: "version-15".to_string(),
            apps: "frappe,erpnext".to_string(),
            size_bytes: 2048,
            size_human: "2KB".to_string(),
            files,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1024), "1KB");
        assert_eq!(format_bytes(1048575), "1023KB");
        assert_eq!(format_bytes(1048576), "1MB");
        assert_eq!(format_bytes(1073741824), "1GB");
    }

    #[test]
    fn test_save_and_load() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let manifest = sample_manifest();
        manifest.save(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded.site_name, "frontend");
        assert_eq!(loaded.files.len(), 2);
        assert_eq!(loaded.files[KEY_DATABASE], "database.sql.gz");
        Ok(())
    }

    #[test]
    fn test_save_refuses_overwrite() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let manifest = sample_manifest();
        manifest.save(dir.path()).unwrap();
        assert!(manifest.save(dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_files() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let manifest = sample_manifest();

        // Nothing on disk: both artifacts reported.
        let mut missing = manifest.missing_files(dir.path());
        missing.sort();
        assert_eq!(missing, vec![KEY_DATABASE, KEY_SITE_CONFIG]);

        // Empty files still count as missing.
        fs::write(dir.path().join("database.sql.gz"), b"")?;
        fs::write(dir.path().join("site_config.json"), b"{}")?;
        assert_eq!(manifest.missing_files(dir.path()), vec![KEY_DATABASE]);

        fs::write(dir.path().join("database.sql.gz"), b"dump")?;
        assert!(manifest.missing_files(dir.path()).is_empty());
        Ok(())
    }
}
