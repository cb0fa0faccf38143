//! Backup engine.
//!
//! Delegates the dump itself to `bench backup` inside the backend container,
//! then copies the newest artifact per category out to a timestamped host
//! directory together with the site config, the apps preset, and a redacted
//! env file, and finally writes the manifest.
//!
//! Artifact copies are best-effort per category: one failed copy does not
//! abort the others. With `strict` set, a missing database dump fails the
//! whole run instead of being reported as a warning.

pub mod manifest;

use crate::compose::{Compose, BACKEND};
use crate::config::EnvConfig;
use crate::lock::SiteLock;
use crate::utils::errors::StackError;
use crate::utils::term;
use chrono::Utc;
use manifest::{format_bytes, Manifest, MANIFEST_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BENCH_DIR: &str = "/home/frappe/frappe-bench";

/// Copyable artifact categories: logical name, container-side glob, canonical
/// host filename. The public files glob must not swallow the private archive.
const ARTIFACTS: &[(&str, &str, &str)] = &[
    ("database", "*-database.sql.gz", "database.sql.gz"),
    ("files", "*-files.tar", "files.tar"),
    ("private_files", "*-private-files.tar", "private-files.tar"),
];

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub site: String,
    pub output_root: PathBuf,
    /// Fail the run when the database dump cannot be collected.
    pub strict: bool,
}

/// Run a backup. Returns the created backup directory.
pub async fn run(
    compose: &Compose,
    config: &EnvConfig,
    opts: &BackupOptions,
) -> anyhow::Result<PathBuf> {
    let _lock = SiteLock::acquire(Path::new("."), &opts.site)?;

    if !compose.is_running(BACKEND).await {
        anyhow::bail!(StackError::ServiceNotRunning(BACKEND.to_string()));
    }

    let backup_dir = opts
        .output_root
        .join(format!("backup-{}", Utc::now().format("%Y%m%d-%H%M%S")));
    std::fs::create_dir_all(&backup_dir)?;

    term::step(&format!("Creating backup of site '{}'...", opts.site));
    compose
        .exec_capture(
            BACKEND,
            &["bench", "--site", &opts.site, "backup", "--with-files"],
        )
        .await?;
    term::success("Framework backup complete");

    let backups_path = format!("{BENCH_DIR}/sites/{}/private/backups", opts.site);
    let mut files: BTreeMap<String, String> = BTreeMap::new();
    let mut warnings: Vec<String> = Vec::new();

    for (key, pattern, canonical) in ARTIFACTS {
        match collect_artifact(compose, &backups_path, key, pattern, canonical, &backup_dir).await {
            Ok(true) => {
                files.insert(key.to_string(), canonical.to_string());
                term::success(&format!("Copied {canonical}"));
            }
            Ok(false) => {
                tracing::debug!("No {key} artifact produced by this run");
            }
            Err(e) => warnings.push(format!("could not copy {key} artifact: {e}")),
        }
    }

    if !files.contains_key(manifest::KEY_DATABASE) {
        let msg = "database dump was not collected".to_string();
        if opts.strict {
            let _ = std::fs::remove_dir_all(&backup_dir);
            anyhow::bail!("{msg}");
        }
        warnings.push(msg);
    }

    // Site config, rendered by the framework inside the container.
    let site_config_path = format!("{BENCH_DIR}/sites/{}/site_config.json", opts.site);
    match compose.exec_capture(BACKEND, &["cat", &site_config_path]).await {
        Ok(content) => {
            std::fs::write(backup_dir.join("site_config.json"), content)?;
            files.insert(manifest::KEY_SITE_CONFIG.to_string(), "site_config.json".to_string());
        }
        Err(e) => warnings.push(format!("could not copy site_config.json: {e}")),
    }

    // Apps preset, when the host has one.
    if Path::new("apps.json").exists() {
        std::fs::copy("apps.json", backup_dir.join("apps.json"))?;
        files.insert(manifest::KEY_APPS_CONFIG.to_string(), "apps.json".to_string());
    }

    // Redacted environment snapshot.
    std::fs::write(backup_dir.join("env.txt"), config.redacted())?;
    files.insert(manifest::KEY_ENV_CONFIG.to_string(), "env.txt".to_string());

    let size_bytes = directory_size(&backup_dir);
    let manifest = Manifest {
        timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        site_name: opts.site.clone(),
        framework_version: config.frappe_version.clone(),
        apps: config.install_apps.clone(),
        size_bytes,
        size_human: format_bytes(size_bytes),
        files,
    };
    manifest.save(&backup_dir)?;

    for w in &warnings {
        term::warning(w);
    }
    term::success(&format!(
        "Backup written to {} ({})",
        backup_dir.display(),
        manifest.size_human
    ));
    Ok(backup_dir)
}

/// Locate the newest artifact matching `pattern` inside the container and
/// copy it out under its canonical name. `Ok(false)` means the category
/// produced nothing.
async fn collect_artifact(
    compose: &Compose,
    backups_path: &str,
    key: &str,
    pattern: &str,
    canonical: &str,
    backup_dir: &Path,
) -> crate::Result<bool> {
    // Newest by mtime; the public-files glob also matches the private archive,
    // which the grep strips back out.
    let list_cmd = if key == "files" {
        format!("ls -t {backups_path}/{pattern} 2>/dev/null | grep -v -- -private-files | head -n 1")
    } else {
        format!("ls -t {backups_path}/{pattern} 2>/dev/null | head -n 1")
    };

    let newest = compose
        .exec_capture(BACKEND, &["sh", "-c", &list_cmd])
        .await
        .map(|out| out.trim().to_string())
        .unwrap_or_default();

    if newest.is_empty() {
        return Ok(false);
    }

    let host_path = backup_dir.join(canonical);
    compose
        .cp_from(BACKEND, &newest, &host_path.to_string_lossy())
        .await?;
    Ok(true)
}

/// Total size of all files in the backup directory, excluding the manifest.
fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name() != MANIFEST_FILE)
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_size_excludes_manifest() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("database.sql.gz"), vec![0u8; 100])?;
        fs::write(dir.path().join("files.tar"), vec![0u8; 50])?;
        fs::write(dir.path().join(MANIFEST_FILE), b"{}")?;

        assert_eq!(directory_size(dir.path()), 150);
        Ok(())
    }

    #[test]
    fn test_directory_size_empty() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(directory_size(dir.path()), 0);
        Ok(())
    }
}
