//! Restore engine.
//!
//! Mirrors the backup layout: artifacts are copied into a scratch directory
//! inside the backend container, the database dump is restored through
//! `bench restore` (the single fail-fast step), file archives are extracted
//! best-effort, and migrate/build run as advisory follow-ups. `strict`
//! upgrades the advisory steps to hard failures.

use crate::backup::manifest::Manifest;
use crate::compose::{Compose, BACKEND};
use crate::config::DEFAULT_SITE;
use crate::lock::SiteLock;
use crate::utils::errors::StackError;
use crate::utils::term;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const BENCH_DIR: &str = "/home/frappe/frappe-bench";

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub backup_dir: PathBuf,
    pub site: Option<String>,
    /// Skip the interactive confirmation gate.
    pub assume_yes: bool,
    /// Treat file extraction and migrate/build failures as errors.
    pub strict: bool,
    /// Confirmation gate, replaceable in tests.
    pub confirm: fn() -> bool,
}

/// Default gate: ask on stdin.
pub fn confirm_on_stdin() -> bool {
    term::confirm("Restore cannot be undone.")
}

#[derive(Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Completed,
    /// User declined the confirmation prompt; nothing was touched.
    Declined,
}

/// Target site: explicit override, else the manifest's `site_name`, else the
/// stack default.
pub fn resolve_site(backup_dir: &Path, site_override: Option<&str>) -> String {
    if let Some(site) = site_override {
        return site.to_string();
    }
    Manifest::load(backup_dir)
        .map(|m| m.site_name)
        .unwrap_or_else(|_| DEFAULT_SITE.to_string())
}

pub async fn run(compose: &Compose, opts: &RestoreOptions) -> anyhow::Result<RestoreOutcome> {
    if !opts.backup_dir.is_dir() {
        anyhow::bail!(StackError::BackupNotFound(
            opts.backup_dir.display().to_string()
        ));
    }

    let site = resolve_site(&opts.backup_dir, opts.site.as_deref());

    match Manifest::load(&opts.backup_dir) {
        Ok(m) => {
            term::info(&format!(
                "Backup from {} (site '{}', {})",
                m.timestamp, m.site_name, m.size_human
            ));
            for key in m.missing_files(&opts.backup_dir) {
                term::warning(&format!("manifest lists '{key}' but the file is missing or empty"));
            }
        }
        Err(_) => term::warning("No manifest found, continuing with defaults"),
    }

    if !opts.assume_yes {
        term::warning(&format!("This will OVERWRITE all data of site '{site}'!"));
        if !(opts.confirm)() {
            term::info("Restore cancelled");
            return Ok(RestoreOutcome::Declined);
        }
    }

    if !compose.is_running(BACKEND).await {
        anyhow::bail!(StackError::ServiceNotRunning(BACKEND.to_string()));
    }

    let _lock = SiteLock::acquire(Path::new("."), &site)?;

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let scratch = format!("/tmp/restore-{millis}");
    compose.exec_capture(BACKEND, &["mkdir", "-p", &scratch]).await?;

    let staged = stage_artifacts(compose, &opts.backup_dir, &scratch).await?;

    if staged.database {
        term::step("Restoring database...");
        let dump = format!("{scratch}/database.sql.gz");
        let result = compose
            .exec(
                BACKEND,
                &["bench", "--site", &site, "--force", "restore", &dump],
            )
            .await;
        if let Err(e) = result {
            // Fail-fast: a bad database restore invalidates everything else.
            cleanup_scratch(compose, &scratch).await;
            anyhow::bail!("database restore failed: {e}");
        }
        term::success("Database restored");
    } else {
        term::info("No database dump in backup, skipping database restore");
    }

    for (present, archive, label) in [
        (staged.files, "files.tar", "public files"),
        (staged.private_files, "private-files.tar", "private files"),
    ] {
        if !present {
            continue;
        }
        term::step(&format!("Restoring {label}..."));
        // Archives carry site-relative paths, so they unpack from sites/.
        let tar_cmd = format!("tar -xf {scratch}/{archive} -C {BENCH_DIR}/sites");
        match compose.exec_capture(BACKEND, &["sh", "-c", &tar_cmd]).await {
            Ok(_) => term::success(&format!("{label} restored")),
            Err(e) if opts.strict => {
                cleanup_scratch(compose, &scratch).await;
                anyhow::bail!("failed to restore {label}: {e}");
            }
            Err(e) => term::warning(&format!("failed to restore {label}: {e}")),
        }
    }

    cleanup_scratch(compose, &scratch).await;

    for (argv, label) in [
        (vec!["bench", "--site", site.as_str(), "migrate"], "schema migration"),
        (vec!["bench", "build"], "asset build"),
    ] {
        term::step(&format!("Running {label}..."));
        match compose.exec(BACKEND, &argv).await {
            Ok(()) => term::success(&format!("{label} complete")),
            Err(e) if opts.strict => anyhow::bail!("{label} failed: {e}"),
            Err(e) => term::warning(&format!("{label} failed: {e}")),
        }
    }

    term::success(&format!("Restore of site '{site}' complete"));
    Ok(RestoreOutcome::Completed)
}

struct StagedArtifacts {
    database: bool,
    files: bool,
    private_files: bool,
}

/// Copy whichever artifacts exist on the host into the container scratch
/// directory. Absence of an optional artifact is not an error.
async fn stage_artifacts(
    compose: &Compose,
    backup_dir: &Path,
    scratch: &str,
) -> anyhow::Result<StagedArtifacts> {
    let mut staged = StagedArtifacts {
        database: false,
        files: false,
        private_files: false,
    };

    for (filename, flag) in [
        ("database.sql.gz", &mut staged.database),
        ("files.tar", &mut staged.files),
        ("private-files.tar", &mut staged.private_files),
    ] {
        let host_path = backup_dir.join(filename);
        if !host_path.exists() {
            continue;
        }
        let container_path = format!("{scratch}/{filename}");
        compose
            .cp_to(&host_path.to_string_lossy(), BACKEND, &container_path)
            .await?;
        *flag = true;
    }

    Ok(staged)
}

async fn cleanup_scratch(compose: &Compose, scratch: &str) {
    if let Err(e) = compose.exec_capture(BACKEND, &["rm", "-rf", scratch]).await {
        tracing::warn!("Failed to remove scratch directory {scratch}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manifest::Manifest;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_site_prefers_override() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(resolve_site(dir.path(), Some("custom")), "custom");
        Ok(())
    }

    #[test]
    fn test_resolve_site_from_manifest() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let manifest = Manifest {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            site_name: "mysite".to_string(),
            framework_version: "version-15".to_string(),
            apps: String::new(),
            size_bytes: 0,
            size_human: "0B".to_string(),
            files: BTreeMap::new(),
        };
        manifest.save(dir.path()).unwrap();

        assert_eq!(resolve_site(dir.path(), None), "mysite");
        assert_eq!(resolve_site(dir.path(), Some("other")), "other");
        Ok(())
    }

    #[test]
    fn test_resolve_site_falls_back_to_default() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(resolve_site(dir.path(), None), DEFAULT_SITE);
        Ok(())
    }

    #[tokio::test]
    async fn test_declined_confirmation_touches_nothing() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("database.sql.gz"), b"dump")?;

        let compose = Compose::docker_plugin();
        let opts = RestoreOptions {
            backup_dir: dir.path().to_path_buf(),
            site: Some("frontend".to_string()),
            assume_yes: false,
            strict: false,
            confirm: || false,
        };

        let outcome = restore_run_declined(&compose, &opts).await;
        assert_eq!(outcome, RestoreOutcome::Declined);

        // Backup directory untouched, no lock taken.
        let entries: Vec<_> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(entries, vec!["database.sql.gz"]);
        assert!(!Path::new(".quickstart-frontend.lock").exists());
        Ok(())
    }

    async fn restore_run_declined(compose: &Compose, opts: &RestoreOptions) -> RestoreOutcome {
        run(compose, opts).await.expect("decline is a clean no-op")
    }

    #[tokio::test]
    async fn test_missing_backup_dir_is_an_error() {
        let compose = Compose::docker_plugin();
        let opts = RestoreOptions {
            backup_dir: PathBuf::from("/nonexistent/backup-19700101-000000"),
            site: None,
            assume_yes: true,
            strict: false,
            confirm: || true,
        };

        let err = run(&compose, &opts).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
