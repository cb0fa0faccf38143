//! Preset catalog: named lists of app sources to install into an image build.
//!
//! A preset file is a JSON array of `{url, branch}` descriptors under
//! `presets/`. The closed built-in catalog ships with the repo; any other
//! `.json` file dropped into the directory is picked up as a user preset.

use crate::utils::errors::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in preset names shipped under `presets/`.
pub const BUILTIN_PRESETS: &[&str] = &[
    "minimal",
    "erp",
    "crm",
    "education",
    "ecommerce",
    "healthcare",
];

/// A single app source within a preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSource {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

impl AppSource {
    /// App name derived from the repo URL: last path segment, `.git` stripped.
    pub fn name(&self) -> String {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
            .trim_end_matches(".git")
            .to_string()
    }
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PRESETS.contains(&name)
}

/// Preset-name check: the built-in catalog plus any user preset file present
/// in `presets_dir`.
pub fn valid_preset_name(presets_dir: &Path, name: &str) -> bool {
    is_builtin(name) || available_presets(presets_dir).iter().any(|p| p == name)
}

/// Enumerate preset names available in `presets_dir` (file stems of `*.json`).
pub fn available_presets(presets_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(presets_dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

/// Load a preset by name from `presets_dir`.
pub fn load_preset(presets_dir: &Path, name: &str) -> Result<Vec<AppSource>> {
    let path: PathBuf = presets_dir.join(format!("{name}.json"));

    if !path.exists() {
        return Err(StackError::PresetNotFound {
            name: name.to_string(),
            available: available_presets(presets_dir).join(", "),
        });
    }

    let content = std::fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| StackError::InvalidPreset(name.to_string(), e.to_string()))?;

    if !value.is_array() {
        return Err(StackError::InvalidPreset(
            name.to_string(),
            "preset file must contain a JSON array".to_string(),
        ));
    }

    let apps: Vec<AppSource> = serde_json::from_value(value)
        .map_err(|e| StackError::InvalidPreset(name.to_string(), e.to_string()))?;
    Ok(apps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_app_name_from_url() {
        let app = AppSource {
            url: "https://github.com/frappe/erpnext".to_string(),
            branch: "version-15".to_string(),
        };
        assert_eq!(app.name(), "erpnext");

        let app = AppSource {
            url: "https://github.com/frappe/hrms.git/".to_string(),
            branch: "main".to_string(),
        };
        assert_eq!(app.name(), "hrms");
    }

    #[test]
    fn test_load_preset() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join("erp.json"),
            r#"[{"url": "https://github.com/frappe/erpnext", "branch": "version-15"}]"#,
        )?;

        let apps = load_preset(dir.path(), "erp").unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name(), "erpnext");
        assert_eq!(apps[0].branch, "version-15");
        Ok(())
    }

    #[test]
    fn test_load_preset_missing_lists_available() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("minimal.json"), "[]")?;

        let err = load_preset(dir.path(), "nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("minimal"));
        Ok(())
    }

    #[test]
    fn test_load_preset_rejects_non_array() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("bad.json"), r#"{"url": "x"}"#)?;

        assert!(load_preset(dir.path(), "bad").is_err());
        Ok(())
    }

    #[test]
    fn test_default_branch() {
        let apps: Vec<AppSource> =
            serde_json::from_str(r#"[{"url": "https://github.com/frappe/hrms"}]"#).unwrap();
        assert_eq!(apps[0].branch, "main");
    }

    #[test]
    fn test_valid_preset_name() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("custom.json"), "[]")?;

        // Built-ins validate even without a file on disk.
        assert!(valid_preset_name(dir.path(), "erp"));
        assert!(valid_preset_name(dir.path(), "healthcare"));
        // User preset files validate too.
        assert!(valid_preset_name(dir.path(), "custom"));
        assert!(!valid_preset_name(dir.path(), "unknown"));
        Ok(())
    }

    #[test]
    fn test_available_presets_sorted() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("erp.json"), "[]")?;
        fs::write(dir.path().join("crm.json"), "[]")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        assert_eq!(available_presets(dir.path()), vec!["crm", "erp"]);
        Ok(())
    }
}
