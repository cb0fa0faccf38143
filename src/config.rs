//! Stack configuration persisted as a `.env` file.
//!
//! Loaded once into an explicit struct, mutated through `set`, and written
//! back only by `save` — operations never reach into the process environment.

use crate::presets::AppSource;
use crate::utils::errors::{Result, StackError};
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_SITE: &str = "frontend";
pub const DEFAULT_FRAPPE_VERSION: &str = "version-15";
pub const PROJECT_NAME: &str = "frappe_quickstart";
pub const IMAGE_NAME: &str = "frappe_quickstart:latest";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub frappe_version: String,
    pub site_name: String,
    pub admin_password: String,
    pub db_password: String,
    pub port: u16,
    pub project_name: String,
    pub image_name: String,
    pub preset: String,
    pub install_apps: String,
}

/// Generate an alphanumeric password.
pub fn generate_password(length: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

impl EnvConfig {
    /// Fresh configuration with generated credentials.
    pub fn generate(port: u16, preset: &str, frappe_version: &str, apps: &[AppSource]) -> Self {
        let install_apps = apps
            .iter()
            .map(|a| a.name())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(",");

        EnvConfig {
            frappe_version: frappe_version.to_string(),
            site_name: DEFAULT_SITE.to_string(),
            admin_password: generate_password(16),
            db_password: generate_password(16),
            port,
            project_name: PROJECT_NAME.to_string(),
            image_name: IMAGE_NAME.to_string(),
            preset: preset.to_string(),
            install_apps,
        }
    }

    /// Load from a `.env` file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StackError::Config(format!(
                "{} not found. Run `frappe-quickstart setup` first.",
                path.display()
            )));
        }

        let mut map = BTreeMap::new();
        for item in dotenvy::from_path_iter(path)
            .map_err(|e| StackError::Config(format!("failed to read {}: {e}", path.display())))?
        {
            let (key, value) =
                item.map_err(|e| StackError::Config(format!("malformed .env line: {e}")))?;
            map.insert(key, value);
        }

        let get = |key: &str| -> Result<String> {
            map.get(key)
                .cloned()
                .ok_or_else(|| StackError::Config(format!("missing key {key} in .env")))
        };

        let port: u16 = get("PORT")?
            .parse()
            .map_err(|_| StackError::Config("PORT is not a valid port number".to_string()))?;

        Ok(EnvConfig {
            frappe_version: get("FRAPPE_VERSION")?,
            site_name: get("SITE_NAME")?,
            admin_password: get("ADMIN_PASSWORD")?,
            db_password: get("DB_ROOT_PASSWORD")?,
            port,
            project_name: map
                .get("PROJECT_NAME")
                .cloned()
                .unwrap_or_else(|| PROJECT_NAME.to_string()),
            image_name: map
                .get("IMAGE_NAME")
                .cloned()
                .unwrap_or_else(|| IMAGE_NAME.to_string()),
            preset: map.get("PRESET").cloned().unwrap_or_default(),
            install_apps: map.get("INSTALL_APPS").cloned().unwrap_or_default(),
        })
    }

    /// Full `.env` rendering. The DB password is written under all three
    /// aliases the stack images read.
    pub fn render(&self) -> String {
        format!(
            "FRAPPE_VERSION={}\n\
             SITE_NAME={}\n\
             \n\
             ADMIN_PASSWORD={}\n\
             DB_ROOT_PASSWORD={}\n\
             MYSQL_ROOT_PASSWORD={}\n\
             MARIADB_ROOT_PASSWORD={}\n\
             \n\
             PORT={}\n\
             \n\
             PROJECT_NAME={}\n\
             IMAGE_NAME={}\n\
             \n\
             PRESET={}\n\
             \n\
             INSTALL_APPS={}\n",
            self.frappe_version,
            self.site_name,
            self.admin_password,
            self.db_password,
            self.db_password,
            self.db_password,
            self.port,
            self.project_name,
            self.image_name,
            self.preset,
            self.install_apps,
        )
    }

    /// Rendering with every `*PASSWORD*` line removed, for inclusion in
    /// backups.
    pub fn redacted(&self) -> String {
        self.render()
            .lines()
            .filter(|line| !line.contains("PASSWORD"))
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Update one recognized key. Unknown keys are an error rather than being
    /// silently created.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "FRAPPE_VERSION" => self.frappe_version = value.to_string(),
            "SITE_NAME" => self.site_name = value.to_string(),
            "ADMIN_PASSWORD" => self.admin_password = value.to_string(),
            "DB_ROOT_PASSWORD" => self.db_password = value.to_string(),
            "PORT" => {
                self.port = value
                    .parse()
                    .map_err(|_| StackError::InvalidInput(format!("invalid port: {value}")))?;
            }
            "PRESET" => self.preset = value.to_string(),
            "PROJECT_NAME" => self.project_name = value.to_string(),
            "IMAGE_NAME" => self.image_name = value.to_string(),
            "INSTALL_APPS" => self.install_apps = value.to_string(),
            _ => {
                return Err(StackError::InvalidInput(format!(
                    "unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }

    /// Read one recognized key.
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "FRAPPE_VERSION" => Ok(self.frappe_version.clone()),
            "SITE_NAME" => Ok(self.site_name.clone()),
            "ADMIN_PASSWORD" => Ok(self.admin_password.clone()),
            "DB_ROOT_PASSWORD" => Ok(self.db_password.clone()),
            "PORT" => Ok(self.port.to_string()),
            "PRESET" => Ok(self.preset.clone()),
            "PROJECT_NAME" => Ok(self.project_name.clone()),
            "IMAGE_NAME" => Ok(self.image_name.clone()),
            "INSTALL_APPS" => Ok(self.install_apps.clone()),
            _ => Err(StackError::InvalidInput(format!(
                "unknown configuration key: {key}"
            ))),
        }
    }

    /// Key/value view with passwords masked, for `config show`.
    pub fn display_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("FRAPPE_VERSION", self.frappe_version.clone()),
            ("SITE_NAME", self.site_name.clone()),
            ("ADMIN_PASSWORD", "********".to_string()),
            ("DB_ROOT_PASSWORD", "********".to_string()),
            ("PORT", self.port.to_string()),
            ("PROJECT_NAME", self.project_name.clone()),
            ("IMAGE_NAME", self.image_name.clone()),
            ("PRESET", self.preset.clone()),
            ("INSTALL_APPS", self.install_apps.clone()),
        ]
    }
}
