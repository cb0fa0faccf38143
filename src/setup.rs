//! First-run setup: from nothing to a running stack.
//!
//! Sequence: dependency check, preset load, port selection, credential
//! generation, `.env` + `apps.json` creation, optional app clones for
//! development, image build, compose start, and a bounded wait for the
//! one-shot `create-site` service to finish.

use crate::compose::{self, Compose, CREATE_SITE};
use crate::config::EnvConfig;
use crate::presets::{self, AppSource};
use crate::utils::term;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

const PORT_SCAN_START: u16 = 8080;
const PORT_SCAN_TRIES: u16 = 100;
const SITE_CREATION_TIMEOUT: Duration = Duration::from_secs(300);
const SITE_CREATION_INTERVAL: Duration = Duration::from_secs(3);

const FRAPPE_REPO: &str = "https://github.com/frappe/frappe";

#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub preset: String,
    pub frappe_version: String,
    pub port: Option<u16>,
    pub no_browser: bool,
    /// Clone app sources to `apps/` for local development.
    pub dev: bool,
}

/// First free TCP port starting at 8080.
pub fn find_available_port(start: u16, tries: u16) -> Option<u16> {
    (start..start.saturating_add(tries)).find(|port| TcpListener::bind(("0.0.0.0", *port)).is_ok())
}

pub async fn run(opts: &SetupOptions) -> anyhow::Result<()> {
    term::header("Checking Dependencies");
    if !compose::check_dependencies().await {
        anyhow::bail!(
            "missing required dependencies; install Docker and Docker Compose first"
        );
    }
    let compose = Compose::detect().await?;

    term::header("Validating Configuration");
    let presets_dir = Path::new("presets");
    if !presets::valid_preset_name(presets_dir, &opts.preset) {
        anyhow::bail!(
            "unknown preset '{}'. Available presets: {}",
            opts.preset,
            presets::available_presets(presets_dir).join(", ")
        );
    }
    let apps = presets::load_preset(presets_dir, &opts.preset)?;
    term::success(&format!(
        "Loaded preset '{}' with {} app(s)",
        opts.preset,
        apps.len()
    ));

    term::header("Configuring Network");
    let port = match opts.port {
        Some(p) => {
            term::info(&format!("Using specified port: {p}"));
            p
        }
        None => {
            let p = find_available_port(PORT_SCAN_START, PORT_SCAN_TRIES).ok_or_else(|| {
                anyhow::anyhow!(
                    "no available port found in range {}-{}",
                    PORT_SCAN_START,
                    PORT_SCAN_START + PORT_SCAN_TRIES
                )
            })?;
            term::success(&format!("Port {p} is available"));
            p
        }
    };

    term::header("Creating Configuration");
    let config = EnvConfig::generate(port, &opts.preset, &opts.frappe_version, &apps);
    config.save(Path::new(".env"))?;
    term::success(".env file created");

    std::fs::write("apps.json", serde_json::to_string_pretty(&apps)?)?;
    term::success(&format!("apps.json created from '{}' preset", opts.preset));

    if opts.dev {
        term::header("Setting Up Apps");
        clone_apps(&apps, &opts.frappe_version).await?;
    }

    term::header("Building Docker Image");
    term::info(&format!("Building with Frappe {}", opts.frappe_version));
    term::info("This may take 5-10 minutes on first run...");
    build_image(&config.image_name, &apps, &opts.frappe_version).await?;
    term::success("Build complete");

    term::header("Starting Services");
    // Clean start: drop any previous volumes so create-site runs fresh.
    compose.run_quiet(&["down", "-v", "--remove-orphans"]).await;
    compose.up_detached().await?;
    term::success("Services started");

    term::header("Creating Site");
    term::info("This may take 2-3 minutes...");
    wait_for_site_creation(&compose, SITE_CREATION_TIMEOUT).await?;
    term::success("Site created successfully");

    if !opts.no_browser {
        let url = format!("http://localhost:{port}");
        if webbrowser::open(&url).is_ok() {
            term::success("Browser opened");
        } else {
            term::info(&format!("Please open: {url}"));
        }
    }

    print_completion(&config, opts);
    Ok(())
}

/// Clone the framework and every preset app into `apps/`, skipping clones
/// that already exist.
async fn clone_apps(apps: &[AppSource], frappe_version: &str) -> anyhow::Result<()> {
    let apps_dir = Path::new("apps");
    std::fs::create_dir_all(apps_dir)?;

    let frappe_dir = apps_dir.join("frappe");
    if frappe_dir.exists() {
        term::info("Frappe framework already exists, skipping clone");
    } else {
        term::step(&format!("Cloning Frappe framework ({frappe_version})..."));
        git_clone(FRAPPE_REPO, frappe_version, &frappe_dir).await?;
        term::success("Frappe framework cloned");
    }

    for app in apps {
        let name = app.name();
        if name.is_empty() {
            continue;
        }
        let app_dir = apps_dir.join(&name);
        if app_dir.exists() {
            term::info(&format!("{name} already exists, skipping clone"));
            continue;
        }
        term::step(&format!("Cloning {name} ({})...", app.branch));
        git_clone(&app.url, &app.branch, &app_dir).await?;
        term::success(&format!("{name} cloned"));
    }

    Ok(())
}

async fn git_clone(url: &str, branch: &str, dest: &Path) -> anyhow::Result<()> {
    let status = Command::new("git")
        .args(["clone", url, "--branch", branch, "--depth", "1"])
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if !status.success() {
        anyhow::bail!("failed to clone {url} (branch {branch})");
    }
    Ok(())
}

async fn build_image(
    image_name: &str,
    apps: &[AppSource],
    frappe_version: &str,
) -> anyhow::Result<()> {
    let apps_json = serde_json::to_string_pretty(apps)?;
    let apps_b64 = BASE64.encode(apps_json.as_bytes());

    let status = Command::new("docker")
        .args([
            "build",
            "--build-arg",
            &format!("APPS_JSON_BASE64={apps_b64}"),
            "--build-arg",
            &format!("FRAPPE_BRANCH={frappe_version}"),
            "-t",
            image_name,
            "-f",
            "Dockerfile",
            ".",
        ])
        .status()
        .await?;
    if !status.success() {
        anyhow::bail!("docker build failed");
    }
    Ok(())
}

/// Poll the one-shot `create-site` service until it exits. Exit 0 means the
/// site is ready; a non-zero exit or hitting the timeout fails the setup.
async fn wait_for_site_creation(compose: &Compose, timeout: Duration) -> anyhow::Result<()> {
    let start = Instant::now();

    while start.elapsed() < timeout {
        if let Ok(statuses) = compose.ps().await {
            if let Some(status) = statuses.iter().find(|s| s.service == CREATE_SITE) {
                if status.state == "exited" {
                    if status.exit_code == 0 {
                        return Ok(());
                    }
                    anyhow::bail!(
                        "site creation failed with exit code {}; view logs with: {} logs {CREATE_SITE}",
                        status.exit_code,
                        compose.display_name(),
                    );
                }
            }
        }
        tracing::debug!(
            "Site creation in progress ({}s elapsed)",
            start.elapsed().as_secs()
        );
        tokio::time::sleep(SITE_CREATION_INTERVAL).await;
    }

    anyhow::bail!(
        "site creation timed out after {} seconds",
        timeout.as_secs()
    )
}

fn print_completion(config: &EnvConfig, opts: &SetupOptions) {
    term::header("Setup Complete!");
    println!();
    println!("{}", term::bold("Access Information:"));
    println!("  URL:      http://localhost:{}", config.port);
    println!("  Username: Administrator");
    println!("  Password: {}", config.admin_password);
    println!();
    println!("{}", term::bold("Configuration:"));
    println!("  Preset:   {}", opts.preset);
    println!("  Version:  {}", opts.frappe_version);
    println!();
    println!("{}", term::bold("Management Commands:"));
    println!("  Status:   frappe-quickstart status");
    println!("  Logs:     frappe-quickstart logs backend");
    println!("  Shell:    frappe-quickstart shell");
    println!("  Health:   frappe-quickstart health");
    println!("  Stop:     frappe-quickstart stop");
    println!();
    term::warning("Save your password somewhere safe!");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_available_port() {
        // Hold one port, then ask for a scan starting there.
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let held = listener.local_addr().unwrap().port();

        let found = find_available_port(held, 10).unwrap();
        assert_ne!(found, held);
        assert!(found > held);
    }

    #[test]
    fn test_find_available_port_exhausted() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let held = listener.local_addr().unwrap().port();

        assert_eq!(find_available_port(held, 1), None);
    }

    #[test]
    fn test_apps_json_base64_round_trip() {
        let apps = vec![AppSource {
            url: "https://github.com/frappe/erpnext".to_string(),
            branch: "version-15".to_string(),
        }];
        let json = serde_json::to_string_pretty(&apps).unwrap();
        let encoded = BASE64.encode(json.as_bytes());
        let decoded = BASE64.decode(encoded).unwrap();
        let parsed: Vec<AppSource> = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(parsed, apps);
    }
}
