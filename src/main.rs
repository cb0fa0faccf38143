//! Frappe Quickstart - Main entry point
//!
//! One CLI for the whole stack lifecycle: setup, start/stop, health, backup,
//! restore, domain configuration.

use clap::{Parser, Subcommand};
use frappe_quickstart::backup::{self, BackupOptions};
use frappe_quickstart::compose::{Compose, BACKEND};
use frappe_quickstart::config::{DEFAULT_SITE, EnvConfig};
use frappe_quickstart::health::{self, HealthOptions};
use frappe_quickstart::presets::AppSource;
use frappe_quickstart::restore::{self, RestoreOptions};
use frappe_quickstart::setup::{self, SetupOptions};
use frappe_quickstart::utils::{logger, term};
use frappe_quickstart::domain;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set up a new stack: config, image build, services, site
    Setup {
        /// Preset configuration to use
        #[arg(long, default_value = "erp")]
        preset: String,

        /// Frappe version/branch to install
        #[arg(long, default_value = "version-15")]
        frappe_version: String,

        /// Port number to use (default: auto-detect from 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Do not open a browser after setup
        #[arg(long)]
        no_browser: bool,

        /// Clone app sources to apps/ for local development
        #[arg(long)]
        dev: bool,
    },

    /// Start all services
    Start,

    /// Stop all services
    Stop,

    /// Restart all services
    Restart,

    /// Show service status
    Status,

    /// Show service logs
    Logs {
        /// Service name (all services when omitted)
        service: Option<String>,

        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },

    /// Open a shell inside a service container
    Shell {
        #[arg(default_value = BACKEND)]
        service: String,
    },

    /// Run a bench command inside the backend container
    Bench {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List installed apps
    Apps,

    /// Back up a site to a timestamped directory
    Backup {
        /// Site to back up
        #[arg(long)]
        site: Option<String>,

        /// Output directory root
        #[arg(long, default_value = "backups")]
        output: PathBuf,

        /// Fail when the database dump cannot be collected
        #[arg(long)]
        strict: bool,
    },

    /// Restore a site from a backup directory
    Restore {
        /// Backup directory to restore from
        backup_dir: PathBuf,

        /// Target site (default: manifest site_name)
        #[arg(long)]
        site: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Treat advisory restore steps as hard failures
        #[arg(long)]
        strict: bool,
    },

    /// Pull newer images, restart, and migrate
    Update,

    /// Destroy the environment: containers and volumes
    Clean {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Generate reverse-proxy configs for a public domain
    Domain {
        #[arg(long)]
        subdomain: Option<String>,

        #[arg(long)]
        ip: Option<String>,

        #[arg(long)]
        port: Option<String>,
    },

    /// Show or change stack configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check stack health
    Health {
        /// Global deadline in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the configuration with passwords masked
    Show,
    /// Print one value
    Get { key: String },
    /// Update one value and save
    Set { key: String, value: String },
}

const ENV_FILE: &str = ".env";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logger::init(&cli.log_level) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            term::error(&format!("{e:#}"));
            ExitCode::from(1)
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Setup { preset, frappe_version, port, no_browser, dev } => {
            let opts = SetupOptions { preset, frappe_version, port, no_browser, dev };
            tokio::select! {
                result = setup::run(&opts) => result?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    term::warning("Setup cancelled by user");
                    return Ok(ExitCode::from(130));
                }
            }
        }

        Commands::Start => {
            let compose = Compose::detect().await?;
            compose.up_detached().await?;
            term::success("Services started");
        }

        Commands::Stop => {
            let compose = Compose::detect().await?;
            compose.stop().await?;
            term::success("Services stopped");
        }

        Commands::Restart => {
            let compose = Compose::detect().await?;
            compose.restart().await?;
            term::success("Services restarted");
        }

        Commands::Status => {
            let compose = Compose::detect().await?;
            let statuses = compose.ps().await?;
            if statuses.is_empty() {
                term::info("No services found. Run `frappe-quickstart setup` first.");
            } else {
                for s in statuses {
                    println!("{:<14} {}", s.service, s.state);
                }
            }
        }

        Commands::Logs { service, follow } => {
            let compose = Compose::detect().await?;
            compose.logs(service.as_deref(), follow).await?;
        }

        Commands::Shell { service } => {
            let compose = Compose::detect().await?;
            compose.exec(&service, &["bash"]).await?;
        }

        Commands::Bench { args } => {
            let compose = Compose::detect().await?;
            let mut argv = vec!["bench"];
            argv.extend(args.iter().map(String::as_str));
            compose.exec(BACKEND, &argv).await?;
        }

        Commands::Apps => {
            let content = std::fs::read_to_string("apps.json")
                .map_err(|_| anyhow::anyhow!("apps.json not found. Run setup first."))?;
            let apps: Vec<AppSource> = serde_json::from_str(&content)?;
            println!("{:<24} branch", "app");
            for app in &apps {
                println!("{:<24} {}", app.name(), app.branch);
            }
        }

        Commands::Backup { site, output, strict } => {
            let compose = Compose::detect().await?;
            let config = EnvConfig::load(Path::new(ENV_FILE))?;
            let opts = BackupOptions {
                site: site.unwrap_or_else(|| config.site_name.clone()),
                output_root: output,
                strict,
            };
            backup::run(&compose, &config, &opts).await?;
        }

        Commands::Restore { backup_dir, site, yes, strict } => {
            let compose = Compose::detect().await?;
            let opts = RestoreOptions {
                backup_dir,
                site,
                assume_yes: yes,
                strict,
                confirm: restore::confirm_on_stdin,
            };
            restore::run(&compose, &opts).await?;
        }

        Commands::Update => {
            let compose = Compose::detect().await?;
            term::step("Pulling images...");
            compose.pull().await?;
            term::step("Restarting services...");
            compose.up_detached().await?;
            term::step("Running schema migration...");
            let site = EnvConfig::load(Path::new(ENV_FILE))
                .map(|c| c.site_name)
                .unwrap_or_else(|_| DEFAULT_SITE.to_string());
            match compose
                .exec(BACKEND, &["bench", "--site", &site, "migrate"])
                .await
            {
                Ok(()) => term::success("Update complete"),
                Err(e) => term::warning(&format!("migration failed: {e}")),
            }
        }

        Commands::Clean { yes } => {
            term::warning("This will remove ALL containers and volumes!");
            if !yes && !term::confirm("All site data will be lost.") {
                term::info("Cancelled");
                return Ok(ExitCode::SUCCESS);
            }
            let compose = Compose::detect().await?;
            compose.down(true).await?;
            term::success("Environment destroyed");
            term::info("Run `frappe-quickstart setup` to set up again");
        }

        Commands::Domain { subdomain, ip, port } => {
            let compose = Compose::detect().await?;
            let site = EnvConfig::load(Path::new(ENV_FILE))
                .map(|c| c.site_name)
                .unwrap_or_else(|_| DEFAULT_SITE.to_string());
            domain::run(&compose, &site, subdomain, ip, port).await?;
        }

        Commands::Config { action } => {
            let path = Path::new(ENV_FILE);
            match action {
                ConfigAction::Show => {
                    let config = EnvConfig::load(path)?;
                    for (key, value) in config.display_pairs() {
                        println!("{key}={value}");
                    }
                }
                ConfigAction::Get { key } => {
                    let config = EnvConfig::load(path)?;
                    println!("{}", config.get(&key)?);
                }
                ConfigAction::Set { key, value } => {
                    let mut config = EnvConfig::load(path)?;
                    config.set(&key, &value)?;
                    config.save(path)?;
                    term::success(&format!("{key} updated"));
                }
            }
        }

        Commands::Health { timeout, verbose } => {
            let compose = Compose::detect().await?;
            let config = EnvConfig::load(Path::new(ENV_FILE))?;
            let opts = HealthOptions {
                deadline: Duration::from_secs(timeout),
                verbose,
                ..HealthOptions::default()
            };
            let report = health::check(&compose, config.port, &opts).await;
            return Ok(ExitCode::from(report.exit_code()));
        }
    }

    Ok(ExitCode::SUCCESS)
}
