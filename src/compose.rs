//! Docker Compose wrapper for the fixed service topology.
//!
//! Resolves `docker compose` vs. the legacy `docker-compose` binary once, then
//! issues lifecycle commands against the stack. All invocations block until
//! the child exits; nothing here runs in parallel.

use crate::utils::errors::{Result, StackError};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// The fixed 11-service topology defined in `compose.yaml`.
pub const SERVICES: &[&str] = &[
    "backend",
    "frontend",
    "websocket",
    "queue-short",
    "queue-long",
    "scheduler",
    "db",
    "redis-cache",
    "redis-queue",
    "configurator",
    "create-site",
];

pub const BACKEND: &str = "backend";
pub const DB: &str = "db";
pub const REDIS_CACHE: &str = "redis-cache";
pub const REDIS_QUEUE: &str = "redis-queue";
pub const CREATE_SITE: &str = "create-site";

/// One line of `compose ps --format json` output.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatus {
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct Compose {
    program: &'static str,
    subcommand: Option<&'static str>,
}

impl Compose {
    /// Handle for the `docker compose` plugin, without probing for it.
    pub fn docker_plugin() -> Self {
        Compose { program: "docker", subcommand: Some("compose") }
    }

    /// Handle for the standalone `docker-compose` binary, without probing.
    pub fn standalone() -> Self {
        Compose { program: "docker-compose", subcommand: None }
    }

    /// Resolve which compose flavor is installed. Prefers the `docker compose`
    /// plugin, falls back to standalone `docker-compose`.
    pub async fn detect() -> Result<Self> {
        for candidate in [Self::docker_plugin(), Self::standalone()] {
            if candidate.probe_version().await {
                tracing::debug!("Using compose command: {}", candidate.display_name());
                return Ok(candidate);
            }
        }
        Err(StackError::ComposeUnavailable(
            "neither `docker compose` nor `docker-compose` responded".to_string(),
        ))
    }

    pub fn display_name(&self) -> String {
        match self.subcommand {
            Some(sub) => format!("{} {sub}", self.program),
            None => self.program.to_string(),
        }
    }

    async fn probe_version(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        matches!(
            tokio::time::timeout(Duration::from_secs(5), cmd.status()).await,
            Ok(Ok(status)) if status.success()
        )
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program);
        if let Some(sub) = self.subcommand {
            cmd.arg(sub);
        }
        cmd
    }

    /// Run a compose command with inherited stdio, failing on non-zero exit.
    pub async fn run(&self, args: &[&str]) -> Result<()> {
        let status = self.command().args(args).status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(StackError::CommandFailed {
                command: format!("{} {}", self.display_name(), args.join(" ")),
                status: status.code().unwrap_or(-1),
            })
        }
    }

    /// Run a compose command silently, ignoring the exit status.
    pub async fn run_quiet(&self, args: &[&str]) {
        let _ = self
            .command()
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
    }

    /// Run a compose command and capture stdout, failing on non-zero exit.
    pub async fn capture(&self, args: &[&str]) -> Result<String> {
        let output = self.command().args(args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(StackError::CommandFailed {
                command: format!("{} {}", self.display_name(), args.join(" ")),
                status: output.status.code().unwrap_or(-1),
            })
        }
    }

    pub async fn up_detached(&self) -> Result<()> {
        self.run(&["up", "-d"]).await
    }

    pub async fn down(&self, remove_volumes: bool) -> Result<()> {
        if remove_volumes {
            self.run(&["down", "-v", "--remove-orphans"]).await
        } else {
            self.run(&["down"]).await
        }
    }

    pub async fn stop(&self) -> Result<()> {
        self.run(&["stop"]).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.run(&["restart"]).await
    }

    pub async fn pull(&self) -> Result<()> {
        self.run(&["pull"]).await
    }

    /// `compose ps --all --format json`, one JSON object per line. Lines that
    /// fail to parse are skipped.
    pub async fn ps(&self) -> Result<Vec<ServiceStatus>> {
        let stdout = self.capture(&["ps", "--all", "--format", "json"]).await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    pub async fn is_running(&self, service: &str) -> bool {
        match self.ps().await {
            Ok(statuses) => statuses
                .iter()
                .any(|s| s.service == service && s.state == "running"),
            Err(_) => false,
        }
    }

    pub async fn logs(&self, service: Option<&str>, follow: bool) -> Result<()> {
        let mut args = vec!["logs"];
        if follow {
            args.push("-f");
        }
        if let Some(s) = service {
            args.push(s);
        }
        self.run(&args).await
    }

    /// Interactive exec with inherited stdio (shell, bench passthrough).
    pub async fn exec(&self, service: &str, argv: &[&str]) -> Result<()> {
        let mut args = vec!["exec", service];
        args.extend_from_slice(argv);
        self.run(&args).await
    }

    /// Exec with captured output.
    pub async fn exec_capture(&self, service: &str, argv: &[&str]) -> Result<String> {
        let mut args = vec!["exec", "-T", service];
        args.extend_from_slice(argv);
        self.capture(&args).await
    }

    /// Copy a path out of a service container to the host.
    pub async fn cp_from(&self, service: &str, container_path: &str, host_path: &str) -> Result<()> {
        let src = format!("{service}:{container_path}");
        self.run(&["cp", &src, host_path]).await
    }

    /// Copy a host path into a service container.
    pub async fn cp_to(&self, host_path: &str, service: &str, container_path: &str) -> Result<()> {
        let dst = format!("{service}:{container_path}");
        self.run(&["cp", host_path, &dst]).await
    }
}

/// Probe for `docker` and a compose flavor, reporting what was found.
/// Returns false if either is missing.
pub async fn check_dependencies() -> bool {
    let docker_ok = matches!(
        tokio::time::timeout(
            Duration::from_secs(5),
            Command::new("docker")
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status(),
        )
        .await,
        Ok(Ok(status)) if status.success()
    );

    if docker_ok {
        crate::utils::term::success("docker found");
    } else {
        crate::utils::term::error("docker not found");
    }

    let compose_ok = Compose::detect().await.is_ok();
    if compose_ok {
        crate::utils::term::success("docker compose found");
    } else {
        crate::utils::term::error("docker compose not found");
    }

    docker_ok && compose_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_line() {
        let line = r#"{"Service":"create-site","State":"exited","ExitCode":0}"#;
        let status: ServiceStatus = serde_json::from_str(line).unwrap();
        assert_eq!(status.service, "create-site");
        assert_eq!(status.state, "exited");
        assert_eq!(status.exit_code, 0);
    }

    #[test]
    fn test_parse_ps_line_without_exit_code() {
        let line = r#"{"Service":"backend","State":"running"}"#;
        let status: ServiceStatus = serde_json::from_str(line).unwrap();
        assert_eq!(status.exit_code, 0);
    }

    #[test]
    fn test_topology_has_eleven_services() {
        assert_eq!(SERVICES.len(), 11);
        assert!(SERVICES.contains(&BACKEND));
        assert!(SERVICES.contains(&DB));
    }
}
