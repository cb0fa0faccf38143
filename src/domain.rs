//! Domain/proxy configuration wizard.
//!
//! Collects a subdomain, public IPv4 address, and port — each re-prompted
//! until it validates — and renders nginx and Apache vhost files into
//! `proxy-configs/`. The rendered files are plain text for the operator to
//! install; nothing here touches a running proxy. Inputs only reach the
//! templates after validation, through the typed [`DomainContext`].

use crate::compose::{Compose, BACKEND};
use crate::utils::errors::{Result, StackError};
use crate::utils::term;
use crate::validate;
use std::path::{Path, PathBuf};

pub const OUTPUT_DIR: &str = "proxy-configs";

/// Validated template inputs.
#[derive(Debug, Clone)]
pub struct DomainContext {
    pub subdomain: String,
    pub server_ip: String,
    pub port: u16,
}

impl DomainContext {
    /// Build a context from raw strings, validating each field.
    pub fn new(subdomain: &str, server_ip: &str, port: &str) -> Result<Self> {
        if !validate::valid_subdomain(subdomain) {
            return Err(StackError::InvalidInput(format!(
                "invalid subdomain: {subdomain}"
            )));
        }
        if !validate::valid_ipv4(server_ip) {
            return Err(StackError::InvalidInput(format!(
                "invalid IPv4 address: {server_ip}"
            )));
        }
        if !validate::valid_port(port) {
            return Err(StackError::InvalidInput(format!("invalid port: {port}")));
        }
        Ok(DomainContext {
            subdomain: subdomain.to_string(),
            server_ip: server_ip.to_string(),
            port: port.parse().unwrap_or_default(),
        })
    }

    pub fn render_nginx(&self) -> String {
        format!(
            r#"server {{
    listen 80;
    server_name {subdomain};

    location / {{
        proxy_pass http://{ip}:{port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_read_timeout 120s;
    }}
}}
"#,
            subdomain = self.subdomain,
            ip = self.server_ip,
            port = self.port,
        )
    }

    pub fn render_apache(&self) -> String {
        format!(
            r#"<VirtualHost *:80>
    ServerName {subdomain}

    ProxyPreserveHost On
    ProxyPass / http://{ip}:{port}/
    ProxyPassReverse / http://{ip}:{port}/

    RewriteEngine On
    RewriteCond %{{HTTP:Upgrade}} =websocket [NC]
    RewriteRule /(.*) ws://{ip}:{port}/$1 [P,L]
</VirtualHost>
"#,
            subdomain = self.subdomain,
            ip = self.server_ip,
            port = self.port,
        )
    }

    /// Render both vhost files into `output_dir`.
    pub fn write_configs(&self, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(output_dir)?;
        let nginx = output_dir.join(format!("{}.nginx.conf", self.subdomain));
        let apache = output_dir.join(format!("{}.apache.conf", self.subdomain));
        std::fs::write(&nginx, self.render_nginx())?;
        std::fs::write(&apache, self.render_apache())?;
        Ok((nginx, apache))
    }
}

fn ask_until_valid(label: &str, prefill: Option<String>, check: fn(&str) -> bool) -> Option<String> {
    if let Some(value) = prefill {
        if check(&value) {
            return Some(value);
        }
        term::error(&format!("Invalid value for {label}: {value}"));
    }
    loop {
        let value = term::prompt(label)?;
        if check(&value) {
            return Some(value);
        }
        term::error(&format!("Invalid {label}, try again"));
    }
}

/// Interactive wizard entry point. Flags pre-fill individual answers.
pub async fn run(
    compose: &Compose,
    site: &str,
    subdomain: Option<String>,
    server_ip: Option<String>,
    port: Option<String>,
) -> anyhow::Result<()> {
    term::header("Domain Setup");

    let Some(subdomain) = ask_until_valid("Subdomain", subdomain, validate::valid_subdomain) else {
        anyhow::bail!("no subdomain provided");
    };
    let Some(server_ip) = ask_until_valid("Public IPv4 address", server_ip, validate::valid_ipv4)
    else {
        anyhow::bail!("no IP address provided");
    };
    let Some(port) = ask_until_valid("Stack port", port, validate::valid_port) else {
        anyhow::bail!("no port provided");
    };

    let ctx = DomainContext::new(&subdomain, &server_ip, &port)?;
    let (nginx, apache) = ctx.write_configs(Path::new(OUTPUT_DIR))?;
    term::success(&format!("Wrote {}", nginx.display()));
    term::success(&format!("Wrote {}", apache.display()));

    // Best-effort: point the framework at its public host name.
    let result = compose
        .exec_capture(
            BACKEND,
            &[
                "bench",
                "--site",
                site,
                "set-config",
                "host_name",
                &ctx.subdomain,
            ],
        )
        .await;
    match result {
        Ok(_) => term::success("Updated site host_name"),
        Err(e) => term::warning(&format!("Could not update site host_name: {e}")),
    }

    term::info("Install the rendered vhost into your reverse proxy and reload it");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_rejects_invalid_inputs() {
        assert!(DomainContext::new("-bad", "1.2.3.4", "80").is_err());
        assert!(DomainContext::new("ok", "256.1.1.1", "80").is_err());
        assert!(DomainContext::new("ok", "1.2.3.4", "0").is_err());
        assert!(DomainContext::new("ok", "1.2.3.4", "8080").is_ok());
    }

    #[test]
    fn test_render_substitutes_all_fields() {
        let ctx = DomainContext::new("erp", "203.0.113.9", "8080").unwrap();

        let nginx = ctx.render_nginx();
        assert!(nginx.contains("server_name erp;"));
        assert!(nginx.contains("proxy_pass http://203.0.113.9:8080;"));

        let apache = ctx.render_apache();
        assert!(apache.contains("ServerName erp"));
        assert!(apache.contains("ProxyPass / http://203.0.113.9:8080/"));
    }

    #[test]
    fn test_write_configs() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let ctx = DomainContext::new("erp", "203.0.113.9", "8080").unwrap();

        let (nginx, apache) = ctx.write_configs(dir.path()).unwrap();
        assert!(nginx.exists());
        assert!(apache.exists());

        let content = std::fs::read_to_string(nginx)?;
        assert!(!content.contains("{subdomain}"));
        Ok(())
    }
}
