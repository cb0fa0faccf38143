//! Stack health checking.
//!
//! Five probes run sequentially in a fixed order: database ping, cache-Redis
//! ping, queue-Redis ping, frontend HTTP, backend API HTTP. Each probe is a
//! bounded retry loop over the shared [`poll_until`] helper. The backend API
//! probe is advisory: the stack can be serving traffic before the API warms
//! up, so its failure is reported but never flips the overall result.

use crate::compose::{Compose, DB, REDIS_CACHE, REDIS_QUEUE};
use crate::utils::term;
use std::future::Future;
use std::time::{Duration, Instant};

/// Exit codes for the `health` subcommand.
pub const EXIT_HEALTHY: u8 = 0;
pub const EXIT_UNHEALTHY: u8 = 1;
pub const EXIT_TIMEOUT: u8 = 2;

/// Retry `probe` every `interval` until it returns true or `timeout` elapses.
pub async fn poll_until<F, Fut>(mut probe: F, interval: Duration, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if probe().await {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

#[derive(Debug, Clone)]
pub struct HealthOptions {
    /// Per-probe retry window.
    pub probe_timeout: Duration,
    /// Fixed retry interval.
    pub interval: Duration,
    /// Global wall-clock deadline across all probes.
    pub deadline: Duration,
    pub verbose: bool,
}

impl Default for HealthOptions {
    fn default() -> Self {
        HealthOptions {
            probe_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(120),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub name: &'static str,
    pub healthy: bool,
    /// Advisory probes never affect the overall result.
    pub advisory: bool,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub results: Vec<ProbeResult>,
    pub elapsed: Duration,
    pub deadline: Duration,
}

impl HealthReport {
    /// AND of the required (non-advisory) probes.
    pub fn all_healthy(&self) -> bool {
        self.results.iter().filter(|r| !r.advisory).all(|r| r.healthy)
    }

    pub fn timed_out(&self) -> bool {
        self.elapsed >= self.deadline
    }

    /// Timeout takes priority over the health outcome.
    pub fn exit_code(&self) -> u8 {
        if self.timed_out() {
            EXIT_TIMEOUT
        } else if self.all_healthy() {
            EXIT_HEALTHY
        } else {
            EXIT_UNHEALTHY
        }
    }
}

/// Run all five probes sequentially and report.
pub async fn check(compose: &Compose, port: u16, opts: &HealthOptions) -> HealthReport {
    let start = Instant::now();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let frontend_url = format!("http://localhost:{port}/");
    let backend_url = format!("http://localhost:{port}/api/method/ping");
    let client = &client;
    let frontend_url = frontend_url.as_str();
    let backend_url = backend_url.as_str();

    let mut results = Vec::with_capacity(5);

    results.push(
        run_probe("database", false, opts, move || async move {
            compose
                .exec_capture(DB, &["mysqladmin", "ping", "-h", "localhost"])
                .await
                .is_ok()
        })
        .await,
    );

    for (name, service) in [("redis-cache", REDIS_CACHE), ("redis-queue", REDIS_QUEUE)] {
        results.push(
            run_probe(name, false, opts, move || async move {
                compose
                    .exec_capture(service, &["redis-cli", "ping"])
                    .await
                    .map(|out| out.contains("PONG"))
                    .unwrap_or(false)
            })
            .await,
        );
    }

    results.push(
        run_probe("frontend-http", false, opts, move || async move {
            http_ok(client, frontend_url).await
        })
        .await,
    );

    // Advisory: the API endpoint can lag behind the web proxy without the
    // stack being unusable.
    results.push(
        run_probe("backend-api", true, opts, move || async move {
            http_ok(client, backend_url).await
        })
        .await,
    );

    let report = HealthReport {
        results,
        elapsed: start.elapsed(),
        deadline: opts.deadline,
    };

    if report.timed_out() {
        tracing::warn!(
            "Health check exceeded the {}s deadline (took {}s)",
            report.deadline.as_secs(),
            report.elapsed.as_secs()
        );
    }
    report
}

async fn run_probe<F, Fut>(
    name: &'static str,
    advisory: bool,
    opts: &HealthOptions,
    probe: F,
) -> ProbeResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if opts.verbose {
        term::step(&format!("Probing {name}..."));
    }
    let healthy = poll_until(probe, opts.interval, opts.probe_timeout).await;
    match (healthy, advisory) {
        (true, _) => term::success(&format!("{name} healthy")),
        (false, true) => term::warning(&format!("{name} inconclusive (advisory)")),
        (false, false) => term::error(&format!("{name} unhealthy")),
    }
    ProbeResult { name, healthy, advisory }
}

async fn http_ok(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn result(name: &'static str, healthy: bool, advisory: bool) -> ProbeResult {
        ProbeResult { name, healthy, advisory }
    }

    fn report(results: Vec<ProbeResult>, elapsed: u64, deadline: u64) -> HealthReport {
        HealthReport {
            results,
            elapsed: Duration::from_secs(elapsed),
            deadline: Duration::from_secs(deadline),
        }
    }

    fn all_probes(db: bool, cache: bool, queue: bool, frontend: bool, backend: bool) -> Vec<ProbeResult> {
        vec![
            result("database", db, false),
            result("redis-cache", cache, false),
            result("redis-queue", queue, false),
            result("frontend-http", frontend, false),
            result("backend-api", backend, true),
        ]
    }

    #[tokio::test]
    async fn test_poll_until_succeeds_after_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let ok = poll_until(
            move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await;

        assert!(ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_gives_up_at_timeout() {
        let ok = poll_until(
            || async { false },
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .await;
        assert!(!ok);
    }

    #[test]
    fn test_exit_code_all_healthy() {
        let r = report(all_probes(true, true, true, true, true), 10, 120);
        assert_eq!(r.exit_code(), EXIT_HEALTHY);
    }

    #[test]
    fn test_backend_probe_is_advisory() {
        let r = report(all_probes(true, true, true, true, false), 10, 120);
        assert!(r.all_healthy());
        assert_eq!(r.exit_code(), EXIT_HEALTHY);
    }

    #[test]
    fn test_database_failure_is_unhealthy() {
        let r = report(all_probes(false, true, true, true, true), 10, 120);
        assert!(!r.all_healthy());
        assert_eq!(r.exit_code(), EXIT_UNHEALTHY);
    }

    #[test]
    fn test_timeout_takes_priority() {
        // Healthy but past the deadline still reports a timeout.
        let r = report(all_probes(true, true, true, true, true), 120, 120);
        assert_eq!(r.exit_code(), EXIT_TIMEOUT);

        let r = report(all_probes(false, true, true, true, true), 300, 120);
        assert_eq!(r.exit_code(), EXIT_TIMEOUT);
    }
}
