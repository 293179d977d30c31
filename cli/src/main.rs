// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Beacon daemon
//!
//! The `beacon` binary wires the reconciliation engine to a concrete
//! master list and registry backend, then polls forever. Unresolved
//! configuration at startup is the only fatal condition; every runtime
//! error is contained to the cycle it occurred in.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use beacon_core::application::{Reconciler, RefreshLoop};
use beacon_core::infrastructure::consul::{ConsulConfig, ConsulRegistry};
use beacon_core::infrastructure::leader::{LeaderLocator, MasterListWatch};
use beacon_core::infrastructure::state_client::HttpStateClient;

/// Beacon - keep a service registry synchronized with orchestrator tasks
#[derive(Parser)]
#[command(name = "beacon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Comma-separated orchestrator master hostnames
    #[arg(long, env = "BEACON_MASTERS", value_delimiter = ',', required = true)]
    masters: Vec<String>,

    /// Port the orchestrator masters serve state on
    #[arg(long, env = "BEACON_MASTER_PORT", default_value = "5050")]
    master_port: u16,

    /// Base URL of the registry agent
    #[arg(long, env = "BEACON_REGISTRY", default_value = "http://127.0.0.1:8500")]
    registry: String,

    /// Registry ACL token
    #[arg(long, env = "BEACON_REGISTRY_TOKEN")]
    registry_token: Option<String>,

    /// Registry basic auth as user[:pass]
    #[arg(long, env = "BEACON_REGISTRY_AUTH", value_name = "USER[:PASS]")]
    registry_auth: Option<String>,

    /// Seconds between refresh cycles
    #[arg(long, env = "BEACON_REFRESH", default_value = "60")]
    refresh: u64,

    /// Seconds between leader probes
    #[arg(long, env = "BEACON_DETECT_INTERVAL", default_value = "30")]
    detect_interval: u64,

    /// Service id prefix marking registry entries as beacon-owned
    #[arg(long, env = "BEACON_SERVICE_PREFIX", default_value = "beacon")]
    service_prefix: String,

    /// Comma-separated tags attached to every registered service
    #[arg(long, env = "BEACON_SERVICE_TAGS", value_delimiter = ',', default_value = "")]
    service_tags: Vec<String>,

    /// Address the Prometheus metrics endpoint listens on
    #[arg(long, env = "BEACON_METRICS_ADDR", default_value = "127.0.0.1:9090")]
    metrics_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BEACON_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!(registry = %cli.registry, "using registry");
    info!(masters = ?cli.masters, port = cli.master_port, "using masters");

    PrometheusBuilder::new()
        .with_http_listener(cli.metrics_addr)
        .install()
        .context("Failed to install metrics exporter")?;
    info!(addr = %cli.metrics_addr, "metrics endpoint listening");

    let mut config = ConsulConfig::new(cli.registry, cli.service_prefix.clone());
    config.token = cli.registry_token;
    config.auth = cli
        .registry_auth
        .as_deref()
        .map(parse_auth)
        .transpose()
        .context("invalid --registry-auth")?;
    let registry = Arc::new(ConsulRegistry::new(config));

    let locator = LeaderLocator::new();
    locator.start_watch(MasterListWatch::new(
        cli.masters,
        cli.master_port,
        Duration::from_secs(cli.detect_interval),
    ));

    let tags: Vec<String> = cli
        .service_tags
        .into_iter()
        .filter(|tag| !tag.is_empty())
        .collect();

    let reconciler = Arc::new(Reconciler::new(
        locator,
        Arc::new(HttpStateClient::new()),
        registry,
        cli.service_prefix,
        tags,
    ));

    RefreshLoop::new(reconciler, Duration::from_secs(cli.refresh))
        .run()
        .await
}

/// Parse `user[:pass]` into basic-auth credentials.
fn parse_auth(spec: &str) -> Result<(String, Option<String>)> {
    let (user, pass) = match spec.split_once(':') {
        Some((user, pass)) => (user, Some(pass.to_string())),
        None => (spec, None),
    };
    if user.is_empty() {
        anyhow::bail!("expected user[:pass], got an empty user");
    }
    Ok((user.to_string(), pass))
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_user_only() {
        assert_eq!(parse_auth("bob").unwrap(), ("bob".to_string(), None));
    }

    #[test]
    fn test_parse_auth_user_and_pass() {
        assert_eq!(
            parse_auth("bob:hunter2").unwrap(),
            ("bob".to_string(), Some("hunter2".to_string()))
        );
    }

    #[test]
    fn test_parse_auth_rejects_empty_user() {
        assert!(parse_auth("").is_err());
        assert!(parse_auth(":hunter2").is_err());
    }

    #[test]
    fn test_cli_parses_metrics_addr() {
        let cli = Cli::try_parse_from([
            "beacon",
            "--masters",
            "master-1",
            "--metrics-addr",
            "0.0.0.0:9100",
        ])
        .unwrap();
        assert_eq!(cli.metrics_addr, SocketAddr::from(([0, 0, 0, 0], 9100)));
    }

    #[test]
    fn test_cli_metrics_addr_defaults_to_localhost() {
        let cli = Cli::try_parse_from(["beacon", "--masters", "master-1"]).unwrap();
        assert_eq!(cli.metrics_addr, SocketAddr::from(([127, 0, 0, 1], 9090)));
    }
}
