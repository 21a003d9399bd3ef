//! CommunityCar admin API server
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (0.0.0.0:8080, 100 requests per minute per client)
//! authz-api-server
//!
//! # Tighter rate limit and outcome-based auditing
//! authz-api-server --rate-limit 20 --audit-mode outcome
//!
//! # Enable debug logging
//! RUST_LOG=debug authz-api-server
//! ```
//!
//! Every option can also be supplied through the `API_SERVER_*` environment
//! variable shown in `--help`.

use anyhow::{Context, Result};
use clap::Parser;
use communitycar_api_server::{config::AppConfig, server::ServerBuilder, state::AppState};
use communitycar_authz::{AuditConfig, AuditMode, CacheConfig, PipelineConfig, RateLimitConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CommunityCar admin API server
#[derive(Parser, Debug)]
#[command(
    name = "authz-api-server",
    version,
    about = "Admin RBAC API with rate limiting, policy guards and audited commands",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "API_SERVER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "API_SERVER_PORT")]
    port: u16,

    /// Enable JSON logging format
    #[arg(long, env = "API_SERVER_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", env = "API_SERVER_LOG_LEVEL")]
    log_level: String,

    /// Requests allowed per client per window
    #[arg(long, default_value = "100", env = "API_SERVER_RATE_LIMIT")]
    rate_limit: u32,

    /// Rate limit window length in seconds
    #[arg(long, default_value = "60", env = "API_SERVER_RATE_LIMIT_WINDOW_SECS")]
    rate_limit_window_secs: u64,

    /// Maximum entries held by the query cache
    #[arg(long, default_value = "10000", env = "API_SERVER_CACHE_CAPACITY")]
    cache_capacity: usize,

    /// Requests slower than this are reported, in milliseconds
    #[arg(long, default_value = "500", env = "API_SERVER_SLOW_REQUEST_MS")]
    slow_request_ms: u64,

    /// When commands are audited: "attempt" (before the handler) or "outcome"
    #[arg(long, default_value = "attempt", env = "API_SERVER_AUDIT_MODE")]
    audit_mode: String,

    /// Upper bound on a single audit write, in milliseconds
    #[arg(long, default_value = "2000", env = "API_SERVER_AUDIT_TIMEOUT_MS")]
    audit_timeout_ms: u64,

    /// Key anonymous callers by the first x-forwarded-for hop (only behind a trusted proxy)
    #[arg(long, env = "API_SERVER_TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,

    /// Interval between sweeps of idle rate-limit windows, in seconds
    #[arg(long, default_value = "60", env = "API_SERVER_PURGE_INTERVAL_SECS")]
    purge_interval_secs: u64,
}

impl Args {
    fn app_config(&self) -> Result<AppConfig> {
        let audit_mode = self
            .audit_mode
            .parse::<AuditMode>()
            .context("Invalid --audit-mode")?;

        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("--rate-limit-window-secs must be greater than zero");
        }

        let config = AppConfig {
            cache: CacheConfig {
                capacity: self.cache_capacity,
            },
            ..Default::default()
        };

        Ok(config
            .with_rate_limit(RateLimitConfig {
                limit: self.rate_limit,
                window: Duration::from_secs(self.rate_limit_window_secs),
            })
            .with_pipeline(PipelineConfig {
                slow_request_threshold: Duration::from_millis(self.slow_request_ms),
                ..Default::default()
            })
            .with_audit(AuditConfig {
                mode: audit_mode,
                write_timeout: Duration::from_millis(self.audit_timeout_ms),
                ..Default::default()
            })
            .with_trust_forwarded_for(self.trust_forwarded_for))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!("Starting CommunityCar admin API server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = args.app_config()?;
    info!(
        rate_limit = config.rate_limit.limit,
        window_secs = config.rate_limit.window.as_secs(),
        audit_mode = ?config.audit.mode,
        trust_forwarded_for = config.trust_forwarded_for,
        "Application configuration loaded"
    );

    let state = Arc::new(AppState::new(&config).context("Failed to initialize application state")?);

    let server = ServerBuilder::new()
        .host(&args.host)
        .port(args.port)
        .purge_interval(Duration::from_secs(args.purge_interval_secs))
        .state(state)
        .build()?;

    info!("API documentation: http://{}:{}/api-docs/", args.host, args.port);
    info!("Health check: http://{}:{}/health", args.host, args.port);
    info!("Metrics: http://{}:{}/metrics", args.host, args.port);

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing/logging subsystem
fn init_tracing(args: &Args) -> Result<()> {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });
    let framework_level = if log_level <= tracing::Level::DEBUG { "info" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "communitycar_api_server={lvl},communitycar_authz={lvl},authz_api_server={lvl},tower_http={fw},axum={fw}",
            lvl = log_level,
            fw = framework_level
        )
        .into()
    });

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(vec!["authz-api-server"]);

        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8080);
        assert_eq!(args.rate_limit, 100);
        assert_eq!(args.rate_limit_window_secs, 60);
        assert_eq!(args.audit_mode, "attempt");
        assert!(!args.json_logs);
        assert!(!args.trust_forwarded_for);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(vec![
            "authz-api-server",
            "--host",
            "127.0.0.1",
            "--port",
            "9090",
            "--rate-limit",
            "20",
            "--audit-mode",
            "outcome",
            "--slow-request-ms",
            "250",
            "--trust-forwarded-for",
        ]);

        let config = args.app_config().unwrap();
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 9090);
        assert_eq!(config.rate_limit.limit, 20);
        assert_eq!(config.audit.mode, AuditMode::Outcome);
        assert_eq!(config.pipeline.slow_request_threshold, Duration::from_millis(250));
        assert!(config.trust_forwarded_for);
    }

    #[test]
    fn test_invalid_audit_mode_rejected() {
        let args = Args::parse_from(vec!["authz-api-server", "--audit-mode", "sometimes"]);
        assert!(args.app_config().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let args = Args::parse_from(vec!["authz-api-server", "--rate-limit-window-secs", "0"]);
        assert!(args.app_config().is_err());
    }
}
