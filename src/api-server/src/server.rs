//! HTTP server setup and lifecycle management
//!
//! This module handles:
//! - Server initialization and configuration
//! - Graceful shutdown on signals (SIGTERM, SIGINT)
//! - Periodic purge of idle rate-limit windows

use crate::{routes, state::AppState};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// How often expired rate-limit windows are dropped
    pub purge_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            purge_interval: Duration::from_secs(60),
        }
    }
}

/// HTTP server instance
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Start the server and block until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!("Starting CommunityCar admin API server");
        info!("Configuration: {:?}", self.config);

        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        let local_addr = listener.local_addr()?;
        info!("Server listening on http://{}", local_addr);
        info!("API documentation available at http://{}/api-docs/", local_addr);

        let shutdown = CancellationToken::new();
        let sweeper = tokio::spawn(purge_rate_limit_windows(
            self.state.clone(),
            self.config.purge_interval,
            shutdown.clone(),
        ));

        let app = routes::create_router(self.state.clone());

        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error");

        shutdown.cancel();
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Rate limit sweeper did not stop cleanly");
        }

        served?;
        info!("Server shutdown complete");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

async fn purge_rate_limit_windows(state: Arc<AppState>, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                state.rate_limiter.purge_expired();
            }
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

/// Builder for creating a server with custom configuration
pub struct ServerBuilder {
    config: ServerConfig,
    state: Option<Arc<AppState>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            state: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn purge_interval(mut self, every: Duration) -> Self {
        self.config.purge_interval = every;
        self
    }

    pub fn state(mut self, state: Arc<AppState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> Result<Server> {
        let state = self.state.context("Application state is required")?;
        if self.config.purge_interval.is_zero() {
            anyhow::bail!("purge interval must be greater than zero");
        }

        Ok(Server::new(self.config, state))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use communitycar_authz::{ManualClock, RateLimitConfig};

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(&AppConfig::default()).unwrap())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.purge_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_server_builder() {
        let server = ServerBuilder::new()
            .host("127.0.0.1")
            .port(9090)
            .purge_interval(Duration::from_secs(5))
            .state(state())
            .build()
            .unwrap();

        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 9090);
        assert_eq!(server.config().purge_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_server_builder_missing_state() {
        let result = ServerBuilder::new().build();
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("state"));
    }

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let clock = Arc::new(ManualClock::new());
        let config = AppConfig::default().with_rate_limit(RateLimitConfig {
            limit: 10,
            window: Duration::from_secs(1),
        });
        let state = Arc::new(AppState::with_clock(&config, clock.clone()).unwrap());
        state.rate_limiter.check("ip:198.51.100.1");
        clock.advance(Duration::from_secs(2));

        let shutdown = CancellationToken::new();
        let sweeper = tokio::spawn(purge_rate_limit_windows(
            state.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.rate_limiter.tracked_clients(), 0);

        shutdown.cancel();
        sweeper.await.unwrap();
    }
}
