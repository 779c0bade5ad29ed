//! HTTP surface of the relay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Relay Server             │
//! │                                     │
//! │  ┌──────────────────────────────┐  │
//! │  │   B3 trace context layer     │  │
//! │  └──────────────────────────────┘  │
//! │                                     │
//! │  ┌──────────────────────────────┐  │
//! │  │   Routes + Suspension        │  │
//! │  │  GET /brave/echo/{text}      │  │
//! │  │  GET /brave/delay/{age}      │  │
//! │  │  GET /brave/call/{how_many}  │  │
//! │  │  GET /health, /metrics       │  │
//! │  └──────────────────────────────┘  │
//! │                                     │
//! │  ┌──────────────────────────────┐  │
//! │  │   Orchestrator               │  │
//! │  └──────────────────────────────┘  │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fanrelay::config::Config;
//! use fanrelay::server::RelayServer;
//!
//! let server = RelayServer::new(Config::default())?;
//! server.start_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! server.shutdown();
//! ```

pub mod api;
pub mod middleware;
pub mod suspension;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::handler::Orchestrator;

pub use api::{create_router, status_for, HealthResponse};
pub use suspension::Suspension;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Request orchestration
    pub orchestrator: Arc<Orchestrator>,

    /// Server start time
    pub start_time: Instant,

    /// Server configuration
    pub config: ServerConfig,
}

// ============================================================================
// Relay Server
// ============================================================================

/// HTTP server in front of the orchestrator
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
}

impl RelayServer {
    /// Validate `config` and build the production orchestrator
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
        Ok(Self::with_orchestrator(config.server, orchestrator))
    }

    /// Serve an already assembled orchestrator
    pub fn with_orchestrator(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> Self {
        let state = AppState {
            orchestrator,
            start_time: Instant::now(),
            config: config.clone(),
        };
        Self { config, state }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        Ok(listener)
    }

    /// Serve on `listener` until `shutdown_signal` completes
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        tracing::info!(address = ?listener.local_addr().ok(), "Relay server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        tracing::info!("Relay server shutdown complete");
        Ok(())
    }

    /// Bind the configured address and serve with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_signal).await
    }

    /// Cancel scheduled work that has not started yet
    pub fn shutdown(&self) {
        self.state.orchestrator.shutdown();
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            default_timeout_secs: self.config.default_timeout_secs,
            max_suspend_timeout_secs: self.config.max_suspend_timeout_secs,
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub default_timeout_secs: u64,
    pub max_suspend_timeout_secs: u64,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Relay Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Suspension Timeout: {}s (max {}s)\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.default_timeout_secs,
            self.max_suspend_timeout_secs,
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
