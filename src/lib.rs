//! fanrelay - failover-aware fan-out relay
//!
//! A small HTTP service that fans requests out to backend replicas, joins
//! their results in order, and falls back to alternate replicas when one
//! fails. Trace context follows every request across tasks and scheduler
//! threads.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`resolver`] - Logical service names to ordered replica locations
//! - [`trace`] - Task-local trace context and B3 header propagation
//! - [`scheduler`] - Delayed and periodic work that keeps trace context
//! - [`client`] - Request templates, dispatch and sequential failover
//! - [`aggregate`] - Pending results and ordered fan-in
//! - [`handler`] - The echo, delay and fan-out operations
//! - [`server`] - axum routes, suspension and trace middleware
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use fanrelay::config::Config;
//! use fanrelay::server::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = RelayServer::new(Config::from_env()?)?;
//!     server
//!         .start_with_shutdown(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     server.shutdown();
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod resolver;
pub mod scheduler;
pub mod server;
pub mod trace;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregate::{join_all, PendingResult};
    pub use crate::client::{Dispatcher, FailoverClient, RequestTemplate};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, RelayErrorTrait, Result};
    pub use crate::handler::Orchestrator;
    pub use crate::resolver::{EndpointResolver, Location, LocationList, StaticResolver};
    pub use crate::scheduler::ContextScheduler;
    pub use crate::server::{RelayServer, Suspension};
    pub use crate::trace::TraceContext;
}
