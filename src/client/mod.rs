//! Outbound requests with endpoint failover
//!
//! - [`template`] - request templates bound to a location at dispatch time
//! - [`dispatch`] - the transport seam and its reqwest implementation
//! - [`failover`] - sequential fallback across a location list

pub mod dispatch;
pub mod failover;
pub mod template;

pub use dispatch::{Dispatcher, HttpDispatcher};
pub use failover::{run_chain, FailoverClient};
pub use template::{RequestTemplate, ResolvedRequest, HOST_AND_PORT};
