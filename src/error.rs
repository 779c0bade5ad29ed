//! Unified error handling for the fanrelay crate
//!
//! Every failure produced by the orchestration core travels through this
//! `Error` enum, either as the output of a [`PendingResult`] or as the
//! synchronous rejection of malformed input.
//!
//! # Architecture
//!
//! - [`RelayErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use fanrelay::error::{Error, RelayErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Another candidate may succeed: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```
//!
//! [`PendingResult`]: crate::aggregate::PendingResult

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::resolver::Location;

// Re-export domain-specific errors for convenience
pub use crate::config::ConfigError;
pub use crate::scheduler::error::SchedulerError;

/// Common trait for all fanrelay error types
pub trait RelayErrorTrait: std::error::Error {
    /// Check if this error is recoverable (another attempt may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Backend-facing errors (dispatch, failover, aggregation)
    Network,
    /// Malformed caller input or unknown names
    Input,
    /// Configuration and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Input => "input",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the fanrelay crate
#[derive(Error, Debug)]
pub enum Error {
    /// A single candidate dispatch failed
    #[error("Endpoint {location} unavailable: {reason}")]
    EndpointUnavailable { location: Location, reason: String },

    /// Every candidate in a failover chain failed
    #[error("All {attempts} endpoints exhausted, last tried {last}: {source}")]
    AllEndpointsExhausted {
        attempts: usize,
        last: Location,
        #[source]
        source: Box<Error>,
    },

    /// At least one fan-out member failed
    #[error("Fan-out member at index {index} failed ({total} members): {source}")]
    AggregateMemberFailed {
        index: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// Malformed input, rejected before any dispatch
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown logical service
    #[error("No locations known for service '{service}'")]
    NotFound { service: String },

    /// The protocol layer refused a suspension timeout extension
    #[error("Suspension timeout of {requested:?} was refused")]
    SuspensionTimeoutMisconfigured { requested: Duration },

    /// A suspended caller was resumed by its timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A spawned pending result panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP client errors outside of a dispatch
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RelayErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::EndpointUnavailable { .. } => true,
            Self::AllEndpointsExhausted { .. } | Self::AggregateMemberFailed { .. } => false,
            Self::InvalidArgument(_) | Self::NotFound { .. } => false,
            Self::SuspensionTimeoutMisconfigured { .. } => true,
            Self::Timeout(_) => true,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Config(_) => false,
            Self::Task(_) => false,
            Self::Io(_) => true,
            Self::Http(_) => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::EndpointUnavailable { .. }
            | Self::AllEndpointsExhausted { .. }
            | Self::AggregateMemberFailed { .. }
            | Self::Http(_)
            | Self::Timeout(_) => ErrorCategory::Network,
            Self::InvalidArgument(_) | Self::NotFound { .. } => ErrorCategory::Input,
            Self::SuspensionTimeoutMisconfigured { .. } | Self::Config(_) => ErrorCategory::Config,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Task(_) | Self::Io(_) => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an endpoint failure for one candidate
    pub fn endpoint_unavailable(location: &Location, reason: impl Into<String>) -> Self {
        Self::EndpointUnavailable {
            location: location.clone(),
            reason: reason.into(),
        }
    }

    /// Walk `source` links down to the innermost relay error
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::AllEndpointsExhausted { source, .. }
            | Self::AggregateMemberFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
