//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The task was cancelled before it started
    Cancelled,

    /// The scheduler was already shut down when the task was submitted
    ShutDown,

    /// The task body panicked
    TaskPanicked {
        message: String,
    },

    /// A periodic task was given a zero period
    InvalidPeriod {
        field: String,
    },

    /// The worker runtime could not be started
    RuntimeInit {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Task was cancelled before it ran"),
            Self::ShutDown => write!(f, "Scheduler is shut down"),
            Self::TaskPanicked { message } => write!(f, "Task panicked: {}", message),
            Self::InvalidPeriod { field } => {
                write!(f, "Invalid period for '{}': must be greater than zero", field)
            }
            Self::RuntimeInit { reason } => {
                write!(f, "Failed to start scheduler runtime: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a task panicked error
    pub fn task_panicked(message: impl Into<String>) -> Self {
        Self::TaskPanicked {
            message: message.into(),
        }
    }

    /// Create an invalid period error
    pub fn invalid_period(field: impl Into<String>) -> Self {
        Self::InvalidPeriod {
            field: field.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TaskPanicked { .. })
    }
}
