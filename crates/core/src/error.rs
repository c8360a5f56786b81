// Central Error Type for the Application

use thiserror::Error;

use crate::domain::Side;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::port::BackendError),

    #[error("Device unavailable for {side} arm: {reason}")]
    DeviceUnavailable { side: Side, reason: String },

    #[error("Invalid grasp model for {side} hand: {reason}")]
    InvalidGraspModel { side: Side, reason: String },

    #[error("Motion not reached on {side} arm at {target}")]
    MotionNotReached { side: Side, target: String },

    #[error("Hand action '{action}' not completed on {side} hand")]
    ActionNotCompleted { side: Side, action: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Run-time failures that leave the cursor in place for a retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::MotionNotReached { .. } | AppError::ActionNotCompleted { .. }
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Poisoned locks only happen after a panic while holding the store lock
impl<T> From<std::sync::PoisonError<T>> for AppError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AppError::Internal(format!("lock poisoned: {}", err))
    }
}
