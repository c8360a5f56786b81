// Backend Error (shared by all device ports)

use thiserror::Error;

/// Failures reported by a device adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    #[error("Handle already closed")]
    Closed,

    #[error("Invalid grasp model: {0}")]
    InvalidModel(String),

    #[error("Device error: {0}")]
    Device(String),
}
