// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid waypoint: expected 6 or 7 values, got {0}")]
    InvalidWaypoint(usize),

    #[error("Invalid side: {0}")]
    InvalidSide(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
