//! Error types for the shared vocabulary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Unknown realm name
    #[error("Unknown realm: {0}")]
    UnknownRealm(String),

    /// Unknown network type name
    #[error("Unknown network type: {0}")]
    UnknownNetworkType(String),

    /// Unknown channel identifier
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}
