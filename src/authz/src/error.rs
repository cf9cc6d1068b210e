//! Error types for the authorization core

use thiserror::Error;

use crate::scope::ScopeError;

/// Authorization core errors
///
/// Decisions never surface these; they are reserved for session lifecycle,
/// configuration and policy loading.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Token could not be decoded into a session
    #[error("Token decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Session was revoked and cannot be refreshed
    #[error("Session revoked: {0}")]
    SessionRevoked(String),

    /// Session expired beyond the refresh grace window
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Invalid policy definition
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Invalid scope literal in configuration
    #[error("Invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Reasons a raw token cannot become a [`Session`](crate::session::Session)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not a three-part `header.payload.signature` structure
    #[error("Malformed token: expected 3 parts, found {0}")]
    Malformed(usize),

    /// A part is not valid base64url
    #[error("Invalid base64 in token {part}: {message}")]
    Base64 { part: &'static str, message: String },

    /// A part is not valid JSON of the expected shape
    #[error("Invalid JSON in token {part}: {message}")]
    Json { part: &'static str, message: String },

    /// Claims decoded but violate a session invariant
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}
