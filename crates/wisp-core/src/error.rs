//! Error types for Wisp

use thiserror::Error;

/// Core Wisp errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WispError {
    /// The membership collaborator could not resolve an audience.
    /// Raised during an update, after the content mutation was applied.
    #[error("Membership unavailable: {0}")]
    MembershipUnavailable(String),

    /// Rejected at the API boundary before reaching a stream
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid {kind} identifier: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WispError {
    pub fn membership(reason: impl Into<String>) -> Self {
        WispError::MembershipUnavailable(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        WispError::MalformedRequest(reason.into())
    }
}

/// Result type for Wisp operations
pub type WispResult<T> = Result<T, WispError>;
