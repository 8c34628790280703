//! Error types for RelayKV
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for RelayKV operations
#[derive(Debug, Error)]
pub enum RelayError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    /// The request payload does not have the shape the operation expects
    #[error("Bad data")]
    BadData,

    #[error("Unknown key")]
    KeyNotFound,

    #[error("Store is closed")]
    StoreClosed,

    #[error("Store did not reply within {0:?}")]
    StoreTimeout(Duration),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// True for errors that mean the store can no longer serve requests
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, RelayError::StoreClosed | RelayError::StoreTimeout(_))
    }
}
