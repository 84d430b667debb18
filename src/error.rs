//! Error types for the aggregation server
//!
//! Provides a unified error type for all operations.

use std::io::ErrorKind;

use thiserror::Error;

/// Result type alias using AggError
pub type Result<T> = std::result::Result<T, AggError>;

/// Unified error type for aggregation server operations
#[derive(Debug, Error)]
pub enum AggError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The peer hung up before sending every byte it declared
    #[error("Connection closed after {received} of {expected} body bytes")]
    TruncatedBody { expected: usize, received: usize },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // -------------------------------------------------------------------------
    // Payload Errors
    // -------------------------------------------------------------------------
    #[error("Invalid station payload: {0}")]
    Payload(String),

    #[error("Station payload has no string \"id\" field")]
    MissingStationId,

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Time Errors
    // -------------------------------------------------------------------------
    #[error("System clock error: {0}")]
    SystemTime(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AggError {
    /// Whether this error means the peer is gone (or silent) and no response
    /// should be attempted.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AggError::TruncatedBody { .. } => true,
            AggError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::WouldBlock
                    | ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
