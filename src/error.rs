//! Error types for the bridge core
//!
//! Validation and encoding errors are fatal to the call that raised them.
//! Status query errors are produced by the status sources but are always
//! contained by the reconciler and never reach the caller of a pass.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // ========================================================================
    // Input Errors
    // ========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    // ========================================================================
    // Chain Interaction Errors
    // ========================================================================
    #[error("Status query failed for {tx_hash}: {reason}")]
    StatusQuery { tx_hash: String, reason: String },

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    // ========================================================================
    // Local Errors
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BridgeError::Validation(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        BridgeError::Encoding(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        BridgeError::Submission(msg.into())
    }

    pub fn wallet(msg: impl Into<String>) -> Self {
        BridgeError::Wallet(msg.into())
    }

    /// Whether the next scheduled pass may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::StatusQuery { .. })
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Storage(format!("JSON serialization: {}", err))
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
