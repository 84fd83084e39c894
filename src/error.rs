//! Error types for the trading pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trading pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    // Log stream errors
    #[error("Log stream connection failed: {0}")]
    StreamConnection(String),

    #[error("Log stream disconnected")]
    StreamDisconnected,

    // Pump.fun protocol errors
    #[error("Invalid pump.fun instruction: {0}")]
    InvalidInstruction(String),

    #[error("Bonding curve decode failed: {0}")]
    BondingCurveDecode(String),

    // Token lifecycle errors
    #[error("Out-of-order observation for {mint}: {observed} is older than {latest}")]
    OutOfOrder {
        mint: String,
        observed: chrono::DateTime<chrono::Utc>,
        latest: chrono::DateTime<chrono::Utc>,
    },

    // Order errors
    #[error("Order queue closed")]
    QueueClosed,

    #[error("Order queue full")]
    QueueFull,

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::RpcTimeout(_)
                | Error::StreamConnection(_)
                | Error::StreamDisconnected
                | Error::TransactionSend(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
