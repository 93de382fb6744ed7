//! Error types for paygate-node.

use thiserror::Error;

pub use crate::rpc::RpcError;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in paygate-node.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Payment error (voucher authentication or upstream payment).
    #[error("payment error: {0}")]
    Payment(String),

    /// Chain client error (submission, revert or confirmation).
    #[error("chain error: {0}")]
    Chain(String),

    /// Malformed inbound message or payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// Upstream JSON-RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Cryptographic error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Node is shutting down.
    #[error("node is shutting down")]
    ShuttingDown,
}
