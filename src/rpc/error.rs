//! Errors surfaced by the upstream JSON-RPC path.

use serde_json::Value;
use thiserror::Error;

/// Result of an upstream call.
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Upstream call failure.
///
/// `Clone` because one pending result may be shared by several callers of a
/// cacheable method.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The upstream answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional error data.
        data: Option<Value>,
    },

    /// The request could not be delivered or the response not read.
    #[error("rpc transport error: {0}")]
    Transport(String),

    /// The upstream payment could not be drawn; nothing was sent.
    #[error("rpc payment error: {0}")]
    Payment(String),

    /// The response body was not a JSON-RPC response.
    #[error("rpc decode error: {0}")]
    Decode(String),
}
