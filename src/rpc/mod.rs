//! Metered access to the upstream JSON-RPC endpoint.
//!
//! [`MeteredRpcProxy`] decorates an [`UpstreamTransport`] and implements the
//! ordinary [`RpcTransport`] interface, so code making RPC calls never learns
//! that some methods are paid for and others are coalesced per turn.

mod cache;
mod error;
mod proxy;
mod transport;

pub use cache::{
    EntryState, ManualTurnBoundary, TokioTurnBoundary, TurnBoundary, TurnCache, TurnCallback,
};
pub use error::{RpcError, RpcResult};
pub use proxy::{MeteredRpcProxy, MeteringConfig, DEFAULT_CACHEABLE_METHODS};
pub use transport::{
    HttpUpstream, JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, RpcTransport,
    UpstreamTransport,
};
