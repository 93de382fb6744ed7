//! # paygate-node
//!
//! A node that relays state mutations received from untrusted gossip peers
//! to an on-chain registry, charging for each one, while paying its own
//! upstream RPC provider per call with off-chain vouchers.
//!
//! ## Architecture
//!
//! - [`relay`]: decodes gossip envelopes, prices them with a [`RateTable`],
//!   authenticates the attached payment and dispatches paid mutations
//!   through a [`ChainClient`](relay::ChainClient)
//! - [`payment`]: rate table, payment claim authentication and the
//!   [`PaymentsManager`] boundary
//! - [`rpc`]: [`MeteredRpcProxy`], a decorator over the upstream JSON-RPC
//!   transport that pays for metered methods and coalesces idempotent reads
//!   within one scheduler turn
//! - [`node`]: wires everything together and runs the gossip intake loop
//!
//! The payment channel itself, the transaction signer and the gossip network
//! are collaborators supplied by the embedding application.
//!
//! ## Example
//!
//! ```rust,no_run
//! use paygate_node::{NodeBuilder, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Observer mode needs no collaborators.
//!     let config = NodeConfig::default();
//!     let mut node = NodeBuilder::new(config).build().await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod payment;
pub mod primitives;
pub mod relay;
pub mod rpc;

pub use config::{NodeConfig, RelayConfig, UpstreamConfig};
pub use error::{Error, Result};
pub use event::{NodeEvent, NodeEventsChannel};
pub use node::{GossipMessage, NodeBuilder, RunningNode};
pub use payment::{PaymentAuthenticator, PaymentClaim, PaymentsManager, RateTable};
pub use primitives::{Address, Cost, Hash, Signature};
pub use relay::{MessageRelay, OperationKind, RelayMode, RelayOutcome};
pub use rpc::{MeteredRpcProxy, RpcError, RpcTransport};
