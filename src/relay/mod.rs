//! Payment-gated relay of state mutations received over gossip.
//!
//! # Architecture
//!
//! ```text
//! gossip (peer_id, bytes)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ MessageEnvelope  │──── malformed ───▶ Dropped
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ SeenEnvelopes    │──── seen before ───▶ Duplicate
//! └────────┬─────────┘
//!          ▼
//!   observer? ──── yes ───▶ describe + log ───▶ Observed(kind)
//!          │ paid
//!          ▼
//! ┌──────────────────┐
//! │ RateTable price  │──── unconfigured (reject) ───▶ Dropped
//! └────────┬─────────┘
//!          ▼ (priced)
//! ┌──────────────────┐
//! │ Authenticator    │──── denied ───▶ Dropped
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Dispatcher       │───▶ Dispatched(outcome)
//! └──────────────────┘
//! ```

pub mod chain;
mod dedupe;
mod dispatcher;
mod envelope;
mod handler;
pub mod handlers;
mod kind;

pub use chain::{ChainClient, PendingTransaction, Receipt};
pub use dedupe::{envelope_digest, DedupeStats, SeenEnvelopes, DEFAULT_DEDUPE_CAPACITY};
pub use dispatcher::{
    payload_digest, MutationDispatcher, TransactionOutcome, TransactionReceipt,
    DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_GAS_LIMIT,
};
pub use envelope::MessageEnvelope;
pub use handler::{MessageRelay, RelayMode, RelayOutcome};
pub use handlers::{HandlerRegistry, InvokeHandler, MutationHandler, RevokeHandler};
pub use kind::OperationKind;
