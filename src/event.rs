//! Node event system.

use crate::relay::{OperationKind, TransactionOutcome};
use tokio::sync::broadcast;

/// Events emitted by the node.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node has started successfully.
    Started,

    /// Node is shutting down.
    ShuttingDown,

    /// A relay message was logged without being acted on (observer mode).
    MessageObserved {
        /// Peer the message came from.
        peer_id: String,
        /// Operation kind.
        kind: OperationKind,
    },

    /// A relay message was dropped.
    MessageDropped {
        /// Peer the message came from.
        peer_id: String,
        /// Why it was dropped.
        reason: String,
    },

    /// A relay message was seen before and ignored.
    DuplicateMessage {
        /// Peer the message came from.
        peer_id: String,
    },

    /// A mutation was submitted on-chain.
    MutationDispatched {
        /// Peer the message came from.
        peer_id: String,
        /// Submission result.
        outcome: TransactionOutcome,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

/// Channel for receiving node events.
pub type NodeEventsChannel = broadcast::Receiver<NodeEvent>;

/// Sender for node events.
pub type NodeEventsSender = broadcast::Sender<NodeEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (NodeEventsSender, NodeEventsChannel) {
    broadcast::channel(256)
}
