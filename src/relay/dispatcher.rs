//! On-chain submission of authorized mutations.
//!
//! Submission is at-most-once and best effort: the payment for a mutation has
//! already been consumed when it gets here, and a failed submission is logged
//! but neither retried nor refunded.

use crate::primitives::{Address, Hash};
use crate::relay::chain::ChainClient;
use crate::relay::handlers::HandlerRegistry;
use crate::relay::OperationKind;
use serde_json::Value;
use sha3::{Digest, Keccak256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gas limit used when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

/// Default bound on waiting for the first receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Receipt of a relayed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Kind that was relayed.
    pub kind: OperationKind,
    /// Contract the transaction went to.
    pub to: Option<Address>,
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Block of inclusion.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: Hash,
    /// Gas consumed.
    pub gas_used: u64,
    /// Price paid per unit of gas.
    pub effective_gas_price: u128,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Mined successfully.
    Confirmed(TransactionReceipt),
    /// Submission, confirmation or execution failed.
    Failed {
        /// Kind that was relayed.
        kind: OperationKind,
        /// Description of the failure.
        error: String,
    },
    /// No handler is registered for the kind; nothing was submitted.
    Unhandled {
        /// Kind that was relayed.
        kind: OperationKind,
    },
}

impl TransactionOutcome {
    /// Whether the mutation was mined.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Short digest of a payload for log correlation.
#[must_use]
pub fn payload_digest(message: &Value) -> String {
    let digest = Keccak256::digest(message.to_string().as_bytes());
    hex::encode(&digest[..8])
}

/// Submits authorized mutations through a [`ChainClient`].
pub struct MutationDispatcher {
    chain: Arc<dyn ChainClient>,
    handlers: HandlerRegistry,
    gas_limit: u64,
    confirmation_timeout: Duration,
}

impl MutationDispatcher {
    /// Create a dispatcher with the default handlers.
    #[must_use]
    pub fn new(chain: Arc<dyn ChainClient>, gas_limit: u64) -> Self {
        Self {
            chain,
            handlers: HandlerRegistry::default(),
            gas_limit,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    /// Replace the handler registry.
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Bound the wait for a receipt.
    #[must_use]
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Handlers used for dispatch and description.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Submit `message` as a `kind` transaction and wait for one receipt.
    pub async fn dispatch(&self, kind: &OperationKind, message: &Value) -> TransactionOutcome {
        let Some(handler) = self.handlers.get(kind) else {
            info!("Handler for message kind {kind} not implemented");
            debug!("{message}");
            return TransactionOutcome::Unhandled { kind: kind.clone() };
        };

        let digest = payload_digest(message);
        let failed = |error: String| {
            warn!("Failed to relay {kind} message (payload {digest}): {error}");
            TransactionOutcome::Failed {
                kind: kind.clone(),
                error,
            }
        };

        let pending = match handler
            .submit(self.chain.as_ref(), message, self.gas_limit)
            .await
        {
            Ok(pending) => pending,
            Err(e) => return failed(format!("submission failed: {e}")),
        };

        let tx_hash = pending.tx_hash();
        debug!("Submitted {kind} transaction {tx_hash}, waiting for receipt");

        let receipt = match tokio::time::timeout(self.confirmation_timeout, pending.wait()).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return failed(format!("transaction {tx_hash}: {e}")),
            Err(_) => {
                return failed(format!(
                    "transaction {tx_hash} not confirmed within {:?}",
                    self.confirmation_timeout
                ))
            }
        };

        if !receipt.status {
            return failed(format!(
                "transaction {} reverted in block {}",
                receipt.transaction_hash, receipt.block_number
            ));
        }

        info!(
            kind = %kind,
            to = ?receipt.to,
            block_number = receipt.block_number,
            block_hash = %receipt.block_hash,
            transaction_hash = %receipt.transaction_hash,
            effective_gas_price = %receipt.effective_gas_price,
            gas_used = receipt.gas_used,
            "Transaction receipt for {kind} message"
        );

        TransactionOutcome::Confirmed(TransactionReceipt {
            kind: kind.clone(),
            to: receipt.to,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            block_hash: receipt.block_hash,
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
        })
    }
}
