//! Boundary with the contract-bound transaction sender.

use crate::error::Result;
use crate::primitives::{Address, Hash};
use async_trait::async_trait;
use serde_json::Value;

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Contract the transaction was sent to.
    pub to: Option<Address>,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Hash of that block.
    pub block_hash: Hash,
    /// Transaction hash.
    pub transaction_hash: Hash,
    /// Price paid per unit of gas.
    pub effective_gas_price: u128,
    /// Gas consumed.
    pub gas_used: u64,
    /// Whether execution succeeded (`false` on revert).
    pub status: bool,
}

/// A submitted transaction awaiting inclusion.
#[async_trait]
pub trait PendingTransaction: Send {
    /// Hash assigned at submission.
    fn tx_hash(&self) -> Hash;

    /// Wait for the first receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the receipt cannot be obtained.
    async fn wait(self: Box<Self>) -> Result<Receipt>;
}

/// Sends transactions to the registry contract.
///
/// Each call submits immediately with the given gas limit; no gas estimation
/// round-trip is made.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a batch of signed invocations.
    ///
    /// # Errors
    ///
    /// Returns an error if submission fails.
    async fn invoke(
        &self,
        signed_invocations: &[Value],
        gas_limit: u64,
    ) -> Result<Box<dyn PendingTransaction>>;

    /// Submit a signed delegation together with a signed intention to revoke it.
    ///
    /// # Errors
    ///
    /// Returns an error if submission fails.
    async fn revoke_delegation(
        &self,
        signed_delegation: &Value,
        signed_intended_revocation: &Value,
        gas_limit: u64,
    ) -> Result<Box<dyn PendingTransaction>>;
}
