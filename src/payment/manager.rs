//! Boundary with the off-chain payment channel component.
//!
//! Channel lifecycle, voucher bookkeeping and settlement live behind this
//! trait; the relay and the RPC proxy only use the calls below.

use crate::error::Result;
use crate::primitives::{cost_serde, Address, Cost, Hash, Signature};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verdict on a voucher presented as payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherCheck {
    /// A voucher covering the required cost has been received from the payer.
    Accepted,
    /// No sufficient voucher; carries the reason.
    Rejected(String),
}

/// A payment drawn on an outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    /// Channel the voucher draws on.
    pub channel_id: Hash,
    /// Amount paid by this voucher.
    #[serde(with = "cost_serde")]
    pub amount: Cost,
    /// Signature over the voucher.
    pub signature: Signature,
}

/// Payments manager contract used by this node.
#[async_trait]
pub trait PaymentsManager: Send + Sync {
    /// Own payable identity, `None` until the manager has subscribed to its
    /// channel ledger.
    fn client_address(&self) -> Option<Address>;

    /// Mutation prices known to the manager, by kind name.
    fn mutation_rates(&self) -> BTreeMap<String, Cost>;

    /// Check that a voucher identified by `voucher_hash` from `payer` covers
    /// `required_cost`. May update channel balance bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be carried out.
    async fn authenticate_payment(
        &self,
        voucher_hash: Hash,
        payer: Address,
        required_cost: Cost,
    ) -> Result<VoucherCheck>;

    /// Draw a fresh voucher paying `amount` to the upstream provider.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel is available or its balance is short.
    async fn send_upstream_payment(&self, amount: Cost) -> Result<Voucher>;
}
