//! Payment claim authentication.
//!
//! Decides whether a claim presented with a relayed mutation pays for it.
//! Every failure is turned into a rejected [`AuthorizationResult`] so callers
//! never have to handle errors on this path.

use crate::payment::manager::{PaymentsManager, VoucherCheck};
use crate::payment::signature::recover_signer;
use crate::primitives::{cost_serde, Address, Cost, Hash, Signature};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single payment check.
pub const DEFAULT_AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Payment claim presented by a requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentClaim {
    /// Declared payer.
    pub payer: Address,
    /// Declared amount paid.
    #[serde(with = "cost_serde")]
    pub amount: Cost,
    /// Hash of the voucher proving the payment.
    #[serde(rename = "vhash")]
    pub voucher_hash: Hash,
    /// Payer's signature over the voucher hash.
    #[serde(rename = "vsig")]
    pub voucher_signature: Signature,
}

/// Outcome of [`PaymentAuthenticator::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResult {
    /// Whether the claim pays for the mutation.
    pub authorized: bool,
    /// Recovered payer, when recovery succeeded.
    pub payer: Option<Address>,
    /// Why the claim was rejected.
    pub reason: Option<String>,
    /// The rejection says nothing about the claim itself (no identity yet,
    /// payments manager failed or timed out), so the same claim may be
    /// presented again.
    pub retryable: bool,
}

impl AuthorizationResult {
    fn granted(payer: Address) -> Self {
        Self {
            authorized: true,
            payer: Some(payer),
            reason: None,
            retryable: false,
        }
    }

    fn denied(payer: Option<Address>, reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            payer,
            reason: Some(reason.into()),
            retryable: false,
        }
    }

    fn deferred(payer: Option<Address>, reason: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::denied(payer, reason)
        }
    }
}

/// Verifies payment claims against a required cost.
pub struct PaymentAuthenticator {
    payments: Arc<dyn PaymentsManager>,
    timeout: Duration,
}

impl PaymentAuthenticator {
    /// Create an authenticator backed by `payments`.
    #[must_use]
    pub fn new(payments: Arc<dyn PaymentsManager>) -> Self {
        Self {
            payments,
            timeout: DEFAULT_AUTHORIZE_TIMEOUT,
        }
    }

    /// Bound the delegated payment check.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authorize `claim` for `required_cost`.
    ///
    /// Fails closed while the node has no payable identity, and rejects any
    /// claim whose recovered signer is the node itself.
    pub async fn authorize(&self, claim: &PaymentClaim, required_cost: Cost) -> AuthorizationResult {
        let Some(own_address) = self.payments.client_address() else {
            return AuthorizationResult::deferred(None, "not ready");
        };

        let signer = match recover_signer(&claim.voucher_hash, &claim.voucher_signature) {
            Ok(signer) => signer,
            Err(e) => return AuthorizationResult::denied(None, e.to_string()),
        };

        if signer == own_address {
            return AuthorizationResult::denied(Some(signer), "payer is this node");
        }

        if signer != claim.payer {
            return AuthorizationResult::denied(
                Some(signer),
                format!("voucher signed by {signer}, claim declares {}", claim.payer),
            );
        }

        if claim.amount < required_cost {
            return AuthorizationResult::denied(
                Some(signer),
                format!(
                    "insufficient amount: {} < required {required_cost}",
                    claim.amount
                ),
            );
        }

        debug!(
            "Checking voucher {} from {signer} for cost {required_cost}",
            claim.voucher_hash
        );

        let check = self
            .payments
            .authenticate_payment(claim.voucher_hash, signer, required_cost);
        match tokio::time::timeout(self.timeout, check).await {
            Ok(Ok(VoucherCheck::Accepted)) => AuthorizationResult::granted(signer),
            Ok(Ok(VoucherCheck::Rejected(reason))) => {
                AuthorizationResult::denied(Some(signer), reason)
            }
            Ok(Err(e)) => {
                warn!("Payment check for {signer} failed: {e}");
                AuthorizationResult::deferred(Some(signer), e.to_string())
            }
            Err(_) => {
                warn!("Payment check for {signer} timed out");
                AuthorizationResult::deferred(
                    Some(signer),
                    format!("payment check timed out after {:?}", self.timeout),
                )
            }
        }
    }
}
