//! Payment checks for relayed mutations.
//!
//! A relayed mutation is forwarded on-chain only after its payment claim has
//! been authenticated against the price of its operation kind.
//!
//! # Architecture
//!
//! ```text
//! Claim received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Own identity known? │──── no ───▶ Reject ("not ready")
//! └─────────┬───────────┘
//!           │ yes
//!           ▼
//! ┌─────────────────────┐
//! │ Recover voucher     │──── fails / is self ───▶ Reject
//! │ signer              │
//! └─────────┬───────────┘
//!           │
//!           ▼
//! ┌─────────────────────┐
//! │ Payments manager    │──── rejected / error / timeout ───▶ Reject
//! │ authenticates       │
//! └─────────┬───────────┘
//!           │
//!           ▼
//!       Authorized
//! ```

mod authenticator;
mod manager;
mod rates;
pub mod signature;

pub use authenticator::{
    AuthorizationResult, PaymentAuthenticator, PaymentClaim, DEFAULT_AUTHORIZE_TIMEOUT,
};
pub use manager::{PaymentsManager, Voucher, VoucherCheck};
pub use rates::{Price, RateTable, UnconfiguredKindPolicy};
