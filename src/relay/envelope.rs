//! Inbound message envelope.
//!
//! Wire format (JSON):
//!
//! ```json
//! {
//!   "payload": { "kind": "invoke", "message": [ ... ] },
//!   "payment": { "payer": "0x..", "amount": "150", "vhash": "0x..", "vsig": "0x.." }
//! }
//! ```

use crate::error::{Error, Result};
use crate::payment::PaymentClaim;
use crate::relay::OperationKind;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    payload: WirePayload,
    #[serde(default)]
    payment: Option<PaymentClaim>,
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    kind: String,
    #[serde(default)]
    message: Value,
}

/// A decoded relay message. The claim is untrusted until authorized.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    /// Operation kind.
    pub kind: OperationKind,
    /// Kind-specific mutation data.
    pub message: Value,
    /// Payment presented by the requester.
    pub claim: Option<PaymentClaim>,
}

impl MessageEnvelope {
    /// Decode raw envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for malformed JSON, a missing payload, an
    /// empty kind or a malformed payment.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_slice(data)
            .map_err(|e| Error::Decode(format!("invalid envelope: {e}")))?;

        if wire.payload.kind.trim().is_empty() {
            return Err(Error::Decode("envelope has no kind".to_string()));
        }

        Ok(Self {
            kind: OperationKind::from(wire.payload.kind.as_str()),
            message: wire.payload.message,
            claim: wire.payment,
        })
    }
}
