//! Gossip message handler for relayed mutations.
//!
//! One envelope goes through decode, duplicate suppression, pricing,
//! authorization and dispatch, strictly in that order. Nothing on this path
//! returns an error: every failure ends in a logged [`RelayOutcome::Dropped`].
//!
//! An envelope dropped before any decision about its payment (node not
//! ready, payments manager failed or timed out) is forgotten by duplicate
//! suppression, so a later redelivery of the same bytes is handled afresh.

use crate::event::{NodeEvent, NodeEventsSender};
use crate::payment::{PaymentAuthenticator, Price, RateTable, UnconfiguredKindPolicy};
use crate::relay::dedupe::{envelope_digest, SeenEnvelopes};
use crate::relay::dispatcher::{MutationDispatcher, TransactionOutcome};
use crate::relay::envelope::MessageEnvelope;
use crate::relay::handlers::HandlerRegistry;
use crate::relay::OperationKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the relay treats incoming mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Log a description of each message; never authorize or dispatch.
    #[default]
    Observer,
    /// Charge for mutations and dispatch the ones that are paid for.
    Paid,
}

/// What happened to one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Logged in observer mode.
    Observed(OperationKind),
    /// Not forwarded.
    Dropped(String),
    /// Already seen recently; ignored.
    Duplicate,
    /// Forwarded on-chain.
    Dispatched(TransactionOutcome),
}

/// Paid-path outcome, plus whether the same envelope may be retried.
struct Verdict {
    outcome: RelayOutcome,
    retryable: bool,
}

impl From<RelayOutcome> for Verdict {
    fn from(outcome: RelayOutcome) -> Self {
        Self {
            outcome,
            retryable: false,
        }
    }
}

struct PaidRelay {
    rates: Arc<RateTable>,
    policy: UnconfiguredKindPolicy,
    authenticator: PaymentAuthenticator,
    dispatcher: Arc<MutationDispatcher>,
}

enum Stage {
    Observer(HandlerRegistry),
    Paid(PaidRelay),
}

/// Handles relay messages received from the gossip network.
pub struct MessageRelay {
    stage: Stage,
    seen: Option<SeenEnvelopes>,
    events: Option<NodeEventsSender>,
}

impl MessageRelay {
    /// A relay that only logs what it receives, described by `handlers`.
    #[must_use]
    pub fn observer(handlers: HandlerRegistry) -> Self {
        Self {
            stage: Stage::Observer(handlers),
            seen: None,
            events: None,
        }
    }

    /// A relay that charges for mutations before dispatching them.
    #[must_use]
    pub fn paid(
        rates: Arc<RateTable>,
        policy: UnconfiguredKindPolicy,
        authenticator: PaymentAuthenticator,
        dispatcher: Arc<MutationDispatcher>,
    ) -> Self {
        Self {
            stage: Stage::Paid(PaidRelay {
                rates,
                policy,
                authenticator,
                dispatcher,
            }),
            seen: None,
            events: None,
        }
    }

    /// Ignore envelopes already present in `seen`.
    #[must_use]
    pub fn with_dedupe(mut self, seen: SeenEnvelopes) -> Self {
        self.seen = Some(seen);
        self
    }

    /// Emit a [`NodeEvent`] per handled message.
    #[must_use]
    pub fn with_events(mut self, events: NodeEventsSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Mode the relay was built in.
    #[must_use]
    pub fn mode(&self) -> RelayMode {
        match self.stage {
            Stage::Observer(_) => RelayMode::Observer,
            Stage::Paid(_) => RelayMode::Paid,
        }
    }

    /// Handle one gossip message from `peer_id`.
    pub async fn on_message(&self, peer_id: &str, data: &[u8]) -> RelayOutcome {
        let outcome = self.handle(peer_id, data).await;
        self.emit(peer_id, &outcome);
        outcome
    }

    async fn handle(&self, peer_id: &str, data: &[u8]) -> RelayOutcome {
        let envelope = match MessageEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping undecodable message from {peer_id}: {e}");
                return RelayOutcome::Dropped(e.to_string());
            }
        };

        let digest = envelope_digest(data);
        if let Some(seen) = &self.seen {
            if !seen.first_sighting(digest) {
                debug!("Ignoring duplicate {} message from {peer_id}", envelope.kind);
                return RelayOutcome::Duplicate;
            }
        }

        match &self.stage {
            Stage::Observer(handlers) => {
                observe(handlers, peer_id, &envelope);
                RelayOutcome::Observed(envelope.kind)
            }
            Stage::Paid(paid) => {
                let verdict = paid.relay(peer_id, envelope).await;
                if verdict.retryable {
                    if let Some(seen) = &self.seen {
                        seen.forget(&digest);
                    }
                }
                verdict.outcome
            }
        }
    }

    fn emit(&self, peer_id: &str, outcome: &RelayOutcome) {
        let Some(events) = &self.events else {
            return;
        };
        let peer_id = peer_id.to_string();
        let event = match outcome {
            RelayOutcome::Observed(kind) => NodeEvent::MessageObserved {
                peer_id,
                kind: kind.clone(),
            },
            RelayOutcome::Duplicate => NodeEvent::DuplicateMessage { peer_id },
            RelayOutcome::Dropped(reason) => NodeEvent::MessageDropped {
                peer_id,
                reason: reason.clone(),
            },
            RelayOutcome::Dispatched(outcome) => NodeEvent::MutationDispatched {
                peer_id,
                outcome: outcome.clone(),
            },
        };
        let _ = events.send(event);
    }
}

fn observe(handlers: &HandlerRegistry, peer_id: &str, envelope: &MessageEnvelope) {
    let kind = &envelope.kind;
    let description = handlers
        .get(kind)
        .and_then(|handler| handler.describe(&envelope.message).ok())
        .unwrap_or_else(|| envelope.message.to_string());
    info!("Observed {kind} message from {peer_id}: {description}");
}

impl PaidRelay {
    async fn relay(&self, peer_id: &str, envelope: MessageEnvelope) -> Verdict {
        let MessageEnvelope {
            kind,
            message,
            claim,
        } = envelope;

        match self.rates.price(&kind, self.policy) {
            Price::Rejected => {
                drop_message(peer_id, &kind, format!("no rate configured for {kind}")).into()
            }
            Price::Free => {
                debug!("Relaying free {kind} message from {peer_id}");
                self.dispatch(&kind, &message).await.into()
            }
            Price::Paid(cost) => {
                let Some(claim) = claim else {
                    return drop_message(peer_id, &kind, "missing payment".to_string()).into();
                };

                let result = self.authenticator.authorize(&claim, cost).await;
                if !result.authorized {
                    let reason = result
                        .reason
                        .unwrap_or_else(|| "payment not authorized".to_string());
                    return Verdict {
                        outcome: drop_message(peer_id, &kind, reason),
                        retryable: result.retryable,
                    };
                }

                info!(
                    "Accepted {kind} message from {peer_id}, paid {} by {}",
                    claim.amount, claim.payer
                );
                self.dispatch(&kind, &message).await.into()
            }
        }
    }

    async fn dispatch(&self, kind: &OperationKind, message: &serde_json::Value) -> RelayOutcome {
        RelayOutcome::Dispatched(self.dispatcher.dispatch(kind, message).await)
    }
}

fn drop_message(peer_id: &str, kind: &OperationKind, reason: String) -> RelayOutcome {
    warn!("Dropping {kind} message from {peer_id}: {reason}");
    RelayOutcome::Dropped(reason)
}
