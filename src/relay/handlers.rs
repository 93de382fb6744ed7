//! Per-kind mutation handlers.
//!
//! Each handler knows the shape of one kind's message: how to describe it for
//! the observer log and how to submit it through the [`ChainClient`]. New
//! kinds are added by registering another handler; the relay itself does not
//! change.

use crate::error::{Error, Result};
use crate::relay::chain::{ChainClient, PendingTransaction};
use crate::relay::OperationKind;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Submission logic for one operation kind.
#[async_trait]
pub trait MutationHandler: Send + Sync {
    /// Human-readable summary of `message`, used in observer mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the message does not have this kind's shape.
    fn describe(&self, message: &Value) -> Result<String>;

    /// Submit `message` on-chain with an explicit gas limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is malformed or submission fails.
    async fn submit(
        &self,
        chain: &dyn ChainClient,
        message: &Value,
        gas_limit: u64,
    ) -> Result<Box<dyn PendingTransaction>>;
}

/// `invoke`: an array of signed invocation batches.
///
/// Without the target contracts' ABIs, [`describe`](MutationHandler::describe)
/// shows each call as its target, raw 4-byte selector and calldata length.
/// Method names and arguments are not decoded.
pub struct InvokeHandler;

#[derive(Deserialize)]
struct SignedInvocationView {
    invocations: InvocationsView,
}

#[derive(Deserialize)]
struct InvocationsView {
    #[serde(default)]
    batch: Vec<InvocationView>,
}

#[derive(Deserialize)]
struct InvocationView {
    transaction: TransactionView,
}

#[derive(Deserialize)]
struct TransactionView {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    data: String,
}

impl InvokeHandler {
    fn signed_invocations(message: &Value) -> Result<&[Value]> {
        match message.as_array() {
            Some(batch) if !batch.is_empty() => Ok(batch),
            Some(_) => Err(Error::Decode("empty invocation batch".to_string())),
            None => Err(Error::Decode(
                "invoke message must be an array of signed invocations".to_string(),
            )),
        }
    }
}

#[async_trait]
impl MutationHandler for InvokeHandler {
    fn describe(&self, message: &Value) -> Result<String> {
        let mut calls = Vec::new();
        for signed in Self::signed_invocations(message)? {
            let view: SignedInvocationView = serde_json::from_value(signed.clone())
                .map_err(|e| Error::Decode(format!("invalid signed invocation: {e}")))?;
            for invocation in view.invocations.batch {
                let tx = invocation.transaction;
                let data = tx.data.trim_start_matches("0x");
                let selector = data.get(..8).unwrap_or(data);
                calls.push(format!(
                    "to={} selector=0x{selector} data_len={}",
                    tx.to.as_deref().unwrap_or("?"),
                    data.len() / 2
                ));
            }
        }
        Ok(format!("{} invocation(s): [{}]", calls.len(), calls.join("; ")))
    }

    async fn submit(
        &self,
        chain: &dyn ChainClient,
        message: &Value,
        gas_limit: u64,
    ) -> Result<Box<dyn PendingTransaction>> {
        let batch = Self::signed_invocations(message)?;
        chain.invoke(batch, gas_limit).await
    }
}

/// `revoke`: a signed delegation plus a signed intention to revoke it.
pub struct RevokeHandler;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevocationMessage {
    signed_delegation: Value,
    signed_intended_revocation: Value,
}

impl RevokeHandler {
    fn parse(message: &Value) -> Result<RevocationMessage> {
        let parsed: RevocationMessage = serde_json::from_value(message.clone())
            .map_err(|e| Error::Decode(format!("invalid revoke message: {e}")))?;
        if parsed.signed_delegation.is_null() || parsed.signed_intended_revocation.is_null() {
            return Err(Error::Decode(
                "revoke message needs a delegation and a revocation".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl MutationHandler for RevokeHandler {
    fn describe(&self, message: &Value) -> Result<String> {
        let parsed = Self::parse(message)?;
        Ok(format!(
            "signed delegation: {}, signed intention to revoke: {}",
            parsed.signed_delegation, parsed.signed_intended_revocation
        ))
    }

    async fn submit(
        &self,
        chain: &dyn ChainClient,
        message: &Value,
        gas_limit: u64,
    ) -> Result<Box<dyn PendingTransaction>> {
        let parsed = Self::parse(message)?;
        chain
            .revoke_delegation(
                &parsed.signed_delegation,
                &parsed.signed_intended_revocation,
                gas_limit,
            )
            .await
    }
}

/// Registry mapping kinds to their handlers.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<OperationKind, Arc<dyn MutationHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, kind: OperationKind, handler: Arc<dyn MutationHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handler for `kind`, if registered.
    #[must_use]
    pub fn get(&self, kind: &OperationKind) -> Option<&Arc<dyn MutationHandler>> {
        self.handlers.get(kind)
    }
}

impl Default for HandlerRegistry {
    /// Registry with the `invoke` and `revoke` handlers.
    fn default() -> Self {
        Self::empty()
            .with(OperationKind::Invoke, Arc::new(InvokeHandler))
            .with(OperationKind::Revoke, Arc::new(RevokeHandler))
    }
}
