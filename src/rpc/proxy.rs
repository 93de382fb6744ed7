//! Metered RPC proxy.
//!
//! Sits in front of an [`UpstreamTransport`] and exposes the plain
//! [`RpcTransport`] call interface, so callers are unaware of it. Per method:
//!
//! - **paid**: one fresh voucher is drawn from the payments manager and sent
//!   as request metadata; if the draw fails, nothing is sent;
//! - **cacheable**: calls within one scheduler turn share a single upstream
//!   call (see [`TurnCache`]);
//! - anything else is passed straight through.
//!
//! A method is never both paid and cacheable.

use crate::error::{Error, Result};
use crate::payment::PaymentsManager;
use crate::primitives::Cost;
use crate::rpc::cache::{TurnBoundary, TurnCache};
use crate::rpc::error::{RpcError, RpcResult};
use crate::rpc::transport::{JsonRpcRequest, RpcTransport, UpstreamTransport};
use async_trait::async_trait;
use futures::future::FutureExt;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Methods whose results may be shared within one turn by default.
pub const DEFAULT_CACHEABLE_METHODS: &[&str] = &["eth_chainId", "eth_blockNumber"];

/// Metering configuration for [`MeteredRpcProxy`].
#[derive(Debug, Clone, Default)]
pub struct MeteringConfig {
    /// Methods that require an upstream payment per call.
    pub paid_methods: HashSet<String>,
    /// Idempotent methods coalesced within a turn.
    pub cacheable_methods: HashSet<String>,
    /// Amount paid per paid call.
    pub payment_amount: Cost,
}

impl MeteringConfig {
    /// Check that no method is both paid and cacheable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the overlapping methods.
    pub fn validate(&self) -> Result<()> {
        let mut overlap: Vec<&str> = self
            .paid_methods
            .intersection(&self.cacheable_methods)
            .map(String::as_str)
            .collect();
        if overlap.is_empty() {
            return Ok(());
        }
        overlap.sort_unstable();
        Err(Error::Config(format!(
            "methods cannot be both paid and cacheable: {}",
            overlap.join(", ")
        )))
    }
}

/// Wraps an upstream transport with payment metering and per-turn caching.
pub struct MeteredRpcProxy<U: UpstreamTransport + ?Sized> {
    upstream: Arc<U>,
    payments: Option<Arc<dyn PaymentsManager>>,
    config: MeteringConfig,
    cache: TurnCache,
    next_id: AtomicU64,
}

impl<U: UpstreamTransport + ?Sized> MeteredRpcProxy<U> {
    /// Compose the proxy in front of `upstream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a method is both paid and cacheable, or if
    /// paid methods are configured without a payments manager.
    pub fn new(
        upstream: Arc<U>,
        payments: Option<Arc<dyn PaymentsManager>>,
        config: MeteringConfig,
        boundary: Arc<dyn TurnBoundary>,
    ) -> Result<Self> {
        config.validate()?;
        if payments.is_none() && !config.paid_methods.is_empty() {
            return Err(Error::Config(
                "paid RPC methods configured without a payments manager".to_string(),
            ));
        }

        Ok(Self {
            upstream,
            payments,
            config,
            cache: TurnCache::new(boundary),
            next_id: AtomicU64::new(1),
        })
    }

    /// The per-turn cache, for inspection.
    #[must_use]
    pub fn cache(&self) -> &TurnCache {
        &self.cache
    }

    fn request(&self, method: &str, params: Vec<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(method, params, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn paid_call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let Some(payments) = &self.payments else {
            return Err(RpcError::Payment(
                "no payments manager for paid method".to_string(),
            ));
        };

        let voucher = payments
            .send_upstream_payment(self.config.payment_amount)
            .await
            .map_err(|e| RpcError::Payment(e.to_string()))?;

        debug!(
            "Paying {} on channel {} for {method}",
            voucher.amount, voucher.channel_id
        );
        self.upstream
            .post(self.request(method, params), Some(voucher))
            .await
    }
}

#[async_trait]
impl<U: UpstreamTransport + ?Sized> RpcTransport for MeteredRpcProxy<U> {
    async fn send(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        debug!("Making RPC call: {method}");

        if self.config.paid_methods.contains(method) {
            return self.paid_call(method, params).await;
        }

        if self.config.cacheable_methods.contains(method) {
            return self
                .cache
                .get_or_call(method, || {
                    let upstream = Arc::clone(&self.upstream);
                    let request = self.request(method, params);
                    async move { upstream.post(request, None).await }.boxed()
                })
                .await;
        }

        self.upstream.post(self.request(method, params), None).await
    }
}
