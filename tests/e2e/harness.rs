//! Test harness that runs a node against in-memory collaborators.
//!
//! The `TestHarness` builds a node with:
//! - an `InMemoryPayments` ledger standing in for the payment channel
//! - an `InMemoryChain` recording every submitted transaction
//! - an `InMemoryUpstream` answering JSON-RPC calls
//! - a manual turn boundary so tests decide when a scheduler turn ends

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use paygate_node::event::NodeEvent;
use paygate_node::node::ShutdownHandle;
use paygate_node::payment::signature::{address_of, sign_hash};
use paygate_node::payment::{Voucher, VoucherCheck};
use paygate_node::relay::{ChainClient, HandlerRegistry, PendingTransaction, Receipt};
use paygate_node::rpc::{
    JsonRpcRequest, ManualTurnBoundary, RpcError, RpcResult, RpcTransport, TurnBoundary,
    UpstreamTransport,
};
use paygate_node::{
    Address, Cost, Error, GossipMessage, Hash, NodeBuilder, NodeConfig, NodeEventsChannel,
    PaymentsManager, RelayMode, Signature,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// How long a test waits for the node before giving up.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Node error
    #[error("Node error: {0}")]
    Node(#[from] Error),

    /// Nothing happened in time
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The node task failed
    #[error("Node task failed: {0}")]
    Join(String),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Secret scalar of the node's own payable identity.
pub const NODE_KEY: [u8; 32] = [0x0a; 32];

/// Secret scalar of the paying peer.
pub const PEER_KEY: [u8; 32] = [0x0b; 32];

/// Signing key from a fixed scalar.
#[must_use]
pub fn key(scalar: [u8; 32]) -> SigningKey {
    SigningKey::from_slice(&scalar).expect("valid scalar")
}

/// Account address of a fixed scalar.
#[must_use]
pub fn address(scalar: [u8; 32]) -> Address {
    address_of(key(scalar).verifying_key())
}

/// Envelope bytes for `kind`, with a payment claim of `amount` signed by
/// `payer` over `voucher_hash` when `payer` is given.
#[must_use]
pub fn signed_envelope(
    kind: &str,
    message: &Value,
    payer: Option<&SigningKey>,
    amount: Cost,
    voucher_hash: Hash,
) -> Vec<u8> {
    let mut body = json!({ "payload": { "kind": kind, "message": message } });
    if let Some(payer) = payer {
        let signature = sign_hash(payer, &voucher_hash).expect("sign voucher hash");
        body["payment"] = json!({
            "payer": address_of(payer.verifying_key()).to_string(),
            "amount": amount.to_string(),
            "vhash": voucher_hash.to_string(),
            "vsig": signature.to_string(),
        });
    }
    serde_json::to_vec(&body).expect("serialize envelope")
}

/// Payment channel ledger kept in memory.
pub struct InMemoryPayments {
    identity: Mutex<Option<Address>>,
    rates: BTreeMap<String, Cost>,
    received: Mutex<HashMap<Hash, (Address, Cost)>>,
    checks: Mutex<u32>,
    balance: Mutex<Cost>,
    drawn: Mutex<Vec<Cost>>,
}

impl InMemoryPayments {
    /// Ledger with the given identity, mutation rates and upstream balance.
    #[must_use]
    pub fn new(identity: Option<Address>, rates: BTreeMap<String, Cost>, balance: Cost) -> Self {
        Self {
            identity: Mutex::new(identity),
            rates,
            received: Mutex::new(HashMap::new()),
            checks: Mutex::new(0),
            balance: Mutex::new(balance),
            drawn: Mutex::new(Vec::new()),
        }
    }

    /// Record a voucher received from `payer` on the inbound channel.
    pub fn credit(&self, voucher_hash: Hash, payer: Address, amount: Cost) {
        self.received.lock().insert(voucher_hash, (payer, amount));
    }

    /// Establish the node's identity later.
    pub fn set_identity(&self, identity: Address) {
        *self.identity.lock() = Some(identity);
    }

    /// Number of delegated payment checks.
    #[must_use]
    pub fn checks(&self) -> u32 {
        *self.checks.lock()
    }

    /// Amounts paid upstream, in order.
    #[must_use]
    pub fn drawn(&self) -> Vec<Cost> {
        self.drawn.lock().clone()
    }
}

#[async_trait]
impl PaymentsManager for InMemoryPayments {
    fn client_address(&self) -> Option<Address> {
        *self.identity.lock()
    }

    fn mutation_rates(&self) -> BTreeMap<String, Cost> {
        self.rates.clone()
    }

    async fn authenticate_payment(
        &self,
        voucher_hash: Hash,
        payer: Address,
        required_cost: Cost,
    ) -> paygate_node::Result<VoucherCheck> {
        *self.checks.lock() += 1;
        Ok(match self.received.lock().get(&voucher_hash) {
            Some((from, _)) if *from != payer => {
                VoucherCheck::Rejected(format!("voucher belongs to {from}"))
            }
            Some((_, amount)) if *amount >= required_cost => VoucherCheck::Accepted,
            Some((_, amount)) => VoucherCheck::Rejected(format!(
                "voucher pays {amount}, {required_cost} required"
            )),
            None => VoucherCheck::Rejected("unknown voucher".to_string()),
        })
    }

    async fn send_upstream_payment(&self, amount: Cost) -> paygate_node::Result<Voucher> {
        let mut balance = self.balance.lock();
        if *balance < amount {
            return Err(Error::Payment(format!(
                "channel balance {} below {amount}",
                *balance
            )));
        }
        *balance -= amount;

        let mut drawn = self.drawn.lock();
        drawn.push(amount);
        let mut channel_id = [0xc4; 32];
        channel_id[31] = 1;
        #[allow(clippy::cast_possible_truncation)]
        let nonce = drawn.len() as u8;
        Ok(Voucher {
            channel_id: Hash(channel_id),
            amount,
            signature: Signature([nonce; 65]),
        })
    }
}

/// A transaction submitted to the in-memory chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainCall {
    /// `invoke` with its batch and gas limit.
    Invoke(Vec<Value>, u64),
    /// `revoke_delegation` with its arguments and gas limit.
    Revoke(Value, Value, u64),
}

struct MinedTransaction {
    hash: Hash,
}

#[async_trait]
impl PendingTransaction for MinedTransaction {
    fn tx_hash(&self) -> Hash {
        self.hash
    }

    async fn wait(self: Box<Self>) -> paygate_node::Result<Receipt> {
        Ok(Receipt {
            to: Some(Address([0xc0; 20])),
            block_number: 42,
            block_hash: Hash([0x42; 32]),
            transaction_hash: self.hash,
            effective_gas_price: 1_000_000_000,
            gas_used: 84_000,
            status: true,
        })
    }
}

/// Chain client that mines every transaction in block 42.
#[derive(Default)]
pub struct InMemoryChain {
    calls: Mutex<Vec<ChainCall>>,
}

impl InMemoryChain {
    /// Transactions submitted so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ChainCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ChainCall) -> Box<dyn PendingTransaction> {
        let mut calls = self.calls.lock();
        calls.push(call);
        #[allow(clippy::cast_possible_truncation)]
        let hash = Hash([calls.len() as u8; 32]);
        Box::new(MinedTransaction { hash })
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn invoke(
        &self,
        signed_invocations: &[Value],
        gas_limit: u64,
    ) -> paygate_node::Result<Box<dyn PendingTransaction>> {
        Ok(self.record(ChainCall::Invoke(signed_invocations.to_vec(), gas_limit)))
    }

    async fn revoke_delegation(
        &self,
        signed_delegation: &Value,
        signed_intended_revocation: &Value,
        gas_limit: u64,
    ) -> paygate_node::Result<Box<dyn PendingTransaction>> {
        Ok(self.record(ChainCall::Revoke(
            signed_delegation.clone(),
            signed_intended_revocation.clone(),
            gas_limit,
        )))
    }
}

/// Upstream JSON-RPC provider kept in memory.
#[derive(Default)]
pub struct InMemoryUpstream {
    requests: Mutex<Vec<(JsonRpcRequest, Option<Voucher>)>>,
    block_number: Mutex<u64>,
    errors: Mutex<HashMap<String, RpcError>>,
}

impl InMemoryUpstream {
    /// Requests received so far, with the voucher each carried.
    #[must_use]
    pub fn requests(&self) -> Vec<(JsonRpcRequest, Option<Voucher>)> {
        self.requests.lock().clone()
    }

    /// Number of requests for `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(request, _)| request.method == method)
            .count()
    }

    /// Make every call to `method` fail with `error`.
    pub fn fail(&self, method: &str, error: RpcError) {
        self.errors.lock().insert(method.to_string(), error);
    }
}

#[async_trait]
impl UpstreamTransport for InMemoryUpstream {
    async fn post(&self, request: JsonRpcRequest, voucher: Option<Voucher>) -> RpcResult<Value> {
        let method = request.method.clone();
        self.requests.lock().push((request, voucher));

        if let Some(error) = self.errors.lock().get(&method) {
            return Err(error.clone());
        }
        Ok(match method.as_str() {
            "eth_chainId" => json!("0x7a69"),
            "eth_getCode" => json!("0x6080604052"),
            "eth_blockNumber" => {
                let mut block = self.block_number.lock();
                *block += 1;
                json!(format!("0x{:x}", *block))
            }
            _ => json!({ "method": method }),
        })
    }
}

/// Settings for one harness.
pub struct TestHarnessConfig {
    /// Node configuration.
    pub node: NodeConfig,
    /// Rates reported by the payments manager.
    pub rates: BTreeMap<String, Cost>,
    /// Whether the node's identity is established at start.
    pub identity_ready: bool,
    /// Upstream channel balance.
    pub balance: Cost,
    /// Handlers replacing the default registry.
    pub handlers: Option<HandlerRegistry>,
}

impl Default for TestHarnessConfig {
    fn default() -> Self {
        let mut node = NodeConfig::default();
        node.relay.mode = RelayMode::Paid;
        node.relay.contract_address = Some(Address([0xc0; 20]));

        Self {
            node,
            rates: BTreeMap::from([("invoke".to_string(), 100), ("revoke".to_string(), 40)]),
            identity_ready: true,
            balance: 1_000,
            handlers: None,
        }
    }
}

/// Test harness that manages one running node and its collaborators.
pub struct TestHarness {
    payments: Arc<InMemoryPayments>,
    chain: Arc<InMemoryChain>,
    upstream: Arc<InMemoryUpstream>,
    boundary: Arc<ManualTurnBoundary>,
    rpc: Arc<dyn RpcTransport>,
    gossip: mpsc::Sender<GossipMessage>,
    events: NodeEventsChannel,
    shutdown: ShutdownHandle,
    runner: JoinHandle<paygate_node::Result<()>>,
}

impl TestHarness {
    /// Start a paid-mode node with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails to build or start.
    pub async fn setup() -> Result<Self> {
        Self::setup_with_config(TestHarnessConfig::default()).await
    }

    /// Start a node with custom settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails to build or start.
    pub async fn setup_with_config(config: TestHarnessConfig) -> Result<Self> {
        info!("Setting up test harness in {:?} mode", config.node.relay.mode);

        let identity = config.identity_ready.then(|| address(NODE_KEY));
        let payments = Arc::new(InMemoryPayments::new(identity, config.rates, config.balance));
        let chain = Arc::new(InMemoryChain::default());
        let upstream = Arc::new(InMemoryUpstream::default());
        let boundary = Arc::new(ManualTurnBoundary::new());

        let mut builder = NodeBuilder::new(config.node)
            .with_payments_manager(Arc::clone(&payments) as Arc<dyn PaymentsManager>)
            .with_chain_client(Arc::clone(&chain) as Arc<dyn ChainClient>)
            .with_upstream(Arc::clone(&upstream) as Arc<dyn UpstreamTransport>)
            .with_turn_boundary(Arc::clone(&boundary) as Arc<dyn TurnBoundary>);
        if let Some(handlers) = config.handlers {
            builder = builder.with_handlers(handlers);
        }

        let mut node = builder.build().await?;
        let mut events = node.subscribe_events();
        let rpc = node.rpc();
        let gossip = node.gossip_sender();
        let shutdown = node.shutdown_handle();
        let runner = tokio::spawn(async move { node.run().await });

        match tokio::time::timeout(WAIT_TIMEOUT, events.recv()).await {
            Ok(Ok(NodeEvent::Started)) => {}
            other => return Err(HarnessError::Timeout(format!("node start, got {other:?}"))),
        }

        Ok(Self {
            payments,
            chain,
            upstream,
            boundary,
            rpc,
            gossip,
            events,
            shutdown,
            runner,
        })
    }

    /// The payments ledger.
    #[must_use]
    pub fn payments(&self) -> &InMemoryPayments {
        &self.payments
    }

    /// The chain double.
    #[must_use]
    pub fn chain(&self) -> &InMemoryChain {
        &self.chain
    }

    /// The upstream double.
    #[must_use]
    pub fn upstream(&self) -> &InMemoryUpstream {
        &self.upstream
    }

    /// The node's metered RPC transport.
    #[must_use]
    pub fn rpc(&self) -> &Arc<dyn RpcTransport> {
        &self.rpc
    }

    /// End the current scheduler turn.
    pub fn end_turn(&self) {
        self.boundary.flush();
    }

    /// Deliver envelope bytes from `peer_id` through the gossip intake.
    ///
    /// # Errors
    ///
    /// Returns an error if the node stopped accepting messages.
    pub async fn deliver(&self, peer_id: &str, data: Vec<u8>) -> Result<()> {
        self.gossip
            .send(GossipMessage {
                peer_id: peer_id.to_string(),
                data,
            })
            .await
            .map_err(|e| HarnessError::Join(e.to_string()))
    }

    /// Next event describing a handled relay message.
    ///
    /// # Errors
    ///
    /// Returns an error if no such event arrives in time.
    pub async fn next_relay_event(&mut self) -> Result<NodeEvent> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .map_err(|_| HarnessError::Timeout("relay event".to_string()))?
                .map_err(|e| HarnessError::Join(e.to_string()))?;
            match event {
                NodeEvent::MessageObserved { .. }
                | NodeEvent::MessageDropped { .. }
                | NodeEvent::DuplicateMessage { .. }
                | NodeEvent::MutationDispatched { .. } => return Ok(event),
                _ => continue,
            }
        }
    }

    /// Wait until the upstream has seen `count` requests for `method`.
    ///
    /// # Errors
    ///
    /// Returns an error if that does not happen in time.
    pub async fn wait_for_upstream(&self, method: &str, count: usize) -> Result<()> {
        let poll = async {
            while self.upstream.count(method) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(WAIT_TIMEOUT, poll)
            .await
            .map_err(|_| HarnessError::Timeout(format!("{count} {method} request(s)")))
    }

    /// Shut the node down and wait for it to stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the node task failed.
    pub async fn teardown(self) -> Result<()> {
        self.shutdown.shutdown();
        self.runner
            .await
            .map_err(|e| HarnessError::Join(e.to_string()))??;
        Ok(())
    }
}
