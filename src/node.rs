//! Node implementation: assembles the relay and the metered RPC proxy and
//! feeds gossip messages to the relay.

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, NodeEvent, NodeEventsChannel, NodeEventsSender};
use crate::payment::{PaymentAuthenticator, PaymentsManager, RateTable};
use crate::relay::{
    ChainClient, HandlerRegistry, MessageRelay, MutationDispatcher, RelayMode, SeenEnvelopes,
};
use crate::rpc::{
    HttpUpstream, MeteredRpcProxy, RpcTransport, TokioTurnBoundary, TurnBoundary,
    UpstreamTransport,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Capacity of the gossip intake queue.
const GOSSIP_QUEUE_CAPACITY: usize = 1024;

/// A message delivered by the gossip transport on the relay topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage {
    /// Sending peer.
    pub peer_id: String,
    /// Raw envelope bytes.
    pub data: Vec<u8>,
}

/// Builder for constructing a paygate node.
pub struct NodeBuilder {
    config: NodeConfig,
    payments: Option<Arc<dyn PaymentsManager>>,
    chain: Option<Arc<dyn ChainClient>>,
    upstream: Option<Arc<dyn UpstreamTransport>>,
    boundary: Option<Arc<dyn TurnBoundary>>,
    handlers: HandlerRegistry,
}

impl NodeBuilder {
    /// Create a new node builder with the given configuration.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            payments: None,
            chain: None,
            upstream: None,
            boundary: None,
            handlers: HandlerRegistry::default(),
        }
    }

    /// Payments manager used for inbound claims and outbound vouchers.
    #[must_use]
    pub fn with_payments_manager(mut self, payments: Arc<dyn PaymentsManager>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Transaction sender for relayed mutations.
    #[must_use]
    pub fn with_chain_client(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Replace the HTTP upstream configured by `upstream.rpc_endpoint`.
    #[must_use]
    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamTransport>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Turn boundary for the RPC cache (tokio scheduler by default).
    #[must_use]
    pub fn with_turn_boundary(mut self, boundary: Arc<dyn TurnBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Replace the mutation handlers.
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Build the node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or a
    /// collaborator required by it was not supplied, and an error if the rates
    /// file cannot be loaded.
    pub async fn build(self) -> Result<RunningNode> {
        info!("Building paygate-node with config: {:?}", self.config);
        self.config.validate()?;

        let upstream: Arc<dyn UpstreamTransport> = match self.upstream {
            Some(upstream) => upstream,
            None => Arc::new(HttpUpstream::new(
                &self.config.upstream.rpc_endpoint,
                self.config.upstream.request_timeout(),
            )?),
        };
        let boundary: Arc<dyn TurnBoundary> = match self.boundary {
            Some(boundary) => boundary,
            None => Arc::new(TokioTurnBoundary),
        };
        let rpc = Arc::new(MeteredRpcProxy::new(
            upstream,
            self.payments.clone(),
            self.config.upstream.metering(),
            boundary,
        )?);

        let (events_tx, events_rx) = create_event_channel();

        let relay = match self.config.relay.mode {
            RelayMode::Observer => MessageRelay::observer(self.handlers),
            RelayMode::Paid => {
                let (Some(payments), Some(chain)) = (self.payments, self.chain) else {
                    return Err(Error::Config(
                        "paid relay mode needs a payments manager and a chain client".to_string(),
                    ));
                };

                let rates = match &self.config.relay.rates_file {
                    Some(path) => RateTable::from_file(path)?,
                    None => RateTable::from_rates(payments.mutation_rates()),
                };
                if rates.is_empty() {
                    warn!("No mutation rates configured");
                }

                let authenticator = PaymentAuthenticator::new(payments)
                    .with_timeout(self.config.relay.authorize_timeout());
                let dispatcher = MutationDispatcher::new(chain, self.config.relay.gas_limit)
                    .with_handlers(self.handlers)
                    .with_confirmation_timeout(self.config.relay.confirmation_timeout());

                MessageRelay::paid(
                    Arc::new(rates),
                    self.config.relay.unconfigured_kind_policy,
                    authenticator,
                    Arc::new(dispatcher),
                )
            }
        };

        let mut relay = relay.with_events(events_tx.clone());
        if self.config.relay.dedupe_capacity > 0 {
            relay = relay.with_dedupe(SeenEnvelopes::with_capacity(
                self.config.relay.dedupe_capacity,
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (gossip_tx, gossip_rx) = mpsc::channel(GOSSIP_QUEUE_CAPACITY);

        Ok(RunningNode {
            config: self.config,
            relay: Arc::new(relay),
            rpc,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
            gossip_tx,
            gossip_rx: Some(gossip_rx),
        })
    }
}

/// Requests shutdown of a running node from another task.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

/// A running paygate node.
pub struct RunningNode {
    config: NodeConfig,
    relay: Arc<MessageRelay>,
    rpc: Arc<MeteredRpcProxy<dyn UpstreamTransport>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: NodeEventsSender,
    events_rx: Option<NodeEventsChannel>,
    gossip_tx: mpsc::Sender<GossipMessage>,
    gossip_rx: Option<mpsc::Receiver<GossipMessage>>,
}

impl RunningNode {
    /// Get the node's configuration.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The relay handling gossip messages.
    #[must_use]
    pub fn relay(&self) -> Arc<MessageRelay> {
        Arc::clone(&self.relay)
    }

    /// Metered RPC transport for outbound calls.
    #[must_use]
    pub fn rpc(&self) -> Arc<dyn RpcTransport> {
        Arc::clone(&self.rpc) as Arc<dyn RpcTransport>
    }

    /// Queue into which the gossip transport pushes relay-topic messages.
    #[must_use]
    pub fn gossip_sender(&self) -> mpsc::Sender<GossipMessage> {
        self.gossip_tx.clone()
    }

    /// Get a receiver for node events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<NodeEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn subscribe_events(&self) -> NodeEventsChannel {
        self.events_tx.subscribe()
    }

    /// Handle for requesting shutdown while [`run`](Self::run) is in progress.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Run the node until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the node has already been run.
    pub async fn run(&mut self) -> Result<()> {
        let mut gossip_rx = self
            .gossip_rx
            .take()
            .ok_or_else(|| Error::Config("node has already been run".to_string()))?;

        info!("Starting paygate-node in {:?} mode", self.relay.mode());
        let _ = self.events_tx.send(NodeEvent::Started);

        self.startup_checks().await;

        info!("Node running, waiting for relay messages");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                message = gossip_rx.recv() => {
                    let Some(GossipMessage { peer_id, data }) = message else {
                        break;
                    };
                    debug!("Received {} bytes from {peer_id}", data.len());
                    let relay = Arc::clone(&self.relay);
                    in_flight.spawn(async move {
                        relay.on_message(&peer_id, &data).await;
                    });
                }
            }
        }

        if !in_flight.is_empty() {
            warn!("Abandoning {} in-flight relay messages", in_flight.len());
        }
        in_flight.shutdown().await;

        let _ = self.events_tx.send(NodeEvent::ShuttingDown);
        info!("Node shutdown complete");
        Ok(())
    }

    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn startup_checks(&self) {
        match self.rpc.send("eth_chainId", vec![]).await {
            Ok(chain_id) => info!("Connected to upstream chain {chain_id}"),
            Err(e) => {
                warn!("Upstream chain id check failed: {e}");
                let _ = self.events_tx.send(NodeEvent::Error {
                    message: format!("eth_chainId failed: {e}"),
                });
            }
        }

        let Some(contract) = self.config.relay.contract_address else {
            return;
        };
        let params = vec![json!(contract.to_string()), json!("latest")];
        match self.rpc.send("eth_getCode", params).await {
            Ok(code) if is_empty_code(&code) => {
                warn!("No contract code deployed at {contract}");
            }
            Ok(_) => info!("Registry contract found at {contract}"),
            Err(e) => {
                warn!("Contract code check for {contract} failed: {e}");
                let _ = self.events_tx.send(NodeEvent::Error {
                    message: format!("eth_getCode failed: {e}"),
                });
            }
        }
    }
}

fn is_empty_code(code: &Value) -> bool {
    code.as_str()
        .map_or(true, |code| code.is_empty() || code == "0x")
}
