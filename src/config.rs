//! Configuration for paygate-node.

use crate::error::{Error, Result};
use crate::payment::{UnconfiguredKindPolicy, DEFAULT_AUTHORIZE_TIMEOUT};
use crate::primitives::{cost_serde, Address, Cost};
use crate::relay::{
    RelayMode, DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_DEDUPE_CAPACITY, DEFAULT_GAS_LIMIT,
};
use crate::rpc::{MeteringConfig, DEFAULT_CACHEABLE_METHODS};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ethereum JSON-RPC methods that may be metered.
const ETH_RPC_METHODS: &[&str] = &[
    "eth_accounts",
    "eth_blockNumber",
    "eth_call",
    "eth_chainId",
    "eth_estimateGas",
    "eth_feeHistory",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getBlockReceipts",
    "eth_getBlockTransactionCountByHash",
    "eth_getBlockTransactionCountByNumber",
    "eth_getCode",
    "eth_getFilterChanges",
    "eth_getFilterLogs",
    "eth_getLogs",
    "eth_getProof",
    "eth_getStorageAt",
    "eth_getTransactionByBlockHashAndIndex",
    "eth_getTransactionByBlockNumberAndIndex",
    "eth_getTransactionByHash",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_getUncleCountByBlockHash",
    "eth_getUncleCountByBlockNumber",
    "eth_maxPriorityFeePerGas",
    "eth_newBlockFilter",
    "eth_newFilter",
    "eth_newPendingTransactionFilter",
    "eth_sendRawTransaction",
    "eth_syncing",
    "eth_uninstallFilter",
    "net_version",
    "web3_clientVersion",
];

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Upstream RPC configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Mutation relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Observe or charge for relayed mutations.
    #[serde(default)]
    pub mode: RelayMode,

    /// Treatment of kinds missing from the rate table.
    #[serde(default)]
    pub unconfigured_kind_policy: UnconfiguredKindPolicy,

    /// TOML rates file; the payments manager's rates are used when absent.
    #[serde(default)]
    pub rates_file: Option<PathBuf>,

    /// Registry contract, checked for deployed code at startup.
    #[serde(default)]
    pub contract_address: Option<Address>,

    /// Gas limit sent with every relayed transaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Bound on one payment check, in seconds.
    #[serde(default = "default_authorize_timeout")]
    pub authorize_timeout_secs: u64,

    /// Bound on waiting for a receipt, in seconds.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Recent envelopes remembered for duplicate suppression (0 disables).
    #[serde(default = "default_dedupe_capacity")]
    pub dedupe_capacity: usize,
}

/// Upstream JSON-RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// HTTP JSON-RPC endpoint.
    #[serde(default = "default_rpc_endpoint")]
    pub rpc_endpoint: String,

    /// Methods paid for with one voucher per call.
    #[serde(default)]
    pub paid_methods: BTreeSet<String>,

    /// Methods whose results are shared within one turn.
    #[serde(default = "default_cacheable_methods")]
    pub cacheable_methods: BTreeSet<String>,

    /// Amount paid per paid call.
    #[serde(default, with = "cost_serde")]
    pub payment_amount: Cost,

    /// HTTP request timeout, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            relay: RelayConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::default(),
            unconfigured_kind_policy: UnconfiguredKindPolicy::default(),
            rates_file: None,
            contract_address: None,
            gas_limit: default_gas_limit(),
            authorize_timeout_secs: default_authorize_timeout(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            dedupe_capacity: default_dedupe_capacity(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: default_rpc_endpoint(),
            paid_methods: BTreeSet::new(),
            cacheable_methods: default_cacheable_methods(),
            payment_amount: 0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

const fn default_authorize_timeout() -> u64 {
    DEFAULT_AUTHORIZE_TIMEOUT.as_secs()
}

const fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT.as_secs()
}

const fn default_dedupe_capacity() -> usize {
    DEFAULT_DEDUPE_CAPACITY
}

fn default_rpc_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_cacheable_methods() -> BTreeSet<String> {
    DEFAULT_CACHEABLE_METHODS
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_request_timeout() -> u64 {
    30
}

impl RelayConfig {
    /// Bound on one payment check.
    #[must_use]
    pub fn authorize_timeout(&self) -> Duration {
        Duration::from_secs(self.authorize_timeout_secs)
    }

    /// Bound on waiting for a receipt.
    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl UpstreamConfig {
    /// HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Metering settings for the RPC proxy.
    #[must_use]
    pub fn metering(&self) -> MeteringConfig {
        MeteringConfig {
            paid_methods: self.paid_methods.iter().cloned().collect(),
            cacheable_methods: self.cacheable_methods.iter().cloned().collect(),
            payment_amount: self.payment_amount,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration before the node is assembled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.upstream.rpc_endpoint).map_err(|e| {
            Error::Config(format!(
                "invalid upstream.rpc_endpoint {}: {e}",
                self.upstream.rpc_endpoint
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "upstream.rpc_endpoint must be http(s), got {}",
                url.scheme()
            )));
        }

        let unknown: Vec<&str> = self
            .upstream
            .paid_methods
            .iter()
            .map(String::as_str)
            .filter(|method| !ETH_RPC_METHODS.contains(method))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::Config(format!(
                "unknown paid RPC methods: {}",
                unknown.join(", ")
            )));
        }

        self.upstream.metering().validate()?;

        if !self.upstream.paid_methods.is_empty() && self.upstream.payment_amount == 0 {
            return Err(Error::Config(
                "upstream.payment_amount must be non-zero when paid methods are set".to_string(),
            ));
        }

        for (name, value) in [
            ("relay.gas_limit", self.relay.gas_limit),
            ("relay.authorize_timeout_secs", self.relay.authorize_timeout_secs),
            (
                "relay.confirmation_timeout_secs",
                self.relay.confirmation_timeout_secs,
            ),
            ("upstream.request_timeout_secs", self.upstream.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }
}
