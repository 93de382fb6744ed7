//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use paygate_node::payment::UnconfiguredKindPolicy;
use paygate_node::{Address, NodeConfig, RelayMode};
use std::path::PathBuf;

/// Payment-gated mutation relay with a metered upstream RPC proxy.
#[derive(Parser, Debug)]
#[command(name = "paygate-node")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Relay mode.
    #[arg(long, value_enum, env = "PAYGATE_MODE")]
    pub mode: Option<CliRelayMode>,

    /// Treatment of mutation kinds without a configured rate.
    #[arg(long, value_enum, env = "PAYGATE_UNCONFIGURED_KINDS")]
    pub unconfigured_kinds: Option<CliKindPolicy>,

    /// TOML file with a `[mutations]` rate table.
    #[arg(long, env = "PAYGATE_RATES_FILE")]
    pub rates_file: Option<PathBuf>,

    /// Registry contract address.
    #[arg(long, env = "PAYGATE_CONTRACT_ADDRESS")]
    pub contract_address: Option<Address>,

    /// Gas limit for relayed transactions.
    #[arg(long, env = "PAYGATE_GAS_LIMIT")]
    pub gas_limit: Option<u64>,

    /// Upstream JSON-RPC endpoint.
    #[arg(long, env = "PAYGATE_RPC_ENDPOINT")]
    pub rpc_endpoint: Option<String>,

    /// Methods paid for per call (repeat or comma-separate).
    #[arg(long, value_delimiter = ',', env = "PAYGATE_PAID_METHODS")]
    pub paid_methods: Vec<String>,

    /// Amount paid per paid RPC call.
    #[arg(long, env = "PAYGATE_PAYMENT_AMOUNT")]
    pub payment_amount: Option<u128>,

    /// Log filter; overrides `log_level` from the config file.
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Relay mode CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliRelayMode {
    /// Log relayed mutations only.
    Observer,
    /// Charge for relayed mutations.
    Paid,
}

/// Unconfigured kind policy CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliKindPolicy {
    /// Relay without payment.
    Free,
    /// Drop.
    Reject,
}

impl Cli {
    /// Convert CLI arguments into a `NodeConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<NodeConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            NodeConfig::from_file(path)?
        } else {
            NodeConfig::default()
        };

        // Override with CLI arguments
        if let Some(mode) = self.mode {
            config.relay.mode = mode.into();
        }
        if let Some(policy) = self.unconfigured_kinds {
            config.relay.unconfigured_kind_policy = policy.into();
        }
        if let Some(rates_file) = self.rates_file {
            config.relay.rates_file = Some(rates_file);
        }
        if let Some(contract) = self.contract_address {
            config.relay.contract_address = Some(contract);
        }
        if let Some(gas_limit) = self.gas_limit {
            config.relay.gas_limit = gas_limit;
        }
        if let Some(endpoint) = self.rpc_endpoint {
            config.upstream.rpc_endpoint = endpoint;
        }
        if !self.paid_methods.is_empty() {
            config.upstream.paid_methods = self.paid_methods.into_iter().collect();
        }
        if let Some(amount) = self.payment_amount {
            config.upstream.payment_amount = amount;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }

        Ok(config)
    }
}

impl From<CliRelayMode> for RelayMode {
    fn from(m: CliRelayMode) -> Self {
        match m {
            CliRelayMode::Observer => RelayMode::Observer,
            CliRelayMode::Paid => RelayMode::Paid,
        }
    }
}

impl From<CliKindPolicy> for UnconfiguredKindPolicy {
    fn from(p: CliKindPolicy) -> Self {
        match p {
            CliKindPolicy::Free => UnconfiguredKindPolicy::Free,
            CliKindPolicy::Reject => UnconfiguredKindPolicy::Reject,
        }
    }
}
