//! Mutation price list keyed by operation kind.
//!
//! Loaded once at startup and never mutated afterwards, so it can be shared
//! across concurrent message handlers behind an `Arc` without locking.

use crate::error::{Error, Result};
use crate::primitives::{cost_serde, Cost};
use crate::relay::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// What to do with an operation kind that has no configured rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnconfiguredKindPolicy {
    /// Forward unpriced kinds without any payment check.
    Free,
    /// Drop unpriced kinds.
    #[default]
    Reject,
}

/// Price resolved for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    /// A payment of at least this cost must be authenticated.
    Paid(Cost),
    /// Forward without authentication.
    Free,
    /// Drop the message.
    Rejected,
}

/// On-disk layout of a rates file.
#[derive(Debug, Deserialize)]
struct RatesFile {
    #[serde(default)]
    mutations: BTreeMap<String, RateValue>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RateValue(#[serde(with = "cost_serde")] Cost);

/// Static mapping from operation kind to cost.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<OperationKind, Cost>,
}

impl RateTable {
    /// Build a table from `(kind, cost)` pairs.
    pub fn from_rates<I, K>(rates: I) -> Self
    where
        I: IntoIterator<Item = (K, Cost)>,
        K: Into<OperationKind>,
    {
        Self {
            rates: rates.into_iter().map(|(k, c)| (k.into(), c)).collect(),
        }
    }

    /// Parse a rates document:
    ///
    /// ```toml
    /// [mutations]
    /// invoke = "100"
    /// revoke = 50
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML or a cost
    /// is not a non-negative integer.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RatesFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid rates: {e}")))?;
        Ok(Self::from_rates(
            file.mutations
                .into_iter()
                .map(|(kind, rate)| (OperationKind::from(kind.as_str()), rate.0)),
        ))
    }

    /// Load a rates file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_toml_str(&content)?;
        debug!(
            "Loaded {} mutation rates from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Configured cost for `kind`, if any.
    #[must_use]
    pub fn cost(&self, kind: &OperationKind) -> Option<Cost> {
        self.rates.get(kind).copied()
    }

    /// Resolve the price of `kind` under the given policy.
    ///
    /// A kind configured with a zero cost is always free; the policy only
    /// applies to kinds missing from the table.
    #[must_use]
    pub fn price(&self, kind: &OperationKind, policy: UnconfiguredKindPolicy) -> Price {
        match (self.cost(kind), policy) {
            (Some(0), _) | (None, UnconfiguredKindPolicy::Free) => Price::Free,
            (Some(cost), _) => Price::Paid(cost),
            (None, UnconfiguredKindPolicy::Reject) => Price::Rejected,
        }
    }

    /// Number of configured kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether no kind is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
