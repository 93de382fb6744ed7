//! End-to-end tests for paygate-node.
//!
//! A full node is assembled through `NodeBuilder` with in-memory doubles for
//! the payments manager, the chain client and the upstream RPC provider.
//! Relay messages are pushed through the node's gossip intake exactly as a
//! gossip transport would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod harness;
mod rpc_proxy;

pub use harness::{
    signed_envelope, HarnessError, InMemoryChain, InMemoryPayments, InMemoryUpstream,
    TestHarness, TestHarnessConfig,
};
