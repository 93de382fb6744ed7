//! Metered RPC behaviour of a running node.

use super::harness::{TestHarness, TestHarnessConfig};
use paygate_node::RpcError;
use serde_json::json;

fn metered() -> TestHarnessConfig {
    let mut config = TestHarnessConfig::default();
    config.node.upstream.paid_methods =
        ["eth_call".to_string(), "eth_getLogs".to_string()].into();
    config.node.upstream.payment_amount = 25;
    config
}

#[tokio::test]
async fn test_startup_checks_go_through_proxy() {
    let harness = TestHarness::setup().await.expect("setup");

    harness
        .wait_for_upstream("eth_getCode", 1)
        .await
        .expect("contract check");
    assert_eq!(harness.upstream().count("eth_chainId"), 1);

    let requests = harness.upstream().requests();
    let (get_code, voucher) = requests
        .iter()
        .find(|(request, _)| request.method == "eth_getCode")
        .expect("eth_getCode sent");
    assert_eq!(
        get_code.params,
        vec![json!("0xc0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0"), json!("latest")]
    );
    assert!(voucher.is_none());

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_block_number_coalesced_per_turn() {
    let harness = TestHarness::setup().await.expect("setup");
    let rpc = harness.rpc();

    let (a, b) = tokio::join!(
        rpc.send("eth_blockNumber", vec![]),
        rpc.send("eth_blockNumber", vec![])
    );
    assert_eq!(a.expect("first"), b.expect("second"));
    assert_eq!(harness.upstream().count("eth_blockNumber"), 1);

    // Still the same turn: served from the cache.
    rpc.send("eth_blockNumber", vec![]).await.expect("cached");
    assert_eq!(harness.upstream().count("eth_blockNumber"), 1);

    harness.end_turn();
    let c = rpc.send("eth_blockNumber", vec![]).await.expect("next turn");
    assert_eq!(c, json!("0x2"));
    assert_eq!(harness.upstream().count("eth_blockNumber"), 2);

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_paid_methods_carry_one_voucher_each() {
    let harness = TestHarness::setup_with_config(metered())
        .await
        .expect("setup");
    let rpc = harness.rpc();

    rpc.send("eth_call", vec![json!({ "to": "0x00" }), json!("latest")])
        .await
        .expect("eth_call");
    rpc.send("eth_getLogs", vec![json!({ "fromBlock": "0x1" })])
        .await
        .expect("eth_getLogs");
    rpc.send("eth_call", vec![json!({ "to": "0x00" }), json!("latest")])
        .await
        .expect("eth_call again");

    assert_eq!(harness.payments().drawn(), vec![25, 25, 25]);
    let paid: Vec<_> = harness
        .upstream()
        .requests()
        .into_iter()
        .filter(|(request, _)| request.method == "eth_call" || request.method == "eth_getLogs")
        .collect();
    assert_eq!(paid.len(), 3);
    for (_, voucher) in &paid {
        assert_eq!(voucher.as_ref().expect("voucher").amount, 25);
    }

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_exhausted_channel_blocks_paid_calls() {
    let config = TestHarnessConfig {
        balance: 30,
        ..metered()
    };
    let harness = TestHarness::setup_with_config(config).await.expect("setup");
    let rpc = harness.rpc();

    rpc.send("eth_call", vec![]).await.expect("first call paid");
    let second = rpc.send("eth_call", vec![]).await;

    assert!(matches!(second, Err(RpcError::Payment(_))));
    assert_eq!(harness.upstream().count("eth_call"), 1);
    // Unmetered methods are unaffected.
    rpc.send("eth_gasPrice", vec![]).await.expect("free call");

    harness.teardown().await.expect("teardown");
}

#[tokio::test]
async fn test_upstream_errors_reach_caller_unchanged() {
    let harness = TestHarness::setup_with_config(metered())
        .await
        .expect("setup");
    let error = RpcError::Rpc {
        code: -32005,
        message: "query returned more than 10000 results".to_string(),
        data: None,
    };
    harness.upstream().fail("eth_getLogs", error.clone());

    let result = harness.rpc().send("eth_getLogs", vec![]).await;
    assert_eq!(result, Err(error));
    // The voucher was spent even though the call failed.
    assert_eq!(harness.payments().drawn(), vec![25]);

    harness.teardown().await.expect("teardown");
}
