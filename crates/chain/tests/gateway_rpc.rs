//! Gateway and oracle against a mock JSON-RPC node.

use binopt_chain::{abi, ChainlinkOracle, EvmChainGateway, RateGate, RpcClient};
use binopt_core::{
    ChainConfig, ChainError, ChainGateway, FeedConfig, OptionId, OracleConfig, PriceOracle,
    ReceiptLookup, ZERO_ADDRESS,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";
const TRADER: &str = "0x00000000000000000000000000000000000000b0";
const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const SETTLE_HASH: &str = "0x5e771e5e771e5e771e5e771e5e771e5e771e5e771e5e771e5e771e5e771e5e77";

// ==================== Helpers ====================

fn word(value: u128) -> String {
    format!("{value:064x}")
}

fn option_data(trader: &str, entry: u128, exit: u128, payout: u128, is_win: bool, executed: bool) -> String {
    let mut symbol = b"BTC".to_vec();
    symbol.resize(32, 0);
    let words = [
        format!("{:0>64}", trader.trim_start_matches("0x")),
        hex::encode(symbol),
        word(10 * 10u128.pow(18)),
        word(entry),
        word(exit),
        word(payout),
        word(1_700_000_300),
        word(1),
        word(u128::from(is_win)),
        word(u128::from(executed)),
    ];
    format!("0x{}", words.concat())
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

fn rpc_method(name: &str) -> impl wiremock::Match {
    body_partial_json(json!({ "method": name }))
}

fn chain_config(uri: &str, private_key: Option<&str>) -> ChainConfig {
    ChainConfig {
        rpc_url: uri.to_string(),
        contract_address: CONTRACT.to_string(),
        private_key: private_key.map(str::to_string),
        ..ChainConfig::default()
    }
}

fn rpc(uri: &str) -> RpcClient {
    let gate = RateGate::with_limits(Duration::ZERO, 1, Duration::from_millis(1));
    RpcClient::new(uri, Duration::from_secs(5), gate).unwrap()
}

fn gateway(server: &MockServer, key: Option<&str>) -> EvmChainGateway {
    let uri = server.uri();
    EvmChainGateway::new(&chain_config(&uri, key), rpc(&uri))
        .unwrap()
        .with_receipt_polling(Duration::from_millis(10), Duration::from_millis(200))
}

fn mined_receipt(status: &str, logs: Value) -> Value {
    json!({
        "transactionHash": SETTLE_HASH,
        "blockNumber": "0x10",
        "status": status,
        "logs": logs,
    })
}

async fn mount_option(server: &MockServer, data: String) {
    Mock::given(method("POST"))
        .and(rpc_method("eth_call"))
        .respond_with(rpc_result(json!(data)))
        .mount(server)
        .await;
}

async fn mount_nonce_and_gas(server: &MockServer) {
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionCount"))
        .respond_with(rpc_result(json!("0x7")))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_gasPrice"))
        .respond_with(rpc_result(json!("0x6fc23ac00")))
        .mount(server)
        .await;
}

// ==================== Read Tests ====================

#[tokio::test]
async fn test_read_option_decodes_state() {
    let server = MockServer::start().await;
    mount_option(
        &server,
        option_data(TRADER, 6_400_000_000_000, 6_400_000_000_000, 0, false, true),
    )
    .await;

    let state = gateway(&server, None).read_option(OptionId::new(3)).await.unwrap();
    assert_eq!(state.trader, TRADER);
    assert_eq!(state.entry_price, dec!(64000));
    assert_eq!(state.exit_price, state.entry_price);
    assert!(state.executed);
}

#[tokio::test]
async fn test_read_option_zero_trader_is_not_found() {
    let server = MockServer::start().await;
    mount_option(&server, option_data(ZERO_ADDRESS, 0, 0, 0, false, false)).await;

    let err = gateway(&server, None).read_option(OptionId::new(99)).await.unwrap_err();
    assert!(matches!(err, ChainError::OptionNotFound { .. }));
}

#[tokio::test]
async fn test_receipt_lookup_pending_and_mined() {
    let server = MockServer::start().await;
    let created_topic = abi::event_topic(abi::OPTION_CREATED);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "params": ["0xpending"] })))
        .respond_with(rpc_result(Value::Null))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "params": ["0xmined"] })))
        .respond_with(rpc_result(mined_receipt(
            "0x1",
            json!([{
                "address": CONTRACT.to_uppercase().replace("0X", "0x"),
                "topics": [created_topic, format!("0x{}", word(42)), format!("0x{}", word(0xb0))],
                "data": "0x"
            }]),
        )))
        .mount(&server)
        .await;

    let gw = gateway(&server, None);
    assert_eq!(
        gw.get_transaction_receipt("0xpending").await.unwrap(),
        ReceiptLookup::Pending
    );

    let ReceiptLookup::Mined(receipt) = gw.get_transaction_receipt("0xmined").await.unwrap() else {
        panic!("expected mined receipt");
    };
    assert!(receipt.succeeded());
    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(gw.extract_option_id(&receipt), Some(OptionId::new(42)));
}

#[tokio::test]
async fn test_failed_receipt_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(mined_receipt("0x0", json!([]))))
        .mount(&server)
        .await;

    let gw = gateway(&server, None);
    let ReceiptLookup::Mined(receipt) = gw.get_transaction_receipt("0xdead").await.unwrap() else {
        panic!("expected mined receipt");
    };
    assert!(!receipt.succeeded());
    assert_eq!(gw.extract_option_id(&receipt), None);
}

// ==================== Submission Tests ====================

#[tokio::test]
async fn test_submit_settlement_waits_for_receipt() {
    let server = MockServer::start().await;
    mount_option(&server, option_data(TRADER, 100, 200, 0, false, false)).await;
    mount_nonce_and_gas(&server).await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_sendRawTransaction"))
        .respond_with(rpc_result(json!(SETTLE_HASH)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(Value::Null))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(mined_receipt("0x1", json!([]))))
        .mount(&server)
        .await;

    let receipt = gateway(&server, Some(DEV_KEY))
        .submit_settlement(OptionId::new(5))
        .await
        .unwrap();
    assert_eq!(receipt.tx_hash, SETTLE_HASH);
    assert!(receipt.succeeded());
}

#[tokio::test]
async fn test_submit_on_executed_option_is_already_settled() {
    let server = MockServer::start().await;
    mount_option(&server, option_data(TRADER, 100, 200, 0, false, true)).await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_sendRawTransaction"))
        .respond_with(rpc_result(json!(SETTLE_HASH)))
        .expect(0)
        .mount(&server)
        .await;

    let err = gateway(&server, Some(DEV_KEY))
        .submit_settlement(OptionId::new(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::AlreadySettled { .. }));
}

/// Contract that flips to executed once a settlement is broadcast.
#[derive(Clone, Default)]
struct SettlingContract {
    executed: Arc<AtomicBool>,
    broadcasts: Arc<AtomicUsize>,
}

struct OptionRead(SettlingContract);

impl Respond for OptionRead {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let executed = self.0.executed.load(Ordering::SeqCst);
        rpc_result(json!(option_data(TRADER, 100, 200, 0, false, executed)))
    }
}

struct Broadcast(SettlingContract);

impl Respond for Broadcast {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.0.broadcasts.fetch_add(1, Ordering::SeqCst);
        self.0.executed.store(true, Ordering::SeqCst);
        rpc_result(json!(SETTLE_HASH))
    }
}

#[tokio::test]
async fn test_concurrent_submissions_broadcast_once() {
    let server = MockServer::start().await;
    let contract = SettlingContract::default();
    Mock::given(method("POST"))
        .and(rpc_method("eth_call"))
        .respond_with(OptionRead(contract.clone()))
        .mount(&server)
        .await;
    mount_nonce_and_gas(&server).await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_sendRawTransaction"))
        .respond_with(Broadcast(contract.clone()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(mined_receipt("0x1", json!([]))))
        .mount(&server)
        .await;

    let gw = gateway(&server, Some(DEV_KEY));
    let (a, b) = tokio::join!(
        gw.submit_settlement(OptionId::new(5)),
        gw.submit_settlement(OptionId::new(5))
    );

    assert_eq!(contract.broadcasts.load(Ordering::SeqCst), 1);
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ChainError::AlreadySettled { .. }))));
}

#[tokio::test]
async fn test_node_rejections_are_classified() {
    for (message, already) in [
        ("execution reverted: option already executed", true),
        ("insufficient funds for gas * price + value", false),
    ] {
        let server = MockServer::start().await;
        mount_option(&server, option_data(TRADER, 100, 200, 0, false, false)).await;
        mount_nonce_and_gas(&server).await;
        Mock::given(method("POST"))
            .and(rpc_method("eth_sendRawTransaction"))
            .respond_with(rpc_error(-32000, message))
            .mount(&server)
            .await;

        let err = gateway(&server, Some(DEV_KEY))
            .submit_settlement(OptionId::new(5))
            .await
            .unwrap_err();
        if already {
            assert!(matches!(err, ChainError::AlreadySettled { .. }), "{err}");
        } else {
            assert!(matches!(err, ChainError::SubmissionFailed { .. }), "{err}");
        }
    }
}

#[tokio::test]
async fn test_reverted_settlement_is_submission_failure() {
    let server = MockServer::start().await;
    mount_option(&server, option_data(TRADER, 100, 200, 0, false, false)).await;
    mount_nonce_and_gas(&server).await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_sendRawTransaction"))
        .respond_with(rpc_result(json!(SETTLE_HASH)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(mined_receipt("0x0", json!([]))))
        .mount(&server)
        .await;

    let err = gateway(&server, Some(DEV_KEY))
        .submit_settlement(OptionId::new(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::SubmissionFailed { .. }));
    assert!(!err.is_systemic());
}

#[tokio::test]
async fn test_missing_receipt_times_out() {
    let server = MockServer::start().await;
    mount_option(&server, option_data(TRADER, 100, 200, 0, false, false)).await;
    mount_nonce_and_gas(&server).await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_sendRawTransaction"))
        .respond_with(rpc_result(json!(SETTLE_HASH)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(rpc_method("eth_getTransactionReceipt"))
        .respond_with(rpc_result(Value::Null))
        .mount(&server)
        .await;

    let err = gateway(&server, Some(DEV_KEY))
        .submit_settlement(OptionId::new(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::ReceiptTimeout { .. }));
    assert!(err.is_systemic());
}

#[tokio::test]
async fn test_read_only_gateway_refuses_submission() {
    let server = MockServer::start().await;
    let gw = gateway(&server, None);
    assert!(gw.signer_address().is_none());

    let err = gw.submit_settlement(OptionId::new(1)).await.unwrap_err();
    assert!(matches!(err, ChainError::Configuration(_)));
}

// ==================== Oracle Tests ====================

#[tokio::test]
async fn test_oracle_reads_latest_round() {
    let server = MockServer::start().await;
    let feed = "0xc907e116054ad103354f2d350fd2514433d57f6f";
    let updated_at = chrono::Utc::now().timestamp() as u128;
    let round = format!(
        "0x{}{}{}{}{}",
        word(1),
        word(6_412_345_000_000),
        word(updated_at),
        word(updated_at),
        word(1)
    );
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{ "to": feed, "data": "0xfeaf968c" }]
        })))
        .respond_with(rpc_result(json!(round)))
        .mount(&server)
        .await;

    let mut config = OracleConfig::default();
    config.feeds.insert(
        "BTC".to_string(),
        FeedConfig {
            address: feed.to_string(),
            decimals: 8,
        },
    );
    let oracle = ChainlinkOracle::new(rpc(&server.uri()), &config);

    assert_eq!(oracle.get_price("btc").await.unwrap(), dec!(64123.45));
}

#[tokio::test]
async fn test_oracle_unreachable_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = OracleConfig::default();
    config.feeds.insert(
        "ETH".to_string(),
        FeedConfig {
            address: "0xf9680d99d6c9589e2a93a78a04a279e509205945".to_string(),
            decimals: 8,
        },
    );
    let oracle = ChainlinkOracle::new(rpc(&server.uri()), &config);
    let err = oracle.get_price("ETH").await.unwrap_err();
    assert!(err.to_string().contains("ETH"));
}
