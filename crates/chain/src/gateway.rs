//! [`ChainGateway`] over an EVM JSON-RPC node.

use async_trait::async_trait;
use binopt_core::{
    ChainConfig, ChainError, ChainGateway, LogEntry, OptionId, OptionState, ReceiptLookup,
    TxReceipt, ZERO_ADDRESS,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::abi;
use crate::rpc::{parse_quantity, RpcClient};
use crate::tx::{self, LegacyTransaction, Signer};

/// Gas price is bumped by this fraction (1/5 = 20%) for faster inclusion.
const GAS_PRICE_BUFFER_DIVISOR: u128 = 5;

pub struct EvmChainGateway {
    rpc: RpcClient,
    contract: String,
    contract_bytes: [u8; 20],
    chain_id: u64,
    gas_limit: u64,
    amount_decimals: u32,
    price_decimals: u32,
    receipt_poll: Duration,
    receipt_timeout: Duration,
    signer: Option<Signer>,
    /// Serializes the executed check through the settlement receipt.
    submit_lock: Mutex<()>,
}

impl EvmChainGateway {
    /// Builds a gateway sharing `rpc`'s rate gate. Without a private key in
    /// `config` the gateway is read-only.
    ///
    /// # Errors
    /// [`ChainError::Configuration`] for a malformed contract address or key.
    pub fn new(config: &ChainConfig, rpc: RpcClient) -> Result<Self, ChainError> {
        let contract_bytes = tx::parse_address(&config.contract_address)?;
        let signer = config
            .private_key
            .as_ref()
            .map(|key| Signer::from_secret(&SecretString::from(key.clone())))
            .transpose()?;

        if let Some(signer) = &signer {
            info!(signer = signer.address(), contract = %config.contract_address, "Chain gateway ready");
        } else {
            warn!(contract = %config.contract_address, "No signing key configured, chain gateway is read-only");
        }

        Ok(Self {
            rpc,
            contract: config.contract_address.to_ascii_lowercase(),
            contract_bytes,
            chain_id: config.chain_id,
            gas_limit: config.gas_limit,
            amount_decimals: config.amount_decimals,
            price_decimals: config.price_decimals,
            receipt_poll: Duration::from_secs(config.receipt_poll_secs),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            signer,
            submit_lock: Mutex::new(()),
        })
    }

    /// Overrides receipt polling cadence.
    #[must_use]
    pub fn with_receipt_polling(mut self, poll: Duration, timeout: Duration) -> Self {
        self.receipt_poll = poll;
        self.receipt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn signer_address(&self) -> Option<&str> {
        self.signer.as_ref().map(Signer::address)
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128, ChainError> {
        let value = self.rpc.request(method, params).await?;
        parse_quantity(&value, method)
    }

    async fn broadcast(&self, raw: &[u8], option_id: OptionId) -> Result<String, ChainError> {
        let local_hash = tx::transaction_hash(raw);
        match self
            .rpc
            .request("eth_sendRawTransaction", json!([abi::to_hex(raw)]))
            .await
        {
            Ok(Value::String(hash)) => Ok(hash),
            Ok(other) => Err(ChainError::BadData(format!(
                "eth_sendRawTransaction returned {other}"
            ))),
            Err(ChainError::Rpc { message, .. }) => {
                let lower = message.to_ascii_lowercase();
                if lower.contains("already executed") {
                    Err(ChainError::AlreadySettled { option_id })
                } else if lower.contains("already known") {
                    // A retried broadcast of a transaction the node already holds.
                    Ok(local_hash)
                } else {
                    Err(ChainError::submission_failed(option_id, message))
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        option_id: OptionId,
    ) -> Result<TxReceipt, ChainError> {
        let started = Instant::now();
        loop {
            match self.get_transaction_receipt(tx_hash).await? {
                ReceiptLookup::Mined(receipt) if receipt.succeeded() => return Ok(receipt),
                ReceiptLookup::Mined(_) => {
                    return Err(ChainError::submission_failed(
                        option_id,
                        format!("transaction {tx_hash} reverted"),
                    ));
                }
                ReceiptLookup::Pending => {
                    if started.elapsed() >= self.receipt_timeout {
                        return Err(ChainError::ReceiptTimeout {
                            tx_hash: tx_hash.to_string(),
                            waited_secs: started.elapsed().as_secs(),
                        });
                    }
                    debug!(%option_id, tx_hash, "Settlement receipt pending");
                    tokio::time::sleep(self.receipt_poll).await;
                }
            }
        }
    }
}

#[async_trait]
impl ChainGateway for EvmChainGateway {
    async fn submit_settlement(&self, option_id: OptionId) -> Result<TxReceipt, ChainError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ChainError::Configuration("no signing key configured, gateway is read-only".into())
        })?;

        // Held through the receipt wait: a queued caller re-reads the option
        // only after the previous settlement is mined.
        let _guard = self.submit_lock.lock().await;

        let state = self.read_option(option_id).await?;
        if state.executed {
            return Err(ChainError::AlreadySettled { option_id });
        }

        let nonce = self
            .quantity("eth_getTransactionCount", json!([signer.address(), "pending"]))
            .await?;
        let nonce = u64::try_from(nonce)
            .map_err(|_| ChainError::BadData(format!("nonce {nonce} out of range")))?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let gas_price = gas_price + gas_price / GAS_PRICE_BUFFER_DIVISOR;

        let transaction = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to: self.contract_bytes,
            data: abi::encode_option_call(abi::EXECUTE_OPTION, option_id),
        };
        let raw = transaction.sign(signer, self.chain_id)?;
        let tx_hash = self.broadcast(&raw, option_id).await?;
        info!(%option_id, tx_hash = %tx_hash, nonce, %gas_price, "Settlement transaction sent");

        let receipt = self.wait_for_receipt(&tx_hash, option_id).await?;
        info!(%option_id, tx_hash = %tx_hash, block = ?receipt.block_number, "Settlement confirmed");
        Ok(receipt)
    }

    async fn read_option(&self, option_id: OptionId) -> Result<OptionState, ChainError> {
        let calldata = abi::to_hex(&abi::encode_option_call(abi::GET_OPTION, option_id));
        let data = self.rpc.eth_call(&self.contract, &calldata).await?;
        let state = abi::decode_option(option_id, &data, self.amount_decimals, self.price_decimals)?;

        if state.trader == ZERO_ADDRESS {
            return Err(ChainError::OptionNotFound { option_id });
        }
        Ok(state)
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<ReceiptLookup, ChainError> {
        let value = self
            .rpc
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if value.is_null() {
            return Ok(ReceiptLookup::Pending);
        }
        parse_receipt(tx_hash, &value).map(ReceiptLookup::Mined)
    }

    fn extract_option_id(&self, receipt: &TxReceipt) -> Option<OptionId> {
        abi::option_id_from_logs(&receipt.logs, &self.contract)
    }
}

fn parse_receipt(tx_hash: &str, value: &Value) -> Result<TxReceipt, ChainError> {
    let status = match value.get("status") {
        Some(status) => parse_quantity(status, "receipt status")? == 1,
        None => {
            return Err(ChainError::BadData(format!(
                "receipt for {tx_hash} carries no status"
            )))
        }
    };
    let block_number = value
        .get("blockNumber")
        .filter(|v| !v.is_null())
        .map(|v| parse_quantity(v, "blockNumber"))
        .transpose()?
        .and_then(|n| i64::try_from(n).ok());

    let logs = value
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| logs.iter().map(parse_log).collect())
        .unwrap_or_default();

    Ok(TxReceipt {
        tx_hash: value
            .get("transactionHash")
            .and_then(Value::as_str)
            .unwrap_or(tx_hash)
            .to_string(),
        block_number,
        status,
        logs,
    })
}

fn parse_log(log: &Value) -> LogEntry {
    let text = |key: &str| log.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    LogEntry {
        address: text("address").to_ascii_lowercase(),
        topics: log
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default(),
        data: text("data"),
    }
}
