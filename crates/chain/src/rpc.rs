//! JSON-RPC 2.0 transport over HTTP.
//!
//! Every request goes through the shared [`RateGate`]; errors are mapped onto
//! [`ChainError`] so the gate can tell throttling apart from real failures.

use binopt_core::ChainError;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::rate_gate::RateGate;

#[derive(Debug, Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
    gate: RateGate,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// # Errors
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration, gate: RateGate) -> Result<Self, ChainError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            gate,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    #[must_use]
    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Sends a gated request and returns the `result` member (possibly null).
    ///
    /// # Errors
    /// Transport failures, JSON-RPC error objects and unparseable bodies.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        self.gate
            .run(method, move || self.send_once(method, params.clone()))
            .await
    }

    /// `eth_call` against `to` at the latest block; returns the hex result.
    ///
    /// # Errors
    /// An empty `0x` result is reported as [`ChainError::BadData`], which the
    /// gate treats as throttling.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String, ChainError> {
        self.gate
            .run("eth_call", move || async move {
                let result = self
                    .send_once("eth_call", json!([{ "to": to, "data": data }, "latest"]))
                    .await?;
                let hex = result
                    .as_str()
                    .ok_or_else(|| ChainError::BadData("eth_call result is not a string".into()))?;
                if hex.trim_start_matches("0x").is_empty() {
                    return Err(ChainError::BadData(format!("empty eth_call result from {to}")));
                }
                Ok(hex.to_string())
            })
            .await
    }

    async fn send_once(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        trace!(method, id, "RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(map_http_err)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::Network(format!("HTTP 429 from {method}")));
        }
        if !status.is_success() {
            return Err(ChainError::Network(format!("HTTP {status} from {method}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChainError::BadData(format!("{method} response: {e}")))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ChainError::rpc(code, message));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn map_http_err(err: reqwest::Error) -> ChainError {
    if err.is_timeout() {
        ChainError::Timeout(err.to_string())
    } else {
        ChainError::Network(err.to_string())
    }
}

/// Parses a `0x`-prefixed quantity.
pub(crate) fn parse_quantity(value: &Value, what: &str) -> Result<u128, ChainError> {
    let hex = value
        .as_str()
        .ok_or_else(|| ChainError::BadData(format!("{what}: expected hex string, got {value}")))?;
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::BadData(format!("{what}: invalid quantity {hex:?}: {e}")))
}
